//! Expansion of `append`.
//!
//! All three forms share the growth idiom:
//!
//! ```text
//! s := x
//! n := len(s) + k
//! if uint(n) > uint(cap(s)) { s = growslice(T, s, n) }
//! s = s[:n]
//! ```
//!
//! The unsigned comparison sends an overflowed (negative) `n` to `growslice`,
//! which rejects it. Statements built here are already lowered.

use tracing::debug;

use super::maps::type_desc;
use super::safe::{assign_conv, same_safe_expr};
use super::{ExprWalker, Lowerer};
use crate::diagnostics::LowerError;
use crate::ir::{BinaryOp, Expr, ExprKind, Lit, Stmt, StmtKind, Type, UnaryOp};
use crate::span::Span;

fn len_of(e: Expr) -> Expr {
    Expr::len(e, Type::Int)
}

fn cap_of(e: Expr) -> Expr {
    Expr::cap(e, Type::Int)
}

fn slice_data(e: Expr, elem: Type) -> Expr {
    Expr::unary(UnaryOp::SlicePtr, e, elem.ptr_to())
}

/// `s[low:high]` with the bounds check elided when `bounded`.
fn reslice(s: Expr, low: Option<Expr>, high: Option<Expr>, bounded: bool) -> Expr {
    let ty = s.ty.clone();
    let kind = ExprKind::Slice { base: Box::new(s), low: low.map(Box::new), high: high.map(Box::new), bounded };
    Expr::new(kind, ty)
}

fn bounded_index(s: Expr, index: Expr, elem: Type) -> Expr {
    Expr::new(ExprKind::Index { base: Box::new(s), index: Box::new(index), bounded: true }, elem)
}

fn byte_type() -> Type {
    Type::Sized { bits: 8, signed: false }
}

impl<W: ExprWalker> Lowerer<'_, W> {
    /// `append(x, make([]T, n)...)` with no capacity, in a build that allows
    /// the zero-extend fast path, and with an `n` whose every positive value
    /// fits a `uint`.
    pub fn is_append_of_make(&self, call: &Expr) -> bool {
        let config = self.frame.config;
        if config.flags.no_optimize || config.instrumenting() {
            return false;
        }
        let ExprKind::Append { args, spread: true, .. } = &call.kind else {
            return false;
        };
        if args.len() != 2 {
            return false;
        }
        let ExprKind::MakeSlice { len, cap: None } = &args[1].kind else {
            return false;
        };
        match len.kind {
            ExprKind::Lit(Lit::Int(n)) => n >= 0,
            _ => len.ty.size(&config.target) <= config.int_size(),
        }
    }

    /// Lower every argument and reduce it to a name or literal, so nothing
    /// an argument does can interleave with the append's own stores.
    fn walk_append_args(&mut self, args: Vec<Expr>, init: &mut Vec<Stmt>) -> Result<Vec<Expr>, LowerError> {
        let args = self.walk_exprs_safe(args, init)?;
        Ok(args.into_iter().map(|a| self.frame.cheap_expr(a, init)).collect())
    }

    /// `if uint(n) > uint(cap(s)) { s = growslice(T, s, n) }`
    fn grow_check(&mut self, s: &Expr, n: &Expr, elem: &Type, span: Span) -> Result<Stmt, LowerError> {
        let n_uint = Expr::conv(n.clone(), Type::Uint);
        let cap_uint = Expr::conv(cap_of(s.clone()), Type::Uint);
        let cond = Expr::binary(BinaryOp::Gt, n_uint, cap_uint, Type::Bool);
        let grow = self
            .frame
            .mkcall("growslice", vec![type_desc(elem), s.clone(), n.clone()], s.ty.clone(), span)?;
        Ok(Stmt::if_(cond, vec![Stmt::assign(s.clone(), grow)], Vec::new()))
    }

    /// `append(l1, l2...)` where `l2` is a slice or a string.
    pub fn append_slice(&mut self, call: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        let span = call.span;
        let ty = call.ty;
        let ExprKind::Append { args, .. } = call.kind else {
            return Err(LowerError::internal("append_slice: not an append", span));
        };
        let [l1, l2]: [Expr; 2] = self
            .walk_append_args(args, init)?
            .try_into()
            .map_err(|_| LowerError::internal("append_slice: expected two operands", span))?;
        let elem = ty.elem().cloned().unwrap_or(Type::Void);
        let width = elem.size(&self.frame.config.target);
        debug!(elem = %elem, "append range");

        let mut nodes = Vec::new();
        let s = self.frame.temp(ty.clone());
        nodes.push(Stmt::assign(s.clone(), l1.clone()));
        let n = self.frame.temp(Type::Int);
        let total = Expr::binary(BinaryOp::Add, len_of(s.clone()), len_of(l2.clone()), Type::Int);
        nodes.push(Stmt::assign(n.clone(), total));
        nodes.push(self.grow_check(&s, &n, &elem, span)?);
        nodes.push(Stmt::assign(s.clone(), reslice(s.clone(), None, Some(n), true)));

        let copy = if elem.has_pointers() {
            // copy(s[len(l1):], l2) with write barriers
            self.frame.set_wb_pos(span);
            let tail = reslice(s.clone(), Some(len_of(l1)), None, false);
            self.frame.mkcall("typedslicecopy", vec![type_desc(&elem), tail, l2], Type::Int, span)?
        } else if self.frame.config.instrumenting() && !self.frame.config.flags.compiling_runtime {
            // Let the runtime see the copy.
            let tail = reslice(s.clone(), Some(len_of(l1)), None, false);
            let width = Expr::int(width as i64, Type::Uintptr);
            self.frame.mkcall("slicecopy", vec![tail, l2, width], Type::Int, span)?
        } else {
            // memmove(&s[len(l1)], &l2[0], len(l2)*sizeof(T))
            let addr = Expr::addr_of(bounded_index(s.clone(), len_of(l1), elem.clone()));
            let src_elem = l2.ty.elem().cloned().unwrap_or_else(byte_type);
            let src = slice_data(l2.clone(), src_elem);
            let count = self.frame.copy_expr(Expr::conv(len_of(l2), Type::Uintptr), &mut nodes);
            let bytes = Expr::binary(BinaryOp::Mul, count, Expr::int(width as i64, Type::Uintptr), Type::Uintptr);
            self.frame.mkcall("memmove", vec![addr, src, bytes], Type::Void, span)?
        };
        nodes.push(Stmt::expr(copy).at(span));

        init.append(&mut nodes);
        Ok(s)
    }

    /// `append(l1, make([]T, l2)...)`: grow by `l2` zeroed elements without
    /// allocating the temporary slice.
    pub fn extend_slice(&mut self, call: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        let span = call.span;
        let ty = call.ty;
        let ExprKind::Append { args, .. } = call.kind else {
            return Err(LowerError::internal("extend_slice: not an append", span));
        };
        let [l1, mk]: [Expr; 2] = args
            .try_into()
            .map_err(|_| LowerError::internal("extend_slice: expected two operands", span))?;
        let ExprKind::MakeSlice { len, .. } = mk.kind else {
            return Err(LowerError::internal("extend_slice: second operand is not make", span));
        };
        // Values too large for an int turn negative here and fail the check below.
        let l2 = assign_conv(*len, &Type::Int);
        let [l1, l2]: [Expr; 2] = self
            .walk_append_args(vec![l1, l2], init)?
            .try_into()
            .map_err(|_| LowerError::internal("extend_slice: lost an operand", span))?;
        let elem = ty.elem().cloned().unwrap_or(Type::Void);
        let width = elem.size(&self.frame.config.target);
        debug!(elem = %elem, "append zero-extend");

        let mut nodes = Vec::new();

        // if l2 >= 0 {} else { panicmakeslicelen() }
        let non_negative = Expr::binary(BinaryOp::Ge, l2.clone(), Expr::int(0, Type::Int), Type::Bool);
        let panic = self.frame.mkcall("panicmakeslicelen", Vec::new(), Type::Void, span)?;
        nodes.push(Stmt::new(StmtKind::If {
            cond: non_negative,
            then: Vec::new(),
            els: vec![Stmt::expr(panic).at(span)],
            likely: true,
        }));

        let s = self.frame.temp(ty.clone());
        nodes.push(Stmt::assign(s.clone(), l1.clone()));
        let n = self.frame.temp(Type::Int);
        let total = Expr::binary(BinaryOp::Add, len_of(s.clone()), l2.clone(), Type::Int);
        nodes.push(Stmt::assign(n.clone(), total));
        nodes.push(self.grow_check(&s, &n, &elem, span)?);
        nodes.push(Stmt::assign(s.clone(), reslice(s.clone(), None, Some(n), true)));

        // Backing arrays before and after the possible growth.
        let l1_ptr = self.frame.temp(elem.clone().ptr_to());
        nodes.push(Stmt::assign(l1_ptr.clone(), slice_data(l1.clone(), elem.clone())));
        let s_ptr = self.frame.temp(elem.clone().ptr_to());
        nodes.push(Stmt::assign(s_ptr.clone(), slice_data(s.clone(), elem.clone())));

        // hp := &s[len(l1)], hn := l2 * sizeof(T)
        let hp = Expr::conv(
            Expr::addr_of(bounded_index(s.clone(), len_of(l1), elem.clone())),
            Type::UnsafePtr,
        );
        let hn = Expr::conv(
            Expr::binary(BinaryOp::Mul, l2, Expr::int(width as i64, Type::Int), Type::Int),
            Type::Uintptr,
        );

        if elem.has_pointers() {
            self.frame.set_wb_pos(span);
            let clear = self.frame.mkcall("memclrHasPointers", vec![hp, hn], Type::Void, span)?;
            // growslice hands back zeroed memory for pointer-carrying elements.
            let same = Expr::binary(BinaryOp::Eq, l1_ptr, s_ptr, Type::Bool);
            nodes.push(Stmt::if_(same, vec![Stmt::expr(clear).at(span)], Vec::new()));
        } else {
            let clear = self.frame.mkcall("memclrNoHeapPointers", vec![hp, hn], Type::Void, span)?;
            nodes.push(Stmt::expr(clear).at(span));
        }

        init.append(&mut nodes);
        Ok(s)
    }

    /// Element-wise `append(s, a, b, ...)`. The call is normally left for the
    /// backend once its operands are cheap; instrumented builds get the
    /// explicit grow-and-store form instead.
    pub fn walk_append(&mut self, call: Expr, init: &mut Vec<Stmt>, dst: Option<&Expr>) -> Result<Expr, LowerError> {
        let span = call.span;
        let ty = call.ty;
        let ExprKind::Append { args, elem_desc, .. } = call.kind else {
            return Err(LowerError::internal("walk_append: not an append", span));
        };
        let mut args = args.into_iter();
        let Some(first) = args.next() else {
            return Err(LowerError::internal("append with no operands", span));
        };
        let src = match dst {
            Some(dst) if same_safe_expr(dst, &first) => first,
            _ => {
                let first = self.walk(first, init)?;
                self.frame.safe_expr(first, init)?.into_expr()
            }
        };

        let elem = ty.elem().cloned().unwrap_or(Type::Void);
        let values = self.walk_exprs_safe(args.collect(), init)?;
        let values: Vec<Expr> = values
            .into_iter()
            .map(|v| {
                let v = self.frame.cheap_expr(v, init);
                assign_conv(v, &elem)
            })
            .collect();

        if values.is_empty() {
            return Ok(src);
        }
        let config = self.frame.config;
        if !config.instrumenting() || config.flags.compiling_runtime {
            let mut all = Vec::with_capacity(values.len() + 1);
            all.push(src);
            all.extend(values);
            let kind = ExprKind::Append { args: all, spread: false, elem_desc };
            return Ok(Expr::new(kind, ty).at(span));
        }

        let argc = values.len() as i64;
        let mut nodes = Vec::new();
        let s = self.frame.temp(ty.clone());
        nodes.push(Stmt::assign(s.clone(), src));

        // if cap(s) - len(s) < argc { s = growslice(T, s, len(s) + argc) }
        let room = Expr::binary(BinaryOp::Sub, cap_of(s.clone()), len_of(s.clone()), Type::Int);
        let cond = Expr::binary(BinaryOp::Lt, room, Expr::int(argc, Type::Int), Type::Bool);
        let want = Expr::binary(BinaryOp::Add, len_of(s.clone()), Expr::int(argc, Type::Int), Type::Int);
        let grow = self.frame.mkcall("growslice", vec![type_desc(&elem), s.clone(), want], ty.clone(), span)?;
        nodes.push(Stmt::if_(cond, vec![Stmt::assign(s.clone(), grow)], Vec::new()));

        let n = self.frame.temp(Type::Int);
        nodes.push(Stmt::assign(n.clone(), len_of(s.clone())));
        let end = Expr::binary(BinaryOp::Add, n.clone(), Expr::int(argc, Type::Int), Type::Int);
        nodes.push(Stmt::assign(s.clone(), reslice(s.clone(), None, Some(end), true)));

        let count = values.len();
        for (i, v) in values.into_iter().enumerate() {
            nodes.push(Stmt::assign(bounded_index(s.clone(), n.clone(), elem.clone()), v));
            if i + 1 < count {
                let next = Expr::binary(BinaryOp::Add, n.clone(), Expr::int(1, Type::Int), Type::Int);
                nodes.push(Stmt::assign(n.clone(), next));
            }
        }

        init.append(&mut nodes);
        Ok(s)
    }
}
