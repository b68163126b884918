//! Single assignment: `x = y` and `x op= y`.

use tracing::debug;

use super::safe::same_safe_expr;
use super::{ExprWalker, Lowerer};
use crate::diagnostics::LowerError;
use crate::ir::pretty::pretty_expr;
use crate::ir::{BinaryOp, Expr, ExprKind, SafeExpr, Stmt, StmtKind, Type};
use crate::span::Span;

impl<W: ExprWalker> Lowerer<'_, W> {
    /// Lower one plain or compound assignment. The destination is lowered
    /// exactly once and made safe; the source is then dispatched on its shape.
    pub fn walk_assign(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let span = stmt.span;
        let (dst, src) = match stmt.kind {
            StmtKind::Assign { dst, src } => {
                let is_map_store = matches!(dst.kind, ExprKind::MapIndex { .. });
                match src {
                    Some(src) if is_map_store => self.lower_map_store(dst, src, init, span)?,
                    src => (self.walk_single_dest(dst, init)?.into_expr(), src),
                }
            }
            StmtKind::AssignOp { dst, op, src } => self.lower_compound(dst, op, src, init, span)?,
            other => {
                return Err(LowerError::internal(
                    format!("walk_assign: not a single assignment: {other:?}"),
                    span,
                ));
            }
        };
        self.assign_source(dst, src, init, span)
    }

    /// Lower a single destination. A map index becomes a `mapassign` slot.
    fn walk_single_dest(&mut self, mut dst: Expr, init: &mut Vec<Stmt>) -> Result<SafeExpr, LowerError> {
        if let ExprKind::MapIndex { assigned, .. } = &mut dst.kind {
            *assigned = true;
        }
        let dst = self.walk(dst, init)?;
        self.frame.safe_expr(dst, init)
    }

    /// `m[k] = v`. The value is computed before `mapassign` creates the slot,
    /// so a panicking source leaves the map untouched. `m[k] = append(m[k], ...)`
    /// shares one `mapassign` between the read and the write.
    fn lower_map_store(
        &mut self,
        dst: Expr,
        src: Expr,
        init: &mut Vec<Stmt>,
        span: Span,
    ) -> Result<(Expr, Option<Expr>), LowerError> {
        let fused = match &src.kind {
            ExprKind::Append { args, .. } => matches!(args.first(), Some(a) if matches!(a.kind, ExprKind::MapIndex { .. })),
            _ => false,
        };
        if !fused {
            let src = match src.kind {
                ExprKind::Append { .. } => {
                    // Any other append gets its own statement through a temporary.
                    let tmp = self.frame.temp(src.ty.clone());
                    let stmt = self.walk_assign(Stmt::assign(tmp.clone(), src).at(span), init)?;
                    init.push(stmt);
                    tmp
                }
                _ => {
                    let src = self.walk(src, init)?;
                    self.frame.cheap_expr(src, init)
                }
            };
            let dst = self.walk_single_dest(dst, init)?;
            return Ok((dst.into_expr(), Some(src)));
        }

        let of_make = self.is_append_of_make(&src);
        let Expr { kind, ty, span: call_span, init: mut call_init } = src;
        init.append(&mut call_init);
        let ExprKind::Append { mut args, spread, elem_desc } = kind else {
            return Err(LowerError::internal("map append fusion on a non-append", span));
        };
        if !same_safe_expr(&dst, &args[0]) {
            return Err(LowerError::internal(
                format!(
                    "not same expressions: {} != {}",
                    pretty_expr(self.frame.func, &dst),
                    pretty_expr(self.frame.func, &args[0])
                ),
                span,
            ));
        }
        debug!("map append shares one mapassign");

        // Everything after the receiver runs before the slot is created.
        if of_make {
            if let ExprKind::MakeSlice { len, .. } = &mut args[1].kind {
                let n = std::mem::replace(&mut **len, Expr::blank(Type::Int));
                let n = self.walk(n, init)?;
                **len = self.frame.cheap_expr(n, init);
            }
        } else {
            for arg in args.iter_mut().skip(1) {
                let a = std::mem::replace(arg, Expr::blank(Type::Void));
                let a = self.walk(a, init)?;
                *arg = self.frame.cheap_expr(a, init);
            }
        }

        let dst = self.walk_single_dest(dst, init)?;
        args[0] = dst.as_expr().clone();
        let call = Expr::new(ExprKind::Append { args, spread, elem_desc }, ty).at(call_span);
        Ok((dst.into_expr(), Some(call)))
    }

    /// `x op= y` becomes `x = x op y` with `x` lowered once.
    fn lower_compound(
        &mut self,
        dst: Expr,
        op: BinaryOp,
        src: Expr,
        init: &mut Vec<Stmt>,
        span: Span,
    ) -> Result<(Expr, Option<Expr>), LowerError> {
        let ty = dst.ty.clone();
        let dst_span = dst.span;
        if let ExprKind::MapIndex { map, key, .. } = dst.kind {
            // m[k] op= y: read through mapaccess, then store through mapassign.
            let map = self.walk(*map, init)?;
            let map = self.frame.safe_expr(map, init)?.into_expr();
            let key = self.walk(*key, init)?;
            let key = self.frame.safe_expr(key, init)?.into_expr();
            let read = Expr::map_index(map.clone(), key.clone()).at(dst_span);
            let value = self.walk(Expr::binary(op, read, src, ty.clone()).at(span), init)?;
            let value = self.frame.cheap_expr(value, init);
            let slot = Expr::new(ExprKind::MapIndex { map: Box::new(map), key: Box::new(key), assigned: true }, ty)
                .at(dst_span);
            let dst = self.walk_single_dest(slot, init)?;
            return Ok((dst.into_expr(), Some(value)));
        }
        let dst = self.walk_single_dest(dst, init)?;
        let src = Expr::binary(op, dst.as_expr().clone(), src, ty).at(span);
        Ok((dst.into_expr(), Some(src)))
    }

    /// Dispatch on the source shape once the destination is lowered and safe.
    fn assign_source(
        &mut self,
        dst: Expr,
        src: Option<Expr>,
        init: &mut Vec<Stmt>,
        span: Span,
    ) -> Result<Stmt, LowerError> {
        let Some(src) = src else {
            debug!("assign zero value");
            return Ok(Stmt::new(StmtKind::Assign { dst, src: None }).at(span));
        };
        if !self.frame.config.instrumenting() && src.is_zero() {
            debug!("assign zero literal");
            return Ok(Stmt::assign(dst, src).at(span));
        }
        match src.kind {
            ExprKind::Recv(chan) => self.assign_recv(dst, *chan, init, span),
            ExprKind::Append { .. } => self.assign_append(dst, src, init, span),
            kind => {
                let src = self.walk(Expr { kind, ..src }, init)?;
                self.convas(dst, src, init, span)
            }
        }
    }

    /// `x = <-c` receives straight into `x`.
    fn assign_recv(&mut self, dst: Expr, chan: Expr, init: &mut Vec<Stmt>, span: Span) -> Result<Stmt, LowerError> {
        debug!("assign receive");
        let chan = self.walk(chan, init)?;
        let elem = chan.ty.elem().cloned().unwrap_or(Type::Void);
        if dst.is_blank() || dst.is_addressable() {
            let addr = if dst.is_blank() { Expr::nil(elem.ptr_to()) } else { Expr::addr_of(dst) };
            let call = self.frame.mkcall("chanrecv1", vec![chan, addr], Type::Void, span)?;
            return Ok(Stmt::expr(call).at(span));
        }
        let tmp = self.frame.temp(elem);
        let call = self.frame.mkcall("chanrecv1", vec![chan, Expr::addr_of(tmp.clone())], Type::Void, span)?;
        init.push(Stmt::expr(call).at(span));
        self.convas(dst, tmp, init, span)
    }

    fn assign_append(&mut self, dst: Expr, src: Expr, init: &mut Vec<Stmt>, span: Span) -> Result<Stmt, LowerError> {
        let elem = src.ty.elem().cloned().unwrap_or(Type::Void);
        if elem.not_in_heap() {
            self.frame
                .semantic_error(format!("{elem} can't be allocated; it is marked not-in-heap"), src.span);
        }
        let lowered = if self.is_append_of_make(&src) {
            debug!("assign append: zero-extend");
            self.extend_slice(src, init)?
        } else if matches!(src.kind, ExprKind::Append { spread: true, .. }) {
            debug!("assign append: range");
            self.append_slice(src, init)?
        } else {
            debug!("assign append: elements");
            self.walk_append(src, init, Some(&dst))?
        };
        if let ExprKind::Append { args, spread, .. } = lowered.kind {
            // Left for the backend, which knows not to add a second write barrier.
            let kind = ExprKind::Append { args, spread, elem_desc: Some(elem) };
            return Ok(Stmt::assign(dst, Expr { kind, ..lowered }).at(span));
        }
        self.convas(dst, lowered, init, span)
    }
}
