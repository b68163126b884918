use super::maps::type_desc;
use super::safe::assign_conv;
use super::{ExprWalker, Frame};
use crate::diagnostics::LowerError;
use crate::ir::visit::has_call;
use crate::ir::{BinaryOp, Expr, ExprKind, Stmt, Type, UnaryOp};
use crate::span::Span;

/// Structural expression lowering.
///
/// Children are lowered in evaluation order. Map reads and stores become
/// runtime calls, a receive used as a value is received into a temporary and
/// `make` becomes a `makeslice` call. Everything else keeps its shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicWalker;

impl BasicWalker {
    fn walk_boxed(&mut self, frame: &mut Frame<'_>, expr: Expr, init: &mut Vec<Stmt>) -> Result<Box<Expr>, LowerError> {
        Ok(Box::new(self.walk_expr(frame, expr, init)?))
    }

    /// Lower sibling operands left to right.
    ///
    /// When lowering an operand hoists statements into `init`, every earlier
    /// operand that still contains a call is copied out first, so the call
    /// keeps running before the hoisted statements.
    fn walk_operands(
        &mut self,
        frame: &mut Frame<'_>,
        operands: Vec<Expr>,
        init: &mut Vec<Stmt>,
    ) -> Result<Vec<Expr>, LowerError> {
        let mut done: Vec<Expr> = Vec::with_capacity(operands.len());
        for operand in operands {
            let mut hoisted = Vec::new();
            let operand = self.walk_expr(frame, operand, &mut hoisted)?;
            if !hoisted.is_empty() {
                for prev in done.iter_mut() {
                    if has_call(prev) {
                        let taken = std::mem::replace(prev, Expr::blank(Type::Void));
                        *prev = spill(frame, taken, init);
                    }
                }
                init.append(&mut hoisted);
            }
            done.push(operand);
        }
        Ok(done)
    }

    fn walk_pair(
        &mut self,
        frame: &mut Frame<'_>,
        a: Expr,
        b: Expr,
        init: &mut Vec<Stmt>,
        span: Span,
    ) -> Result<(Box<Expr>, Box<Expr>), LowerError> {
        let mut out = self.walk_operands(frame, vec![a, b], init)?.into_iter();
        match (out.next(), out.next()) {
            (Some(a), Some(b)) => Ok((Box::new(a), Box::new(b))),
            _ => Err(LowerError::internal("operand count changed while lowering", span)),
        }
    }

    /// `a && b` and `a || b` evaluate `b` conditionally, so statements that
    /// lowering `b` produced must run under the same condition.
    fn walk_logical(
        &mut self,
        frame: &mut Frame<'_>,
        op: BinaryOp,
        lhs: Expr,
        rhs: Expr,
        ty: Type,
        init: &mut Vec<Stmt>,
    ) -> Result<Expr, LowerError> {
        let lhs = self.walk_expr(frame, lhs, init)?;
        let mut rhs_init = Vec::new();
        let rhs = self.walk_expr(frame, rhs, &mut rhs_init)?;
        if rhs_init.is_empty() {
            return Ok(Expr::binary(op, lhs, rhs, ty));
        }
        let tmp = frame.temp(ty.clone());
        init.push(Stmt::assign(tmp.clone(), lhs));
        let cond = match op {
            BinaryOp::AndAnd => tmp.clone(),
            _ => Expr::unary(UnaryOp::Not, tmp.clone(), ty),
        };
        rhs_init.push(Stmt::assign(tmp.clone(), rhs));
        init.push(Stmt::if_(cond, rhs_init, Vec::new()));
        Ok(tmp)
    }
}

/// Copy `expr` into a temporary, keeping it addressable when it was: the
/// pointer under a dereference and the operands of an array element are
/// copied instead of the value.
fn spill(frame: &mut Frame<'_>, expr: Expr, init: &mut Vec<Stmt>) -> Expr {
    let Expr { kind, ty, init: own, span } = expr;
    let kind = match kind {
        ExprKind::Deref(inner) => ExprKind::Deref(Box::new(frame.cheap_expr(*inner, init))),
        ExprKind::Paren(inner) => ExprKind::Paren(Box::new(spill(frame, *inner, init))),
        ExprKind::Field { base, index } => ExprKind::Field { base: Box::new(spill(frame, *base, init)), index },
        ExprKind::Index { base, index, bounded } if base.ty.is_array() => {
            let base = spill(frame, *base, init);
            let index = frame.cheap_expr(*index, init);
            ExprKind::Index { base: Box::new(base), index: Box::new(index), bounded }
        }
        kind => return frame.cheap_expr(Expr { kind, ty, init: own, span }, init),
    };
    Expr { kind, ty, init: own, span }
}

impl ExprWalker for BasicWalker {
    fn walk_expr(&mut self, frame: &mut Frame<'_>, mut expr: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        init.append(&mut expr.take_init());
        let span = expr.span;
        let ty = expr.ty;
        let kind = match expr.kind {
            kind @ (ExprKind::Name(_)
            | ExprKind::Blank
            | ExprKind::Lit(_)
            | ExprKind::CallResult(_)
            | ExprKind::TypeDesc(_)
            | ExprKind::ZeroAddr(_)) => kind,

            ExprKind::Paren(inner) => ExprKind::Paren(self.walk_boxed(frame, *inner, init)?),
            ExprKind::Field { base, index } => ExprKind::Field { base: self.walk_boxed(frame, *base, init)?, index },
            ExprKind::FieldPtr { base, index } => {
                ExprKind::FieldPtr { base: self.walk_boxed(frame, *base, init)?, index }
            }
            ExprKind::Deref(inner) => ExprKind::Deref(self.walk_boxed(frame, *inner, init)?),
            ExprKind::AddrOf(inner) => ExprKind::AddrOf(self.walk_boxed(frame, *inner, init)?),
            ExprKind::Conv(inner) => ExprKind::Conv(self.walk_boxed(frame, *inner, init)?),
            ExprKind::TypeAssert(inner) => ExprKind::TypeAssert(self.walk_boxed(frame, *inner, init)?),
            ExprKind::Unary { op, operand } => ExprKind::Unary { op, operand: self.walk_boxed(frame, *operand, init)? },

            ExprKind::Binary { op: op @ (BinaryOp::AndAnd | BinaryOp::OrOr), lhs, rhs } => {
                return Ok(self.walk_logical(frame, op, *lhs, *rhs, ty, init)?.at(span));
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = self.walk_pair(frame, *lhs, *rhs, init, span)?;
                ExprKind::Binary { op, lhs, rhs }
            }
            ExprKind::Index { base, index, bounded } => {
                let (base, index) = self.walk_pair(frame, *base, *index, init, span)?;
                ExprKind::Index { base, index, bounded }
            }
            ExprKind::Slice { base, low, high, bounded } => {
                let (has_low, has_high) = (low.is_some(), high.is_some());
                let operands = std::iter::once(*base).chain(low.map(|e| *e)).chain(high.map(|e| *e)).collect();
                let mut out = self.walk_operands(frame, operands, init)?.into_iter().map(Box::new);
                let base = out
                    .next()
                    .ok_or_else(|| LowerError::internal("slice without operand", span))?;
                let low = if has_low { out.next() } else { None };
                let high = if has_high { out.next() } else { None };
                ExprKind::Slice { base, low, high, bounded }
            }
            ExprKind::Call { callee, args } => {
                let args = self.walk_operands(frame, args, init)?;
                ExprKind::Call { callee, args }
            }

            ExprKind::MapIndex { map, key, assigned } => {
                let (map, key) = self.walk_pair(frame, *map, *key, init, span)?;
                return if assigned {
                    frame.map_assign(*map, *key, init, span)
                } else {
                    frame.map_read(*map, *key, init, span)
                };
            }
            ExprKind::Recv(chan) => {
                let chan = self.walk_expr(frame, *chan, init)?;
                let tmp = frame.temp(ty);
                let call = frame.mkcall("chanrecv1", vec![chan, Expr::addr_of(tmp.clone())], Type::Void, span)?;
                init.push(Stmt::expr(call).at(span));
                return Ok(tmp);
            }
            ExprKind::MakeSlice { len, cap } => {
                let elem = ty.elem().cloned().unwrap_or(Type::Void);
                let (len, cap) = match cap {
                    Some(cap) => {
                        let (len, cap) = self.walk_pair(frame, *len, *cap, init, span)?;
                        (assign_conv(*len, &Type::Int), assign_conv(*cap, &Type::Int))
                    }
                    None => {
                        let len = self.walk_expr(frame, *len, init)?;
                        let len = frame.cheap_expr(assign_conv(len, &Type::Int), init);
                        (len.clone(), len)
                    }
                };
                return frame.mkcall("makeslice", vec![type_desc(&elem), len, cap], ty, span);
            }
            ExprKind::Append { .. } => {
                return Err(LowerError::internal("append outside of an assignment", span));
            }
        };
        Ok(Expr::new(kind, ty).at(span))
    }
}
