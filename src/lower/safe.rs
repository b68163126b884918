//! Single-evaluation rewrites.
//!
//! `safe_expr` rewrites an already-lowered expression so that evaluating it
//! again has no side effects, copying into temporaries only the parts that
//! need it. `cheap_expr` goes further and reduces the expression to a name or
//! literal.

use tracing::trace;

use super::Frame;
use crate::diagnostics::LowerError;
use crate::ir::{BinaryOp, Expr, ExprKind, Lit, SafeExpr, Stmt, Type, UnaryOp};

impl Frame<'_> {
    /// Evaluate `expr` once into a fresh temporary; the temporary stands in for it.
    pub fn copy_expr(&mut self, expr: Expr, init: &mut Vec<Stmt>) -> Expr {
        let id = self.new_temp(expr.ty.clone());
        trace!(temp = %self.func.var(id).name, "copy into temporary");
        let tmp = self.func.name(id);
        init.push(Stmt::assign(tmp.clone(), expr));
        tmp
    }

    /// Names and literals are returned as-is; anything else is copied.
    pub fn cheap_expr(&mut self, expr: Expr, init: &mut Vec<Stmt>) -> Expr {
        match expr.kind {
            ExprKind::Name(_) | ExprKind::Lit(_) => expr,
            _ => self.copy_expr(expr, init),
        }
    }

    pub fn safe_expr(&mut self, mut expr: Expr, init: &mut Vec<Stmt>) -> Result<SafeExpr, LowerError> {
        init.append(&mut expr.take_init());
        let span = expr.span;
        let ty = expr.ty;
        let kind = match expr.kind {
            kind @ (ExprKind::Name(_)
            | ExprKind::Blank
            | ExprKind::Lit(_)
            | ExprKind::TypeDesc(_)
            | ExprKind::ZeroAddr(_)) => kind,
            ExprKind::Paren(inner) => ExprKind::Paren(self.safe_boxed(*inner, init)?),
            ExprKind::Unary { op: op @ (UnaryOp::Len | UnaryOp::Cap), operand } => {
                ExprKind::Unary { op, operand: self.safe_boxed(*operand, init)? }
            }
            ExprKind::Field { base, index } => ExprKind::Field { base: self.safe_boxed(*base, init)?, index },
            ExprKind::FieldPtr { base, index } => {
                ExprKind::FieldPtr { base: self.safe_boxed(*base, init)?, index }
            }
            ExprKind::Deref(inner) => ExprKind::Deref(self.safe_boxed(*inner, init)?),
            ExprKind::Index { base, index, bounded } => ExprKind::Index {
                base: self.safe_boxed(*base, init)?,
                index: self.safe_boxed(*index, init)?,
                bounded,
            },
            ExprKind::MapIndex { map, key, assigned } => ExprKind::MapIndex {
                map: self.safe_boxed(*map, init)?,
                key: self.safe_boxed(*key, init)?,
                assigned,
            },
            kind => {
                let expr = Expr::new(kind, ty).at(span);
                if expr.is_addressable() {
                    return Err(LowerError::internal(
                        "missing lvalue case in safe expression rewrite",
                        span,
                    ));
                }
                return Ok(SafeExpr::new_unchecked(self.cheap_expr(expr, init)));
            }
        };
        Ok(SafeExpr::new_unchecked(Expr::new(kind, ty).at(span)))
    }

    fn safe_boxed(&mut self, expr: Expr, init: &mut Vec<Stmt>) -> Result<Box<Expr>, LowerError> {
        Ok(Box::new(self.safe_expr(expr, init)?.into_expr()))
    }
}

/// Whether `l` and `r` are syntactically the same side-effect-free expression,
/// so that evaluating one is as good as evaluating the other.
pub fn same_safe_expr(l: &Expr, r: &Expr) -> bool {
    if l.ty != r.ty {
        return false;
    }
    match (&l.kind, &r.kind) {
        (ExprKind::Name(a), ExprKind::Name(b)) => a == b,
        (ExprKind::Paren(a), ExprKind::Paren(b)) => same_safe_expr(a, b),
        (ExprKind::Field { base: a, index: i }, ExprKind::Field { base: b, index: j })
        | (ExprKind::FieldPtr { base: a, index: i }, ExprKind::FieldPtr { base: b, index: j }) => {
            i == j && same_safe_expr(a, b)
        }
        (ExprKind::Deref(a), ExprKind::Deref(b)) => same_safe_expr(a, b),
        (ExprKind::Unary { op: o1, operand: a }, ExprKind::Unary { op: o2, operand: b }) => {
            o1 == o2 && matches!(o1, UnaryOp::Neg | UnaryOp::Not | UnaryOp::BitNot) && same_safe_expr(a, b)
        }
        // Only value-preserving numeric conversions can be reused.
        (ExprKind::Conv(a), ExprKind::Conv(b)) => is_simple(&l.ty) && same_safe_expr(a, b),
        (
            ExprKind::Index { base: b1, index: i1, .. },
            ExprKind::Index { base: b2, index: i2, .. },
        ) => same_safe_expr(b1, b2) && same_safe_expr(i1, i2),
        (
            ExprKind::MapIndex { map: m1, key: k1, .. },
            ExprKind::MapIndex { map: m2, key: k2, .. },
        ) => same_safe_expr(m1, m2) && same_safe_expr(k1, k2),
        (ExprKind::Binary { op: o1, lhs: l1, rhs: r1 }, ExprKind::Binary { op: o2, lhs: l2, rhs: r2 }) => {
            o1 == o2 && is_arith(*o1) && same_safe_expr(l1, l2) && same_safe_expr(r1, r2)
        }
        (ExprKind::Lit(a), ExprKind::Lit(b)) => a == b && !matches!(a, Lit::Zero),
        _ => false,
    }
}

fn is_simple(ty: &Type) -> bool {
    ty.is_integer() || ty.is_boolean() || matches!(ty, Type::UnsafePtr)
}

fn is_arith(op: BinaryOp) -> bool {
    !op.is_comparison() && !matches!(op, BinaryOp::AndAnd | BinaryOp::OrOr)
}

/// Insert the implicit conversion an assignment to a `ty` destination needs.
pub fn assign_conv(src: Expr, ty: &Type) -> Expr {
    if &src.ty == ty || *ty == Type::Void {
        return src;
    }
    let span = src.span;
    Expr::conv(src, ty.clone()).at(span)
}
