//! Simultaneous assignment.
//!
//! `a, b = c, d` must behave as if every operand were evaluated before any
//! store. `ascompatee` pairs destinations with sources, `reorder` then walks
//! the pairs in order and copies into temporaries exactly the operands an
//! earlier store could clobber. `ascompatet` does the same job for the fields
//! of a multi-value call result.

use tracing::trace;

use super::alias::aliased;
use super::safe::{assign_conv, same_safe_expr};
use super::{ExprWalker, Lowerer};
use crate::diagnostics::LowerError;
use crate::ir::visit::has_call;
use crate::ir::{Expr, ExprKind, Stmt, StmtKind, Type};
use crate::span::Span;

/// One pending `dst = src` of a simultaneous assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignPair {
    pub dst: Expr,
    pub src: Expr,
}

impl AssignPair {
    pub fn new(dst: Expr, src: Expr) -> Self {
        Self { dst, src }
    }
}

impl<W: ExprWalker> Lowerer<'_, W> {
    /// Lower a destination of a list assignment and make it safe. Map index
    /// destinations stay raw, with only their operands made safe: turning
    /// them into calls this early would hide them from the alias analysis.
    pub(crate) fn walk_dest_safe(&mut self, dst: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        if let ExprKind::MapIndex { map, key, .. } = dst.kind {
            let ty = dst.ty;
            let span = dst.span;
            let map = self.walk(*map, init)?;
            let map = self.frame.safe_expr(map, init)?.into_expr();
            let key = self.walk(*key, init)?;
            let key = self.frame.safe_expr(key, init)?.into_expr();
            let kind = ExprKind::MapIndex { map: Box::new(map), key: Box::new(key), assigned: true };
            return Ok(Expr::new(kind, ty).at(span));
        }
        let dst = self.walk(dst, init)?;
        Ok(self.frame.safe_expr(dst, init)?.into_expr())
    }

    pub(crate) fn walk_dests_safe(&mut self, dsts: Vec<Expr>, init: &mut Vec<Stmt>) -> Result<Vec<Expr>, LowerError> {
        dsts.into_iter().map(|d| self.walk_dest_safe(d, init)).collect()
    }

    pub(crate) fn walk_exprs_safe(&mut self, exprs: Vec<Expr>, init: &mut Vec<Stmt>) -> Result<Vec<Expr>, LowerError> {
        exprs
            .into_iter()
            .map(|e| {
                let e = self.walk(e, init)?;
                Ok(self.frame.safe_expr(e, init)?.into_expr())
            })
            .collect()
    }

    /// Conversion assignment: add the implicit conversion and turn a raw map
    /// index destination into a store through `mapassign`. Anything the map
    /// key needs goes to `init`.
    pub fn convas(&mut self, dst: Expr, src: Expr, init: &mut Vec<Stmt>, span: Span) -> Result<Stmt, LowerError> {
        if dst.is_blank() {
            return Ok(Stmt::assign(dst, src).at(span));
        }
        let dst = match dst.kind {
            ExprKind::MapIndex { map, key, .. } => self.frame.map_assign(*map, *key, init, span)?,
            kind => Expr { kind, ..dst },
        };
        let src = assign_conv(src, &dst.ty);
        Ok(Stmt::assign(dst, src).at(span))
    }

    /// Match a destination list against a source list. Both lists must
    /// already be lowered and safe. In a return statement, `x = x` pairs are
    /// dropped.
    pub fn ascompatee(
        &mut self,
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        is_return: bool,
        span: Span,
    ) -> Result<Vec<Stmt>, LowerError> {
        if lhs.len() != rhs.len() {
            return Err(LowerError::internal(
                format!("assignment count mismatch: {} = {}", lhs.len(), rhs.len()),
                span,
            ));
        }
        let mut pairs = Vec::with_capacity(lhs.len());
        for (l, r) in lhs.into_iter().zip(rhs) {
            if is_return && same_safe_expr(&l, &r) {
                continue;
            }
            let r = if l.is_blank() { r } else { assign_conv(r, &l.ty) };
            pairs.push(AssignPair::new(l, r));
        }
        self.reorder(pairs, span)
    }

    /// Sequence `pairs` so that running them one after another has the effect
    /// of running them simultaneously.
    ///
    /// Output order: map-store setup, then early copies of operands later
    /// stores would clobber, then the stores themselves in source order.
    pub fn reorder(&mut self, pairs: Vec<AssignPair>, span: Span) -> Result<Vec<Stmt>, LowerError> {
        let mut early = Vec::new();
        let mut map_init = Vec::new();
        let mut done: Vec<AssignPair> = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let dst = self.protect_dst(pair.dst, &done, &mut early)?;
            let dst = match dst.kind {
                ExprKind::MapIndex { map, key, .. } => self.frame.map_assign(*map, *key, &mut map_init, span)?,
                kind => Expr { kind, ..dst },
            };
            let src = self.reorder_save(pair.src, &done, &mut early)?;
            done.push(AssignPair::new(dst, src));
        }

        let mut out = map_init;
        out.append(&mut early);
        out.extend(done.into_iter().map(|p| Stmt::assign(p.dst, p.src).at(span)));
        Ok(out)
    }

    /// Protect the operands of a destination against earlier stores.
    fn protect_dst(&mut self, dst: Expr, done: &[AssignPair], early: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        let Expr { kind, ty, init, span } = dst;
        let kind = match kind {
            kind @ (ExprKind::Name(_) | ExprKind::Blank) => kind,
            // Selecting part of a value never needs protection by itself.
            ExprKind::Field { base, index } => {
                ExprKind::Field { base: Box::new(self.protect_dst(*base, done, early)?), index }
            }
            ExprKind::Paren(inner) => ExprKind::Paren(Box::new(self.protect_dst(*inner, done, early)?)),
            ExprKind::Index { base, index, bounded } if base.ty.is_array() => {
                let index = self.reorder_save(*index, done, early)?;
                let base = self.protect_dst(*base, done, early)?;
                ExprKind::Index { base: Box::new(base), index: Box::new(index), bounded }
            }
            ExprKind::Index { base, index, bounded } => ExprKind::Index {
                base: Box::new(self.reorder_save(*base, done, early)?),
                index: Box::new(self.reorder_save(*index, done, early)?),
                bounded,
            },
            ExprKind::MapIndex { map, key, assigned } => ExprKind::MapIndex {
                map: Box::new(self.reorder_save(*map, done, early)?),
                key: Box::new(self.reorder_save(*key, done, early)?),
                assigned,
            },
            ExprKind::Deref(inner) => ExprKind::Deref(Box::new(self.reorder_save(*inner, done, early)?)),
            ExprKind::FieldPtr { base, index } => {
                ExprKind::FieldPtr { base: Box::new(self.reorder_save(*base, done, early)?), index }
            }
            other => {
                return Err(LowerError::internal(
                    format!("unexpected assignment destination {other:?}"),
                    span,
                ));
            }
        };
        Ok(Expr { kind, ty, init, span })
    }

    /// Copy `expr` into a temporary if an earlier store could change its value.
    fn reorder_save(&mut self, expr: Expr, done: &[AssignPair], early: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        if !aliased(self.frame.func, &expr, done.iter().map(|p| &p.dst))? {
            return Ok(expr);
        }
        let tmp = self.frame.temp(expr.ty.clone());
        trace!(span = ?expr.span, "operand clobbered by earlier store, copied early");
        early.push(Stmt::assign(tmp.clone(), expr));
        Ok(tmp)
    }

    /// Match a destination list against the fields of a call result that has
    /// just been evaluated. Stores that might themselves call something are
    /// deferred until every field has been read.
    pub fn ascompatet(&mut self, lhs: Vec<Expr>, results: &Type, span: Span) -> Result<Vec<Stmt>, LowerError> {
        let fields = match results {
            Type::Tuple(fields) => fields.as_slice(),
            other => std::slice::from_ref(other),
        };
        if lhs.len() != fields.len() {
            return Err(LowerError::internal(
                format!("assignment count mismatch: {} = {}", lhs.len(), fields.len()),
                span,
            ));
        }

        let mut reads = Vec::new();
        let mut deferred = Vec::new();
        for (i, l) in lhs.into_iter().enumerate() {
            if l.is_blank() {
                continue;
            }
            let field_ty = fields[i].clone();
            let l = if fncall(&l, &field_ty) {
                let tmp = self.frame.temp(field_ty.clone());
                let store = self.convas(l, tmp.clone(), &mut deferred, span)?;
                deferred.push(store);
                tmp
            } else {
                l
            };
            let res = Expr::new(ExprKind::CallResult(i), field_ty).at(span);
            let read = self.convas(l, res, &mut reads, span)?;
            if stmt_has_call(&read) {
                return Err(LowerError::internal(
                    "too many function calls evaluating call results",
                    span,
                ));
            }
            reads.push(read);
        }
        reads.append(&mut deferred);
        Ok(reads)
    }
}

/// Storing into `l` a value of type `field_ty` could run a call: `l` contains
/// one, is a map index, or needs a conversion.
fn fncall(l: &Expr, field_ty: &Type) -> bool {
    has_call(l) || matches!(l.kind, ExprKind::MapIndex { .. }) || &l.ty != field_ty
}

fn stmt_has_call(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Assign { dst, src } => has_call(dst) || src.as_ref().is_some_and(has_call),
        _ => true,
    }
}
