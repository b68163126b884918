//! Read-only traversal of IR trees.
//!
//! `Visitor` mirrors the AST visitor: override the hooks you need and call the
//! matching `walk_*` function to keep recursing. The free predicates below
//! (`any`, `has_call`, `refers_to_var`) are what the aliasing analysis and the
//! sequencer are built on. Init lists are not part of an expression's value
//! and are not visited by the predicates.

use super::{Expr, ExprKind, Stmt, StmtKind, VarId};

pub trait Visitor: Sized {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_stmts<V: Visitor>(v: &mut V, stmts: &[Stmt]) {
    for stmt in stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &Stmt) {
    walk_stmts(v, &stmt.init);
    match &stmt.kind {
        StmtKind::Assign { dst, src } => {
            v.visit_expr(dst);
            if let Some(src) = src {
                v.visit_expr(src);
            }
        }
        StmtKind::AssignOp { dst, src, .. } => {
            v.visit_expr(dst);
            v.visit_expr(src);
        }
        StmtKind::AssignList { lhs, rhs, .. } => {
            for e in lhs.iter().chain(rhs.iter()) {
                v.visit_expr(e);
            }
        }
        StmtKind::If { cond, then, els, .. } => {
            v.visit_expr(cond);
            walk_stmts(v, then);
            walk_stmts(v, els);
        }
        StmtKind::Block(stmts) => walk_stmts(v, stmts),
        StmtKind::Expr(e) => v.visit_expr(e),
        StmtKind::Return { results } => {
            for e in results {
                v.visit_expr(e);
            }
        }
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Expr) {
    walk_stmts(v, &expr.init);
    for child in children(expr) {
        v.visit_expr(child);
    }
}

/// Direct sub-expressions of `expr`, in evaluation order.
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Name(_)
        | ExprKind::Blank
        | ExprKind::Lit(_)
        | ExprKind::CallResult(_)
        | ExprKind::TypeDesc(_)
        | ExprKind::ZeroAddr(_) => Vec::new(),

        ExprKind::Paren(inner)
        | ExprKind::Deref(inner)
        | ExprKind::AddrOf(inner)
        | ExprKind::Conv(inner)
        | ExprKind::Recv(inner)
        | ExprKind::TypeAssert(inner) => vec![&**inner],
        ExprKind::Field { base, .. } | ExprKind::FieldPtr { base, .. } => vec![&**base],
        ExprKind::Unary { operand, .. } => vec![&**operand],

        ExprKind::Index { base, index, .. } => vec![&**base, &**index],
        ExprKind::MapIndex { map, key, .. } => vec![&**map, &**key],
        ExprKind::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],

        ExprKind::Call { args, .. } | ExprKind::Append { args, .. } => args.iter().collect(),
        ExprKind::MakeSlice { len, cap } => {
            let mut out: Vec<&Expr> = vec![&**len];
            out.extend(cap.as_deref());
            out
        }
        ExprKind::Slice { base, low, high, .. } => {
            let mut out: Vec<&Expr> = vec![&**base];
            out.extend(low.as_deref());
            out.extend(high.as_deref());
            out
        }
    }
}

/// Whether `expr` or any descendant satisfies `pred`. Parents are tested before children.
pub fn any(expr: &Expr, pred: &mut impl FnMut(&Expr) -> bool) -> bool {
    if pred(expr) {
        return true;
    }
    children(expr).into_iter().any(|c| any(c, pred))
}

/// Evaluating `expr` may run a call (user function, runtime primitive, map access).
pub fn has_call(expr: &Expr) -> bool {
    any(expr, &mut |e| {
        matches!(
            e.kind,
            ExprKind::Call { .. }
                | ExprKind::Append { .. }
                | ExprKind::MakeSlice { .. }
                | ExprKind::Recv(_)
                | ExprKind::MapIndex { .. }
                | ExprKind::TypeAssert(_)
        )
    })
}

/// Whether the variable `id` is referenced anywhere inside `expr`.
pub fn refers_to_var(id: VarId, expr: &Expr) -> bool {
    any(expr, &mut |e| e.var_id() == Some(id))
}

struct CallCollector {
    names: Vec<String>,
}

impl Visitor for CallCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Call { callee, .. } = &expr.kind {
            let name = match callee {
                super::Callee::Func(n) | super::Callee::Runtime(n) | super::Callee::Intrinsic(n) => n,
            };
            self.names.push(name.clone());
        }
        walk_expr(self, expr);
    }
}

/// Names of every call in `stmts`, in traversal order.
pub fn calls_in(stmts: &[Stmt]) -> Vec<String> {
    let mut collector = CallCollector { names: Vec::new() };
    walk_stmts(&mut collector, stmts);
    collector.names
}
