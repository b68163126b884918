//! May-alias analysis for simultaneous assignment.
//!
//! The answers are conservative: a `true` may be spurious and only costs a
//! temporary, a `false` is a promise.

use crate::diagnostics::LowerError;
use crate::ir::visit::{any, refers_to_var};
use crate::ir::{Expr, ExprKind, Func, StorageClass, UnaryOp};

/// Strip wrappers that select part of a value without computing an address:
/// field selection, parentheses and indexing into a fixed-size array.
pub fn outer_value(mut expr: &Expr) -> &Expr {
    loop {
        match &expr.kind {
            ExprKind::Field { base, .. } | ExprKind::Paren(base) => expr = &**base,
            ExprKind::Index { base, .. } if base.ty.is_array() => expr = &**base,
            _ => return expr,
        }
    }
}

/// Whether evaluating `read` could observe any of `writes` (the destinations of
/// assignments that run before it).
pub fn aliased<'e>(
    func: &Func,
    read: &Expr,
    writes: impl IntoIterator<Item = &'e Expr>,
) -> Result<bool, LowerError> {
    // All fields of a struct count as the whole struct.
    let mut read = read;
    while let ExprKind::Field { base, .. } = &read.kind {
        read = &**base;
    }

    let mut mem_write = false;
    for dst in writes {
        if dst.is_blank() {
            continue;
        }
        let Some(id) = outer_value(dst).var_id() else {
            mem_write = true;
            continue;
        };
        let var = func.var(id);
        match var.class {
            StorageClass::AutoHeap | StorageClass::Extern => mem_write = true,
            StorageClass::Auto | StorageClass::Param | StorageClass::ParamOut | StorageClass::Temp => {
                if var.addr_taken {
                    mem_write = true;
                } else if refers_to_var(id, read) {
                    return Ok(true);
                }
            }
            StorageClass::Func => {
                return Err(LowerError::internal(
                    format!("unexpected storage class {:?} for '{}'", var.class, var.name),
                    dst.span,
                ));
            }
        }
    }

    if !mem_write {
        return Ok(false);
    }
    // Both sides go through computed addresses; assume they may meet.
    Ok(any_addr_taken(func, read))
}

/// Whether `expr` could read memory reachable through a computed address.
pub fn any_addr_taken(func: &Func, expr: &Expr) -> bool {
    any(expr, &mut |e| match &e.kind {
        ExprKind::Name(id) => {
            let var = func.var(*id);
            matches!(var.class, StorageClass::Extern | StorageClass::AutoHeap) || var.addr_taken
        }
        ExprKind::Binary { .. } => false,
        ExprKind::Unary { op, .. } => !matches!(op, UnaryOp::Neg | UnaryOp::Not | UnaryOp::BitNot),
        ExprKind::Conv(_) | ExprKind::Lit(_) | ExprKind::Paren(_) | ExprKind::Blank => false,
        _ => true,
    })
}
