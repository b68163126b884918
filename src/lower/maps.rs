//! Map access through the runtime's key-specialized primitives.

use super::Frame;
use crate::diagnostics::LowerError;
use crate::ir::{Expr, ExprKind, KeyAlg, Stmt, Type};
use crate::runtime::KeyPassing;
use crate::span::Span;

/// Which primitive family member handles a map type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFast {
    Slow,
    Fast32,
    Fast32Ptr,
    Fast64,
    Fast64Ptr,
    FastStr,
}

impl MapFast {
    /// Suffix of the read primitives. Reads have no pointer-key variants.
    fn access_suffix(self) -> &'static str {
        match self {
            MapFast::Slow => "",
            MapFast::Fast32 | MapFast::Fast32Ptr => "_fast32",
            MapFast::Fast64 | MapFast::Fast64Ptr => "_fast64",
            MapFast::FastStr => "_faststr",
        }
    }

    fn assign_suffix(self) -> &'static str {
        match self {
            MapFast::Slow => "",
            MapFast::Fast32 => "_fast32",
            MapFast::Fast32Ptr => "_fast32ptr",
            MapFast::Fast64 => "_fast64",
            MapFast::Fast64Ptr => "_fast64ptr",
            MapFast::FastStr => "_faststr",
        }
    }
}

impl Frame<'_> {
    /// Pick the primitive family member for `map_ty` from its key and element shape.
    pub fn mapfast(&self, map_ty: &Type, span: Span) -> Result<MapFast, LowerError> {
        let (Some(key), Some(elem)) = (map_ty.map_key(), map_ty.elem()) else {
            return Err(LowerError::internal(format!("map access on non-map type {map_ty}"), span));
        };
        let target = &self.config.target;
        if elem.size(target) > self.config.limits.max_fast_elem_size {
            return Ok(MapFast::Slow);
        }
        let fast = match key.key_alg(target) {
            KeyAlg::Mem32 if !key.has_pointers() => MapFast::Fast32,
            KeyAlg::Mem32 if self.config.ptr_size() == 4 => MapFast::Fast32Ptr,
            KeyAlg::Mem32 => {
                return Err(LowerError::internal(format!("small pointer key {key}"), span));
            }
            KeyAlg::Mem64 if !key.has_pointers() => MapFast::Fast64,
            KeyAlg::Mem64 if self.config.ptr_size() == 8 => MapFast::Fast64Ptr,
            // Two words, at least one of them a pointer.
            KeyAlg::Mem64 => MapFast::Slow,
            KeyAlg::Str => MapFast::FastStr,
            KeyAlg::Other => MapFast::Slow,
        };
        Ok(fast)
    }

    /// Key operand as the chosen primitive expects it.
    fn map_key_arg(&mut self, name: &str, key: Expr, init: &mut Vec<Stmt>, span: Span) -> Result<Expr, LowerError> {
        let passing = self.runtime.lookup(name, span)?.key;
        match passing {
            KeyPassing::ByAddr => {
                let key = if key.is_addressable() { key } else { self.copy_expr(key, init) };
                Ok(Expr::addr_of(key))
            }
            KeyPassing::ByValue | KeyPassing::None => Ok(key),
        }
    }

    /// `m[k]` as an rvalue: `*mapaccess1*(type, m, k)`.
    pub fn map_read(&mut self, map: Expr, key: Expr, init: &mut Vec<Stmt>, span: Span) -> Result<Expr, LowerError> {
        let map_ty = map.ty.clone();
        let elem = map_ty.elem().cloned().unwrap_or(Type::Void);
        let fast = self.mapfast(&map_ty, span)?;
        let width = elem.size(&self.config.target);
        let call = if width <= self.config.limits.zero_val_size {
            let name = format!("mapaccess1{}", fast.access_suffix());
            let key = self.map_key_arg(&name, key, init, span)?;
            self.mkcall(&name, vec![type_desc(&map_ty), map, key], elem.clone().ptr_to(), span)?
        } else {
            let key = self.map_key_arg("mapaccess1_fat", key, init, span)?;
            let zero = Expr::new(ExprKind::ZeroAddr(width), Type::UnsafePtr);
            self.mkcall("mapaccess1_fat", vec![type_desc(&map_ty), map, key, zero], elem.clone().ptr_to(), span)?
        };
        Ok(Expr::deref(call).at(span))
    }

    /// `m[k]` as the destination of a store: `*mapassign*(type, m, k)`.
    pub fn map_assign(&mut self, map: Expr, key: Expr, init: &mut Vec<Stmt>, span: Span) -> Result<Expr, LowerError> {
        let map_ty = map.ty.clone();
        let elem = map_ty.elem().cloned().unwrap_or(Type::Void);
        let name = format!("mapassign{}", self.mapfast(&map_ty, span)?.assign_suffix());
        let key = self.map_key_arg(&name, key, init, span)?;
        let call = self.mkcall(&name, vec![type_desc(&map_ty), map, key], elem.ptr_to(), span)?;
        Ok(Expr::deref(call).at(span))
    }

    /// The presence-returning read `mapaccess2*(type, m, k)`, typed as
    /// `(*elem, ok_ty)`. Large elements use the `_fat` form with a zero buffer.
    pub fn map_read2(
        &mut self,
        map: Expr,
        key: Expr,
        ok_ty: Type,
        init: &mut Vec<Stmt>,
        span: Span,
    ) -> Result<Expr, LowerError> {
        let map_ty = map.ty.clone();
        let elem = map_ty.elem().cloned().unwrap_or(Type::Void);
        let fast = self.mapfast(&map_ty, span)?;
        let width = elem.size(&self.config.target);
        let result = Type::Tuple(vec![elem.ptr_to(), ok_ty]);
        if width <= self.config.limits.zero_val_size {
            let name = format!("mapaccess2{}", fast.access_suffix());
            let key = self.map_key_arg(&name, key, init, span)?;
            self.mkcall(&name, vec![type_desc(&map_ty), map, key], result, span)
        } else {
            let key = self.map_key_arg("mapaccess2_fat", key, init, span)?;
            let zero = Expr::new(ExprKind::ZeroAddr(width), Type::UnsafePtr);
            self.mkcall("mapaccess2_fat", vec![type_desc(&map_ty), map, key, zero], result, span)
        }
    }
}

pub fn type_desc(ty: &Type) -> Expr {
    Expr::new(ExprKind::TypeDesc(ty.clone()), Type::TypeDesc)
}
