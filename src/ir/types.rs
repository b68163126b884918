use serde::{Deserialize, Serialize};

use crate::config::Target;

/// Resolved static type attached to every IR node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Machine `int`; width comes from the target.
    Int,
    /// Machine `uint`; width comes from the target.
    Uint,
    Uintptr,
    /// Explicitly sized integers (`int32`, `uint8`, ...).
    Sized { bits: u8, signed: bool },
    /// The predeclared boolean type.
    Bool,
    /// A user-declared boolean type. Not identical to `Bool`.
    NamedBool(std::string::String),
    String,
    UnsafePtr,
    Ptr(Box<Type>),
    Slice(Box<Type>),
    Array(u64, Box<Type>),
    Struct(Vec<StructField>),
    Map(Box<Type>, Box<Type>),
    Chan(Box<Type>),
    /// Result list of a multi-value call.
    Tuple(Vec<Type>),
    /// A type the core only knows by its layout facts.
    Opaque {
        name: std::string::String,
        size: u64,
        pointers: bool,
        not_in_heap: bool,
    },
    /// Pointer to a runtime type descriptor.
    TypeDesc,
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: std::string::String,
    pub ty: Type,
}

/// Hashing/equality algorithm of a map key, used for fast-path selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlg {
    Mem32,
    Mem64,
    Str,
    Other,
}

impl Type {
    pub fn ptr_to(self) -> Type {
        Type::Ptr(Box::new(self))
    }

    pub fn slice_of(self) -> Type {
        Type::Slice(Box::new(self))
    }

    /// Element type of pointers, slices, arrays, channels and maps (the value type).
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Ptr(t) | Type::Slice(t) | Type::Array(_, t) | Type::Chan(t) => Some(t),
            Type::Map(_, v) => Some(v),
            _ => None,
        }
    }

    pub fn map_key(&self) -> Option<&Type> {
        match self {
            Type::Map(k, _) => Some(k),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Bool | Type::NamedBool(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int | Type::Uint | Type::Uintptr | Type::Sized { .. })
    }

    /// Size in bytes on `target`. Struct fields are laid out without padding.
    pub fn size(&self, target: &Target) -> u64 {
        let word = u64::from(target.ptr_size);
        match self {
            Type::Int | Type::Uint => u64::from(target.int_bits / 8),
            Type::Uintptr | Type::UnsafePtr | Type::Ptr(_) | Type::Map(..) | Type::Chan(_)
            | Type::TypeDesc => word,
            Type::Sized { bits, .. } => u64::from(*bits / 8),
            Type::Bool | Type::NamedBool(_) => 1,
            Type::String => 2 * word,
            Type::Slice(_) => 3 * word,
            Type::Array(n, elem) => n * elem.size(target),
            Type::Struct(fields) => fields.iter().map(|f| f.ty.size(target)).sum(),
            Type::Tuple(items) => items.iter().map(|t| t.size(target)).sum(),
            Type::Opaque { size, .. } => *size,
            Type::Void => 0,
        }
    }

    /// Whether a value of this type holds pointers the collector must see.
    pub fn has_pointers(&self) -> bool {
        match self {
            Type::Int | Type::Uint | Type::Uintptr | Type::Sized { .. } | Type::Bool
            | Type::NamedBool(_) | Type::Void => false,
            Type::String | Type::UnsafePtr | Type::Ptr(_) | Type::Slice(_) | Type::Map(..)
            | Type::Chan(_) | Type::TypeDesc => true,
            Type::Array(n, elem) => *n > 0 && elem.has_pointers(),
            Type::Struct(fields) => fields.iter().any(|f| f.ty.has_pointers()),
            Type::Tuple(items) => items.iter().any(|t| t.has_pointers()),
            Type::Opaque { pointers, .. } => *pointers,
        }
    }

    /// Types marked as never living on the garbage-collected heap.
    pub fn not_in_heap(&self) -> bool {
        match self {
            Type::Opaque { not_in_heap, .. } => *not_in_heap,
            Type::Array(_, elem) => elem.not_in_heap(),
            Type::Struct(fields) => fields.iter().any(|f| f.ty.not_in_heap()),
            _ => false,
        }
    }

    /// Whether values compare as plain memory (no strings, interfaces or floats inside).
    fn is_plain_memory(&self) -> bool {
        match self {
            Type::Int | Type::Uint | Type::Uintptr | Type::Sized { .. } | Type::Bool
            | Type::NamedBool(_) | Type::UnsafePtr | Type::Ptr(_) | Type::Chan(_) => true,
            Type::Array(_, elem) => elem.is_plain_memory(),
            Type::Struct(fields) => fields.iter().all(|f| f.ty.is_plain_memory()),
            _ => false,
        }
    }

    pub fn key_alg(&self, target: &Target) -> KeyAlg {
        if matches!(self, Type::String) {
            return KeyAlg::Str;
        }
        if !self.is_plain_memory() {
            return KeyAlg::Other;
        }
        match self.size(target) {
            4 => KeyAlg::Mem32,
            8 => KeyAlg::Mem64,
            _ => KeyAlg::Other,
        }
    }

    /// Byte offset of field `index` in a struct type.
    pub fn field_offset(&self, index: usize, target: &Target) -> Option<u64> {
        match self {
            Type::Struct(fields) if index < fields.len() => {
                Some(fields[..index].iter().map(|f| f.ty.size(target)).sum())
            }
            Type::Tuple(items) if index < items.len() => {
                Some(items[..index].iter().map(|t| t.size(target)).sum())
            }
            _ => None,
        }
    }

    pub fn field_type(&self, index: usize) -> Option<&Type> {
        match self {
            Type::Struct(fields) => fields.get(index).map(|f| &f.ty),
            Type::Tuple(items) => items.get(index),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Uint => write!(f, "uint"),
            Type::Uintptr => write!(f, "uintptr"),
            Type::Sized { bits, signed: true } => write!(f, "int{bits}"),
            Type::Sized { bits, signed: false } => write!(f, "uint{bits}"),
            Type::Bool => write!(f, "bool"),
            Type::NamedBool(name) => write!(f, "{name}"),
            Type::String => write!(f, "string"),
            Type::UnsafePtr => write!(f, "unsafe.Pointer"),
            Type::Ptr(inner) => write!(f, "*{inner}"),
            Type::Slice(inner) => write!(f, "[]{inner}"),
            Type::Array(n, inner) => write!(f, "[{n}]{inner}"),
            Type::Struct(fields) => {
                write!(f, "struct {{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.ty)?;
                }
                write!(f, " }}")
            }
            Type::Map(k, v) => write!(f, "map[{k}]{v}"),
            Type::Chan(inner) => write!(f, "chan {inner}"),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Type::Opaque { name, .. } => write!(f, "{name}"),
            Type::TypeDesc => write!(f, "*runtime._type"),
            Type::Void => write!(f, "void"),
        }
    }
}
