use std::collections::HashMap;

use crate::diagnostics::LowerError;
use crate::span::Span;

/// How the key operand of a map primitive is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPassing {
    /// Fast paths take the key itself.
    ByValue,
    /// The generic path takes the key's address.
    ByAddr,
    /// Not a map primitive.
    None,
}

/// Shape of a primitive's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Void,
    Bool,
    Int,
    /// Pointer to a map element slot.
    ElemPtr,
    /// Same type as the operand it resizes.
    Same,
    /// Element pointer plus presence flag.
    ElemPtrBool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFn {
    pub name: &'static str,
    pub params: usize,
    pub key: KeyPassing,
    pub result: ResultShape,
}

/// Table of every runtime primitive the lowering stage emits calls to.
/// Built once and shared read-only by every routine being lowered.
#[derive(Debug, Clone)]
pub struct RuntimeTable {
    fns: HashMap<&'static str, RuntimeFn>,
}

impl Default for RuntimeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeTable {
    pub fn new() -> Self {
        use KeyPassing::{ByAddr, ByValue};
        use ResultShape::*;

        let mut table = RuntimeTable { fns: HashMap::new() };

        // Slices
        table.declare("growslice", 3, KeyPassing::None, Same);
        table.declare("makeslice", 3, KeyPassing::None, Same);
        table.declare("panicmakeslicelen", 0, KeyPassing::None, Void);

        // Memory
        table.declare("memmove", 3, KeyPassing::None, Void);
        table.declare("typedslicecopy", 3, KeyPassing::None, Int);
        table.declare("slicecopy", 3, KeyPassing::None, Int);
        table.declare("memclrNoHeapPointers", 2, KeyPassing::None, Void);
        table.declare("memclrHasPointers", 2, KeyPassing::None, Void);

        // Channels
        table.declare("chanrecv1", 2, KeyPassing::None, Void);
        table.declare("chanrecv2", 2, KeyPassing::None, Bool);

        // Maps: (type, map, key) plus a zero buffer for the _fat forms.
        table.declare("mapaccess1", 3, ByAddr, ElemPtr);
        table.declare("mapaccess1_fast32", 3, ByValue, ElemPtr);
        table.declare("mapaccess1_fast64", 3, ByValue, ElemPtr);
        table.declare("mapaccess1_faststr", 3, ByValue, ElemPtr);
        table.declare("mapaccess1_fat", 4, ByAddr, ElemPtr);
        table.declare("mapaccess2", 3, ByAddr, ElemPtrBool);
        table.declare("mapaccess2_fast32", 3, ByValue, ElemPtrBool);
        table.declare("mapaccess2_fast64", 3, ByValue, ElemPtrBool);
        table.declare("mapaccess2_faststr", 3, ByValue, ElemPtrBool);
        table.declare("mapaccess2_fat", 4, ByAddr, ElemPtrBool);
        table.declare("mapassign", 3, ByAddr, ElemPtr);
        table.declare("mapassign_fast32", 3, ByValue, ElemPtr);
        table.declare("mapassign_fast32ptr", 3, ByValue, ElemPtr);
        table.declare("mapassign_fast64", 3, ByValue, ElemPtr);
        table.declare("mapassign_fast64ptr", 3, ByValue, ElemPtr);
        table.declare("mapassign_faststr", 3, ByValue, ElemPtr);

        table
    }

    fn declare(&mut self, name: &'static str, params: usize, key: KeyPassing, result: ResultShape) {
        self.fns.insert(name, RuntimeFn { name, params, key, result });
    }

    /// Look up a primitive. A missing entry means the caller asked for a
    /// primitive that was never registered, which is an internal error.
    pub fn lookup(&self, name: &str, span: Span) -> Result<&RuntimeFn, LowerError> {
        self.fns
            .get(name)
            .ok_or_else(|| LowerError::internal(format!("unknown runtime primitive '{name}'"), span))
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}
