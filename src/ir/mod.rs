//! Typed IR consumed and produced by the lowering stage.
//!
//! Every expression and statement carries its resolved static type (expressions
//! only) and a list of init statements that must run immediately before it.
//! Trees are owned: a lowering step consumes a node and returns its
//! replacement. The only sanctioned way to use one sub-tree in two places is a
//! [`SafeExpr`], whose re-evaluation is side-effect free.

pub mod pretty;
pub mod types;
pub mod visit;

use serde::{Deserialize, Serialize};

use crate::span::Span;
pub use types::{KeyAlg, StructField, Type};

/// Index of a variable in its routine's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u32);

/// Where a variable lives. Fixed at creation; escape analysis decided it upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    /// Local on the stack.
    Auto,
    /// Local moved to the heap because it escapes.
    AutoHeap,
    Param,
    /// Named (or compiler-named) result.
    ParamOut,
    /// Package-level global.
    Extern,
    /// Compiler temporary.
    Temp,
    /// Function symbol. Never a valid assignment destination.
    Func,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    pub ty: Type,
    pub class: StorageClass,
    /// The address of the variable was taken somewhere in the routine.
    #[serde(default)]
    pub addr_taken: bool,
    /// Known never to hold nil.
    #[serde(default)]
    pub non_nil: bool,
    /// For results moved to the heap: the variable holding their heap address.
    #[serde(default)]
    pub heap_addr: Option<VarId>,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: Type, class: StorageClass) -> Self {
        Self {
            name: name.into(),
            ty,
            class,
            addr_taken: false,
            non_nil: false,
            heap_addr: None,
        }
    }

    pub fn addr_taken(mut self) -> Self {
        self.addr_taken = true;
        self
    }
}

/// The routine whose body is being lowered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    pub vars: Vec<Var>,
    /// Declared results in declaration order.
    #[serde(default)]
    pub results: Vec<VarId>,
    /// Results were declared with names in the source.
    #[serde(default)]
    pub named_results: bool,
    /// First position that needs a write barrier, recorded for the backend.
    #[serde(default)]
    pub wb_pos: Option<Span>,
    #[serde(default)]
    pub num_returns: u32,
    #[serde(default)]
    next_temp: u32,
}

impl Func {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            results: Vec::new(),
            named_results: false,
            wb_pos: None,
            num_returns: 0,
            next_temp: 0,
        }
    }

    pub fn declare(&mut self, var: Var) -> VarId {
        let id = VarId(self.vars.len() as u32);
        let is_result = var.class == StorageClass::ParamOut;
        self.vars.push(var);
        if is_result {
            self.results.push(id);
        }
        id
    }

    /// Fresh compiler temporary, uniquely named within the routine.
    pub fn new_temp(&mut self, ty: Type) -> VarId {
        let name = format!(".autotmp_{}", self.next_temp);
        self.next_temp += 1;
        self.declare(Var::new(name, ty, StorageClass::Temp))
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.vars[id.0 as usize]
    }

    pub fn name(&self, id: VarId) -> Expr {
        Expr::name(id, self.var(id).ty.clone())
    }

    /// Record a write-barrier position. The first one recorded wins.
    pub fn set_wb_pos(&mut self, span: Span) {
        if self.wb_pos.is_none() {
            self.wb_pos = Some(span);
        }
    }

    /// Results the body writes through an indirect heap slot.
    pub fn has_heap_results(&self) -> bool {
        self.results.iter().any(|&id| {
            let v = self.var(id);
            v.heap_addr.is_some() || v.addr_taken
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    Int(i64),
    Bool(bool),
    Str(String),
    Nil,
    /// The zero value of a composite type.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Len,
    Cap,
    /// Pointer to the backing array of a slice or string.
    SlicePtr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    AndAnd,
    OrOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::AndAnd => "&&",
            BinaryOp::OrOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// A user-level function.
    Func(String),
    /// A primitive from the runtime signature table.
    Runtime(String),
    /// A call the backend expands inline and can return multiple values through.
    Intrinsic(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Name(VarId),
    /// The discard destination `_`.
    Blank,
    Lit(Lit),
    Paren(Box<Expr>),
    /// Field of a struct value.
    Field { base: Box<Expr>, index: usize },
    /// Field reached through a pointer to a struct.
    FieldPtr { base: Box<Expr>, index: usize },
    /// Index into an array, slice or string. `bounded` elides the bounds check.
    Index { base: Box<Expr>, index: Box<Expr>, bounded: bool },
    /// `m[k]`. `assigned` marks the destination of a single assignment.
    MapIndex { map: Box<Expr>, key: Box<Expr>, assigned: bool },
    Deref(Box<Expr>),
    AddrOf(Box<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Conversion of the operand to this node's type.
    Conv(Box<Expr>),
    Call { callee: Callee, args: Vec<Expr> },
    /// Builtin `append`. `elem_desc` is filled in when the call is left for the backend.
    Append { args: Vec<Expr>, spread: bool, elem_desc: Option<Type> },
    MakeSlice { len: Box<Expr>, cap: Option<Box<Expr>> },
    Recv(Box<Expr>),
    /// `x.(T)` in a comma-ok assignment.
    TypeAssert(Box<Expr>),
    Slice { base: Box<Expr>, low: Option<Box<Expr>>, high: Option<Box<Expr>>, bounded: bool },
    /// Field `n` of the results of the call that ran immediately before.
    CallResult(usize),
    /// Address of the runtime descriptor for a type.
    TypeDesc(Type),
    /// Address of a zeroed buffer of at least this many bytes.
    ZeroAddr(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty, init: Vec::new(), span: Span::dummy() }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn name(id: VarId, ty: Type) -> Self {
        Self::new(ExprKind::Name(id), ty)
    }

    pub fn blank(ty: Type) -> Self {
        Self::new(ExprKind::Blank, ty)
    }

    pub fn int(value: i64, ty: Type) -> Self {
        Self::new(ExprKind::Lit(Lit::Int(value)), ty)
    }

    pub fn bool_lit(value: bool) -> Self {
        Self::new(ExprKind::Lit(Lit::Bool(value)), Type::Bool)
    }

    pub fn nil(ty: Type) -> Self {
        Self::new(ExprKind::Lit(Lit::Nil), ty)
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Unary { op, operand: Box::new(operand) }, ty)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty)
    }

    pub fn conv(operand: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Conv(Box::new(operand)), ty)
    }

    pub fn deref(operand: Expr) -> Self {
        let ty = match &operand.ty {
            Type::Ptr(inner) => (**inner).clone(),
            _ => Type::Void,
        };
        Self::new(ExprKind::Deref(Box::new(operand)), ty)
    }

    pub fn addr_of(operand: Expr) -> Self {
        let ty = operand.ty.clone().ptr_to();
        Self::new(ExprKind::AddrOf(Box::new(operand)), ty)
    }

    pub fn index(base: Expr, index: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Index { base: Box::new(base), index: Box::new(index), bounded: false }, ty)
    }

    pub fn map_index(map: Expr, key: Expr) -> Self {
        let ty = map.ty.elem().cloned().unwrap_or(Type::Void);
        Self::new(ExprKind::MapIndex { map: Box::new(map), key: Box::new(key), assigned: false }, ty)
    }

    pub fn field(base: Expr, index: usize) -> Self {
        let ty = base.ty.field_type(index).cloned().unwrap_or(Type::Void);
        Self::new(ExprKind::Field { base: Box::new(base), index }, ty)
    }

    pub fn field_ptr(base: Expr, index: usize) -> Self {
        let ty = base.ty.elem().and_then(|s| s.field_type(index)).cloned().unwrap_or(Type::Void);
        Self::new(ExprKind::FieldPtr { base: Box::new(base), index }, ty)
    }

    pub fn call(callee: Callee, args: Vec<Expr>, ty: Type) -> Self {
        Self::new(ExprKind::Call { callee, args }, ty)
    }

    pub fn recv(chan: Expr) -> Self {
        let ty = chan.ty.elem().cloned().unwrap_or(Type::Void);
        Self::new(ExprKind::Recv(Box::new(chan)), ty)
    }

    pub fn len(operand: Expr, int_ty: Type) -> Self {
        Self::unary(UnaryOp::Len, operand, int_ty)
    }

    pub fn cap(operand: Expr, int_ty: Type) -> Self {
        Self::unary(UnaryOp::Cap, operand, int_ty)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, ExprKind::Blank)
    }

    pub fn is_name(&self) -> bool {
        matches!(self.kind, ExprKind::Name(_))
    }

    pub fn var_id(&self) -> Option<VarId> {
        match self.kind {
            ExprKind::Name(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_const_int(&self) -> bool {
        matches!(self.kind, ExprKind::Lit(Lit::Int(_)))
    }

    /// Statically known to be the zero value of its type.
    pub fn is_zero(&self) -> bool {
        match &self.kind {
            ExprKind::Lit(Lit::Int(0)) | ExprKind::Lit(Lit::Bool(false)) => true,
            ExprKind::Lit(Lit::Nil) | ExprKind::Lit(Lit::Zero) => true,
            ExprKind::Lit(Lit::Str(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// Could appear on the left of an assignment and have its address taken.
    pub fn is_addressable(&self) -> bool {
        match &self.kind {
            ExprKind::Name(_) | ExprKind::Deref(_) | ExprKind::FieldPtr { .. } => true,
            ExprKind::Index { base, .. } => match base.ty {
                Type::Array(..) => base.is_addressable(),
                Type::String => false,
                _ => true,
            },
            ExprKind::Field { base, .. } | ExprKind::Paren(base) => base.is_addressable(),
            _ => false,
        }
    }

    /// Move the pending init statements out, leaving the list empty.
    pub fn take_init(&mut self) -> Vec<Stmt> {
        std::mem::take(&mut self.init)
    }
}

/// An expression whose evaluation has no side effects and yields the same
/// value every time until a store intervenes. Only the lowering stage's
/// safe-expression rewrite builds one, so a clone can stand in for the original
/// node on both sides of `x = x op y` or `m[k] = append(m[k], ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeExpr(Expr);

impl SafeExpr {
    pub(crate) fn new_unchecked(expr: Expr) -> Self {
        SafeExpr(expr)
    }

    pub fn as_expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    /// `a, b = c, d`
    Plain,
    /// `a, b = f()`
    Func,
    /// `v, ok = m[k]`
    MapRead,
    /// `v, ok = <-c`
    Recv,
    /// `v, ok = x.(T)`
    TypeAssert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `dst = src`. A missing source means "assign the zero value".
    Assign { dst: Expr, src: Option<Expr> },
    /// `dst op= src`
    AssignOp { dst: Expr, op: BinaryOp, src: Expr },
    AssignList { kind: ListKind, lhs: Vec<Expr>, rhs: Vec<Expr> },
    If { cond: Expr, then: Vec<Stmt>, els: Vec<Stmt>, likely: bool },
    Block(Vec<Stmt>),
    Expr(Expr),
    Return { results: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { kind, init: Vec::new(), span: Span::dummy() }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn assign(dst: Expr, src: Expr) -> Self {
        Self::new(StmtKind::Assign { dst, src: Some(src) })
    }

    pub fn assign_op(dst: Expr, op: BinaryOp, src: Expr) -> Self {
        Self::new(StmtKind::AssignOp { dst, op, src })
    }

    pub fn assign_list(kind: ListKind, lhs: Vec<Expr>, rhs: Vec<Expr>) -> Self {
        Self::new(StmtKind::AssignList { kind, lhs, rhs })
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Block(stmts))
    }

    pub fn if_(cond: Expr, then: Vec<Stmt>, els: Vec<Stmt>) -> Self {
        Self::new(StmtKind::If { cond, then, els, likely: false })
    }

    pub fn ret(results: Vec<Expr>) -> Self {
        Self::new(StmtKind::Return { results })
    }

    pub fn take_init(&mut self) -> Vec<Stmt> {
        std::mem::take(&mut self.init)
    }

    /// Wrap `self` so that `init` runs first.
    pub fn with_init(mut self, mut init: Vec<Stmt>) -> Self {
        if init.is_empty() {
            return self;
        }
        init.append(&mut self.init);
        self.init = init;
        self
    }
}
