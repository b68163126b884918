//! Assignment lowering.
//!
//! The entry point is [`Lowerer::lower_body`], which walks a routine body and
//! hands every assignment-family statement to the dispatcher in `assign`. The
//! general expression walk is a collaborator behind [`ExprWalker`]; everything
//! it needs from the routine (temporaries, runtime calls, map helpers) lives
//! on [`Frame`].

pub mod alias;
pub mod append;
pub mod assign;
pub mod maps;
pub mod multi;
pub mod order;
pub mod safe;
pub mod walker;

use tracing::trace;

use crate::config::LowerConfig;
use crate::diagnostics::LowerError;
use crate::ir::{Callee, Expr, Func, ListKind, Stmt, StmtKind, Type, VarId};
use crate::runtime::RuntimeTable;
use crate::span::Span;

pub use walker::BasicWalker;

/// Per-routine state shared by the core and the expression walker.
pub struct Frame<'a> {
    /// The routine being lowered. Temporaries are declared here.
    pub func: &'a mut Func,
    /// Read-only table of runtime primitives.
    pub runtime: &'a RuntimeTable,
    pub config: &'a LowerConfig,
    /// User-facing errors. Lowering keeps going after one is recorded.
    errors: Vec<LowerError>,
}

impl<'a> Frame<'a> {
    pub fn new(func: &'a mut Func, runtime: &'a RuntimeTable, config: &'a LowerConfig) -> Self {
        Self {
            func,
            runtime,
            config,
            errors: Vec::new(),
        }
    }

    pub fn new_temp(&mut self, ty: Type) -> VarId {
        let id = self.func.new_temp(ty);
        trace!(temp = %self.func.var(id).name, ty = %self.func.var(id).ty, "new temporary");
        id
    }

    /// Fresh temporary, returned as a name expression.
    pub fn temp(&mut self, ty: Type) -> Expr {
        let id = self.new_temp(ty);
        self.func.name(id)
    }

    /// Build a call to a registered runtime primitive.
    pub fn mkcall(&self, name: &str, args: Vec<Expr>, ty: Type, span: Span) -> Result<Expr, LowerError> {
        let desc = self.runtime.lookup(name, span)?;
        if desc.params != args.len() {
            return Err(LowerError::internal(
                format!("{name}: expected {} arguments, got {}", desc.params, args.len()),
                span,
            ));
        }
        Ok(Expr::call(Callee::Runtime(desc.name.to_string()), args, ty).at(span))
    }

    pub fn semantic_error(&mut self, msg: impl Into<String>, span: Span) {
        self.errors.push(LowerError::semantic(msg, span));
    }

    pub fn set_wb_pos(&mut self, span: Span) {
        self.func.set_wb_pos(span);
    }

    pub fn into_errors(self) -> Vec<LowerError> {
        self.errors
    }
}

/// The general expression-lowering collaborator.
///
/// Implementations must be idempotent on already-lowered nodes: the core
/// passes safe expressions back through the walker when it rebuilds a node
/// around them.
pub trait ExprWalker {
    fn walk_expr(&mut self, frame: &mut Frame<'_>, expr: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError>;
}

/// Result of lowering one routine body.
#[derive(Debug)]
pub struct Lowered {
    pub body: Vec<Stmt>,
    /// User-facing errors recorded along the way.
    pub errors: Vec<LowerError>,
}

impl Lowered {
    /// A body with recorded errors must not reach code generation.
    pub fn is_trusted(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Lowerer<'a, W: ExprWalker> {
    pub frame: Frame<'a>,
    pub walker: W,
}

impl<'a, W: ExprWalker> Lowerer<'a, W> {
    pub fn new(frame: Frame<'a>, walker: W) -> Self {
        Self { frame, walker }
    }

    pub fn finish(self) -> Vec<LowerError> {
        self.frame.into_errors()
    }

    pub(crate) fn walk(&mut self, expr: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        self.walker.walk_expr(&mut self.frame, expr, init)
    }

    pub fn lower_body(&mut self, body: Vec<Stmt>) -> Result<Vec<Stmt>, LowerError> {
        body.into_iter().map(|stmt| self.lower_stmt(stmt)).collect()
    }

    /// Lower one statement. Statements produced while lowering end up in the
    /// returned statement's init list, ahead of the statement itself.
    pub fn lower_stmt(&mut self, mut stmt: Stmt) -> Result<Stmt, LowerError> {
        let pending = stmt.take_init();
        let mut init = self.lower_body(pending)?;
        let span = stmt.span;

        let lowered = match stmt.kind {
            StmtKind::Assign { .. } | StmtKind::AssignOp { .. } => self.walk_assign(stmt, &mut init)?,
            StmtKind::AssignList { kind, .. } => match kind {
                ListKind::Plain => self.walk_assign_list(stmt, &mut init)?,
                ListKind::Func => self.walk_assign_func(stmt, &mut init)?,
                ListKind::MapRead => self.walk_assign_map_read(stmt, &mut init)?,
                ListKind::Recv => self.walk_assign_recv(stmt, &mut init)?,
                ListKind::TypeAssert => self.walk_assign_dot_type(stmt, &mut init)?,
            },
            StmtKind::Return { .. } => self.walk_return(stmt, &mut init)?,
            StmtKind::If { cond, then, els, likely } => {
                let cond = self.walk(cond, &mut init)?;
                let then = self.lower_body(then)?;
                let els = self.lower_body(els)?;
                Stmt::new(StmtKind::If { cond, then, els, likely }).at(span)
            }
            StmtKind::Block(stmts) => Stmt::block(self.lower_body(stmts)?).at(span),
            StmtKind::Expr(expr) => Stmt::expr(self.walk(expr, &mut init)?).at(span),
        };
        Ok(lowered.with_init(init))
    }
}
