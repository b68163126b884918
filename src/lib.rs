pub mod config;
pub mod diagnostics;
pub mod ir;
pub mod lower;
pub mod runtime;
pub mod span;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use config::LowerConfig;
use diagnostics::LowerError;
use ir::visit::{Visitor, walk_expr, walk_stmts};
use ir::{Expr, ExprKind, Func, Stmt, VarId};
use lower::{BasicWalker, Frame, Lowered, Lowerer};
use runtime::RuntimeTable;

/// A routine as exchanged with the driver: its variables and results plus the
/// statement list to lower.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub func: Func,
    pub body: Vec<Stmt>,
}

impl Routine {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, LowerError> {
        let routine: Self = serde_json::from_str(text)
            .map_err(|e| LowerError::input(format!("failed to parse routine: {e}"), path.to_path_buf()))?;
        routine.check_vars(path)?;
        Ok(routine)
    }

    /// Every variable id in the routine must name an entry of `func.vars`.
    pub fn check_vars(&self, path: &Path) -> Result<(), LowerError> {
        let count = self.func.vars.len();
        let in_range = |id: VarId| (id.0 as usize) < count;
        let bad = |what: &str, id: VarId| {
            LowerError::input(
                format!("{what} refers to variable #{} but the routine declares {count}", id.0),
                path.to_path_buf(),
            )
        };

        if let Some(&id) = self.func.results.iter().find(|&&id| !in_range(id)) {
            return Err(bad("result list", id));
        }
        for var in &self.func.vars {
            if let Some(addr) = var.heap_addr.filter(|&id| !in_range(id)) {
                return Err(bad(&format!("heap address of `{}`", var.name), addr));
            }
        }
        let mut check = VarRefCheck { count, bad: None };
        walk_stmts(&mut check, &self.body);
        match check.bad {
            Some(id) => Err(bad("body", id)),
            None => Ok(()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, LowerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LowerError::input(format!("failed to read: {e}"), path.to_path_buf()))?;
        Self::from_json(&text, path)
    }
}

/// Finds the first variable reference past the end of the arena.
struct VarRefCheck {
    count: usize,
    bad: Option<VarId>,
}

impl Visitor for VarRefCheck {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.bad.is_some() {
            return;
        }
        if let ExprKind::Name(id) = expr.kind {
            if (id.0 as usize) >= self.count {
                self.bad = Some(id);
                return;
            }
        }
        walk_expr(self, expr);
    }
}

/// Lower every assignment-family statement of one routine body.
///
/// An internal error aborts the routine. User-facing errors are collected in
/// the result, whose body must then not be handed to code generation.
pub fn lower_func(
    func: &mut Func,
    body: Vec<Stmt>,
    runtime: &RuntimeTable,
    config: &LowerConfig,
) -> Result<Lowered, LowerError> {
    debug!(func = %func.name, stmts = body.len(), "lowering routine");
    let mut lowerer = Lowerer::new(Frame::new(func, runtime, config), BasicWalker);
    let body = lowerer.lower_body(body)?;
    let errors = lowerer.finish();
    Ok(Lowered { body, errors })
}

/// [`lower_func`] for a whole [`Routine`], which is updated in place.
pub fn lower_routine(
    routine: &mut Routine,
    runtime: &RuntimeTable,
    config: &LowerConfig,
) -> Result<Vec<LowerError>, LowerError> {
    let body = std::mem::take(&mut routine.body);
    let lowered = lower_func(&mut routine.func, body, runtime, config)?;
    routine.body = lowered.body;
    Ok(lowered.errors)
}
