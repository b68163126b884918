//! Assignments with more than one destination, and `return`.

use tracing::debug;

use super::{ExprWalker, Lowerer};
use crate::diagnostics::LowerError;
use crate::ir::{Callee, Expr, ExprKind, ListKind, Stmt, StmtKind, Type};
use crate::span::Span;

/// Split a list assignment into its two sides.
fn list_parts(stmt: Stmt, what: &str) -> Result<(Vec<Expr>, Vec<Expr>, Span), LowerError> {
    let span = stmt.span;
    match stmt.kind {
        StmtKind::AssignList { lhs, rhs, .. } => Ok((lhs, rhs, span)),
        other => Err(LowerError::internal(format!("{what}: not a list assignment: {other:?}"), span)),
    }
}

fn single_source(rhs: Vec<Expr>, what: &str, span: Span) -> Result<Expr, LowerError> {
    let count = rhs.len();
    let [src]: [Expr; 1] = rhs
        .try_into()
        .map_err(|_| LowerError::internal(format!("{what}: expected one source, got {count}"), span))?;
    Ok(src)
}

fn pair(lhs: Vec<Expr>, what: &str, span: Span) -> Result<(Expr, Expr), LowerError> {
    let count = lhs.len();
    let [a, b]: [Expr; 2] = lhs
        .try_into()
        .map_err(|_| LowerError::internal(format!("{what}: expected two destinations, got {count}"), span))?;
    Ok((a, b))
}

impl<W: ExprWalker> Lowerer<'_, W> {
    /// Turn a map index left raw by `walk_dests_safe` into its `mapassign`
    /// slot, for destinations the backend writes directly.
    fn settle_dest(&mut self, dst: Expr, init: &mut Vec<Stmt>) -> Result<Expr, LowerError> {
        let span = dst.span;
        match dst.kind {
            ExprKind::MapIndex { map, key, .. } => {
                let slot = self.frame.map_assign(*map, *key, init, span)?;
                Ok(self.frame.safe_expr(slot, init)?.into_expr())
            }
            kind => Ok(Expr { kind, ..dst }),
        }
    }

    /// `a, b = c, d`
    pub fn walk_assign_list(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let (lhs, rhs, span) = list_parts(stmt, "walk_assign_list")?;
        debug!(count = lhs.len(), "parallel assignment");
        let lhs = self.walk_dests_safe(lhs, init)?;
        let rhs = self.walk_exprs_safe(rhs, init)?;
        Ok(Stmt::block(self.ascompatee(lhs, rhs, false, span)?).at(span))
    }

    /// `a, b = f()`
    pub fn walk_assign_func(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let (lhs, rhs, span) = list_parts(stmt, "walk_assign_func")?;
        let call = single_source(rhs, "walk_assign_func", span)?;
        let lhs = self.walk_dests_safe(lhs, init)?;
        let call = self.walk(call, init)?;

        if matches!(call.kind, ExprKind::Call { callee: Callee::Intrinsic(_), .. }) {
            debug!("multi-value intrinsic kept for the backend");
            let lhs = lhs
                .into_iter()
                .map(|l| self.settle_dest(l, init))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Stmt::assign_list(ListKind::Func, lhs, vec![call]).at(span));
        }

        debug!(count = lhs.len(), "multi-value call");
        let results = call.ty.clone();
        init.push(Stmt::expr(call).at(span));
        Ok(Stmt::block(self.ascompatet(lhs, &results, span)?).at(span))
    }

    /// `a, ok = m[k]` becomes
    ///
    /// ```text
    /// p, ok = mapaccess2*(t, m, k)
    /// a = *p
    /// ```
    pub fn walk_assign_map_read(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let (lhs, rhs, span) = list_parts(stmt, "walk_assign_map_read")?;
        let read = single_source(rhs, "walk_assign_map_read", span)?;
        let lhs = self.walk_dests_safe(lhs, init)?;
        let (a, ok) = pair(lhs, "walk_assign_map_read", span)?;
        let ExprKind::MapIndex { map, key, .. } = read.kind else {
            return Err(LowerError::internal("walk_assign_map_read: source is not a map index", span));
        };
        let map = self.walk(*map, init)?;
        let key = self.walk(*key, init)?;

        // The flag takes the destination's boolean type, which may be a named one.
        let ok_ty = if !ok.is_blank() && ok.ty.is_boolean() { ok.ty.clone() } else { Type::Bool };
        let call = self.frame.map_read2(map, key, ok_ty, init, span)?;
        debug!("comma-ok map read");

        if a.is_blank() {
            let inner = Stmt::assign_list(ListKind::Func, vec![a, ok], vec![call]).at(span);
            return self.walk_assign_func(inner, init);
        }

        let elem_ptr = match &call.ty {
            Type::Tuple(fields) if !fields.is_empty() => fields[0].clone(),
            other => return Err(LowerError::internal(format!("map read result {other}"), span)),
        };
        let id = self.frame.new_temp(elem_ptr);
        // The runtime never hands back a nil element pointer.
        self.frame.func.var_mut(id).non_nil = true;
        let ptr = self.frame.func.name(id);
        let inner = Stmt::assign_list(ListKind::Func, vec![ptr.clone(), ok], vec![call]).at(span);
        let inner = self.walk_assign_func(inner, init)?;
        init.push(inner);
        self.convas(a, Expr::deref(ptr).at(span), init, span)
    }

    /// `a, ok = <-c` becomes `ok = chanrecv2(c, &a)`.
    pub fn walk_assign_recv(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let (lhs, rhs, span) = list_parts(stmt, "walk_assign_recv")?;
        let recv = single_source(rhs, "walk_assign_recv", span)?;
        let lhs = self.walk_dests_safe(lhs, init)?;
        let (a, ok) = pair(lhs, "walk_assign_recv", span)?;
        let ExprKind::Recv(chan) = recv.kind else {
            return Err(LowerError::internal("walk_assign_recv: source is not a receive", span));
        };
        let chan = self.walk(*chan, init)?;
        let elem = chan.ty.elem().cloned().unwrap_or(Type::Void);
        debug!("comma-ok receive");

        let mut after = Vec::new();
        let addr = if a.is_blank() {
            Expr::nil(elem.ptr_to())
        } else if a.is_addressable() && a.ty == elem {
            Expr::addr_of(a)
        } else {
            // Receive into a temporary and store once the flag is known.
            let tmp = self.frame.temp(elem);
            let store = self.convas(a, tmp.clone(), &mut after, span)?;
            after.push(store);
            Expr::addr_of(tmp)
        };
        let call = self.frame.mkcall("chanrecv2", vec![chan, addr], Type::Bool, span)?;
        let flag = self.convas(ok, call, init, span)?;
        if after.is_empty() {
            return Ok(flag);
        }
        let mut stmts = vec![flag];
        stmts.append(&mut after);
        Ok(Stmt::block(stmts).at(span))
    }

    /// `a, ok = x.(T)`: both results come from one primitive, so only the
    /// operands are lowered.
    pub fn walk_assign_dot_type(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let (lhs, rhs, span) = list_parts(stmt, "walk_assign_dot_type")?;
        let assert = single_source(rhs, "walk_assign_dot_type", span)?;
        let lhs = self.walk_dests_safe(lhs, init)?;
        let lhs = lhs
            .into_iter()
            .map(|l| self.settle_dest(l, init))
            .collect::<Result<Vec<_>, _>>()?;
        let assert = self.walk(assert, init)?;
        Ok(Stmt::assign_list(ListKind::TypeAssert, lhs, vec![assert]).at(span))
    }

    /// `return a, b` stores into the declared results, then returns.
    pub fn walk_return(&mut self, mut stmt: Stmt, init: &mut Vec<Stmt>) -> Result<Stmt, LowerError> {
        init.append(&mut stmt.take_init());
        let span = stmt.span;
        self.frame.func.num_returns += 1;
        let StmtKind::Return { results } = stmt.kind else {
            return Err(LowerError::internal("walk_return: not a return", span));
        };
        if results.is_empty() {
            return Ok(Stmt::ret(Vec::new()).at(span));
        }

        let func = &*self.frame.func;
        if func.results.len() != results.len() {
            return Err(LowerError::internal(
                format!(
                    "return count mismatch: {} declared, {} returned",
                    func.results.len(),
                    results.len()
                ),
                span,
            ));
        }
        let dsts: Vec<Expr> = func
            .results
            .iter()
            .map(|&id| match func.var(id).heap_addr {
                Some(addr) => Expr::deref(func.name(addr)),
                None => func.name(id),
            })
            .collect();
        let redirect = (func.named_results && dsts.len() > 1) || func.has_heap_results();
        debug!(count = dsts.len(), redirect, "return");

        let mut stmts = if redirect {
            let dsts = self.walk_dests_safe(dsts, init)?;
            let results = self.walk_exprs_safe(results, init)?;
            self.ascompatee(dsts, results, true, span)?
        } else {
            let mut out = Vec::with_capacity(dsts.len());
            for (dst, res) in dsts.into_iter().zip(results) {
                let res = self.walk(res, init)?;
                out.push(self.convas(dst, res, init, span)?);
            }
            out
        };
        stmts.push(Stmt::ret(Vec::new()).at(span));
        Ok(Stmt::block(stmts).at(span))
    }
}
