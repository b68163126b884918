use super::{Callee, Expr, ExprKind, Func, Lit, ListKind, Stmt, StmtKind, Type, UnaryOp};

/// Pretty-print a statement list as Go-like text, one statement per line.
/// Variable names come from `func`.
pub fn pretty_body(func: &Func, body: &[Stmt]) -> String {
    let mut pp = PrettyPrinter::new(func);
    for stmt in body {
        pp.emit_stmt(stmt);
    }
    pp.buf
}

/// Pretty-print a single expression.
pub fn pretty_expr(func: &Func, expr: &Expr) -> String {
    let mut pp = PrettyPrinter::new(func);
    pp.emit_expr(expr);
    pp.buf
}

struct PrettyPrinter<'a> {
    func: &'a Func,
    buf: String,
    indent: usize,
}

impl<'a> PrettyPrinter<'a> {
    fn new(func: &'a Func) -> Self {
        Self {
            func,
            buf: String::new(),
            indent: 0,
        }
    }

    fn write(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn newline(&mut self) {
        self.buf.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn emit_block(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for stmt in stmts {
            self.emit_stmt(stmt);
        }
        self.indent -= 1;
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        for init in &stmt.init {
            self.emit_stmt(init);
        }
        self.write_indent();
        match &stmt.kind {
            StmtKind::Assign { dst, src } => {
                self.emit_expr(dst);
                self.write(" = ");
                match src {
                    Some(src) => self.emit_expr(src),
                    None => self.write("zero"),
                }
            }
            StmtKind::AssignOp { dst, op, src } => {
                self.emit_expr(dst);
                self.write(&format!(" {}= ", op.symbol()));
                self.emit_expr(src);
            }
            StmtKind::AssignList { kind, lhs, rhs } => {
                self.emit_list(lhs);
                self.write(" = ");
                if *kind != ListKind::Plain && rhs.len() != 1 {
                    self.write("<malformed> ");
                }
                self.emit_list(rhs);
            }
            StmtKind::If { cond, then, els, likely } => {
                self.write("if ");
                if *likely {
                    self.write("likely(");
                    self.emit_expr(cond);
                    self.write(")");
                } else {
                    self.emit_expr(cond);
                }
                self.write(" {");
                self.newline();
                self.emit_block(then);
                if !els.is_empty() {
                    self.write_indent();
                    self.write("} else {");
                    self.newline();
                    self.emit_block(els);
                }
                self.write_indent();
                self.write("}");
            }
            StmtKind::Block(stmts) => {
                self.write("{");
                self.newline();
                self.emit_block(stmts);
                self.write_indent();
                self.write("}");
            }
            StmtKind::Expr(e) => self.emit_expr(e),
            StmtKind::Return { results } => {
                self.write("return");
                if !results.is_empty() {
                    self.write(" ");
                    self.emit_list(results);
                }
            }
        }
        self.newline();
    }

    fn emit_list(&mut self, exprs: &[Expr]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_expr(e);
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn emit_expr(&mut self, expr: &Expr) {
        if !expr.init.is_empty() {
            // Init lists should have been hoisted; show them inline rather than drop them.
            self.write("(init: ");
            let saved = std::mem::take(&mut self.buf);
            let indent = std::mem::replace(&mut self.indent, 0);
            for stmt in &expr.init {
                self.emit_stmt(stmt);
            }
            self.indent = indent;
            let text = std::mem::replace(&mut self.buf, saved);
            self.write(&text.trim_end().replace('\n', "; "));
            self.write(") ");
        }
        match &expr.kind {
            ExprKind::Name(id) => {
                let name = self.func.var(*id).name.clone();
                self.write(&name);
            }
            ExprKind::Blank => self.write("_"),
            ExprKind::Lit(lit) => match lit {
                Lit::Int(n) => self.write(&n.to_string()),
                Lit::Bool(b) => self.write(if *b { "true" } else { "false" }),
                Lit::Str(s) => self.write(&format!("{s:?}")),
                Lit::Nil => self.write("nil"),
                Lit::Zero => self.write(&format!("{}{{}}", expr.ty)),
            },
            ExprKind::Paren(inner) => {
                self.write("(");
                self.emit_expr(inner);
                self.write(")");
            }
            ExprKind::Field { base, index } => {
                self.emit_operand(base);
                self.write(".");
                self.write(&field_name(&base.ty, *index));
            }
            ExprKind::FieldPtr { base, index } => {
                self.emit_operand(base);
                self.write(".");
                let name = match base.ty.elem() {
                    Some(inner) => field_name(inner, *index),
                    None => index.to_string(),
                };
                self.write(&name);
            }
            ExprKind::Index { base, index, .. } => {
                self.emit_operand(base);
                self.write("[");
                self.emit_expr(index);
                self.write("]");
            }
            ExprKind::MapIndex { map, key, .. } => {
                self.emit_operand(map);
                self.write("[");
                self.emit_expr(key);
                self.write("]");
            }
            ExprKind::Deref(inner) => {
                self.write("*");
                self.emit_operand(inner);
            }
            ExprKind::AddrOf(inner) => {
                self.write("&");
                self.emit_operand(inner);
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg | UnaryOp::Not | UnaryOp::BitNot => {
                    self.write(match op {
                        UnaryOp::Neg => "-",
                        UnaryOp::Not => "!",
                        _ => "^",
                    });
                    self.emit_operand(operand);
                }
                UnaryOp::Len | UnaryOp::Cap | UnaryOp::SlicePtr => {
                    self.write(match op {
                        UnaryOp::Len => "len(",
                        UnaryOp::Cap => "cap(",
                        _ => "slicedata(",
                    });
                    self.emit_expr(operand);
                    self.write(")");
                }
            },
            ExprKind::Binary { op, lhs, rhs } => {
                self.emit_binary_operand(lhs);
                self.write(&format!(" {} ", op.symbol()));
                self.emit_binary_operand(rhs);
            }
            ExprKind::Conv(inner) => {
                let ty = expr.ty.to_string();
                if ty.starts_with('*') || ty.contains(' ') {
                    self.write(&format!("({ty})("));
                } else {
                    self.write(&format!("{ty}("));
                }
                self.emit_expr(inner);
                self.write(")");
            }
            ExprKind::Call { callee, args } => {
                let name = match callee {
                    Callee::Func(n) | Callee::Runtime(n) | Callee::Intrinsic(n) => n,
                };
                self.write(name);
                self.write("(");
                self.emit_list(args);
                self.write(")");
            }
            ExprKind::Append { args, spread, .. } => {
                self.write("append(");
                self.emit_list(args);
                if *spread {
                    self.write("...");
                }
                self.write(")");
            }
            ExprKind::MakeSlice { len, cap } => {
                self.write(&format!("make({}, ", expr.ty));
                self.emit_expr(len);
                if let Some(cap) = cap {
                    self.write(", ");
                    self.emit_expr(cap);
                }
                self.write(")");
            }
            ExprKind::Recv(chan) => {
                self.write("<-");
                self.emit_operand(chan);
            }
            ExprKind::TypeAssert(inner) => {
                self.emit_operand(inner);
                self.write(&format!(".({})", expr.ty));
            }
            ExprKind::Slice { base, low, high, .. } => {
                self.emit_operand(base);
                self.write("[");
                if let Some(low) = low {
                    self.emit_expr(low);
                }
                self.write(":");
                if let Some(high) = high {
                    self.emit_expr(high);
                }
                self.write("]");
            }
            ExprKind::CallResult(i) => self.write(&format!("res{i}")),
            ExprKind::TypeDesc(ty) => self.write(&format!("type({ty})")),
            ExprKind::ZeroAddr(size) => self.write(&format!("&zeroVal[{size}]")),
        }
    }

    /// Operand of a prefix or postfix operator.
    fn emit_operand(&mut self, expr: &Expr) {
        if needs_parens(expr) {
            self.write("(");
            self.emit_expr(expr);
            self.write(")");
        } else {
            self.emit_expr(expr);
        }
    }

    fn emit_binary_operand(&mut self, expr: &Expr) {
        if matches!(expr.kind, ExprKind::Binary { .. }) {
            self.write("(");
            self.emit_expr(expr);
            self.write(")");
        } else {
            self.emit_expr(expr);
        }
    }
}

fn needs_parens(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Binary { .. } | ExprKind::Deref(_) | ExprKind::AddrOf(_) | ExprKind::Recv(_) => true,
        ExprKind::Unary { op, .. } => matches!(op, UnaryOp::Neg | UnaryOp::Not | UnaryOp::BitNot),
        _ => false,
    }
}

fn field_name(ty: &Type, index: usize) -> String {
    match ty {
        Type::Struct(fields) => match fields.get(index) {
            Some(field) => field.name.clone(),
            None => index.to_string(),
        },
        _ => index.to_string(),
    }
}
