//! Minimal WGSL syntax tree covering what planet generation programs need,
//! plus the writer that renders it to source text.
//!
//! All numeric formatting and parenthesization happens in [`WgslWriter`], so
//! generated programs are byte-for-byte reproducible.

/// Binary operators, lowest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Less,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Less => "<",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Less => 1,
            BinaryOp::Add | BinaryOp::Sub => 2,
            BinaryOp::Mul | BinaryOp::Div => 3,
        }
    }

    /// `a op (b op c) == (a op b) op c`, so a right operand of the same
    /// precedence needs no parentheses.
    fn is_associative(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Mul)
    }
}

/// Expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `f32` literal.
    Float(f32),
    /// `u32` literal, written with the `u` suffix.
    Uint(u32),
    Ident(String),
    /// `base.field`
    Member { base: Box<Expr>, field: String },
    /// Explicit parentheses, kept even where precedence would not need them.
    Group(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Function call or type constructor.
    Call { function: String, args: Vec<Expr> },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn member(base: Expr, field: impl Into<String>) -> Self {
        Expr::Member {
            base: Box::new(base),
            field: field.into(),
        }
    }

    pub fn group(inner: Expr) -> Self {
        Expr::Group(Box::new(inner))
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            function: function.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }

    pub fn less(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Less, self, rhs)
    }
}

/// Assignment operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Mul,
}

impl AssignOp {
    fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Mul => "*=",
        }
    }
}

/// Statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `// text`
    Comment(String),
    /// `let name = init;`
    Let { name: String, init: Expr },
    /// `var name: ty;` or `var name: ty = init;`
    Var {
        name: String,
        ty: String,
        init: Option<Expr>,
    },
    /// `target op value;`
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
    },
    /// `for (var counter: u32 = 0u; counter < count; counter++) { body }`
    Repeat {
        counter: String,
        count: u32,
        body: Vec<Stmt>,
    },
    Return(Expr),
}

impl Stmt {
    pub fn assign(target: impl Into<String>, op: AssignOp, value: Expr) -> Self {
        Stmt::Assign {
            target: target.into(),
            op,
            value,
        }
    }

    pub fn var(name: impl Into<String>, ty: impl Into<String>, init: Option<Expr>) -> Self {
        Stmt::Var {
            name: name.into(),
            ty: ty.into(),
            init,
        }
    }
}

/// Shader stage an entry point runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fragment,
}

impl Stage {
    fn attribute(self) -> &'static str {
        match self {
            Stage::Fragment => "@fragment",
        }
    }
}

/// A shader entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryPoint {
    pub stage: Stage,
    pub name: String,
    /// `(name, type)` pairs.
    pub params: Vec<(String, String)>,
    pub return_type: String,
    pub body: Vec<Stmt>,
}

/// Formats an `f32` as a WGSL float literal.
///
/// Uses the shortest representation that round-trips, which always carries a
/// fractional part or an exponent (`0.0`, `-1.5`, `1e-7`). WGSL has no
/// literal for infinities or NaN: infinities saturate to the nearest finite
/// value and NaN is written as `0.0`.
pub fn format_float(value: f32) -> String {
    let value = if value.is_nan() {
        0.0
    } else {
        value.clamp(f32::MIN, f32::MAX)
    };
    format!("{value:?}")
}

/// Renders syntax trees to WGSL text with four-space indentation.
#[derive(Default)]
pub struct WgslWriter {
    out: String,
    depth: usize,
}

impl WgslWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw source text, such as a library of helper functions.
    pub fn write_raw(&mut self, source: &str) {
        self.out.push_str(source);
        if !source.ends_with('\n') {
            self.out.push('\n');
        }
    }

    pub fn write_entry_point(&mut self, entry: &EntryPoint) {
        let params = entry
            .params
            .iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.line(entry.stage.attribute());
        self.line(&format!(
            "fn {}({params}) -> {} {{",
            entry.name, entry.return_type
        ));
        self.block(&entry.body);
        self.line("}");
    }

    pub fn write_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Comment(text) => self.line(&format!("// {text}")),
            Stmt::Let { name, init } => self.line(&format!("let {name} = {};", expr_to_string(init))),
            Stmt::Var { name, ty, init: None } => self.line(&format!("var {name}: {ty};")),
            Stmt::Var {
                name,
                ty,
                init: Some(init),
            } => self.line(&format!("var {name}: {ty} = {};", expr_to_string(init))),
            Stmt::Assign { target, op, value } => self.line(&format!(
                "{target} {} {};",
                op.symbol(),
                expr_to_string(value)
            )),
            Stmt::Repeat {
                counter,
                count,
                body,
            } => {
                let init = expr_to_string(&Expr::Uint(0));
                let condition =
                    expr_to_string(&Expr::ident(counter.as_str()).less(Expr::Uint(*count)));
                self.line(&format!(
                    "for (var {counter}: u32 = {init}; {condition}; {counter}++) {{"
                ));
                self.block(body);
                self.line("}");
            }
            Stmt::Return(value) => self.line(&format!("return {};", expr_to_string(value))),
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn block(&mut self, body: &[Stmt]) {
        self.depth += 1;
        for stmt in body {
            self.write_stmt(stmt);
        }
        self.depth -= 1;
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

/// Renders a single expression.
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Float(value) => out.push_str(&format_float(*value)),
        Expr::Uint(value) => {
            out.push_str(&value.to_string());
            out.push('u');
        }
        Expr::Ident(name) => out.push_str(name),
        Expr::Member { base, field } => {
            write_expr(out, base);
            out.push('.');
            out.push_str(field);
        }
        Expr::Group(inner) => {
            out.push('(');
            write_expr(out, inner);
            out.push(')');
        }
        Expr::Binary { op, lhs, rhs } => {
            write_operand(out, lhs, *op, Side::Left);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_operand(out, rhs, *op, Side::Right);
        }
        Expr::Call { function, args } => {
            out.push_str(function);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
    }
}

fn write_operand(out: &mut String, operand: &Expr, parent: BinaryOp, side: Side) {
    let needs_parens = match operand {
        Expr::Binary { op, .. } => {
            op.precedence() < parent.precedence()
                || (op.precedence() == parent.precedence()
                    && side == Side::Right
                    && !parent.is_associative())
                // Comparisons never chain.
                || (*op == BinaryOp::Less && parent == BinaryOp::Less)
        }
        Expr::Float(value) => value.is_sign_negative(),
        _ => false,
    };
    if needs_parens {
        out.push('(');
        write_expr(out, operand);
        out.push(')');
    } else {
        write_expr(out, operand);
    }
}
