// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Expr {
    /// Number literal (integer or float).
    Number(f64),
    /// String literal, single- or double-quoted.
    StringLit(String),
    /// Boolean literal.
    Bool(bool),
    /// Bare top-level name, e.g. `evt`.
    Name(String),
    /// Attribute access, e.g. `evt.severity`.
    Attr { target: Box<Expr>, name: String },
    /// Binary operation.
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary negation.
    Neg(Box<Expr>),
    /// Logical negation: `not expr` or `!expr`.
    Not(Box<Expr>),
    /// Builtin call: `name(args...)` or method form `receiver.name(args...)`.
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    /// `expr in (v1, v2, ...)` / `expr in [v1, v2]` and the `not in` forms.
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// `expr in container` where the container is a list-valued attribute
    /// or a string (substring test).
    Member {
        expr: Box<Expr>,
        container: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    /// Root name of an attribute chain: `evt` for `evt.summary`.
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Expr::Name(n) => Some(n),
            Expr::Attr { target, .. } => target.root_name(),
            _ => None,
        }
    }

    /// Dotted path of an attribute chain, e.g. `dev.groups`.
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Name(n) => Some(n.clone()),
            Expr::Attr { target, name } => target.dotted_path().map(|p| format!("{p}.{name}")),
            _ => None,
        }
    }
}
