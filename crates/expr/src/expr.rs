use serde_json::Value;

/// Unary operators (spec §4.2 whitelist: `UAdd`, `USub`, `Not`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// Binary operators (spec §4.2 whitelist: arithmetic, comparison, `in`/
/// `not in`, `is`/`is not`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    And,
    Or,
    In,
    NotIn,
    Is,
    IsNot,
}

/// The safe expression AST (spec §4.2, §9 "Expression sandbox"). Every
/// variant here corresponds to one whitelisted construct; there is no
/// variant for imports, assignments, function/lambda definitions, or any
/// other construct the sandbox forbids — those simply cannot be
/// constructed by the parser (spec AMBIENT "Parser Strategy": rejected at
/// parse time, before any evaluation is attempted).
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    /// A whitelisted top-level name: `body`, `headers`, `context`, or a
    /// name bound by an enclosing comprehension.
    Ident(String),
    /// `value.attr` — `attr` must be one of the whitelisted attribute
    /// names (spec §4.2); enforced at parse time.
    Attribute(Box<Expr>, String),
    /// `value[index]`.
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// `then_branch if cond else else_branch`.
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `name(args)` or `value.method(args)` — `name`/`method` must be
    /// whitelisted (spec §4.2); enforced at parse time.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// `[elt for target in iter if cond?]` — a single-generator
    /// comprehension, matching the scope of spec §4.2's "list/generator
    /// comprehensions".
    Comprehension {
        element: Box<Expr>,
        target: String,
        iter: Box<Expr>,
        condition: Option<Box<Expr>>,
    },
}
