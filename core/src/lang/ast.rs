use std::rc::Rc;

pub type Body = Vec<Expr>;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Body,
    /// Locals assigned at the top level, so that a following program run in
    /// the same context can be parsed with the same variable/method split.
    pub top_level_locals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// 1-indexed source line
    pub line: usize,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinOp {
    pub fn method_name(self) -> &'static str {
        use BinOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Text(String),
    Interp(Body),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nil,
    True,
    False,
    SelfRef,
    Int(i64),
    Float(f64),
    Str(Vec<StrPart>),
    Symbol(String),
    Array(Vec<Expr>),
    Const(String),
    /// A name the parser knows to be a local variable.
    Var(String),
    Assign(String, Box<Expr>),
    OpAssign(String, BinOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Call),
    Yield(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then_body: Body,
        else_body: Option<Body>,
    },
    While {
        cond: Box<Expr>,
        body: Body,
        /// `until` loops run while the condition is falsy
        negate: bool,
    },
    Begin(Body),
    Def(Rc<MethodDef>),
    Return(Option<Box<Expr>>),
    Break(Option<Box<Expr>>),
    Next(Option<Box<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub args: Vec<Expr>,
    pub block: Option<Rc<BlockDef>>,
    /// Bare identifier with no receiver, arguments or parens; may name a local
    /// defined by an earlier program in the same context.
    pub bare: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Body,
    pub line: usize,
}

impl MethodDef {
    pub fn required_arity(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDef {
    pub params: Vec<String>,
    pub body: Body,
}

impl Expr {
    pub fn new(line: usize, kind: ExprKind) -> Self {
        Self { line, kind }
    }
}
