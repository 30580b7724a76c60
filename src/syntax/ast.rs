use crate::syntax::span::Spanned;

/// A parsed `.sym` file: declarations and statements in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub items: Vec<Item>,
}

impl File {
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter().filter_map(|item| match item {
            Item::Declaration(d) => Some(d),
            Item::Statement(_) => None,
        })
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.items.iter().filter_map(|item| match item {
            Item::Statement(s) => Some(s),
            Item::Declaration(_) => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Declaration(Declaration),
    Statement(Statement),
}

/// `vector<float> x, y;`
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub ty: Spanned<TypeExpr>,
    pub names: Vec<Spanned<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Vector,
    Matrix,
    Scalar,
    Host,
}

impl DeclKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            DeclKind::Vector => "vector",
            DeclKind::Matrix => "matrix",
            DeclKind::Scalar => "scalar",
            DeclKind::Host => "host",
        }
    }
}

/// `matrix<double, col, trans>`: the kind keyword plus its type arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    pub kind: DeclKind,
    pub args: Vec<Spanned<TypeArg>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeArg {
    /// Element type or layout flag: `float`, `row`, `trans`.
    Flag(String),
    /// Keyed integer parameter: `stride=2`.
    Param(String, u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
}

/// `target op value;`
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub target: Spanned<String>,
    pub op: Spanned<AssignOp>,
    pub value: Spanned<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Var(String),
    Neg(Box<Spanned<Expr>>),
    BinOp {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Call {
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    /// Placeholder left behind by a parse error.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    ElemMul,
    ElemDiv,
}

impl BinOp {
    /// (left, right) binding power; higher binds tighter.
    pub fn binding_power(&self) -> (u8, u8) {
        match self {
            BinOp::Add | BinOp::Sub => (2, 3),
            BinOp::Mul | BinOp::Div | BinOp::ElemMul | BinOp::ElemDiv => (4, 5),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::ElemMul => ".*",
            BinOp::ElemDiv => "./",
        }
    }
}

/// Binding power of prefix `-`.
pub const PREFIX_NEG_BP: u8 = 6;
