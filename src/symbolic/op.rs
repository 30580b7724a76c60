//! Operator descriptors.
//!
//! An operator knows three things: the name it contributes to canonical
//! reprs, whether it is an assignment, and how to apply itself to the code
//! fragments of its operands. Parenthesization is the node's job, not the
//! operator's.

/// Binary operators, arithmetic and assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Assign,      // =
    InplaceAdd,  // +=
    InplaceSub,  // -=
    Add,         // +
    Sub,         // -
    Mul,         // *  (at least one scalar operand)
    Div,         // /  (scalar divisor)
    ElementProd, // .*
    ElementDiv,  // ./
    Pow,         // pow(a, b)
    Max,         // max(a, b)
    Min,         // min(a, b)
    Prod,        // accumulation step of a matrix product
}

impl BinaryOp {
    /// Name used inside canonical reprs.
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Assign => "assign",
            BinaryOp::InplaceAdd => "iadd",
            BinaryOp::InplaceSub => "isub",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::ElementProd => "emul",
            BinaryOp::ElementDiv => "ediv",
            BinaryOp::Pow => "pow",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
            BinaryOp::Prod => "prod",
        }
    }

    /// Source-level spelling, for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::InplaceAdd => "+=",
            BinaryOp::InplaceSub => "-=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::ElementProd => ".*",
            BinaryOp::ElementDiv => "./",
            BinaryOp::Pow => "pow",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
            BinaryOp::Prod => "prod",
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            BinaryOp::Assign | BinaryOp::InplaceAdd | BinaryOp::InplaceSub
        )
    }

    /// Apply the operator to two already-generated operand fragments.
    pub fn generate(&self, lhs: &str, rhs: &str) -> String {
        match self {
            BinaryOp::Assign => format!("{} = {}", lhs, rhs),
            BinaryOp::InplaceAdd => format!("{} += {}", lhs, rhs),
            BinaryOp::InplaceSub => format!("{} -= {}", lhs, rhs),
            BinaryOp::Add | BinaryOp::Prod => format!("{} + {}", lhs, rhs),
            BinaryOp::Sub => format!("{} - {}", lhs, rhs),
            BinaryOp::Mul | BinaryOp::ElementProd => format!("{} * {}", lhs, rhs),
            BinaryOp::Div | BinaryOp::ElementDiv => format!("{} / {}", lhs, rhs),
            BinaryOp::Pow => format!("pow({}, {})", lhs, rhs),
            BinaryOp::Max => format!("fmax({}, {})", lhs, rhs),
            BinaryOp::Min => format!("fmin({}, {})", lhs, rhs),
        }
    }
}

/// Unary operators: negation and elementwise math functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Tanh,
    Fabs,
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Fabs => "fabs",
        }
    }

    /// Look up a function-style operator by its source name.
    pub fn from_function(name: &str) -> Option<Self> {
        match name {
            "exp" => Some(UnaryOp::Exp),
            "log" => Some(UnaryOp::Log),
            "sqrt" => Some(UnaryOp::Sqrt),
            "sin" => Some(UnaryOp::Sin),
            "cos" => Some(UnaryOp::Cos),
            "tan" => Some(UnaryOp::Tan),
            "tanh" => Some(UnaryOp::Tanh),
            "fabs" => Some(UnaryOp::Fabs),
            _ => None,
        }
    }

    /// Math functions are only defined for floating-point element types.
    pub fn requires_float(&self) -> bool {
        !matches!(self, UnaryOp::Neg)
    }

    pub fn generate(&self, sub: &str) -> String {
        match self {
            UnaryOp::Neg => format!("-{}", sub),
            _ => format!("{}({})", self.name(), sub),
        }
    }
}
