//! Expression-tree nodes.
//!
//! A tree is built bottom-up from leaves, bound once, and then asked for
//! code (`generate`) and identities (`repr`, `simplified_repr`). Every
//! composite owns its operands exclusively; there is no sharing and no
//! cycles, so `Box` is the whole ownership story.

use std::fmt;

use super::arg::{Handle, KernelArgument};
use super::error::{Result, SymbolicError};
use super::info::{BindingMaps, SharedInfoRegistry};
use super::op::{BinaryOp, UnaryOp};
use super::product::{InnerProductNode, ProductNode};
use super::scalar::ScalarType;

/// What kind of value an expression produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    Scalar,
    Vector,
    Matrix,
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueCategory::Scalar => "scalar",
            ValueCategory::Vector => "vector",
            ValueCategory::Matrix => "matrix",
        })
    }
}

/// Which roles a node plays. The inner product is the one node that is
/// both an expression and a kernel argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub expression: bool,
    pub argument: bool,
}

/// Composite node with two operands.
#[derive(Clone, Debug)]
pub struct BinaryNode {
    category: ValueCategory,
    op: BinaryOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
}

impl BinaryNode {
    pub(crate) fn new(category: ValueCategory, op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Self {
            category,
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn lhs(&self) -> &Node {
        &self.lhs
    }

    pub fn rhs(&self) -> &Node {
        &self.rhs
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }

    pub fn category(&self) -> ValueCategory {
        self.category
    }

    pub fn generate(&self, reg: &SharedInfoRegistry, pass: usize) -> Result<String> {
        let lhs = self.lhs.generate(reg, pass)?;
        let rhs = self.rhs.generate(reg, pass)?;
        Ok(format!("({})", self.op.generate(&lhs, &rhs)))
    }

    pub fn repr(&self, reg: &SharedInfoRegistry) -> Result<String> {
        Ok(format!(
            "p_{}{}{}_p",
            self.lhs.repr(reg)?,
            self.op.name(),
            self.rhs.repr(reg)?
        ))
    }

    /// Plain tree rule: both operands reduced, operator kept.
    pub fn tree_simplified_repr(&self, reg: &SharedInfoRegistry) -> Result<String> {
        Ok(format!(
            "p_{}{}{}_p",
            self.lhs.simplified_repr(reg)?,
            self.op.name(),
            self.rhs.simplified_repr(reg)?
        ))
    }

    /// Arithmetic rule: assignments keep the tree rule, everything else
    /// collapses to the full repr of the left operand.
    pub fn arithmetic_simplified_repr(&self, reg: &SharedInfoRegistry) -> Result<String> {
        if self.op.is_assignment() {
            self.tree_simplified_repr(reg)
        } else {
            self.lhs.repr(reg)
        }
    }

    pub fn bind(&mut self, reg: &mut SharedInfoRegistry, maps: &mut BindingMaps) -> Result<()> {
        self.lhs.bind(reg, maps)?;
        self.rhs.bind(reg, maps)
    }
}

/// Composite node with one operand.
#[derive(Clone, Debug)]
pub struct UnaryNode {
    category: ValueCategory,
    op: UnaryOp,
    sub: Box<Node>,
}

impl UnaryNode {
    pub fn sub(&self) -> &Node {
        &self.sub
    }

    pub fn op(&self) -> UnaryOp {
        self.op
    }

    pub fn category(&self) -> ValueCategory {
        self.category
    }
}

/// An expression-tree node.
#[derive(Clone, Debug)]
pub enum Node {
    Binary(BinaryNode),
    Unary(UnaryNode),
    Argument(KernelArgument),
    MatMatProd(ProductNode),
    MatVecProd(ProductNode),
    InnerProduct(InnerProductNode),
}

impl From<KernelArgument> for Node {
    fn from(arg: KernelArgument) -> Self {
        Node::Argument(arg)
    }
}

fn mismatch(op: &str, lhs: &Node, rhs: &Node) -> SymbolicError {
    SymbolicError::TypeMismatch {
        op: op.to_string(),
        lhs: format!("{} {}", lhs.scalar_type(), lhs.category()),
        rhs: format!("{} {}", rhs.scalar_type(), rhs.category()),
    }
}

impl Node {
    pub fn argument(arg: KernelArgument) -> Self {
        Node::Argument(arg)
    }

    /// Build a binary arithmetic or assignment node, checking operand
    /// categories. Matrix products go through [`Node::mat_mat`] and
    /// [`Node::mat_vec`].
    pub fn binary(lhs: Node, op: BinaryOp, rhs: Node) -> Result<Node> {
        use ValueCategory::*;

        if lhs.scalar_type() != rhs.scalar_type() {
            return Err(mismatch(op.as_str(), &lhs, &rhs));
        }
        let (l, r) = (lhs.category(), rhs.category());
        let category = match op {
            BinaryOp::Assign | BinaryOp::InplaceAdd | BinaryOp::InplaceSub => {
                let writeable = matches!(&lhs, Node::Argument(arg) if arg.kind().is_writeable());
                if !writeable || l != r {
                    return Err(mismatch(op.as_str(), &lhs, &rhs));
                }
                l
            }
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::ElementProd
            | BinaryOp::ElementDiv
            | BinaryOp::Pow
            | BinaryOp::Max
            | BinaryOp::Min => {
                if l != r {
                    return Err(mismatch(op.as_str(), &lhs, &rhs));
                }
                if matches!(op, BinaryOp::Pow | BinaryOp::Max | BinaryOp::Min)
                    && !lhs.scalar_type().is_float()
                {
                    return Err(mismatch(op.as_str(), &lhs, &rhs));
                }
                l
            }
            BinaryOp::Mul => match (l, r) {
                (Scalar, other) | (other, Scalar) => other,
                _ => return Err(mismatch(op.as_str(), &lhs, &rhs)),
            },
            BinaryOp::Div => match r {
                Scalar => l,
                _ => return Err(mismatch(op.as_str(), &lhs, &rhs)),
            },
            BinaryOp::Prod => return Err(mismatch(op.as_str(), &lhs, &rhs)),
        };
        Ok(Node::Binary(BinaryNode::new(category, op, lhs, rhs)))
    }

    pub fn unary(op: UnaryOp, sub: Node) -> Result<Node> {
        if op.requires_float() && !sub.scalar_type().is_float() {
            return Err(SymbolicError::TypeMismatch {
                op: op.name().to_string(),
                lhs: format!("{} {}", sub.scalar_type(), sub.category()),
                rhs: "nothing".to_string(),
            });
        }
        Ok(Node::Unary(UnaryNode {
            category: sub.category(),
            op,
            sub: Box::new(sub),
        }))
    }

    /// Matrix × matrix product.
    pub fn mat_mat(lhs: Node, rhs: Node) -> Result<Node> {
        if lhs.category() != ValueCategory::Matrix
            || rhs.category() != ValueCategory::Matrix
            || lhs.scalar_type() != rhs.scalar_type()
        {
            return Err(mismatch("prod", &lhs, &rhs));
        }
        Ok(Node::MatMatProd(ProductNode::new(ValueCategory::Matrix, lhs, rhs)))
    }

    /// Matrix × vector product.
    pub fn mat_vec(lhs: Node, rhs: Node) -> Result<Node> {
        if lhs.category() != ValueCategory::Matrix
            || rhs.category() != ValueCategory::Vector
            || lhs.scalar_type() != rhs.scalar_type()
        {
            return Err(mismatch("prod", &lhs, &rhs));
        }
        Ok(Node::MatVecProd(ProductNode::new(ValueCategory::Vector, lhs, rhs)))
    }

    /// Inner product of two vectors, reduced with addition.
    pub fn inner_prod(lhs: Node, rhs: Node) -> Result<Node> {
        if lhs.category() != ValueCategory::Vector
            || rhs.category() != ValueCategory::Vector
            || lhs.scalar_type() != rhs.scalar_type()
        {
            return Err(mismatch("dot", &lhs, &rhs));
        }
        Ok(Node::InnerProduct(InnerProductNode::new(lhs, rhs, BinaryOp::Add)))
    }

    pub fn category(&self) -> ValueCategory {
        match self {
            Node::Binary(b) => b.category(),
            Node::Unary(u) => u.category(),
            Node::Argument(arg) => arg.category(),
            Node::MatMatProd(p) | Node::MatVecProd(p) => p.tree().category(),
            Node::InnerProduct(_) => ValueCategory::Scalar,
        }
    }

    /// Element type, taken from the leftmost leaf.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Node::Binary(b) => b.lhs().scalar_type(),
            Node::Unary(u) => u.sub().scalar_type(),
            Node::Argument(arg) => arg.scalar_type(),
            Node::MatMatProd(p) | Node::MatVecProd(p) => p.tree().lhs().scalar_type(),
            Node::InnerProduct(ip) => ip.tree().lhs().scalar_type(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Node::Argument(_) => Capabilities {
                expression: false,
                argument: true,
            },
            Node::InnerProduct(_) => Capabilities {
                expression: true,
                argument: true,
            },
            _ => Capabilities {
                expression: true,
                argument: false,
            },
        }
    }

    pub fn as_argument(&self) -> Option<&KernelArgument> {
        match self {
            Node::Argument(arg) => Some(arg),
            Node::InnerProduct(ip) => ip.as_argument(),
            _ => None,
        }
    }

    pub fn as_inner_product(&self) -> Option<&InnerProductNode> {
        match self {
            Node::InnerProduct(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn as_inner_product_mut(&mut self) -> Option<&mut InnerProductNode> {
        match self {
            Node::InnerProduct(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn as_product(&self) -> Option<&ProductNode> {
        match self {
            Node::MatMatProd(p) | Node::MatVecProd(p) => Some(p),
            _ => None,
        }
    }

    /// The binary view of any two-operand node.
    pub fn as_binary(&self) -> Option<&BinaryNode> {
        match self {
            Node::Binary(b) => Some(b),
            Node::MatMatProd(p) | Node::MatVecProd(p) => Some(p.tree()),
            Node::InnerProduct(ip) => Some(ip.tree()),
            _ => None,
        }
    }

    /// Handle identifying the node as a kernel argument: the buffer of a
    /// leaf, or the temporary of a bound inner product.
    pub fn handle(&self) -> Option<Handle> {
        self.as_argument().map(KernelArgument::handle)
    }

    /// Mutable access to every direct operand, for passes that rewrite
    /// state below the root.
    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Node::Binary(b) => vec![&mut *b.lhs, &mut *b.rhs],
            Node::MatMatProd(p) | Node::MatVecProd(p) => {
                let tree = p.tree_mut();
                vec![&mut *tree.lhs, &mut *tree.rhs]
            }
            Node::InnerProduct(ip) => {
                let tree = ip.tree_mut();
                vec![&mut *tree.lhs, &mut *tree.rhs]
            }
            Node::Unary(u) => vec![&mut *u.sub],
            Node::Argument(_) => Vec::new(),
        }
    }

    /// Inline code for this node in kernel `pass`.
    pub fn generate(&self, reg: &SharedInfoRegistry, pass: usize) -> Result<String> {
        match self {
            Node::Binary(b) => b.generate(reg, pass),
            Node::Unary(u) => {
                let sub = u.sub.generate(reg, pass)?;
                Ok(format!("({})", u.op.generate(&sub)))
            }
            Node::Argument(arg) => Ok(arg.access_name(reg, pass)?.to_string()),
            Node::MatMatProd(p) | Node::MatVecProd(p) => p.generate(reg, pass),
            Node::InnerProduct(ip) => ip.generate(reg, pass),
        }
    }

    /// Canonical identity: equal for trees of the same shape over the same
    /// bound arguments.
    pub fn repr(&self, reg: &SharedInfoRegistry) -> Result<String> {
        match self {
            Node::Binary(b) => b.repr(reg),
            Node::Unary(u) => Ok(format!("p_{}{}_p", u.op.name(), u.sub.repr(reg)?)),
            Node::Argument(arg) => arg.repr(reg),
            Node::MatMatProd(p) | Node::MatVecProd(p) => p.tree().repr(reg),
            Node::InnerProduct(ip) => ip.tree().repr(reg),
        }
    }

    pub fn simplified_repr(&self, reg: &SharedInfoRegistry) -> Result<String> {
        match self {
            Node::Binary(b) => b.arithmetic_simplified_repr(reg),
            Node::Unary(u) => Ok(format!(
                "p_{}{}_p",
                u.op.name(),
                u.sub.simplified_repr(reg)?
            )),
            Node::Argument(arg) => arg.repr(reg),
            Node::MatMatProd(p) | Node::MatVecProd(p) => p.tree().tree_simplified_repr(reg),
            Node::InnerProduct(ip) => ip.tree().arithmetic_simplified_repr(reg),
        }
    }

    /// Bind every leaf below this node (operands first), then the node
    /// itself if it is a kernel argument.
    pub fn bind(&mut self, reg: &mut SharedInfoRegistry, maps: &mut BindingMaps) -> Result<()> {
        match self {
            Node::Binary(b) => b.bind(reg, maps),
            Node::Unary(u) => u.sub.bind(reg, maps),
            Node::Argument(arg) => arg.bind(reg, maps),
            Node::MatMatProd(p) | Node::MatVecProd(p) => p.tree_mut().bind(reg, maps),
            Node::InnerProduct(ip) => ip.bind(reg, maps),
        }
    }
}
