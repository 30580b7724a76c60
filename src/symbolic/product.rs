//! Hybrid product nodes.
//!
//! Matrix products accumulate into per-entry registers named after the
//! product's repr. The inner product is scalar-valued and, once a
//! reduction pass has materialized it, stands in for its own temporary.

use super::arg::KernelArgument;
use super::error::{Result, SymbolicError};
use super::info::{BindingMaps, SharedInfoRegistry};
use super::node::{BinaryNode, Node, ValueCategory};
use super::op::BinaryOp;

/// Matrix × matrix or matrix × vector product.
#[derive(Clone, Debug)]
pub struct ProductNode {
    tree: BinaryNode,
}

impl ProductNode {
    pub(crate) fn new(category: ValueCategory, lhs: Node, rhs: Node) -> Self {
        Self {
            tree: BinaryNode::new(category, BinaryOp::Prod, lhs, rhs),
        }
    }

    pub fn tree(&self) -> &BinaryNode {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut BinaryNode {
        &mut self.tree
    }

    /// Name of the accumulator register for output entry `(m, n)`.
    pub fn val_name(&self, reg: &SharedInfoRegistry, m: usize, n: usize) -> Result<String> {
        Ok(format!("{}_val_{}_{}", self.tree.repr(reg)?, m, n))
    }

    /// One accumulation step: `res = res + lhs * rhs;`.
    pub fn update_val(&self, res: &str, lhs: &str, rhs: &str) -> String {
        let step = format!("{} * {}", lhs, rhs);
        format!("{} = {};", res, self.tree.op().generate(res, &step))
    }

    /// Inside the product loop the node stands for its first accumulator.
    pub fn generate(&self, reg: &SharedInfoRegistry, _pass: usize) -> Result<String> {
        self.val_name(reg, 0, 0)
    }
}

/// Inner product of two vectors.
#[derive(Clone, Debug)]
pub struct InnerProductNode {
    tree: BinaryNode,
    reduce: BinaryOp,
    computed: Option<usize>,
    temporary: Option<KernelArgument>,
}

impl InnerProductNode {
    pub(crate) fn new(lhs: Node, rhs: Node, reduce: BinaryOp) -> Self {
        Self {
            tree: BinaryNode::new(ValueCategory::Scalar, BinaryOp::Mul, lhs, rhs),
            reduce,
            computed: None,
            temporary: None,
        }
    }

    pub fn tree(&self) -> &BinaryNode {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut BinaryNode {
        &mut self.tree
    }

    /// Operator combining partial results in the reduction.
    pub fn reduce_op(&self) -> BinaryOp {
        self.reduce
    }

    /// Mark the product as materialized by the reduction in kernel `pass`.
    pub fn set_computed(&mut self, pass: usize) {
        self.computed = Some(pass);
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    pub fn computed_pass(&self) -> Option<usize> {
        self.computed
    }

    /// The device-scalar temporary, once bound.
    pub fn temporary(&self) -> Option<&KernelArgument> {
        self.temporary.as_ref()
    }

    /// The temporary, but only once it holds the reduced value.
    pub fn as_argument(&self) -> Option<&KernelArgument> {
        if self.is_computed() {
            self.temporary.as_ref()
        } else {
            None
        }
    }

    pub fn arguments_string(&self, reg: &SharedInfoRegistry) -> Result<String> {
        self.temporary
            .as_ref()
            .ok_or(SymbolicError::Unbound)?
            .arguments_string(reg)
    }

    /// Reference to the temporary once computed, the elementwise product
    /// otherwise.
    pub fn generate(&self, reg: &SharedInfoRegistry, pass: usize) -> Result<String> {
        match (&self.temporary, self.computed) {
            (Some(temp), Some(_)) => Ok(temp.access_name(reg, pass)?.to_string()),
            (None, Some(_)) => Err(SymbolicError::Unbound),
            (_, None) => self.tree.generate(reg, pass),
        }
    }

    /// Bind both operands, then the temporary. Identical inner products
    /// share one temporary since its handle is keyed by repr.
    pub fn bind(&mut self, reg: &mut SharedInfoRegistry, maps: &mut BindingMaps) -> Result<()> {
        self.tree.bind(reg, maps)?;
        let key = self.tree.repr(reg)?;
        let handle = maps.temporary_for(&key);
        let scalar = self.tree.lhs().scalar_type();
        let temp = self
            .temporary
            .get_or_insert_with(|| KernelArgument::device_scalar(handle, scalar));
        temp.bind(reg, maps)
    }
}
