//! Kind-filtered traversal, the node ordering and ordered node sets.

use std::cmp::Ordering;

use super::node::Node;

/// Node filter for [`extract_as`] and [`count_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Any,
    /// Leaves, and inner products that have been materialized.
    Argument,
    Binary,
    Unary,
    MatMatProd,
    MatVecProd,
    InnerProduct,
}

impl NodeKind {
    pub fn matches(self, node: &Node) -> bool {
        match self {
            NodeKind::Any => true,
            NodeKind::Argument => node.as_argument().is_some(),
            NodeKind::Binary => matches!(node, Node::Binary(_)),
            NodeKind::Unary => matches!(node, Node::Unary(_)),
            NodeKind::MatMatProd => matches!(node, Node::MatMatProd(_)),
            NodeKind::MatVecProd => matches!(node, Node::MatVecProd(_)),
            NodeKind::InnerProduct => matches!(node, Node::InnerProduct(_)),
        }
    }
}

/// Operands a walk descends into. A node that acts as a kernel argument
/// is a leaf for traversal purposes.
fn operands(node: &Node) -> Vec<&Node> {
    if node.as_argument().is_some() {
        return Vec::new();
    }
    match node {
        Node::Unary(u) => vec![u.sub()],
        _ => match node.as_binary() {
            Some(b) => vec![b.lhs(), b.rhs()],
            None => Vec::new(),
        },
    }
}

/// Post-order walk: operands first, then the node itself.
pub fn walk<'a>(node: &'a Node, visit: &mut impl FnMut(&'a Node)) {
    for child in operands(node) {
        walk(child, visit);
    }
    visit(node);
}

/// Collect every node under `root` matching `kind` and `predicate` into an
/// ordered, deduplicated set.
pub fn extract_as<'a>(
    root: &'a Node,
    kind: NodeKind,
    predicate: impl Fn(&Node) -> bool,
) -> NodeSet<'a> {
    let mut set = NodeSet::new();
    walk(root, &mut |node| {
        if kind.matches(node) && predicate(node) {
            set.insert(node);
        }
    });
    set
}

/// Number of nodes under `root` matching `kind`, repeats included.
pub fn count_type(root: &Node, kind: NodeKind) -> usize {
    let mut count = 0;
    walk(root, &mut |node| {
        if kind.matches(node) {
            count += 1;
        }
    });
    count
}

/// Strict ordering over heterogeneous nodes.
///
/// A composite on the left is less than `other` if either operand is; a
/// composite on the right is greater than `first` if `first` is less than
/// either operand; two arguments compare by handle.
pub fn node_less(first: &Node, other: &Node) -> bool {
    let lhs_ops = operands(first);
    if !lhs_ops.is_empty() {
        return lhs_ops.into_iter().any(|op| node_less(op, other));
    }
    let rhs_ops = operands(other);
    if !rhs_ops.is_empty() {
        return rhs_ops.into_iter().any(|op| node_less(first, op));
    }
    match (first.handle(), other.handle()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

/// Ordering derived from [`node_less`]; equivalent nodes compare equal.
pub fn node_cmp(a: &Node, b: &Node) -> Ordering {
    if node_less(a, b) {
        Ordering::Less
    } else if node_less(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Nodes kept sorted by [`node_less`], one per equivalence class.
#[derive(Clone, Debug, Default)]
pub struct NodeSet<'a> {
    nodes: Vec<&'a Node>,
}

impl<'a> NodeSet<'a> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Insert `node` unless an equivalent node is already present.
    pub fn insert(&mut self, node: &'a Node) -> bool {
        let pos = self.nodes.partition_point(|n| node_less(n, node));
        if pos < self.nodes.len() && !node_less(node, self.nodes[pos]) {
            return false;
        }
        self.nodes.insert(pos, node);
        true
    }

    pub fn extend(&mut self, other: NodeSet<'a>) {
        for node in other.nodes {
            self.insert(node);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.nodes.iter().copied()
    }
}

impl<'a> IntoIterator for NodeSet<'a> {
    type Item = &'a Node;
    type IntoIter = std::vec::IntoIter<&'a Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::arg::{Handle, KernelArgument};
    use crate::symbolic::op::{BinaryOp, UnaryOp};
    use crate::symbolic::scalar::ScalarType;

    fn key(h: Handle) -> u64 {
        match h {
            Handle::Buffer(k) => k,
            Handle::Temporary(_) => panic!("expected a buffer handle"),
        }
    }

    fn v(h: u64) -> Node {
        Node::argument(KernelArgument::vector(Handle::Buffer(h), ScalarType::Float))
    }

    fn add(a: Node, b: Node) -> Node {
        Node::binary(a, BinaryOp::Add, b).unwrap()
    }

    #[test]
    fn test_leaf_order_is_total_and_strict() {
        let leaves = [v(3), v(1), v(2)];
        for a in &leaves {
            assert!(!node_less(a, a));
            for b in &leaves {
                if a.handle() != b.handle() {
                    assert!(node_less(a, b) ^ node_less(b, a));
                }
            }
        }
    }

    #[test]
    fn test_composite_compares_through_operands() {
        let sum = add(v(1), v(5));
        assert!(node_less(&sum, &v(3)));
        assert!(!node_less(&add(v(4), v(5)), &v(3)));
        assert!(node_less(&v(2), &add(v(1), v(3))));
    }

    #[test]
    fn test_extract_dedups_and_orders() {
        let tree = add(add(v(3), v(1)), add(v(1), v(3)));
        let set = extract_as(&tree, NodeKind::Argument, |_| true);
        let handles: Vec<u64> = set.iter().filter_map(|n| n.handle()).map(key).collect();
        assert_eq!(handles, vec![1, 3]);
    }

    #[test]
    fn test_extract_with_predicate() {
        let tree = add(v(1), v(2));
        let set = extract_as(&tree, NodeKind::Argument, |n| {
            n.handle().map_or(false, |h| key(h) == 2)
        });
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_count_type() {
        let tree = Node::unary(UnaryOp::Exp, add(add(v(1), v(2)), v(1))).unwrap();
        assert_eq!(count_type(&tree, NodeKind::Argument), 3);
        assert_eq!(count_type(&tree, NodeKind::Binary), 2);
        assert_eq!(count_type(&tree, NodeKind::Unary), 1);
        assert_eq!(count_type(&tree, NodeKind::Any), 6);
        assert_eq!(count_type(&tree, NodeKind::InnerProduct), 0);
    }

    #[test]
    fn test_walk_is_post_order() {
        let tree = add(v(1), v(2));
        let mut seen = Vec::new();
        walk(&tree, &mut |n| seen.push(n.handle().map(key)));
        assert_eq!(seen, vec![Some(1), Some(2), None]);
    }
}
