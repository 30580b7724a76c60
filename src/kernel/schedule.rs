//! Pass planning: which statements run in which kernel.
//!
//! Consecutive elementwise statements of one shape share a kernel. Every
//! inner product that is not yet materialized gets a reduction kernel ahead
//! of its first consumer; identical inner products are reduced once, until
//! one of their operands is written again.

use std::collections::HashMap;
use std::fmt;

use crate::config::GeneratorConfig;
use crate::lower::LoweredStatement;
use crate::symbolic::traverse::walk;
use crate::symbolic::{
    count_type, ArgKind, BindingMaps, Handle, InnerProductNode, Node, NodeKind, Result,
    SharedInfoRegistry, ValueCategory,
};

/// Loop structure of one kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    Vector,
    Matrix,
    Scalar,
    Reduction,
    MatVec,
    MatMat,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        match self {
            PassKind::Vector => "vector",
            PassKind::Matrix => "matrix",
            PassKind::Scalar => "scalar",
            PassKind::Reduction => "reduction",
            PassKind::MatVec => "matvec",
            PassKind::MatMat => "matmat",
        }
    }

    /// Whether several statements may share a kernel of this kind.
    pub fn is_fusable(self) -> bool {
        matches!(self, PassKind::Vector | PassKind::Matrix | PassKind::Scalar)
    }

    /// Number of NDRange dimensions the kernel iterates over.
    pub fn dimensions(self) -> u32 {
        match self {
            PassKind::Matrix | PassKind::MatMat => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One kernel of the plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pass {
    pub index: usize,
    pub kind: PassKind,
    /// Statements whose bodies run in this kernel, in source order. A
    /// reduction pass lists the statement holding its inner product.
    pub statements: Vec<usize>,
    /// Post-order position of the reduced inner product in its statement.
    pub reduction: Option<usize>,
}

/// Bound statements plus the kernels that evaluate them.
#[derive(Debug)]
pub struct Plan {
    pub statements: Vec<LoweredStatement>,
    pub passes: Vec<Pass>,
    pub registry: SharedInfoRegistry,
    pub maps: BindingMaps,
}

impl Plan {
    /// The inner product a reduction pass materializes.
    pub fn reduced_node(&self, pass: &Pass) -> Option<&Node> {
        let stmt = self.statements.get(*pass.statements.first()?)?;
        let mut found = Vec::new();
        collect_inner_products(&stmt.tree, &mut found);
        found.get(pass.reduction?).copied()
    }

    /// Full repr of every statement, in source order.
    pub fn reprs(&self) -> Result<Vec<String>> {
        self.statements
            .iter()
            .map(|s| s.tree.repr(&self.registry))
            .collect()
    }

    pub fn simplified_reprs(&self) -> Result<Vec<String>> {
        self.statements
            .iter()
            .map(|s| s.tree.simplified_repr(&self.registry))
            .collect()
    }

    /// Whether any buffer of the plan holds doubles.
    pub fn uses_double(&self) -> bool {
        self.registry.iter().any(|info| info.scalartype().needs_double())
    }
}

/// Bind `statements` and split them into kernels.
pub fn schedule(mut statements: Vec<LoweredStatement>, config: &GeneratorConfig) -> Result<Plan> {
    config.check_local_size()?;
    let mut registry = SharedInfoRegistry::new();
    let mut maps = BindingMaps::new();
    let mut passes: Vec<Pass> = Vec::new();
    // repr of a reduced inner product -> (its pass, buffers it reads)
    let mut reduced: HashMap<String, (usize, Vec<Handle>)> = HashMap::new();
    let mut open: Option<usize> = None;

    for (si, stmt) in statements.iter_mut().enumerate() {
        let mut ordinal = 0;
        for_each_inner_product_mut(&mut stmt.tree, &mut |ip| {
            let candidate = passes.len();
            maps.set_pass(candidate);
            ip.bind(&mut registry, &mut maps)?;
            let key = ip.tree().repr(&registry)?;
            let pass = match reduced.get(&key) {
                Some(&(existing, _)) => {
                    tracing::debug!(statement = si, pass = existing, "reusing reduction");
                    existing
                }
                None => {
                    passes.push(Pass {
                        index: candidate,
                        kind: PassKind::Reduction,
                        statements: vec![si],
                        reduction: Some(ordinal),
                    });
                    let mut reads = Vec::new();
                    walk(ip.tree().lhs(), &mut |n| reads.extend(n.handle()));
                    walk(ip.tree().rhs(), &mut |n| reads.extend(n.handle()));
                    reduced.insert(key, (candidate, reads));
                    tracing::debug!(statement = si, pass = candidate, "scheduled reduction");
                    candidate
                }
            };
            ip.set_computed(pass);
            ordinal += 1;
            Ok(())
        })?;

        let kind = statement_kind(&stmt.tree);
        let pass = match open {
            Some(p) if p + 1 == passes.len() && passes[p].kind == kind => p,
            _ => {
                let index = passes.len();
                passes.push(Pass {
                    index,
                    kind,
                    statements: Vec::new(),
                    reduction: None,
                });
                tracing::debug!(statement = si, pass = index, kind = kind.name(), "opened pass");
                index
            }
        };
        open = kind.is_fusable().then_some(pass);
        passes[pass].statements.push(si);

        maps.set_pass(pass);
        stmt.tree.bind(&mut registry, &mut maps)?;

        if let Some(written) = stmt.tree.as_binary().and_then(|b| b.lhs().handle()) {
            reduced.retain(|_, (_, reads)| !reads.contains(&written));
        }
    }

    let mut plan = Plan {
        statements,
        passes,
        registry,
        maps,
    };
    apply_alignment(&mut plan, config)?;
    Ok(plan)
}

fn statement_kind(tree: &Node) -> PassKind {
    if count_type(tree, NodeKind::MatVecProd) > 0 {
        return PassKind::MatVec;
    }
    if count_type(tree, NodeKind::MatMatProd) > 0 {
        return PassKind::MatMat;
    }
    match tree.category() {
        ValueCategory::Vector => PassKind::Vector,
        ValueCategory::Matrix => PassKind::Matrix,
        ValueCategory::Scalar => PassKind::Scalar,
    }
}

/// Widen vector buffers to the configured alignment when every kernel is a
/// plain elementwise vector loop over contiguous buffers.
fn apply_alignment(plan: &mut Plan, config: &GeneratorConfig) -> Result<()> {
    let width = config.alignment.get();
    if width == 1 {
        return Ok(());
    }

    let mut contiguous = true;
    for stmt in &plan.statements {
        walk(&stmt.tree, &mut |node| {
            if let Some(ArgKind::Vector(view)) = node.as_argument().map(|a| a.kind()) {
                contiguous &= view.is_contiguous();
            }
        });
    }
    let elementwise = plan.passes.iter().all(|p| p.kind == PassKind::Vector);
    if !(contiguous && elementwise) {
        tracing::warn!(
            alignment = width,
            "alignment only applies to elementwise programs over contiguous vectors, using 1"
        );
        return Ok(());
    }

    for stmt in &plan.statements {
        let mut leaves = Vec::new();
        walk(&stmt.tree, &mut |node| {
            if let Some(arg) = node.as_argument() {
                if matches!(arg.kind(), ArgKind::Vector(_)) {
                    leaves.push(arg);
                }
            }
        });
        for leaf in leaves {
            leaf.set_alignment(&mut plan.registry, width)?;
        }
    }
    Ok(())
}

/// Every inner product under `node` in post-order, materialized or not.
pub(crate) fn collect_inner_products<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    match node {
        Node::Argument(_) => {}
        Node::Unary(u) => collect_inner_products(u.sub(), out),
        _ => {
            if let Some(b) = node.as_binary() {
                collect_inner_products(b.lhs(), out);
                collect_inner_products(b.rhs(), out);
            }
            if matches!(node, Node::InnerProduct(_)) {
                out.push(node);
            }
        }
    }
}

fn for_each_inner_product_mut(
    node: &mut Node,
    visit: &mut impl FnMut(&mut InnerProductNode) -> Result<()>,
) -> Result<()> {
    for child in node.children_mut() {
        for_each_inner_product_mut(child, visit)?;
    }
    if let Some(ip) = node.as_inner_product_mut() {
        visit(ip)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::{BinaryOp, Handle, KernelArgument, MatrixLayout, ScalarType, VectorView};
    use crate::syntax::span::Span;

    fn vec_leaf(h: u64) -> Node {
        Node::argument(KernelArgument::vector(Handle::Buffer(h), ScalarType::Float))
    }

    fn scal_leaf(h: u64) -> Node {
        Node::argument(KernelArgument::device_scalar(Handle::Buffer(h), ScalarType::Float))
    }

    fn stmt(tree: Node) -> LoweredStatement {
        LoweredStatement {
            tree,
            span: Span::default(),
        }
    }

    fn assign(lhs: Node, rhs: Node) -> LoweredStatement {
        stmt(Node::binary(lhs, BinaryOp::Assign, rhs).unwrap())
    }

    fn kinds(plan: &Plan) -> Vec<PassKind> {
        plan.passes.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_elementwise_statements_fuse() {
        let statements = vec![
            assign(vec_leaf(1), Node::binary(vec_leaf(2), BinaryOp::Add, vec_leaf(3)).unwrap()),
            assign(vec_leaf(2), vec_leaf(3)),
        ];
        let plan = schedule(statements, &GeneratorConfig::default()).unwrap();
        assert_eq!(kinds(&plan), vec![PassKind::Vector]);
        assert_eq!(plan.passes[0].statements, vec![0, 1]);
        assert_eq!(plan.registry.len(), 3);
    }

    #[test]
    fn test_category_change_opens_pass() {
        let statements = vec![
            assign(vec_leaf(1), vec_leaf(2)),
            assign(scal_leaf(3), scal_leaf(4)),
            assign(vec_leaf(2), vec_leaf(1)),
        ];
        let plan = schedule(statements, &GeneratorConfig::default()).unwrap();
        assert_eq!(
            kinds(&plan),
            vec![PassKind::Vector, PassKind::Scalar, PassKind::Vector]
        );
    }

    #[test]
    fn test_reduction_precedes_consumer() {
        let dot = Node::inner_prod(vec_leaf(1), vec_leaf(2)).unwrap();
        let statements = vec![assign(
            vec_leaf(1),
            Node::binary(dot, BinaryOp::Mul, vec_leaf(2)).unwrap(),
        )];
        let plan = schedule(statements, &GeneratorConfig::default()).unwrap();
        assert_eq!(kinds(&plan), vec![PassKind::Reduction, PassKind::Vector]);

        let reduced = plan.reduced_node(&plan.passes[0]).unwrap();
        let ip = reduced.as_inner_product().unwrap();
        assert_eq!(ip.computed_pass(), Some(0));
        // The consumer reads the temporary, not the elementwise product.
        let body = plan.statements[0].tree.generate(&plan.registry, 1).unwrap();
        assert_eq!(body, "(arg0[i] = (arg2[0] * arg1[i]))");
    }

    #[test]
    fn test_identical_inner_products_reduce_once() {
        let dot = || Node::inner_prod(vec_leaf(1), vec_leaf(2)).unwrap();
        let statements = vec![
            assign(scal_leaf(5), dot()),
            assign(scal_leaf(6), dot()),
        ];
        let plan = schedule(statements, &GeneratorConfig::default()).unwrap();
        assert_eq!(kinds(&plan), vec![PassKind::Reduction, PassKind::Scalar]);
        assert_eq!(plan.passes[1].statements, vec![0, 1]);
        assert_eq!(plan.maps.temporary_count(), 1);
    }

    #[test]
    fn test_reduction_recomputed_after_operand_write() {
        let dot = || Node::inner_prod(vec_leaf(1), vec_leaf(2)).unwrap();
        let statements = vec![
            assign(scal_leaf(5), dot()),
            assign(vec_leaf(1), vec_leaf(2)),
            assign(scal_leaf(6), dot()),
        ];
        let plan = schedule(statements, &GeneratorConfig::default()).unwrap();
        assert_eq!(
            kinds(&plan),
            vec![
                PassKind::Reduction,
                PassKind::Scalar,
                PassKind::Vector,
                PassKind::Reduction,
                PassKind::Scalar,
            ]
        );
        // Both reductions share one temporary buffer.
        assert_eq!(plan.maps.temporary_count(), 1);
    }

    #[test]
    fn test_products_get_own_pass() {
        let a = || {
            Node::argument(KernelArgument::matrix(
                Handle::Buffer(1),
                ScalarType::Float,
                MatrixLayout::default(),
            ))
        };
        let statements = vec![
            assign(vec_leaf(2), Node::mat_vec(a(), vec_leaf(3)).unwrap()),
            assign(vec_leaf(3), Node::mat_vec(a(), vec_leaf(2)).unwrap()),
        ];
        let plan = schedule(statements, &GeneratorConfig::default()).unwrap();
        assert_eq!(kinds(&plan), vec![PassKind::MatVec, PassKind::MatVec]);
    }

    #[test]
    fn test_alignment_applies_to_contiguous_vectors() {
        let mut config = GeneratorConfig::default();
        config.alignment = crate::symbolic::Alignment::new(4).unwrap();
        let plan = schedule(vec![assign(vec_leaf(1), vec_leaf(2))], &config).unwrap();
        assert!(plan.registry.iter().all(|info| info.alignment().get() == 4));
    }

    #[test]
    fn test_alignment_skipped_for_views() {
        let mut config = GeneratorConfig::default();
        config.alignment = crate::symbolic::Alignment::new(4).unwrap();
        let view = Node::argument(KernelArgument::vector_view(
            Handle::Buffer(2),
            ScalarType::Float,
            VectorView::new(1, 2),
        ));
        let plan = schedule(vec![assign(vec_leaf(1), view)], &config).unwrap();
        assert!(plan.registry.iter().all(|info| info.alignment().get() == 1));
    }
}
