//! OpenCL source for a scheduled plan.

use crate::config::GeneratorConfig;
use crate::symbolic::arg::vector_size;
use crate::symbolic::traverse::walk;
use crate::symbolic::{
    extract_as, ArgKind, KernelArgument, LocalMemory, MatrixLayout, MatrixParams,
    Node, NodeKind, NodeSet, ProductNode, Result, SymbolicError,
};

use super::schedule::{Pass, PassKind, Plan};

const LOCAL_BUFFER: &str = "buf";
const LOCAL_ID: &str = "lid";
const ACCUMULATOR: &str = "acc";
const INNER_INDEX: &str = "k";

/// Launch-relevant facts about one generated kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelInfo {
    pub name: String,
    pub kind: PassKind,
    /// Parameter declarations in signature order.
    pub arguments: Vec<String>,
    /// NDRange dimensions.
    pub dimensions: u32,
    /// Required work-group size; reductions must run as one work-group of
    /// exactly this size.
    pub local_size: Option<u32>,
}

/// Generated program text plus its kernel table.
#[derive(Clone, Debug)]
pub struct EmittedProgram {
    pub source: String,
    pub kernels: Vec<KernelInfo>,
}

struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn open(&mut self) {
        self.line("{");
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }
}

/// Ordered, deduplicated kernel arguments of `pass`.
///
/// A reduction reads the operands of its inner product and writes the
/// product's temporary; every other pass takes the arguments of its
/// statements.
pub fn pass_arguments<'a>(plan: &'a Plan, pass: &Pass) -> Result<NodeSet<'a>> {
    let mut set = NodeSet::new();
    if pass.kind == PassKind::Reduction {
        let node = plan.reduced_node(pass).ok_or(SymbolicError::Unbound)?;
        let tree = node.as_binary().ok_or(SymbolicError::Unbound)?;
        set.extend(extract_as(tree.lhs(), NodeKind::Argument, |_| true));
        set.extend(extract_as(tree.rhs(), NodeKind::Argument, |_| true));
        set.insert(node);
    } else {
        for &si in &pass.statements {
            let tree = &plan.statements[si].tree;
            set.extend(extract_as(tree, NodeKind::Argument, |_| true));
        }
    }
    Ok(set)
}

/// Render every pass of `plan` as a kernel of program `program`.
pub fn emit_program(
    plan: &Plan,
    program: &str,
    config: &GeneratorConfig,
) -> Result<EmittedProgram> {
    config.check_local_size()?;
    let mut w = SourceWriter::new();
    w.line(&format!("// {}: {} kernel(s)", program, plan.passes.len()));
    if plan.uses_double() {
        w.line("#pragma OPENCL EXTENSION cl_khr_fp64 : enable");
    }

    let mut kernels = Vec::with_capacity(plan.passes.len());
    for pass in &plan.passes {
        let name = format!("{}_k{}", program, pass.index);
        let mut arguments = Vec::new();
        for node in pass_arguments(plan, pass)?.iter() {
            let arg = node.as_argument().ok_or(SymbolicError::Unbound)?;
            arguments.push(arg.arguments_string(&plan.registry)?);
        }

        w.line("");
        w.line(&format!("__kernel void {}({})", name, arguments.join(", ")));
        w.open();
        match pass.kind {
            PassKind::Vector => emit_vector(&mut w, plan, pass)?,
            PassKind::Matrix => emit_matrix(&mut w, plan, pass)?,
            PassKind::Scalar => emit_scalar(&mut w, plan, pass)?,
            PassKind::Reduction => emit_reduction(&mut w, plan, pass, config.local_size)?,
            PassKind::MatVec => emit_mat_vec(&mut w, plan, pass)?,
            PassKind::MatMat => emit_mat_mat(&mut w, plan, pass)?,
        }
        w.close();

        tracing::debug!(kernel = name.as_str(), kind = pass.kind.name(), "emitted kernel");
        kernels.push(KernelInfo {
            name,
            kind: pass.kind,
            arguments,
            dimensions: pass.kind.dimensions(),
            local_size: (pass.kind == PassKind::Reduction).then_some(config.local_size),
        });
    }

    Ok(EmittedProgram {
        source: w.out,
        kernels,
    })
}

// ─── Helpers ───────────────────────────────────────────────────────

/// The assigned leaf of statement `si`.
fn target(plan: &Plan, si: usize) -> Result<&KernelArgument> {
    plan.statements[si]
        .tree
        .as_binary()
        .filter(|b| b.op().is_assignment())
        .and_then(|b| b.lhs().as_argument())
        .ok_or(SymbolicError::Unbound)
}

fn first_statement(pass: &Pass) -> Result<usize> {
    pass.statements.first().copied().ok_or(SymbolicError::Unbound)
}

fn statements(w: &mut SourceWriter, plan: &Plan, pass: &Pass) -> Result<()> {
    for &si in &pass.statements {
        let body = plan.statements[si].tree.generate(&plan.registry, pass.index)?;
        w.line(&format!("{};", body));
    }
    Ok(())
}

fn matrix_layout(arg: &KernelArgument) -> Result<MatrixLayout> {
    match arg.kind() {
        ArgKind::Matrix(layout) => Ok(layout),
        _ => Err(SymbolicError::TypeMismatch {
            op: "matrix loop".to_string(),
            lhs: arg.category().to_string(),
            rhs: "matrix".to_string(),
        }),
    }
}

fn product(plan: &Plan, si: usize) -> Result<&ProductNode> {
    let mut found = None;
    walk(&plan.statements[si].tree, &mut |node| {
        if found.is_none() {
            found = node.as_product();
        }
    });
    found.ok_or(SymbolicError::Unbound)
}

fn grid_loop(dim: u32, index: &str, bound: &str) -> String {
    format!(
        "for (unsigned int {i} = get_global_id({d}); {b}; {i} += get_global_size({d}))",
        i = index,
        d = dim,
        b = bound
    )
}

fn vector_loop(plan: &Plan, target: &KernelArgument) -> Result<String> {
    let size = vector_size(target.name(&plan.registry)?);
    Ok(grid_loop(0, "i", &format!("i < {}", size)))
}

fn matrix_loops(plan: &Plan, target: &KernelArgument) -> Result<(String, String)> {
    let layout = matrix_layout(target)?;
    let params = MatrixParams::new(target.name(&plan.registry)?);
    Ok((
        grid_loop(0, "i", &params.rows_bound(layout, "i")),
        grid_loop(1, "j", &params.cols_bound(layout, "j")),
    ))
}

/// Loop over the shared dimension of a product's left operand.
fn inner_loop(plan: &Plan, lhs: &KernelArgument) -> Result<String> {
    let params = MatrixParams::new(lhs.name(&plan.registry)?);
    let bound = params.cols_bound(matrix_layout(lhs)?, INNER_INDEX);
    Ok(format!(
        "for (unsigned int {k} = 0; {b}; ++{k})",
        k = INNER_INDEX,
        b = bound
    ))
}

fn product_operands(product: &ProductNode) -> Result<(&KernelArgument, &KernelArgument)> {
    let lhs = product.tree().lhs().as_argument();
    let rhs = product.tree().rhs().as_argument();
    lhs.zip(rhs).ok_or(SymbolicError::Unbound)
}

// ─── Kernel bodies ─────────────────────────────────────────────────

fn emit_vector(w: &mut SourceWriter, plan: &Plan, pass: &Pass) -> Result<()> {
    let target = target(plan, first_statement(pass)?)?;
    w.line(&vector_loop(plan, target)?);
    w.open();
    statements(w, plan, pass)?;
    w.close();
    Ok(())
}

fn emit_matrix(w: &mut SourceWriter, plan: &Plan, pass: &Pass) -> Result<()> {
    let target = target(plan, first_statement(pass)?)?;
    let (rows, cols) = matrix_loops(plan, target)?;
    w.line(&rows);
    w.open();
    w.line(&cols);
    w.open();
    statements(w, plan, pass)?;
    w.close();
    w.close();
    Ok(())
}

fn emit_scalar(w: &mut SourceWriter, plan: &Plan, pass: &Pass) -> Result<()> {
    w.line("if (get_global_id(0) == 0)");
    w.open();
    statements(w, plan, pass)?;
    w.close();
    Ok(())
}

fn emit_reduction(
    w: &mut SourceWriter,
    plan: &Plan,
    pass: &Pass,
    local_size: u32,
) -> Result<()> {
    let reg = &plan.registry;
    let node = plan.reduced_node(pass).ok_or(SymbolicError::Unbound)?;
    let ip = node.as_inner_product().ok_or(SymbolicError::Unbound)?;
    let scalar = node.scalar_type();

    let sized = extract_as(ip.tree().lhs(), NodeKind::Argument, |n| {
        matches!(n, Node::Argument(arg) if matches!(arg.kind(), ArgKind::Vector(_)))
    });
    let length = sized
        .iter()
        .next()
        .and_then(Node::as_argument)
        .ok_or(SymbolicError::Unbound)?;
    let temp = ip.temporary().ok_or(SymbolicError::Unbound)?;
    let buffer = LocalMemory::new(LOCAL_BUFFER, local_size, scalar);
    let reduce = ip.reduce_op();

    w.line(&buffer.declare());
    w.line(&format!("unsigned int {} = get_local_id(0);", LOCAL_ID));
    w.line(&format!("{} {} = 0;", scalar, ACCUMULATOR));
    w.line(&vector_loop(plan, length)?);
    w.open();
    let term = ip.tree().generate(reg, pass.index)?;
    w.line(&format!(
        "{} = {};",
        ACCUMULATOR,
        reduce.generate(ACCUMULATOR, &term)
    ));
    w.close();
    w.line(&format!("{} = {};", buffer.access(LOCAL_ID), ACCUMULATOR));
    for line in buffer.reduction(reduce, LOCAL_ID) {
        w.line(&line);
    }
    w.line(&format!("if ({} == 0)", LOCAL_ID));
    w.open();
    w.line(&format!(
        "{} = {};",
        temp.access_name(reg, pass.index)?,
        buffer.access("0")
    ));
    w.close();
    Ok(())
}

fn emit_mat_vec(w: &mut SourceWriter, plan: &Plan, pass: &Pass) -> Result<()> {
    let reg = &plan.registry;
    let si = first_statement(pass)?;
    let target = target(plan, si)?;
    let product = product(plan, si)?;
    let (matrix, vector) = product_operands(product)?;
    let acc = product.val_name(reg, 0, 0)?;
    let scalar = product.tree().lhs().scalar_type();

    w.line(&vector_loop(plan, target)?);
    w.open();
    w.line(&format!("{} {} = 0;", scalar, acc));
    w.line(&inner_loop(plan, matrix)?);
    w.open();
    w.line(&product.update_val(
        &acc,
        &matrix.matrix_element(reg, "i", INNER_INDEX)?,
        &vector.vector_element(reg, INNER_INDEX)?,
    ));
    w.close();
    statements(w, plan, pass)?;
    w.close();
    Ok(())
}

fn emit_mat_mat(w: &mut SourceWriter, plan: &Plan, pass: &Pass) -> Result<()> {
    let reg = &plan.registry;
    let si = first_statement(pass)?;
    let target = target(plan, si)?;
    let product = product(plan, si)?;
    let (lhs, rhs) = product_operands(product)?;
    let acc = product.val_name(reg, 0, 0)?;
    let scalar = product.tree().lhs().scalar_type();
    let (rows, cols) = matrix_loops(plan, target)?;

    w.line(&rows);
    w.open();
    w.line(&cols);
    w.open();
    w.line(&format!("{} {} = 0;", scalar, acc));
    w.line(&inner_loop(plan, lhs)?);
    w.open();
    w.line(&product.update_val(
        &acc,
        &lhs.matrix_element(reg, "i", INNER_INDEX)?,
        &rhs.matrix_element(reg, INNER_INDEX, "j")?,
    ));
    w.close();
    statements(w, plan, pass)?;
    w.close();
    w.close();
    Ok(())
}
