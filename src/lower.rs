//! AST → symbolic expression trees.
//!
//! Every declared name gets one buffer handle; every occurrence of the name
//! becomes a fresh leaf carrying that handle, so repeated references
//! collapse to one kernel parameter when the tree is bound.

use std::collections::HashMap;

use crate::config::GeneratorConfig;
use crate::diagnostic::Diagnostic;
use crate::symbolic::{
    count_type, BinaryOp, Handle, KernelArgument, MatrixLayout, Node, NodeKind, ScalarType,
    UnaryOp, ValueCategory, VectorView,
};
use crate::symbolic::traverse::walk;
use crate::syntax::ast::*;
use crate::syntax::span::{Span, Spanned};

/// One statement ready for scheduling.
#[derive(Clone, Debug)]
pub struct LoweredStatement {
    pub tree: Node,
    pub span: Span,
}

struct Symbol {
    leaf: KernelArgument,
    span: Span,
}

struct Lowerer<'a> {
    config: &'a GeneratorConfig,
    symbols: HashMap<String, Symbol>,
    next_handle: u64,
    diagnostics: Vec<Diagnostic>,
}

/// Lower a parsed file. Declarations must precede their uses.
pub fn lower_file(
    file: &File,
    config: &GeneratorConfig,
) -> Result<Vec<LoweredStatement>, Vec<Diagnostic>> {
    let mut lowerer = Lowerer {
        config,
        symbols: HashMap::new(),
        next_handle: 1,
        diagnostics: Vec::new(),
    };

    let mut statements = Vec::new();
    for item in &file.items {
        match item {
            Item::Declaration(decl) => lowerer.declare(decl),
            Item::Statement(stmt) => {
                if let Some(lowered) = lowerer.statement(stmt) {
                    statements.push(lowered);
                }
            }
        }
    }

    if statements.is_empty() && lowerer.diagnostics.is_empty() {
        lowerer.diagnostics.push(
            Diagnostic::error("no statements to compile".to_string(), Span::default())
                .with_help("add an assignment such as `y = x + y;`".to_string()),
        );
    }

    if lowerer.diagnostics.is_empty() {
        Ok(statements)
    } else {
        Err(lowerer.diagnostics)
    }
}

impl<'a> Lowerer<'a> {
    fn error(&mut self, msg: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(msg, span));
    }

    // ─── Declarations ──────────────────────────────────────────────

    fn declare(&mut self, decl: &Declaration) {
        let Some(template) = self.leaf_type(&decl.ty) else {
            return;
        };
        for name in &decl.names {
            if let Some(previous) = self.symbols.get(&name.node) {
                let note = format!(
                    "'{}' was first declared at bytes {}..{}",
                    name.node, previous.span.start, previous.span.end
                );
                self.diagnostics.push(
                    Diagnostic::error(format!("'{}' is declared twice", name.node), name.span)
                        .with_note(note),
                );
                continue;
            }
            let handle = Handle::Buffer(self.next_handle);
            self.next_handle += 1;
            let leaf = KernelArgument::new(handle, template.scalar_type(), template.kind());
            self.symbols.insert(
                name.node.clone(),
                Symbol {
                    leaf,
                    span: name.span,
                },
            );
        }
    }

    /// Resolve a type expression to a leaf template (with a dummy handle).
    fn leaf_type(&mut self, ty: &Spanned<TypeExpr>) -> Option<KernelArgument> {
        let mut scalar = None;
        let mut row_major = true;
        let mut transposed = false;
        let mut view = VectorView::default();
        let errors_before = self.diagnostics.len();
        let kind = ty.node.kind;

        for arg in &ty.node.args {
            match (&arg.node, kind) {
                (TypeArg::Flag(name), _) if ScalarType::from_name(name).is_some() => {
                    if scalar.is_some() {
                        self.error("element type given twice".to_string(), arg.span);
                    }
                    scalar = ScalarType::from_name(name);
                }
                (TypeArg::Flag(flag), DeclKind::Matrix) => match flag.as_str() {
                    "row" => row_major = true,
                    "col" => row_major = false,
                    "trans" => transposed = true,
                    _ => self.diagnostics.push(
                        Diagnostic::error(format!("unknown matrix flag '{}'", flag), arg.span)
                            .with_help("matrix flags are `row`, `col` and `trans`".to_string()),
                    ),
                },
                (TypeArg::Param(key, value), DeclKind::Vector) => {
                    let Ok(value) = u32::try_from(*value) else {
                        self.error(format!("{} is out of range", key), arg.span);
                        continue;
                    };
                    match key.as_str() {
                        "start" => view.start = value,
                        "stride" if value > 0 => view.stride = value,
                        "stride" => self.error("stride must be positive".to_string(), arg.span),
                        _ => self.diagnostics.push(
                            Diagnostic::error(
                                format!("unknown vector parameter '{}'", key),
                                arg.span,
                            )
                            .with_help("vector parameters are `start` and `stride`".to_string()),
                        ),
                    }
                }
                (TypeArg::Flag(name), _) | (TypeArg::Param(name, _), _) => {
                    self.diagnostics.push(
                        Diagnostic::error(
                            format!("'{}' is not valid for {}", name, kind.keyword()),
                            arg.span,
                        )
                        .with_help("element types are float, double, int and uint".to_string()),
                    );
                }
            }
        }

        if self.diagnostics.len() > errors_before {
            return None;
        }

        let scalar = scalar.unwrap_or(self.config.default_type);
        let handle = Handle::Buffer(0);
        Some(match kind {
            DeclKind::Vector => KernelArgument::vector_view(handle, scalar, view),
            DeclKind::Matrix => KernelArgument::matrix(
                handle,
                scalar,
                MatrixLayout {
                    row_major,
                    transposed,
                },
            ),
            DeclKind::Scalar => KernelArgument::device_scalar(handle, scalar),
            DeclKind::Host => KernelArgument::host_scalar(handle, scalar),
        })
    }

    // ─── Statements ────────────────────────────────────────────────

    fn statement(&mut self, stmt: &Statement) -> Option<LoweredStatement> {
        let span = stmt.target.span.merge(stmt.value.span);
        let target = self.var(&stmt.target.node, stmt.target.span);
        let value = self.expr(&stmt.value);
        let (target, value) = (target?, value?);

        let products = count_type(&value, NodeKind::MatMatProd)
            + count_type(&value, NodeKind::MatVecProd);
        if products > 1 {
            self.diagnostics.push(
                Diagnostic::error(
                    "more than one matrix product in a statement".to_string(),
                    stmt.value.span,
                )
                .with_help("compute each product into its own vector or matrix first".to_string()),
            );
            return None;
        }
        if products == 1 && product_reads_target(&value, &target) {
            self.diagnostics.push(
                Diagnostic::error(
                    format!(
                        "'{}' is both the target and an operand of a matrix product",
                        stmt.target.node
                    ),
                    span,
                )
                .with_help("write the product into a separate variable".to_string()),
            );
            return None;
        }

        let op = match stmt.op.node {
            AssignOp::Assign => BinaryOp::Assign,
            AssignOp::AddAssign => BinaryOp::InplaceAdd,
            AssignOp::SubAssign => BinaryOp::InplaceSub,
        };
        match Node::binary(target, op, value) {
            Ok(tree) => Some(LoweredStatement { tree, span }),
            Err(e) => {
                self.diagnostics.push(Diagnostic::from_symbolic(&e, span));
                None
            }
        }
    }

    fn var(&mut self, name: &str, span: Span) -> Option<Node> {
        match self.symbols.get(name) {
            Some(symbol) => Some(Node::argument(symbol.leaf.clone())),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(format!("undeclared name '{}'", name), span).with_help(
                        format!("declare it first, e.g. `vector<float> {};`", name),
                    ),
                );
                None
            }
        }
    }

    fn check(&mut self, result: crate::symbolic::Result<Node>, span: Span) -> Option<Node> {
        result
            .map_err(|e| self.diagnostics.push(Diagnostic::from_symbolic(&e, span)))
            .ok()
    }

    fn expr(&mut self, expr: &Spanned<Expr>) -> Option<Node> {
        match &expr.node {
            Expr::Var(name) => self.var(name, expr.span),
            Expr::Neg(inner) => {
                let inner = self.expr(inner)?;
                self.check(Node::unary(UnaryOp::Neg, inner), expr.span)
            }
            Expr::BinOp { op, lhs, rhs } => {
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                let (lhs, rhs) = (lhs?, rhs?);
                let result = match op {
                    BinOp::Add => Node::binary(lhs, BinaryOp::Add, rhs),
                    BinOp::Sub => Node::binary(lhs, BinaryOp::Sub, rhs),
                    BinOp::Div => Node::binary(lhs, BinaryOp::Div, rhs),
                    BinOp::ElemMul => Node::binary(lhs, BinaryOp::ElementProd, rhs),
                    BinOp::ElemDiv => Node::binary(lhs, BinaryOp::ElementDiv, rhs),
                    BinOp::Mul => return self.product_or_scale(lhs, rhs, expr.span),
                };
                self.check(result, expr.span)
            }
            Expr::Call { name, args } => self.call(name, args, expr.span),
            Expr::Error => None,
        }
    }

    /// `*` is a matrix product when the left operand is a matrix and the
    /// right one is not a scalar; a scaling otherwise.
    fn product_or_scale(&mut self, lhs: Node, rhs: Node, span: Span) -> Option<Node> {
        if lhs.category() == ValueCategory::Matrix && rhs.category() != ValueCategory::Scalar {
            self.product(lhs, rhs, span)
        } else {
            self.check(Node::binary(lhs, BinaryOp::Mul, rhs), span)
        }
    }

    fn product(&mut self, lhs: Node, rhs: Node, span: Span) -> Option<Node> {
        if lhs.as_argument().is_none() || rhs.as_argument().is_none() {
            self.diagnostics.push(
                Diagnostic::error("matrix product operands must be declared names".to_string(), span)
                    .with_help("assign the operand expression to a variable first".to_string()),
            );
            return None;
        }
        let result = match rhs.category() {
            ValueCategory::Matrix => Node::mat_mat(lhs, rhs),
            _ => Node::mat_vec(lhs, rhs),
        };
        self.check(result, span)
    }

    fn call(&mut self, name: &Spanned<String>, args: &[Spanned<Expr>], span: Span) -> Option<Node> {
        let arity = match name.node.as_str() {
            "dot" | "prod" | "pow" | "max" | "min" => 2,
            other if UnaryOp::from_function(other).is_some() => 1,
            other => {
                self.diagnostics.push(
                    Diagnostic::error(format!("unknown function '{}'", other), name.span)
                        .with_help(
                            "available: dot, prod, pow, max, min, exp, log, sqrt, sin, cos, \
                             tan, tanh, fabs"
                                .to_string(),
                        ),
                );
                return None;
            }
        };
        if args.len() != arity {
            self.error(
                format!(
                    "'{}' takes {} argument{}, found {}",
                    name.node,
                    arity,
                    if arity == 1 { "" } else { "s" },
                    args.len()
                ),
                span,
            );
            return None;
        }

        let lowered: Vec<Option<Node>> = args.iter().map(|a| self.expr(a)).collect();
        let mut operands = Vec::with_capacity(arity);
        for node in lowered {
            operands.push(node?);
        }
        let mut operands = operands.into_iter();
        let first = operands.next()?;

        if arity == 1 {
            let op = UnaryOp::from_function(&name.node)?;
            return self.check(Node::unary(op, first), span);
        }

        let second = operands.next()?;
        match name.node.as_str() {
            "dot" => {
                let nested = count_type(&first, NodeKind::MatVecProd)
                    + count_type(&second, NodeKind::MatVecProd)
                    + count_type(&first, NodeKind::MatMatProd)
                    + count_type(&second, NodeKind::MatMatProd);
                if nested > 0 {
                    self.diagnostics.push(
                        Diagnostic::error(
                            "matrix products cannot appear inside dot()".to_string(),
                            span,
                        )
                        .with_help("compute the product into a vector first".to_string()),
                    );
                    return None;
                }
                self.check(Node::inner_prod(first, second), span)
            }
            "prod" => {
                if first.category() != ValueCategory::Matrix {
                    self.diagnostics.push(
                        Diagnostic::error(
                            format!("prod() expects a matrix first, found a {}", first.category()),
                            span,
                        ),
                    );
                    return None;
                }
                self.product(first, second, span)
            }
            "pow" => self.check(Node::binary(first, BinaryOp::Pow, second), span),
            "max" => self.check(Node::binary(first, BinaryOp::Max, second), span),
            _ => self.check(Node::binary(first, BinaryOp::Min, second), span),
        }
    }
}

fn product_reads_target(value: &Node, target: &Node) -> bool {
    let target = target.handle();
    let mut found = false;
    walk(value, &mut |node| {
        if let Some(p) = node.as_product() {
            found |= p.tree().lhs().handle() == target || p.tree().rhs().handle() == target;
        }
    });
    found
}
