//! Library entry points: source text in, OpenCL program out.

use std::path::Path;

use rayon::prelude::*;

use crate::config::GeneratorConfig;
use crate::device::DeviceInfo;
use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::kernel::{emit_program, program_name, schedule, KernelInfo, Plan, ProgramCache};
use crate::lower::{lower_file, LoweredStatement};
use crate::symbolic::traverse::walk;
use crate::syntax::parse_source;
use crate::syntax::span::Span;

#[cfg(test)]
mod tests;

/// Everything that shapes one compilation besides the source.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub config: GeneratorConfig,
    /// Device the program is generated for.
    pub device: DeviceInfo,
    /// Cache partition; programs are only reused within one context.
    pub context: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            config: GeneratorConfig::default(),
            device: DeviceInfo::default(),
            context: "default".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn with_config(config: GeneratorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

/// Identity strings of one source statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatementInfo {
    pub repr: String,
    pub simplified: String,
    pub span: Span,
}

/// A generated OpenCL program.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub name: String,
    /// Full reprs of all statements, joined by `;`.
    pub cache_key: String,
    pub simplified_key: String,
    pub source: String,
    pub kernels: Vec<KernelInfo>,
    pub statements: Vec<StatementInfo>,
}

impl CompiledProgram {
    /// Serialize the program manifest (names, keys, kernel table, source).
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        out.push_str("{\n");
        out.push_str(&format!("  \"name\": {},\n", json_escape(&self.name)));
        out.push_str(&format!(
            "  \"cache_key\": {},\n",
            json_escape(&self.cache_key)
        ));
        out.push_str(&format!(
            "  \"simplified_key\": {},\n",
            json_escape(&self.simplified_key)
        ));
        out.push_str("  \"kernels\": [\n");
        for (i, kernel) in self.kernels.iter().enumerate() {
            let args: Vec<String> = kernel.arguments.iter().map(|a| json_escape(a)).collect();
            let local = match kernel.local_size {
                Some(size) => size.to_string(),
                None => "null".to_string(),
            };
            out.push_str(&format!(
                "    {{\"name\": {}, \"kind\": \"{}\", \"dimensions\": {}, \"local_size\": {}, \"arguments\": [{}]}}",
                json_escape(&kernel.name),
                kernel.kind,
                kernel.dimensions,
                local,
                args.join(", ")
            ));
            if i + 1 < self.kernels.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("  ],\n");
        out.push_str(&format!("  \"source\": {}\n", json_escape(&self.source)));
        out.push_str("}\n");
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        std::fs::write(path, &self.source)
            .map_err(|e| format!("cannot write '{}': {}", path.display(), e))
    }
}

/// Compile one source string with default options.
pub fn compile(source: &str, filename: &str) -> Result<CompiledProgram, Vec<Diagnostic>> {
    compile_with_options(source, filename, &CompileOptions::default())
}

/// Compile one source string, rendering any diagnostics to stderr.
pub fn compile_with_options(
    source: &str,
    filename: &str,
    options: &CompileOptions,
) -> Result<CompiledProgram, Vec<Diagnostic>> {
    compile_silent(source, options).map_err(|errors| {
        render_diagnostics(&errors, filename, source);
        errors
    })
}

/// Compile without rendering diagnostics.
pub fn compile_silent(
    source: &str,
    options: &CompileOptions,
) -> Result<CompiledProgram, Vec<Diagnostic>> {
    let plan = plan_source(source, options)?;
    let name = program_name_for(&plan, options)?;
    finish(&plan, name, options)
}

/// Compile, reusing a program already built for the same context.
pub fn compile_cached(
    source: &str,
    filename: &str,
    options: &CompileOptions,
    cache: &mut ProgramCache<CompiledProgram>,
) -> Result<CompiledProgram, Vec<Diagnostic>> {
    let result = plan_source(source, options).and_then(|plan| {
        let name = program_name_for(&plan, options)?;
        if let Some(program) = cache.get(&options.context, &name) {
            return Ok(program);
        }
        let program = finish(&plan, name, options)?;
        cache.insert(&options.context, &program.name, program.clone());
        Ok(program)
    });
    result.map_err(|errors| {
        render_diagnostics(&errors, filename, source);
        errors
    })
}

/// Compile independent sources in parallel. Each request gets its own
/// registry, so results are identical to compiling them one by one.
pub fn compile_batch(
    requests: &[(String, String)],
    options: &CompileOptions,
) -> Vec<Result<CompiledProgram, Vec<Diagnostic>>> {
    requests
        .par_iter()
        .map(|(name, source)| {
            tracing::debug!(request = name.as_str(), "compiling");
            compile_silent(source, options)
        })
        .collect()
}

// ─── Pipeline ──────────────────────────────────────────────────────

fn plan_source(source: &str, options: &CompileOptions) -> Result<Plan, Vec<Diagnostic>> {
    let file = parse_source(source, 0)?;
    let statements = lower_file(&file, &options.config)?;
    check_device(&statements, &options.device)?;

    let span = statements.first().map(|s| s.span).unwrap_or_default();
    schedule(statements, &options.config)
        .map_err(|e| vec![Diagnostic::from_symbolic(&e, span)])
}

/// Reject element types the target device cannot execute.
fn check_device(
    statements: &[LoweredStatement],
    device: &DeviceInfo,
) -> Result<(), Vec<Diagnostic>> {
    let mut unsupported = Vec::new();
    for stmt in statements {
        let mut missing = None;
        walk(&stmt.tree, &mut |node| {
            if let Some(arg) = node.as_argument() {
                if missing.is_none() && !device.supports(arg.scalar_type()) {
                    missing = Some(arg.scalar_type());
                }
            }
        });
        if let Some(scalar) = missing {
            unsupported.push(
                Diagnostic::error(
                    format!("device '{}' does not support {}", device.name, scalar),
                    stmt.span,
                )
                .with_help("use float, or target a device with cl_khr_fp64".to_string()),
            );
        }
    }
    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(unsupported)
    }
}

fn program_name_for(plan: &Plan, options: &CompileOptions) -> Result<String, Vec<Diagnostic>> {
    let reprs = plan.reprs().map_err(|e| symbolic_error(plan, e))?;
    Ok(program_name(
        &options.config.prefix,
        &reprs.join(";"),
        options.config.local_size,
    ))
}

fn finish(
    plan: &Plan,
    name: String,
    options: &CompileOptions,
) -> Result<CompiledProgram, Vec<Diagnostic>> {
    let emitted =
        emit_program(plan, &name, &options.config).map_err(|e| symbolic_error(plan, e))?;
    let reprs = plan.reprs().map_err(|e| symbolic_error(plan, e))?;
    let simplified = plan.simplified_reprs().map_err(|e| symbolic_error(plan, e))?;

    let statements = plan
        .statements
        .iter()
        .zip(reprs.iter().zip(simplified.iter()))
        .map(|(stmt, (repr, simplified))| StatementInfo {
            repr: repr.clone(),
            simplified: simplified.clone(),
            span: stmt.span,
        })
        .collect();

    tracing::info!(
        program = name.as_str(),
        kernels = emitted.kernels.len(),
        "generated program"
    );
    Ok(CompiledProgram {
        name,
        cache_key: reprs.join(";"),
        simplified_key: simplified.join(";"),
        source: emitted.source,
        kernels: emitted.kernels,
        statements,
    })
}

fn symbolic_error(plan: &Plan, err: crate::symbolic::SymbolicError) -> Vec<Diagnostic> {
    let span = plan.statements.first().map(|s| s.span).unwrap_or_default();
    vec![Diagnostic::from_symbolic(&err, span)]
}

// ─── JSON Helpers ─────────────────────────────────────────────────

fn json_escape(s: &str) -> String {
    let mut out = String::from("\"");
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
