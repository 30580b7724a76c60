use std::path::{Path, PathBuf};

use symcl::kernel::PassKind;
use symcl::{compile_silent, CompileOptions, CompiledProgram, GeneratorConfig};

fn demo(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

fn compile_demo(name: &str, options: &CompileOptions) -> CompiledProgram {
    compile_silent(&demo(name), options).unwrap_or_else(|errs| {
        panic!(
            "{} should compile, got {} errors: {:?}",
            name,
            errs.len(),
            errs.iter().map(|e| &e.message).collect::<Vec<_>>()
        );
    })
}

#[test]
fn test_axpy_is_one_vector_kernel() {
    let program = compile_demo("axpy.sym", &CompileOptions::default());
    assert_eq!(program.kernels.len(), 1);
    assert_eq!(program.kernels[0].kind, PassKind::Vector);
    assert!(program
        .source
        .contains("(arg0[i] = ((arg1 * arg2[i]) + arg0[i]));"));
    assert!(!program.source.contains("cl_khr_fp64"));
}

#[test]
fn test_cg_step_pass_plan() {
    let program = compile_demo("cg_step.sym", &CompileOptions::default());
    let kinds: Vec<PassKind> = program.kernels.iter().map(|k| k.kind).collect();
    assert_eq!(
        kinds,
        vec![
            PassKind::MatVec,
            PassKind::Reduction,
            PassKind::Scalar,
            PassKind::Reduction,
            PassKind::Scalar,
            PassKind::Vector,
        ]
    );
    // dot(r, r) takes r once, plus its temporary.
    assert_eq!(program.kernels[1].arguments.len(), 2);
    // Both updates run in the last kernel.
    let last = program.source.rsplit("__kernel").next().unwrap();
    assert!(last.contains(" += "));
    assert!(last.contains(" -= "));
}

#[test]
fn test_strided_double_view() {
    let program = compile_demo("strided.sym", &CompileOptions::default());
    assert!(program
        .source
        .contains("#pragma OPENCL EXTENSION cl_khr_fp64 : enable"));
    assert!(program.source.contains("(arg0[i] = (arg1 * arg2[i*2+1]));"));
    assert!(program.statements[0].repr.contains("_s2o1"));
}

#[test]
fn test_alignment_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("symcl.toml"), "[types]\nalignment = 4\n").unwrap();
    let config = GeneratorConfig::resolve(dir.path()).unwrap();
    let program = compile_demo("axpy.sym", &CompileOptions::with_config(config));
    assert!(program.source.contains("__global float4* arg0"));
    assert!(program.statements[0].repr.contains("vec_float4_0"));
}

#[test]
fn test_alignment_ignored_for_mixed_programs() {
    let config = GeneratorConfig {
        alignment: symcl::symbolic::Alignment::new(4).unwrap(),
        ..GeneratorConfig::default()
    };
    let program = compile_demo("cg_step.sym", &CompileOptions::with_config(config));
    assert!(!program.source.contains("float4"));
}

#[test]
fn test_every_demo_compiles() {
    let dir: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let mut seen = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|e| e == "sym") {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let program = compile_demo(&name, &CompileOptions::default());
            assert!(!program.kernels.is_empty(), "{}", name);
            seen += 1;
        }
    }
    assert!(seen >= 3);
}
