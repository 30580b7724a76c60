use super::*;
use crate::kernel::PassKind;

const AXPY: &str = "vector<float> x, y;\nhost<float> alpha;\ny = alpha * x + y;\n";

#[test]
fn test_compile_valid_program() {
    let program = compile(AXPY, "axpy.sym").unwrap();
    assert!(program.name.starts_with("symcl_"));
    assert_eq!(program.kernels.len(), 1);
    assert!(program.source.contains("__kernel void"));
    assert!(program.source.contains(&format!("{}_k0", program.name)));
    assert_eq!(program.statements.len(), 1);
}

#[test]
fn test_compile_error_returns_diagnostics() {
    let errors = compile("vector<float> y;\ny = x;\n", "bad.sym").unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("undeclared"));
}

#[test]
fn test_same_structure_same_program() {
    let a = compile_silent(AXPY, &CompileOptions::default()).unwrap();
    let renamed = "vector<float> u, v;\nhost<float> beta;\nv = beta * u + v;\n";
    let b = compile_silent(renamed, &CompileOptions::default()).unwrap();
    assert_eq!(a.name, b.name);
    assert_eq!(a.cache_key, b.cache_key);
    assert_eq!(a.source, b.source);
}

#[test]
fn test_prefix_and_local_size_change_name() {
    let base = compile_silent(AXPY, &CompileOptions::default()).unwrap();
    let config = GeneratorConfig {
        prefix: "blas".to_string(),
        ..GeneratorConfig::default()
    };
    let prefixed = compile_silent(AXPY, &CompileOptions::with_config(config)).unwrap();
    assert!(prefixed.name.starts_with("blas_"));

    let config = GeneratorConfig {
        local_size: 256,
        ..GeneratorConfig::default()
    };
    let resized = compile_silent(AXPY, &CompileOptions::with_config(config)).unwrap();
    assert_ne!(base.name, resized.name);
}

#[test]
fn test_invalid_local_size_rejected() {
    let source = "vector<float> x, y;\nscalar<float> s;\ns = dot(x, y);\n";
    for local_size in [0, 100, 2048] {
        let config = GeneratorConfig {
            local_size,
            ..GeneratorConfig::default()
        };
        let errors = compile_silent(source, &CompileOptions::with_config(config)).unwrap_err();
        assert!(errors[0].message.contains("invalid work-group size"));
        assert!(errors[0].help.is_some());
    }
}

#[test]
fn test_double_rejected_without_device_support() {
    let options = CompileOptions {
        device: DeviceInfo::offline(false),
        ..CompileOptions::default()
    };
    let source = "vector<double> x, y;\ny = x + y;\n";
    let errors = compile_silent(source, &options).unwrap_err();
    assert_eq!(
        errors[0].message,
        "device 'offline' does not support double"
    );
    assert!(compile_silent(source, &CompileOptions::default()).is_ok());
}

#[test]
fn test_cache_reuses_program() {
    let mut cache = ProgramCache::new();
    let options = CompileOptions::default();
    let first = compile_cached(AXPY, "a.sym", &options, &mut cache).unwrap();
    let second = compile_cached(AXPY, "a.sym", &options, &mut cache).unwrap();
    assert_eq!(first.name, second.name);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.hits(), 1);

    let other = CompileOptions {
        context: "gpu1".to_string(),
        ..CompileOptions::default()
    };
    compile_cached(AXPY, "a.sym", &other, &mut cache).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_batch_matches_sequential() {
    let requests = vec![
        ("axpy".to_string(), AXPY.to_string()),
        (
            "dot".to_string(),
            "vector<float> x, y;\nscalar<float> s;\ns = dot(x, y);\n".to_string(),
        ),
        ("bad".to_string(), "vector<float> y;\ny = z;\n".to_string()),
    ];
    let options = CompileOptions::default();
    let results = compile_batch(&requests, &options);
    assert_eq!(results.len(), 3);
    let axpy = results[0].as_ref().unwrap();
    assert_eq!(axpy.source, compile_silent(AXPY, &options).unwrap().source);
    let dot = results[1].as_ref().unwrap();
    assert_eq!(dot.kernels[0].kind, PassKind::Reduction);
    assert!(results[2].is_err());
}

#[test]
fn test_statement_reprs() {
    let program = compile_silent(AXPY, &CompileOptions::default()).unwrap();
    insta::assert_snapshot!(
        program.statements[0].repr,
        @"p_vec_float_0assignp_p_hscal_float_1mulvec_float_2_paddvec_float_0_p_p"
    );
    insta::assert_snapshot!(
        program.statements[0].simplified,
        @"p_vec_float_0assignp_hscal_float_1mulvec_float_2_p_p"
    );
}

#[test]
fn test_json_manifest() {
    let program = compile_silent(AXPY, &CompileOptions::default()).unwrap();
    let json = program.to_json();
    assert!(json.starts_with("{\n"));
    assert!(json.contains(&format!("\"name\": \"{}\"", program.name)));
    assert!(json.contains("\"kind\": \"vector\""));
    assert!(json.contains("\"local_size\": null"));
    // Newlines in the source are escaped.
    assert!(json.contains("\\n__kernel void"));
}

#[test]
fn test_json_escape() {
    assert_eq!(json_escape("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
    assert_eq!(json_escape("\u{1}"), "\"\\u0001\"");
}
