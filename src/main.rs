use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use symcl::{CompileOptions, CompiledProgram, DeviceInfo, GeneratorConfig};

#[derive(Parser)]
#[command(
    name = "symcl",
    version,
    about = "symcl: linear-algebra statements to OpenCL kernels"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a .sym file to an OpenCL program
    Build {
        /// Input .sym file
        input: PathBuf,
        /// Output file (default: <input>.cl, or <input>.json with --json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Generator config (default: symcl.toml next to the input)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Query the GPU adapter for double support
        #[arg(long)]
        probe: bool,
        /// Assume the device supports double precision
        #[arg(long)]
        double: bool,
        /// Write the JSON manifest instead of the OpenCL source
        #[arg(long)]
        json: bool,
    },
    /// Print the repr and simplified repr of every statement
    Repr {
        /// Input .sym file
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Print the ordered kernel parameters of every pass
    Args {
        /// Input .sym file
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Show the detected device and whether it supports double
    Probe,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            input,
            output,
            config,
            probe,
            double,
            json,
        } => cmd_build(input, output, config, probe, double, json),
        Command::Repr { input, config } => cmd_repr(input, config),
        Command::Args { input, config } => cmd_args(input, config),
        Command::Probe => cmd_probe(),
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("SYMCL_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// --- shared helpers ---

fn load_config(input: &Path, explicit: Option<PathBuf>) -> GeneratorConfig {
    let result = match explicit {
        Some(path) => GeneratorConfig::load(&path),
        None => GeneratorConfig::resolve(input.parent().unwrap_or(Path::new("."))),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(help) = &e.help {
                eprintln!("  help: {}", help);
            }
            process::exit(1);
        }
    }
}

fn read_source(input: &Path) -> String {
    if !input.extension().is_some_and(|e| e == "sym") {
        eprintln!("error: input must be a .sym file");
        process::exit(1);
    }
    match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input.display(), e);
            process::exit(1);
        }
    }
}

fn compile_file(input: &Path, options: &CompileOptions) -> CompiledProgram {
    let source = read_source(input);
    let filename = input.to_string_lossy().to_string();
    match symcl::compile_with_options(&source, &filename, options) {
        Ok(program) => program,
        Err(_) => process::exit(1),
    }
}

// --- symcl build ---

fn cmd_build(
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    probe: bool,
    double: bool,
    json: bool,
) {
    let config = load_config(&input, config);
    let device = if probe {
        DeviceInfo::probe_or_offline()
    } else {
        DeviceInfo::offline(double)
    };
    let options = CompileOptions {
        config,
        device,
        ..CompileOptions::default()
    };
    let program = compile_file(&input, &options);

    let default_ext = if json { "json" } else { "cl" };
    let out_path = output.unwrap_or_else(|| input.with_extension(default_ext));
    let written = if json {
        std::fs::write(&out_path, program.to_json())
            .map_err(|e| format!("cannot write '{}': {}", out_path.display(), e))
    } else {
        program.save(&out_path)
    };
    if let Err(e) = written {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    eprintln!(
        "Compiled {} -> {} ({}, {} kernel(s))",
        input.display(),
        out_path.display(),
        program.name,
        program.kernels.len()
    );
}

// --- symcl repr ---

fn cmd_repr(input: PathBuf, config: Option<PathBuf>) {
    let options = CompileOptions::with_config(load_config(&input, config));
    let program = compile_file(&input, &options);
    for (i, stmt) in program.statements.iter().enumerate() {
        println!("statement {}", i);
        println!("  repr:       {}", stmt.repr);
        println!("  simplified: {}", stmt.simplified);
    }
    println!("program: {}", program.name);
}

// --- symcl args ---

fn cmd_args(input: PathBuf, config: Option<PathBuf>) {
    let options = CompileOptions::with_config(load_config(&input, config));
    let program = compile_file(&input, &options);
    for kernel in &program.kernels {
        println!("{} ({})", kernel.name, kernel.kind);
        for arg in &kernel.arguments {
            println!("  {}", arg);
        }
    }
}

// --- symcl probe ---

fn cmd_probe() {
    match DeviceInfo::probe() {
        Some(device) => {
            println!("device: {}", device.name);
            println!(
                "double: {}",
                if device.supports_double { "yes" } else { "no" }
            );
        }
        None => {
            eprintln!("error: no GPU adapter found");
            process::exit(1);
        }
    }
}
