//! scopgen command line interface
//!
//! Usage:
//!   scopgen [OPTIONS] --scop <FILE> <INPUT>
//!   scopgen --help
//!
//! Examples:
//!   scopgen --scop vadd.json vadd.c             # Writes vadd.scopgen.c
//!   scopgen --scop vadd.json --no-openmp vadd.c # Sequential code only
//!   scopgen --scop vadd.json --emit=ast vadd.c  # Dump the annotated tree
//!   scopgen --scop vadd.json --emit=deps vadd.c # Print the dependences

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use scopgen::codegen::{build_ast, generate_cpu};
use scopgen::frontend::load_scop_file;
use scopgen::utils::PrettyPrint;
use scopgen::CodegenOptions;
use std::fs;
use std::path::PathBuf;

/// scopgen - polyhedral CPU code generator
#[derive(Parser, Debug)]
#[command(name = "scopgen")]
#[command(version)]
#[command(about = "Generates OpenMP-annotated C loop nests from a scheduled SCoP", long_about = None)]
struct Cli {
    /// C source file containing the SCoP region
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// JSON description of the SCoP
    #[arg(long, value_name = "FILE")]
    scop: PathBuf,

    /// Output file (defaults to INPUT's name with `.scopgen` before the extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not emit OpenMP directives
    #[arg(long)]
    no_openmp: bool,

    /// What to emit
    #[arg(long, default_value = "code")]
    emit: EmitKind,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Generated source file
    Code,
    /// Annotated syntax tree, on stdout
    Ast,
    /// Flow and false dependences, on stdout
    Deps,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("scopgen v{}", scopgen::VERSION);
    debug!("Input file: {:?}", cli.input);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;
    let scop = load_scop_file(&cli.scop, &source)?;

    let options = CodegenOptions { openmp: !cli.no_openmp, output: cli.output.clone() };
    debug!("Options: {:?}", options);

    match cli.emit {
        EmitKind::Deps => {
            println!("flow: {}", scop.dep_flow);
            println!("false: {}", scop.dep_false);
        }
        EmitKind::Ast => {
            let tree = build_ast(&scop, &options).context("Failed to build the syntax tree")?;
            println!("{}", tree.pretty());
        }
        EmitKind::Code => {
            let path = generate_cpu(Some(&scop), &options, &cli.input, cli.output.as_deref())?;
            info!("Generated {}", path.display());
        }
    }

    Ok(())
}
