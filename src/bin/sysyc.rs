//! The compiler driver. Takes a source file, a mode selecting how far to
//! lower it, and an output path.
//!
//! Run with `--help` for more info.

use std::str::FromStr;

use clap::Parser;

use sysyc::back::codegen::codegen_program;
use sysyc::front::{lower, parse};
use sysyc::middle::tir;
use sysyc::CompileError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Koopa,
    Riscv,
    Perf,
}

impl FromStr for Mode {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-koopa" => Ok(Mode::Koopa),
            "-riscv" => Ok(Mode::Riscv),
            "-perf" => Ok(Mode::Perf),
            other => Err(CompileError::Usage(format!(
                "unrecognized mode {other:?}, expected one of -koopa, -riscv, -perf"
            ))),
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// compilation mode: -koopa, -riscv, or -perf
    #[arg(allow_hyphen_values = true)]
    mode: Mode,
    /// the input source file
    input: String,
    /// the output file
    #[arg(short = 'o', long = "out")]
    output: String,
}

fn run(args: &Args) -> Result<String, CompileError> {
    let source = std::fs::read_to_string(&args.input)
        .map_err(|e| CompileError::Usage(format!("reading {:?}: {e}", args.input)))?;

    let ast = parse(&source)?;
    let ir: tir::Program = lower(ast)?;

    match args.mode {
        Mode::Koopa => Ok(ir.to_string()),
        Mode::Riscv | Mode::Perf => {
            let asm = codegen_program(&ir)?;
            Ok(asm.to_string())
        }
    }
}

fn main() {
    let args = Args::parse();

    match run(&args) {
        Ok(output) => {
            if let Err(e) = std::fs::write(&args.output, output) {
                eprintln!("error writing {:?}: {e}", args.output);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
