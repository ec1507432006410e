//! The `hatch` command-line driver.
//!
//! `hatch compile foo.hatch` writes `foo.hb`; `hatch run foo.hb` executes
//! an image and prints its output log. `--debug` dumps the AST and a
//! labelled instruction listing at compile time, and per-cycle execution
//! traces at run time.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hatch_asm::Instruction;
use hatch_compiler::{compile, dump_module, parse_program, CompiledProgram, FsLoader};
use hatch_vm::{output_text, Interpreter};

#[derive(Parser)]
#[command(name = "hatch", about = "Compiler and virtual machine for the Hatch language")]
struct Cli {
    /// Dump the AST, the instruction listing and per-cycle traces.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a .hatch source file to a .hb image.
    Compile {
        /// Path to the source file.
        path: PathBuf,
    },
    /// Run a compiled .hb image.
    Run {
        /// Path to the image file.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Command::Compile { path } => compile_file(&path, cli.debug),
        Command::Run { path } => run_file(&path),
    }
}

fn loader_for(path: &Path) -> FsLoader {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    FsLoader::with_roots(vec![
        base.to_path_buf(),
        base.join("lib"),
        base.join("../lib"),
        base.join("../../lib"),
    ])
}

fn compile_file(path: &Path, debug: bool) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let filename = path.to_string_lossy().into_owned();
    let loader = loader_for(path);

    if debug {
        let module = parse_program(&source, &filename, &loader)?;
        eprintln!("{}", dump_module(&module));
    }

    let program = compile(&source, &filename, &loader)?;

    let output = path.with_extension("hb");
    fs::write(&output, &program.image)
        .with_context(|| format!("writing {}", output.display()))?;

    if debug {
        let listing = listing(&program);
        let listing_path = path.with_extension("hasm");
        fs::write(&listing_path, &listing)
            .with_context(|| format!("writing {}", listing_path.display()))?;
        eprintln!("{listing}");
    }

    println!(
        "Compilation complete, filesize={} bytes",
        program.image.len()
    );
    Ok(())
}

fn run_file(path: &Path) -> Result<()> {
    let image = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    let mut vm = Interpreter::new();
    vm.load(&image)?;
    vm.run()?;

    print!("{}", output_text(vm.output()));
    Ok(())
}

/// Renders a labelled listing of the code section, `hasm` style.
fn listing(program: &CompiledProgram) -> String {
    let code = &program.image[..program.data_start];
    let mut out = String::from("; autogenerated assembly\n");

    for (index, instruction) in Instruction::decode_prefix(code).iter().enumerate() {
        let address = index * Instruction::LEN;
        for (name, location) in &program.function_addresses {
            if *location == address {
                let _ = writeln!(out, "{name}:");
            }
        }
        let _ = writeln!(out, "{address}: {instruction}");
    }

    if program.data_start < program.image.len() {
        let _ = writeln!(out, "; data section");
        let _ = writeln!(out, "{:?}", &program.image[program.data_start..]);
    }
    out
}
