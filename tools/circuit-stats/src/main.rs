//! CLI tool for lowering a handful of canned demo programs through the
//! full compiler pipeline and reporting the resulting circuit's gate
//! counts, mirroring the teacher's `util/adder` report format.

mod demo;

use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tangle_circuit::emit::Circuit;
use tangle_ssa::{Collaborators, CompilerOptions};

#[derive(Parser)]
#[command(name = "circuit-stats")]
#[command(about = "Lower a canned demo program and report circuit statistics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// `a + b` over `bits`-wide operands.
    Add {
        /// Operand width in bits.
        bits: u32,
        /// Use a signed (two's-complement) operand type.
        #[arg(short, long)]
        signed: bool,
    },
    /// `a * b` over `bits`-wide operands.
    Mult {
        /// Operand width in bits.
        bits: u32,
        #[arg(short, long)]
        signed: bool,
        /// Force the schoolbook array multiplier instead of Karatsuba.
        #[arg(short, long)]
        array: bool,
    },
    /// Hamming distance over two `bits`-wide byte arrays.
    Hamming {
        /// Total bit width of each array argument.
        bits: u32,
    },
}

fn report(label: &str, elapsed: std::time::Duration, circuit: &Circuit) {
    println!("{label}:");
    println!("  Inputs:       {}", circuit.inputs.len());
    println!("  Outputs:      {}", circuit.outputs.len());
    println!("  Wires:        {}", circuit.wire_count);
    println!("  Total gates:  {}", circuit.stats.total());
    println!("    XOR:        {}", circuit.stats.xor);
    println!("    XNOR:       {}", circuit.stats.xnor);
    println!("    AND:        {}", circuit.stats.and);
    println!("    OR:         {}", circuit.stats.or);
    println!("    INV:        {}", circuit.stats.inv);
    println!("  Lowering took {:.3}s", elapsed.as_secs_f64());
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("static template is well-formed"));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let (label, program, function, options) = match &cli.command {
        Commands::Add { bits, signed } => {
            spinner.set_message(format!("lowering {bits}-bit adder"));
            (format!("{bits}-bit adder ({})", if *signed { "signed" } else { "unsigned" }), demo::adder_program(*bits, *signed), "add", CompilerOptions::default())
        }
        Commands::Mult { bits, signed, array } => {
            spinner.set_message(format!("lowering {bits}-bit multiplier"));
            let options = CompilerOptions { use_karatsuba: !array, ..CompilerOptions::default() };
            (format!("{bits}-bit multiplier ({})", if *array { "array" } else { "karatsuba" }), demo::multiplier_program(*bits, *signed), "mult", options)
        }
        Commands::Hamming { bits } => {
            spinner.set_message(format!("lowering {bits}-bit hamming distance"));
            (format!("{bits}-bit hamming distance"), demo::hamming_program(*bits), "hamming_fn", CompilerOptions::default())
        }
    };

    let collaborators = Collaborators::for_testing();
    let start = Instant::now();

    let generated = tangle_ssa::compile_entry(&program, &collaborators, options, "main", function)
        .inspect_err(|_| spinner.finish_and_clear())
        .context("SSA generation failed")?;

    let circuit = tangle_compile::lower_to_circuit(&generated, options)
        .inspect_err(|_| spinner.finish_and_clear())
        .context("circuit lowering failed")?;

    let elapsed = start.elapsed();
    spinner.finish_and_clear();
    report(&label, elapsed, &circuit);
    Ok(())
}
