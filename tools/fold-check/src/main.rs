//! Fuzzer-style harness exercising the bit-exactness guarantee §4.2.4
//! mandates between compile-time constant folding (`tangle_bigint`'s
//! ephemeral-circuit evaluation) and the final emitted circuit a runtime
//! garbled evaluation would walk, grounded on the teacher's `util/exectest`
//! round-trip-execution harness.

mod demo;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::Rng;
use tangle_bigint::BigInt;
use tangle_circuit::alloc::WireAllocator;
use tangle_circuit::arith;
use tangle_circuit::emit::Circuit;
use tangle_circuit::eval::evaluate_direct;
use tangle_circuit::special::SpecialWires;
use tangle_ssa::{compile_entry, Collaborators, CompilerOptions};

#[derive(Parser)]
#[command(name = "fold-check")]
#[command(about = "Cross-checks constant folding against direct circuit evaluation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compares a compile-time-folded `a + b` against the same operands
    /// lowered and evaluated as runtime circuit inputs.
    Fold {
        /// Operand width in bits.
        #[arg(default_value_t = 16)]
        bits: u32,
        #[arg(short, long)]
        signed: bool,
        /// Number of random operand pairs to try.
        #[arg(short, long, default_value_t = 32)]
        trials: u32,
    },
    /// Compares the Karatsuba and schoolbook array multiplier circuits
    /// directly (§8 scenario 6), independent of `tangle_bigint`'s own
    /// width-based dispatch.
    Multiply {
        /// Operand width in bits.
        #[arg(default_value_t = 32)]
        bits: u32,
        #[arg(short, long, default_value_t = 32)]
        trials: u32,
    },
}

/// Walks `circuit.gates` in emission order (already a valid topological
/// order — a gate only ever becomes ready once its operands have dense
/// ids) assigning declared input bits from `input_bits` in port order. Any
/// primary input wire with no declared port (the `SpecialWires` bootstrap
/// wire) defaults to `false`; §4.3.3 guarantees `zero`/`one` are correct
/// regardless of that wire's actual value.
fn simulate(circuit: &Circuit, input_bits: &[bool]) -> Vec<bool> {
    let mut values = vec![false; circuit.wire_count as usize];
    let mut next = 0usize;
    for port in &circuit.inputs {
        for &id in &port.wire_ids {
            values[id as usize] = input_bits[next];
            next += 1;
        }
    }
    for gate in &circuit.gates {
        let a = values[gate.input1 as usize];
        let b = gate.input2.map(|i| values[i as usize]).unwrap_or(false);
        values[gate.output as usize] = gate.op.eval(a, b);
    }
    circuit.outputs.iter().flat_map(|p| p.wire_ids.iter().map(|&id| values[id as usize])).collect()
}

fn bits_of(value: &BigInt) -> Vec<bool> {
    (0..value.width()).map(|i| value.bit(i)).collect()
}

fn run_fold(bits: u32, signed: bool, trials: u32) -> anyhow::Result<bool> {
    let collaborators = Collaborators::for_testing();
    let options = CompilerOptions::default();
    let mut rng = rand::rng();
    let mut all_ok = true;

    let runtime_program = demo::runtime_add_program(bits, signed);
    let runtime_generated = compile_entry(&runtime_program, &collaborators, options, "main", "runtime").context("runtime program should compile")?;
    let runtime_circuit = tangle_compile::lower_to_circuit(&runtime_generated, options).context("runtime program should lower")?;

    for trial in 0..trials {
        let (a, b) = if signed {
            let half = 1i128 << (bits.saturating_sub(1).min(62));
            (rng.random_range(-half..half), rng.random_range(-half..half))
        } else {
            let max = 1i128 << bits.min(62);
            (rng.random_range(0..max), rng.random_range(0..max))
        };

        let folded_program = demo::folded_add_program(bits, signed, a, b);
        let folded_generated = compile_entry(&folded_program, &collaborators, options, "main", "folded").context("folded program should compile")?;
        let folded_circuit = tangle_compile::lower_to_circuit(&folded_generated, options).context("folded program should lower")?;
        let folded_bits = simulate(&folded_circuit, &[]);

        let a_bi = if signed { BigInt::from_i64(a as i64, bits as usize) } else { BigInt::from_u64(a as u64, bits as usize) };
        let b_bi = if signed { BigInt::from_i64(b as i64, bits as usize) } else { BigInt::from_u64(b as u64, bits as usize) };
        let mut runtime_input = bits_of(&a_bi);
        runtime_input.extend(bits_of(&b_bi));
        let runtime_bits = simulate(&runtime_circuit, &runtime_input);

        let ok = folded_bits == runtime_bits;
        all_ok &= ok;
        println!("trial {trial:>3}: a={a:<12} b={b:<12} {}", if ok { "PASS" } else { "FAIL" });
        if !ok {
            println!("  folded:  {folded_bits:?}");
            println!("  runtime: {runtime_bits:?}");
        }
    }
    Ok(all_ok)
}

fn run_multiply(bits: u32, trials: u32) -> bool {
    let mut rng = rand::rng();
    let mut all_ok = true;

    for trial in 0..trials {
        let a = BigInt::from_u64(rng.random(), bits as usize);
        let b = BigInt::from_u64(rng.random(), bits as usize);

        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let wa = alloc.wires(bits as usize);
        let wb = alloc.wires(bits as usize);
        let mut inputs = ahash::AHashMap::new();
        for (i, &w) in wa.iter().enumerate() {
            inputs.insert(w, a.bit(i));
        }
        for (i, &w) in wb.iter().enumerate() {
            inputs.insert(w, b.bit(i));
        }

        let array_out = arith::array_multiply(&mut alloc, &mut special, &wa, &wb);
        let karatsuba_out = arith::karatsuba_multiply(&mut alloc, &mut special, &wa, &wb);

        let values = evaluate_direct(&alloc, &inputs);
        let array_bits: Vec<bool> = array_out.iter().map(|&w| values[&w]).collect();
        let karatsuba_bits: Vec<bool> = karatsuba_out.iter().map(|&w| values[&w]).collect();

        let ok = array_bits == karatsuba_bits;
        all_ok &= ok;
        println!("trial {trial:>3}: {bits}-bit multiply {}", if ok { "PASS" } else { "FAIL" });
    }
    all_ok
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Fold { bits, signed, trials } => run_fold(bits, signed, trials)?,
        Commands::Multiply { bits, trials } => run_multiply(bits, trials),
    };

    if !ok {
        eprintln!("fold-check: mismatches found");
        std::process::exit(1);
    }
    println!("fold-check: all trials agreed");
    Ok(())
}
