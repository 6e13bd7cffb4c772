//! BFS-ordered dense wire-id emission and the final [`Circuit`] artifact.
//!
//! Gate emission order follows BFS visitation order from the primary
//! inputs (§4.3.5), mirroring the teacher's level-by-level gate
//! readiness tracking in its `builder` analysis (`GateSatisfactionTracker`,
//! `gen_level_allocs`): a gate becomes "ready" once every operand it reads
//! has been assigned a dense id, and ready gates are emitted in the order
//! they become ready. Primary inputs receive contiguous dense ids up front;
//! declared, non-input output wires receive dense ids only after every
//! interior wire has one, assigned in declared output-port order so output
//! ranges stay contiguous and deterministic regardless of gate-creation or
//! BFS-discovery order.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::alloc::WireAllocator;
use crate::coords::{GateId, WireId};
use crate::gate::GateOp;
use crate::optimize::OptimizedCircuit;

/// One named port: a list of dense wire ids, one per bit (§4.5 — a lowering
/// driver embedding this circuit inline needs the exact ids to wire its own
/// operands to, not just a bit count).
#[derive(Clone, Debug)]
pub struct IoPort {
    pub name: String,
    pub bits: u32,
    pub wire_ids: Vec<u32>,
}

/// A single emitted gate, referencing dense wire ids.
#[derive(Copy, Clone, Debug)]
pub struct EmittedGate {
    pub op: GateOp,
    pub input1: u32,
    /// `None` only for [`GateOp::Inv`].
    pub input2: Option<u32>,
    pub output: u32,
}

/// Per-opcode gate counts, reported alongside the circuit for diagnostics
/// and the `circuit-stats` tool.
#[derive(Clone, Debug, Default)]
pub struct GateStats {
    pub xor: usize,
    pub xnor: usize,
    pub and: usize,
    pub or: usize,
    pub inv: usize,
}

impl GateStats {
    pub fn total(&self) -> usize {
        self.xor + self.xnor + self.and + self.or + self.inv
    }

    fn record(&mut self, op: GateOp) {
        match op {
            GateOp::Xor => self.xor += 1,
            GateOp::Xnor => self.xnor += 1,
            GateOp::And => self.and += 1,
            GateOp::Or => self.or += 1,
            GateOp::Inv => self.inv += 1,
        }
    }
}

/// The finished Boolean circuit artifact: declared input/output ports and a
/// dense, gate-ordered gate list ready for garbling or direct evaluation.
#[derive(Clone, Debug)]
pub struct Circuit {
    pub inputs: Vec<IoPort>,
    pub outputs: Vec<IoPort>,
    pub gates: Vec<EmittedGate>,
    pub wire_count: u32,
    pub stats: GateStats,
}

/// One declared port: a name, its wire bundle (in the allocator's ids), and
/// its bit width (redundant with the bundle length, kept for clarity at
/// call sites that only have one or the other handy).
pub struct PortSpec {
    pub name: String,
    pub wires: Vec<WireId>,
}

fn resolve(redirect: &AHashMap<WireId, WireId>, mut w: WireId) -> WireId {
    while let Some(&next) = redirect.get(&w) {
        if next == w {
            break;
        }
        w = next;
    }
    w
}

/// Assigns dense ids and emits the gate list in BFS-readiness order.
///
/// `inputs` and `outputs` name the circuit's declared ports in the order
/// they should appear in the artifact; `outputs` wires need not be disjoint
/// from gate outputs used elsewhere (a pass-through output is legal).
pub fn compile(
    alloc: &WireAllocator,
    optimized: &OptimizedCircuit,
    inputs: &[PortSpec],
    outputs: &[PortSpec],
) -> Circuit {
    let mut dense: AHashMap<WireId, u32> = AHashMap::new();
    let mut next_id: u32 = 0;

    // Primary inputs get immediate, contiguous dense ids, even if a port
    // also happens to be flagged as a circuit output (§4.3.5 resolution:
    // input contiguity takes priority over output contiguity).
    let mut input_ports = Vec::with_capacity(inputs.len());
    for port in inputs {
        let mut wire_ids = Vec::with_capacity(port.wires.len());
        for &w in &port.wires {
            let canon = resolve(&optimized.redirect, w);
            let id = *dense.entry(canon).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            wire_ids.push(id);
        }
        input_ports.push(IoPort {
            name: port.name.clone(),
            bits: port.wires.len() as u32,
            wire_ids,
        });
    }

    // A primary input not named by any declared port — the bootstrap wire
    // `SpecialWires::input0` allocates when asked for `zero`/`one` on a
    // circuit with no real input yet (§4.3.3) — still needs a dense id, or
    // the readiness seed below never discovers it and every gate
    // downstream of it silently never emits.
    for wire_idx in 0..alloc.num_wires() {
        let id = WireId::from(wire_idx);
        if !alloc.get_wire(id).is_primary_input() {
            continue;
        }
        let canon = resolve(&optimized.redirect, id);
        dense.entry(canon).or_insert_with(|| {
            let id = next_id;
            next_id += 1;
            id
        });
    }

    // Readiness-tracked BFS over gates: a binary gate becomes ready once
    // both operands have dense ids; a unary gate needs only its one input.
    let mut consumers: AHashMap<WireId, Vec<GateId>> = AHashMap::new();
    for gate_id in alloc.gate_ids() {
        if !optimized.live[usize::from(gate_id)] {
            continue;
        }
        let gate = alloc.get_gate(gate_id);
        let in1 = resolve(&optimized.redirect, gate.in1());
        consumers.entry(in1).or_default().push(gate_id);
        if let Some(in2) = gate.in2() {
            let in2 = resolve(&optimized.redirect, in2);
            if in2 != in1 {
                consumers.entry(in2).or_default().push(gate_id);
            }
        }
    }

    let mut satisfied: AHashMap<GateId, u8> = AHashMap::new();
    let mut ready: VecDeque<GateId> = VecDeque::new();
    let mut enqueued: AHashSet<GateId> = AHashSet::new();

    let needed = |alloc: &WireAllocator, g: GateId| -> u8 {
        let gate = alloc.get_gate(g);
        if gate.op().is_unary() { 1 } else if gate.in1() == gate.in2().unwrap() { 1 } else { 2 }
    };

    for &ready_wire in dense.keys().cloned().collect::<Vec<_>>().iter() {
        if let Some(gs) = consumers.get(&ready_wire) {
            for &g in gs {
                let count = satisfied.entry(g).or_insert(0);
                *count += 1;
                if *count >= needed(alloc, g) && enqueued.insert(g) {
                    ready.push_back(g);
                }
            }
        }
    }

    let mut emitted: Vec<(GateId, EmittedGate)> = Vec::new();
    let mut stats = GateStats::default();

    while let Some(gate_id) = ready.pop_front() {
        let gate = alloc.get_gate(gate_id);
        let out = resolve(&optimized.redirect, gate.out());

        if dense.contains_key(&out) {
            // Already resolved to an existing wire (e.g. an optimizer
            // redirect collapsed onto something with an id already); this
            // gate produces no new wire and is skipped.
            continue;
        }
        let out_id = next_id;
        next_id += 1;
        dense.insert(out, out_id);
        stats.record(gate.op());

        let in1 = *dense.get(&resolve(&optimized.redirect, gate.in1())).expect("emit: operand not yet assigned");
        let in2 = gate.in2().map(|w| *dense.get(&resolve(&optimized.redirect, w)).expect("emit: operand not yet assigned"));
        emitted.push((gate_id, EmittedGate { op: gate.op(), input1: in1, input2: in2, output: out_id }));

        if let Some(gs) = consumers.get(&out) {
            for &g in gs {
                let count = satisfied.entry(g).or_insert(0);
                *count += 1;
                if *count >= needed(alloc, g) && enqueued.insert(g) {
                    ready.push_back(g);
                }
            }
        }
    }

    // Declared output wires that are not primary inputs and did not already
    // receive a dense id as a gate output (a constant-folded output, say)
    // get ids now, in declared output-port order.
    let mut output_ports = Vec::with_capacity(outputs.len());
    for port in outputs {
        let mut wire_ids = Vec::with_capacity(port.wires.len());
        for &w in &port.wires {
            let canon = resolve(&optimized.redirect, w);
            let id = *dense.entry(canon).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            wire_ids.push(id);
        }
        output_ports.push(IoPort {
            name: port.name.clone(),
            bits: port.wires.len() as u32,
            wire_ids,
        });
    }

    // Remap emitted gates through the final dense map (a gate's output may
    // have been assigned before some of its own operands if those operands
    // were only-ever-used-as-outputs wires discovered in the output pass).
    let gates: Vec<EmittedGate> = emitted
        .iter()
        .map(|(gate_id, g)| {
            let gate = alloc.get_gate(*gate_id);
            let in1 = *dense.get(&resolve(&optimized.redirect, gate.in1())).unwrap();
            let in2 = gate.in2().map(|w| *dense.get(&resolve(&optimized.redirect, w)).unwrap());
            EmittedGate { op: g.op, input1: in1, input2: in2, output: g.output }
        })
        .collect();

    Circuit {
        inputs: input_ports,
        outputs: output_ports,
        gates,
        wire_count: next_id,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::WireAllocator;
    use crate::gate::GateOp;
    use crate::optimize::optimize;
    use crate::special::SpecialWires;

    #[test]
    fn two_bit_adder_emits_dense_contiguous_ids() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();

        let a = alloc.wires(2);
        let b = alloc.wires(2);

        let (s0, c0) = crate::arith::half_adder(&mut alloc, a[0], b[0]);
        let (s1, c1) = crate::arith::full_adder(&mut alloc, a[1], b[1], c0);

        for &w in &[s0, s1, c1] {
            alloc.mark_output(w);
        }

        let optimized = optimize(&mut alloc, &mut special);
        let circuit = compile(
            &alloc,
            &optimized,
            &[
                PortSpec { name: "a".into(), wires: a },
                PortSpec { name: "b".into(), wires: b },
            ],
            &[PortSpec {
                name: "sum".into(),
                wires: vec![s0, s1, c1],
            }],
        );

        assert_eq!(circuit.inputs[0].bits, 2);
        assert_eq!(circuit.inputs[1].bits, 2);
        assert_eq!(circuit.outputs[0].bits, 3);
        assert!(circuit.gates.iter().all(|g| g.op != GateOp::Inv || g.input2.is_none()));

        let max_id = circuit.gates.iter().map(|g| g.output).max().unwrap_or(0);
        assert!(max_id < circuit.wire_count);
    }
}
