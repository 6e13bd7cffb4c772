//! Direct topological evaluation of an in-progress circuit.
//!
//! Used by the compiler's constant-folding path (§4.2.4): an ephemeral
//! [`WireAllocator`] is built for a single arithmetic expression, its inputs
//! are pinned to the statically-known operand bits, and the result is read
//! back out through the same gate semantics the final emitted circuit uses.
//! This guarantees bit-exact equivalence between compile-time folding and
//! runtime evaluation, since both walk the identical [`GateOp::eval`] table.

use ahash::AHashMap;

use crate::alloc::WireAllocator;
use crate::coords::WireId;

/// Evaluates every gate in `alloc` in allocation order, given a full set of
/// primary-input assignments, and returns the bit value of every wire.
///
/// Allocation order is a valid topological order (§4.3.1: a gate only ever
/// references previously-allocated wires), so a single forward pass over
/// [`WireAllocator::gate_ids`] suffices; no worklist or level analysis is
/// needed here the way the final BFS emitter needs one for dense numbering.
pub fn evaluate_direct(alloc: &WireAllocator, inputs: &AHashMap<WireId, bool>) -> AHashMap<WireId, bool> {
    let mut values: AHashMap<WireId, bool> = AHashMap::with_capacity(alloc.num_wires());

    for wire_idx in 0..alloc.num_wires() {
        let id = WireId::from(wire_idx);
        let wire = alloc.get_wire(id);
        if wire.is_primary_input() {
            let v = *inputs
                .get(&id)
                .unwrap_or_else(|| panic!("eval: missing input assignment for {id:?}"));
            values.insert(id, v);
        }
    }

    for gate_id in alloc.gate_ids() {
        let gate = alloc.get_gate(gate_id);
        let a = *values
            .get(&gate.in1())
            .unwrap_or_else(|| panic!("eval: {:?} read before driven", gate.in1()));
        let b = gate.in2().map(|w| {
            *values
                .get(&w)
                .unwrap_or_else(|| panic!("eval: {w:?} read before driven"))
        });
        let out = gate.op().eval(a, b.unwrap_or(false));
        values.insert(gate.out(), out);
    }

    values
}

/// Evaluates a single wire's value given full primary-input assignments.
///
/// Convenience wrapper around [`evaluate_direct`] for call sites that only
/// need one output bit (most constant-folding call sites need the whole
/// bundle and call `evaluate_direct` directly instead).
pub fn evaluate_wire(alloc: &WireAllocator, inputs: &AHashMap<WireId, bool>, wire: WireId) -> bool {
    evaluate_direct(alloc, inputs)[&wire]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateOp;

    #[test]
    fn xor_gate_truth_table() {
        let mut alloc = WireAllocator::new();
        let a = alloc.wire();
        let b = alloc.wire();
        let out = alloc.wire();
        alloc.binary_gate(GateOp::Xor, a, b, out);

        for av in [false, true] {
            for bv in [false, true] {
                let mut inputs = AHashMap::new();
                inputs.insert(a, av);
                inputs.insert(b, bv);
                let result = evaluate_wire(&alloc, &inputs, out);
                assert_eq!(result, av ^ bv, "xor({av}, {bv})");
            }
        }
    }

    #[test]
    fn half_adder_chain() {
        // sum = a ^ b, carry = a & b
        let mut alloc = WireAllocator::new();
        let a = alloc.wire();
        let b = alloc.wire();
        let sum = alloc.wire();
        let carry = alloc.wire();
        alloc.binary_gate(GateOp::Xor, a, b, sum);
        alloc.binary_gate(GateOp::And, a, b, carry);

        let mut inputs = AHashMap::new();
        inputs.insert(a, true);
        inputs.insert(b, true);
        let values = evaluate_direct(&alloc, &inputs);
        assert_eq!(values[&sum], false);
        assert_eq!(values[&carry], true);
    }
}
