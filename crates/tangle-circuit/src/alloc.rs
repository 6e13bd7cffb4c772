//! Wire/gate allocation and the value-keyed wire-bundle table.

use ahash::AHashMap;

use crate::coords::{GateId, WireId};
use crate::gate::{Gate, GateOp, LogicalValue, Wire};

/// Number of wires reserved per bulk-allocation block (§5).
const BLOCK_SIZE: usize = 8192;

/// Low-level allocator of wires and gates.
///
/// Contract (§4.3.1): `wire`/`wires` allocate fresh, unconnected wires;
/// `binary_gate`/`inv_gate` connect two (or one) existing wires to drive a
/// third, previously-allocated, wire. Re-driving an already-driven wire is a
/// programmer bug in this crate and panics rather than returning an error
/// (§7 kind 5: internal errors must not be triggerable by malformed input).
#[derive(Debug, Default)]
pub struct WireAllocator {
    wires: Vec<Wire>,
    gates: Vec<Gate>,
}

impl WireAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve_for(&mut self, additional: usize) {
        if self.wires.len() + additional > self.wires.capacity() {
            let blocks = additional.div_ceil(BLOCK_SIZE).max(1);
            self.wires.reserve(blocks * BLOCK_SIZE);
        }
    }

    /// Allocates a single fresh, unconnected wire.
    pub fn wire(&mut self) -> WireId {
        self.reserve_for(1);
        let id = WireId::from(self.wires.len());
        self.wires.push(Wire::new_input());
        id
    }

    /// Allocates `n` fresh, unconnected wires.
    pub fn wires(&mut self, n: usize) -> Vec<WireId> {
        self.reserve_for(n);
        (0..n).map(|_| self.wire()).collect()
    }

    fn connect(&mut self, gate_id: GateId, out: WireId, in1: WireId, in2: Option<WireId>) {
        let out_wire = &mut self.wires[usize::from(out)];
        if out_wire.input_gate.is_some() {
            panic!("alloc: re-assignment of already-driven wire {out:?}");
        }
        out_wire.input_gate = Some(gate_id);

        self.wires[usize::from(in1)].output_gates.push(gate_id);
        self.wires[usize::from(in1)].flags.fanout += 1;
        if let Some(in2) = in2 {
            self.wires[usize::from(in2)].output_gates.push(gate_id);
            self.wires[usize::from(in2)].flags.fanout += 1;
        }
    }

    /// Wires a two-input gate, connecting `a` and `b` to drive the
    /// pre-allocated wire `out`.
    pub fn binary_gate(&mut self, op: GateOp, a: WireId, b: WireId, out: WireId) -> GateId {
        assert!(!op.is_unary(), "alloc: binary_gate called with unary op {op:?}");
        let gate_id = GateId::from(self.gates.len());
        self.gates.push(Gate::new(op, a, b, out));
        self.connect(gate_id, out, a, Some(b));
        gate_id
    }

    /// Wires an [`GateOp::Inv`] gate, connecting `a` to drive `out`.
    pub fn inv_gate(&mut self, a: WireId, out: WireId) -> GateId {
        let gate_id = GateId::from(self.gates.len());
        self.gates.push(Gate::new(GateOp::Inv, a, WireId::UNASSIGNED, out));
        self.connect(gate_id, out, a, None);
        gate_id
    }

    pub fn get_wire(&self, id: WireId) -> &Wire {
        &self.wires[usize::from(id)]
    }

    pub(crate) fn get_wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[usize::from(id)]
    }

    pub fn get_gate(&self, id: GateId) -> &Gate {
        &self.gates[usize::from(id)]
    }

    pub(crate) fn get_gate_mut(&mut self, id: GateId) -> &mut Gate {
        &mut self.gates[usize::from(id)]
    }

    pub fn num_wires(&self) -> usize {
        self.wires.len()
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    /// Gate ids in allocation (creation) order. Because every gate only ever
    /// references previously-allocated wires, this order is already a valid
    /// topological order.
    pub fn gate_ids(&self) -> impl Iterator<Item = GateId> + Clone {
        (0..self.gates.len()).map(GateId::from)
    }

    pub fn mark_output(&mut self, id: WireId) {
        self.wires[usize::from(id)].flags.is_output = true;
    }

    pub fn is_output(&self, id: WireId) -> bool {
        self.wires[usize::from(id)].flags.is_output
    }

    pub fn set_value(&mut self, id: WireId, value: LogicalValue) {
        self.wires[usize::from(id)].flags.value = value;
    }

    pub fn value_of(&self, id: WireId) -> LogicalValue {
        self.wires[usize::from(id)].flags.value
    }
}

/// A contiguous bundle of wires representing one multi-bit value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WireBundle(Vec<WireId>);

impl WireBundle {
    pub fn new(wires: Vec<WireId>) -> Self {
        Self(wires)
    }

    pub fn bits(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, i: usize) -> Option<WireId> {
        self.0.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = WireId> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[WireId] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<WireId> {
        self.0
    }
}

impl FromIterator<WireId> for WireBundle {
    fn from_iter<T: IntoIterator<Item = WireId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Recycling pool of [`WireBundle`]s keyed by bit-count (§4.3.1, §5).
///
/// Bundles returned by `gc` preserve their wire ids: a bundle reissued from
/// the freelist for a new value is physically the same wires, so any gates
/// still (incorrectly) wired to them remain structurally valid, even though
/// the SSA generator's liveness analysis guarantees they will not be.
#[derive(Debug, Default)]
pub struct WireFreelist {
    by_bits: AHashMap<usize, Vec<WireBundle>>,
}

impl WireFreelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recycle(&mut self, bundle: WireBundle) {
        self.by_bits.entry(bundle.bits()).or_default().push(bundle);
    }

    pub fn take(&mut self, bits: usize) -> Option<WireBundle> {
        self.by_bits.get_mut(&bits).and_then(Vec::pop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_gate_registers_fanout_on_both_operands() {
        let mut alloc = WireAllocator::new();
        let [a, b] = [alloc.wire(), alloc.wire()];
        let out = alloc.wire();
        alloc.binary_gate(GateOp::Xor, a, b, out);
        assert_eq!(alloc.get_wire(a).flags.fanout, 1);
        assert_eq!(alloc.get_wire(b).flags.fanout, 1);
        assert!(alloc.get_wire(out).input_gate.is_some());
    }

    #[test]
    #[should_panic(expected = "re-assignment")]
    fn driving_an_already_driven_wire_panics() {
        let mut alloc = WireAllocator::new();
        let [a, b, c] = [alloc.wire(), alloc.wire(), alloc.wire()];
        let out = alloc.wire();
        alloc.binary_gate(GateOp::And, a, b, out);
        alloc.binary_gate(GateOp::Or, a, c, out);
    }

    #[test]
    #[should_panic(expected = "binary_gate called with unary op")]
    fn binary_gate_rejects_inv() {
        let mut alloc = WireAllocator::new();
        let [a, b] = [alloc.wire(), alloc.wire()];
        let out = alloc.wire();
        alloc.binary_gate(GateOp::Inv, a, b, out);
    }

    #[test]
    fn freelist_round_trips_a_bundle_by_bit_count() {
        let mut alloc = WireAllocator::new();
        let bundle = WireBundle::new(alloc.wires(8));
        let mut freelist = WireFreelist::new();
        assert!(freelist.take(8).is_none());
        freelist.recycle(bundle.clone());
        let recycled = freelist.take(8).expect("bundle should be recyclable");
        assert_eq!(recycled, bundle);
        assert!(freelist.take(8).is_none());
    }

    #[test]
    fn mark_output_and_value_round_trip() {
        let mut alloc = WireAllocator::new();
        let w = alloc.wire();
        assert!(!alloc.is_output(w));
        alloc.mark_output(w);
        assert!(alloc.is_output(w));
        alloc.set_value(w, LogicalValue::One);
        assert_eq!(alloc.value_of(w), LogicalValue::One);
    }
}
