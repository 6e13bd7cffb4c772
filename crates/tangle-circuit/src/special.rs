//! Lazily-materialized constant wires.

use crate::alloc::WireAllocator;
use crate::coords::WireId;
use crate::gate::GateOp;

/// Holds `inv_i0`, `zero`, and `one` for a circuit under construction,
/// materializing each on first use (§4.3.3).
///
/// `inv_i0 = INV(primary-input-0)`; `zero = AND(primary-input-0, inv_i0)`;
/// `one = OR(primary-input-0, inv_i0)`. Deriving the constants from the
/// circuit's own first primary input, rather than a dedicated constant-wire
/// primitive the gate set doesn't have, guarantees `zero`/`one` are grounded
/// regardless of what value that input happens to carry at evaluation time.
///
/// Precondition: wire id 0 must already exist and be a primary input by the
/// time `zero`/`one`/`inv_i0` is first called — in practice, the circuit's
/// first declared input port, allocated before any arithmetic that needs a
/// constant. In the rare circuit with no real input yet (an ephemeral
/// circuit built solely to fold a constant expression), wire 0 is
/// allocated here as a fresh primary input on first use.
#[derive(Debug, Default)]
pub struct SpecialWires {
    inv_i0: Option<WireId>,
    zero: Option<WireId>,
    one: Option<WireId>,
}

impl SpecialWires {
    pub fn new() -> Self {
        Self::default()
    }

    fn input0(alloc: &mut WireAllocator) -> WireId {
        if alloc.num_wires() == 0 {
            alloc.wire()
        } else {
            WireId::from(0usize)
        }
    }

    fn inv_i0(&mut self, alloc: &mut WireAllocator) -> WireId {
        if let Some(w) = self.inv_i0 {
            return w;
        }
        let input0 = Self::input0(alloc);
        let w = alloc.wire();
        alloc.inv_gate(input0, w);
        self.inv_i0 = Some(w);
        w
    }

    /// Returns the constant-zero wire, allocating `inv_i0` first if needed.
    pub fn zero(&mut self, alloc: &mut WireAllocator) -> WireId {
        if let Some(z) = self.zero {
            return z;
        }
        let input0 = Self::input0(alloc);
        let inv = self.inv_i0(alloc);
        let z = alloc.wire();
        alloc.binary_gate(GateOp::And, input0, inv, z);
        self.zero = Some(z);
        z
    }

    /// Returns the constant-one wire, allocating `inv_i0` first if needed.
    pub fn one(&mut self, alloc: &mut WireAllocator) -> WireId {
        if let Some(o) = self.one {
            return o;
        }
        let input0 = Self::input0(alloc);
        let inv = self.inv_i0(alloc);
        let o = alloc.wire();
        alloc.binary_gate(GateOp::Or, input0, inv, o);
        self.one = Some(o);
        o
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate_direct;
    use ahash::AHashMap;

    /// §4.3.3: `zero`/`one` must be grounded correctly regardless of what
    /// value primary input 0 actually carries at evaluation time.
    fn check(input0_value: bool) {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let zero = special.zero(&mut alloc);
        let one = special.one(&mut alloc);
        let mut inputs = AHashMap::new();
        inputs.insert(WireId::from(0usize), input0_value);
        let values = evaluate_direct(&alloc, &inputs);
        assert!(!values[&zero]);
        assert!(values[&one]);
    }

    #[test]
    fn zero_and_one_are_grounded_when_input0_is_true() {
        check(true);
    }

    #[test]
    fn zero_and_one_are_grounded_when_input0_is_false() {
        check(false);
    }

    #[test]
    fn repeated_calls_reuse_the_same_wire() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let z1 = special.zero(&mut alloc);
        let z2 = special.zero(&mut alloc);
        assert_eq!(z1, z2);
        special.one(&mut alloc);
        let before = alloc.num_wires();
        special.one(&mut alloc);
        let after = alloc.num_wires();
        assert_eq!(before, after, "second `one()` call should not allocate");
    }
}
