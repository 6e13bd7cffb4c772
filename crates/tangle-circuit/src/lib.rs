//! Boolean circuit construction: wire/gate allocation, arithmetic
//! primitives, optimization, and dense-id emission.
//!
//! This crate has no notion of source-language syntax or types; it is the
//! layer the SSA lowering driver in `tangle-compile` drives directly. A
//! [`CircuitBuilder`] owns one [`alloc::WireAllocator`] and one
//! [`special::SpecialWires`] for the lifetime of a single compilation unit.

pub mod alloc;
pub mod arith;
pub mod coords;
pub mod emit;
pub mod eval;
pub mod gate;
pub mod optimize;
pub mod special;

use alloc::{WireAllocator, WireBundle, WireFreelist};
use emit::{Circuit, PortSpec};
use special::SpecialWires;

/// Facade over the wire allocator, constant wires, and bundle freelist used
/// to build one circuit from end to end.
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    alloc: WireAllocator,
    special: SpecialWires,
    freelist: WireFreelist,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new primary input port and allocates its wires.
    pub fn declare_input(&mut self, name: impl Into<String>, bits: usize) -> WireBundle {
        let wires = self.alloc.wires(bits);
        self.inputs.push(PortSpec {
            name: name.into(),
            wires: wires.clone(),
        });
        WireBundle::new(wires)
    }

    /// Declares a circuit output port bound to `bundle`.
    pub fn declare_output(&mut self, name: impl Into<String>, bundle: &WireBundle) {
        for w in bundle.iter() {
            self.alloc.mark_output(w);
        }
        self.outputs.push(PortSpec {
            name: name.into(),
            wires: bundle.as_slice().to_vec(),
        });
    }

    pub fn alloc(&mut self) -> &mut WireAllocator {
        &mut self.alloc
    }

    pub fn special(&mut self) -> &mut SpecialWires {
        &mut self.special
    }

    /// Borrows the allocator and the constant wires together. Callers that
    /// need both as separate arguments to an `arith` primitive (the common
    /// case) can't get there from two separate `alloc()`/`special()` calls —
    /// each takes `&mut self` in its own right, so the borrow checker sees
    /// two overlapping exclusive borrows of `self`. Splitting the two
    /// fields inside one method sidesteps that.
    pub fn alloc_and_special(&mut self) -> (&mut WireAllocator, &mut SpecialWires) {
        (&mut self.alloc, &mut self.special)
    }

    /// Recycles a bundle's wires for reuse by a later allocation of the same
    /// bit width (§4.3.1, §5): the wires stay physically allocated but
    /// become available to [`Self::reuse_bundle`].
    pub fn recycle_bundle(&mut self, bundle: WireBundle) {
        self.freelist.recycle(bundle);
    }

    /// Takes a previously-recycled bundle of the given width, if one is
    /// available, avoiding a fresh allocation.
    pub fn reuse_bundle(&mut self, bits: usize) -> Option<WireBundle> {
        self.freelist.take(bits)
    }

    pub fn fresh_bundle(&mut self, bits: usize) -> WireBundle {
        WireBundle::new(self.alloc.wires(bits))
    }

    /// Runs the optimizer and emits the final dense-id [`Circuit`] artifact.
    pub fn finish(mut self) -> Circuit {
        let optimized = optimize::optimize(&mut self.alloc, &mut self.special);
        emit::compile(&self.alloc, &optimized, &self.inputs, &self.outputs)
    }
}

pub use gate::GateOp;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_emits_adder_circuit() {
        let mut builder = CircuitBuilder::new();
        let a = builder.declare_input("a", 4);
        let b = builder.declare_input("b", 4);

        let (alloc, special) = builder.alloc_and_special();
        let sum_wires = arith::ripple_add(alloc, special, a.as_slice(), b.as_slice());
        let sum = WireBundle::new(sum_wires);
        builder.declare_output("sum", &sum);

        let circuit = builder.finish();
        assert_eq!(circuit.inputs.len(), 2);
        assert_eq!(circuit.outputs[0].bits, 4);
        assert!(circuit.stats.total() > 0);
    }
}
