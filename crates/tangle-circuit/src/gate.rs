//! Gate and wire concepts.

use crate::coords::{GateId, WireId};

/// The closed set of 2-input (or 1-input, for `Inv`) Boolean gate operations.
///
/// Discriminant values match the opcode numbering the final circuit artifact
/// declares: `XOR=0, XNOR=1, AND=2, OR=3, INV=4`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum GateOp {
    Xor = 0,
    Xnor = 1,
    And = 2,
    Or = 3,
    Inv = 4,
}

impl GateOp {
    /// Whether this operation takes a single input wire.
    pub fn is_unary(self) -> bool {
        matches!(self, GateOp::Inv)
    }

    /// Evaluates the gate's truth table over two boolean inputs.
    ///
    /// For [`GateOp::Inv`] only `a` is consulted.
    pub fn eval(self, a: bool, b: bool) -> bool {
        match self {
            GateOp::Xor => a ^ b,
            GateOp::Xnor => !(a ^ b),
            GateOp::And => a && b,
            GateOp::Or => a || b,
            GateOp::Inv => !a,
        }
    }
}

/// A known or unknown logical value carried by a wire during optimization.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum LogicalValue {
    #[default]
    Unknown,
    Zero,
    One,
}

impl LogicalValue {
    /// Converts a concrete value, if known, to `Some(bool)`.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            LogicalValue::Unknown => None,
            LogicalValue::Zero => Some(false),
            LogicalValue::One => Some(true),
        }
    }

    pub fn from_bool(b: bool) -> Self {
        if b { LogicalValue::One } else { LogicalValue::Zero }
    }
}

/// A gate: an operation over one or two input wires producing one output wire.
#[derive(Copy, Clone, Debug)]
pub struct Gate {
    op: GateOp,
    in1: WireId,
    /// Unused (== [`WireId::UNASSIGNED`]) for [`GateOp::Inv`].
    in2: WireId,
    out: WireId,
}

impl Gate {
    pub fn new(op: GateOp, in1: WireId, in2: WireId, out: WireId) -> Self {
        assert_ne!(in1, out, "gate: input wire equals output wire");
        if !op.is_unary() {
            assert_ne!(in2, out, "gate: input wire equals output wire");
        }
        Self { op, in1, in2, out }
    }

    pub fn op(&self) -> GateOp {
        self.op
    }

    pub fn in1(&self) -> WireId {
        self.in1
    }

    /// The second input wire, or `None` for [`GateOp::Inv`].
    pub fn in2(&self) -> Option<WireId> {
        if self.op.is_unary() { None } else { Some(self.in2) }
    }

    pub fn out(&self) -> WireId {
        self.out
    }

    /// Sets the gate's input wires in place (used by the optimizer's redirect pass).
    pub(crate) fn set_inputs(&mut self, in1: WireId, in2: WireId) {
        self.in1 = in1;
        self.in2 = in2;
    }
}

/// A wire's packed metadata: whether it is a declared circuit output, its
/// propagated logical value (if the optimizer has determined one), and how
/// many gates currently read it.
#[derive(Copy, Clone, Debug, Default)]
pub struct WireFlags {
    pub is_output: bool,
    pub value: LogicalValue,
    pub fanout: u32,
}

/// A wire: either a primary input or the output of exactly one gate.
#[derive(Clone, Debug)]
pub struct Wire {
    /// `None` for primary inputs.
    pub(crate) input_gate: Option<GateId>,
    pub(crate) output_gates: Vec<GateId>,
    pub(crate) flags: WireFlags,
}

impl Wire {
    pub(crate) fn new_input() -> Self {
        Self {
            input_gate: None,
            output_gates: Vec::new(),
            flags: WireFlags::default(),
        }
    }

    pub fn is_primary_input(&self) -> bool {
        self.input_gate.is_none()
    }

    pub fn input_gate(&self) -> Option<GateId> {
        self.input_gate
    }

    pub fn output_gates(&self) -> &[GateId] {
        &self.output_gates
    }

    pub fn flags(&self) -> WireFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_op_truth_tables() {
        for &(a, b) in &[(false, false), (false, true), (true, false), (true, true)] {
            assert_eq!(GateOp::Xor.eval(a, b), a ^ b);
            assert_eq!(GateOp::Xnor.eval(a, b), !(a ^ b));
            assert_eq!(GateOp::And.eval(a, b), a && b);
            assert_eq!(GateOp::Or.eval(a, b), a || b);
            assert_eq!(GateOp::Inv.eval(a, b), !a);
        }
    }

    #[test]
    fn only_inv_is_unary() {
        assert!(GateOp::Inv.is_unary());
        assert!(!GateOp::Xor.is_unary());
        assert!(!GateOp::Xnor.is_unary());
        assert!(!GateOp::And.is_unary());
        assert!(!GateOp::Or.is_unary());
    }

    #[test]
    fn logical_value_bool_round_trip() {
        assert_eq!(LogicalValue::from_bool(true), LogicalValue::One);
        assert_eq!(LogicalValue::from_bool(false), LogicalValue::Zero);
        assert_eq!(LogicalValue::Unknown.as_bool(), None);
        assert_eq!(LogicalValue::One.as_bool(), Some(true));
        assert_eq!(LogicalValue::Zero.as_bool(), Some(false));
    }

    #[test]
    #[should_panic(expected = "input wire equals output wire")]
    fn gate_rejects_output_aliasing_input() {
        let w = WireId::from(0usize);
        Gate::new(GateOp::And, w, WireId::from(1usize), w);
    }
}
