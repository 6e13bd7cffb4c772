//! Basic blocks and SSA instructions (§3 "Block", "Instruction").
//!
//! Blocks live in [`crate::generator::Generator`]'s arena, addressed by
//! [`BlockId`] — a plain index, never a pointer — exactly as §9 "Cyclic
//! graphs" prescribes for avoiding reference-counted back-edges.

use tangle_circuit::emit::Circuit as EmittedCircuit;
use tangle_diag::SourceLoc;

use crate::env::Environment;
use crate::opcode::Opcode;
use crate::value::ValueId;

/// An index into the Generator's block arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlockId(pub u32);

/// One SSA instruction (§3 "Instruction").
///
/// Not every field is used by every opcode: `target` only matters for
/// `jump`/`if`; `circ` only for `Opcode::Circ`; `extra_outputs` only for
/// instructions that produce more than one result (none of the closed
/// opcode set currently needs more than one, but the field is kept to
/// match §3's literal shape for a `builtin` that returns a tuple).
#[derive(Clone, Debug)]
pub struct Instruction {
    pub op: Opcode,
    pub inputs: Vec<ValueId>,
    pub output: Option<ValueId>,
    pub target: Option<BlockId>,
    pub circ: Option<EmittedCircuit>,
    pub builtin_name: Option<String>,
    pub extra_outputs: Vec<ValueId>,
    /// Opcode-specific compile-time-known immediates the lowering driver
    /// needs alongside the wire-bundle inputs: a `[start, len]` bit range
    /// for `slice`/field-replacing `amov`, a `[amount]` shift count, a
    /// `[bit_index]` for `bts`/`btc`, a `[dest_bits, sign_extend]` pair for
    /// a width-changing `mov`. Empty when an opcode needs none.
    pub imm: Vec<u32>,
    pub loc: SourceLoc,
}

impl Instruction {
    pub fn new(op: Opcode, inputs: Vec<ValueId>, output: Option<ValueId>, loc: SourceLoc) -> Self {
        Self {
            op,
            inputs,
            output,
            target: None,
            circ: None,
            builtin_name: None,
            extra_outputs: Vec::new(),
            imm: Vec::new(),
            loc,
        }
    }

    pub fn with_target(mut self, target: BlockId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_circ(mut self, circ: EmittedCircuit) -> Self {
        self.circ = Some(circ);
        self
    }

    pub fn with_builtin_name(mut self, name: impl Into<String>) -> Self {
        self.builtin_name = Some(name.into());
        self
    }
}

/// A basic block (§3 "Block"): at most one sequential successor (`next`)
/// and one conditional successor (`branch`); `branch` is set only when the
/// block ends in a conditional jump, in which case `branch_cond` names the
/// tested value.
#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    pub preds: Vec<BlockId>,
    pub next: Option<BlockId>,
    pub branch: Option<BlockId>,
    pub instructions: Vec<Instruction>,
    pub env: Environment,
    pub branch_cond: Option<ValueId>,
    pub dead: bool,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            preds: Vec::new(),
            next: None,
            branch: None,
            instructions: Vec::new(),
            env: Environment::new(),
            branch_cond: None,
            dead: false,
        }
    }

    pub fn push(&mut self, inst: Instruction) {
        assert!(!self.dead, "block: instruction appended after terminator");
        self.instructions.push(inst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_diag::SourceLoc;

    #[test]
    fn new_block_starts_empty_and_alive() {
        let b = Block::new(BlockId(3));
        assert_eq!(b.id, BlockId(3));
        assert!(b.instructions.is_empty());
        assert!(!b.dead);
        assert!(b.next.is_none());
        assert!(b.branch.is_none());
    }

    #[test]
    #[should_panic(expected = "instruction appended after terminator")]
    fn pushing_after_dead_panics() {
        let mut b = Block::new(BlockId(0));
        b.dead = true;
        b.push(Instruction::new(Opcode::Ret, vec![], None, SourceLoc::UNKNOWN));
    }

    #[test]
    fn instruction_builders_set_optional_fields() {
        let inst = Instruction::new(Opcode::Jump, vec![], None, SourceLoc::UNKNOWN).with_target(BlockId(7));
        assert_eq!(inst.target, Some(BlockId(7)));

        let named = Instruction::new(Opcode::Builtin, vec![], None, SourceLoc::UNKNOWN).with_builtin_name("hamming");
        assert_eq!(named.builtin_name.as_deref(), Some("hamming"));
    }
}
