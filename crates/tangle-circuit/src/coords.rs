//! Wire and gate coordinates.

/// Inner type used for wire and gate indexes.
pub type RawIdx = u32;

/// Sentinel raw value meaning "unassigned".
const UNASSIGNED: RawIdx = RawIdx::MAX;

/// Identifies a wire within a [`crate::alloc::WireAllocator`]'s arena.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WireId(RawIdx);

impl WireId {
    /// The sentinel "unassigned" wire id.
    pub const UNASSIGNED: WireId = WireId(UNASSIGNED);

    /// True if this is the sentinel unassigned id.
    pub fn is_unassigned(self) -> bool {
        self.0 == UNASSIGNED
    }
}

impl std::fmt::Debug for WireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unassigned() {
            write!(f, "w?")
        } else {
            write!(f, "w{}", self.0)
        }
    }
}

impl From<RawIdx> for WireId {
    fn from(value: RawIdx) -> Self {
        Self(value)
    }
}

impl From<WireId> for RawIdx {
    fn from(value: WireId) -> Self {
        value.0
    }
}

impl From<usize> for WireId {
    fn from(value: usize) -> Self {
        Self(value as RawIdx)
    }
}

impl From<WireId> for usize {
    fn from(value: WireId) -> Self {
        value.0 as usize
    }
}

/// Identifies a gate within a [`crate::alloc::WireAllocator`]'s arena.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GateId(RawIdx);

impl std::fmt::Debug for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

impl From<RawIdx> for GateId {
    fn from(value: RawIdx) -> Self {
        Self(value)
    }
}

impl From<GateId> for RawIdx {
    fn from(value: GateId) -> Self {
        value.0
    }
}

impl From<usize> for GateId {
    fn from(value: usize) -> Self {
        Self(value as RawIdx)
    }
}

impl From<GateId> for usize {
    fn from(value: GateId) -> Self {
        value.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_sentinel_round_trips() {
        assert!(WireId::UNASSIGNED.is_unassigned());
        assert!(!WireId::from(0usize).is_unassigned());
    }

    #[test]
    fn wire_id_usize_conversion_round_trips() {
        let id = WireId::from(42usize);
        assert_eq!(usize::from(id), 42);
    }

    #[test]
    fn gate_id_usize_conversion_round_trips() {
        let id = GateId::from(7usize);
        assert_eq!(usize::from(id), 7);
    }
}
