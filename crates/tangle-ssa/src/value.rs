//! The Generator-owned value table (§3, §9 "Ownership of values"). Every
//! `Value` lives at a single index in [`crate::Generator`]'s table;
//! everything else — bindings, environments, instruction operands — stores
//! a [`ValueId`], never the value itself.

use tangle_bigint::BigInt;
use tangle_types::{AssignSource, Info};

/// An index into the Generator's value table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ValueId(pub u32);

/// The tagged-sum constant payload (§9 "Dynamic payload in constants").
/// `Array`'s elements are themselves `ConstPayload`s, tagged individually,
/// so bit-extraction over a nested array-of-structs dispatches on each
/// element's own tag rather than a single homogeneous element type.
#[derive(Clone, Debug)]
pub enum ConstPayload {
    Bool(bool),
    Int(BigInt),
    Str(String),
    Array(Vec<ConstPayload>),
    Type(Info),
}

impl ConstPayload {
    /// The minimal width this payload proves its value fits in, used to
    /// populate a freshly-folded `Value`'s `Info::min_bits` (§4.1).
    pub fn min_bits(&self) -> u32 {
        match self {
            ConstPayload::Bool(_) => 1,
            ConstPayload::Int(i) => int_min_bits(i),
            ConstPayload::Str(s) => (s.len() as u32) * 8,
            ConstPayload::Array(elems) => elems.iter().map(ConstPayload::min_bits).sum(),
            ConstPayload::Type(_) => 0,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstPayload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            ConstPayload::Int(i) => Some(i),
            _ => None,
        }
    }
}

/// The smallest width a `BigInt`'s value would still fit in — unsigned
/// values need bits through their highest set bit, signed values need one
/// extra bit beyond the magnitude's own width to keep the sign clear.
fn int_min_bits(i: &BigInt) -> u32 {
    let highest_set = (0..i.width()).rev().find(|&b| i.bit(b)).map(|b| b as u32 + 1).unwrap_or(0);
    if i.is_signed() {
        // A negative value's leading 1s don't count toward min_bits beyond
        // the bit that distinguishes it from all-ones; conservatively keep
        // the full declared width for negatives rather than search for the
        // shortest two's-complement encoding.
        if i.width() > 0 && i.bit(i.width() - 1) { i.width() as u32 } else { highest_set.max(1) }
    } else {
        highest_set.max(1)
    }
}

/// A statically-resolvable pointer: always `&array[const-index]` or
/// `&struct.field`, expressed as a bit range into `base`'s own bundle
/// (§4.4.6) — this language has no heap, so every pointer is resolvable at
/// lowering time without a runtime dereference instruction.
#[derive(Copy, Clone, Debug)]
pub struct PtrInfo {
    pub base: ValueId,
    pub bit_offset: u32,
    pub bit_len: u32,
}

/// One entry in the Generator's value table (§3 "Value").
#[derive(Clone, Debug)]
pub struct Value {
    pub ty: Info,
    /// `Some` for every value the generator proved constant by folding;
    /// lowering emits no instruction for these (§4.4.5).
    pub konst: Option<ConstPayload>,
    pub ptr: Option<PtrInfo>,
}

impl Value {
    pub fn concrete(ty: Info) -> Self {
        Self { ty, konst: None, ptr: None }
    }

    pub fn constant(ty: Info, payload: ConstPayload) -> Self {
        let min_bits = payload.min_bits();
        Self { ty: ty.with_min_bits(min_bits), konst: Some(payload), ptr: None }
    }

    pub fn pointer(ty: Info, ptr: PtrInfo) -> Self {
        Self { ty, konst: None, ptr: Some(ptr) }
    }

    pub fn is_const(&self) -> bool {
        self.konst.is_some()
    }
}

impl AssignSource for Value {
    fn is_const(&self) -> bool {
        self.konst.is_some()
    }

    fn info(&self) -> &Info {
        &self.ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_min_bits_is_highest_set_bit_plus_one() {
        let payload = ConstPayload::Int(BigInt::from_u64(0b0101, 8));
        assert_eq!(payload.min_bits(), 3);
    }

    #[test]
    fn zero_has_min_bits_one() {
        let payload = ConstPayload::Int(BigInt::from_u64(0, 8));
        assert_eq!(payload.min_bits(), 1);
    }

    #[test]
    fn negative_signed_keeps_full_declared_width() {
        let payload = ConstPayload::Int(BigInt::from_i64(-1, 8));
        assert_eq!(payload.min_bits(), 8);
    }
}
