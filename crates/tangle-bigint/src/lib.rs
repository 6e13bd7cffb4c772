//! Fixed-width multi-precision integers, evaluated symbolically through
//! ephemeral [`tangle_circuit`] circuits (§4.2).
//!
//! Every operation here constructs a throwaway circuit over
//! [`tangle_circuit::arith`] primitives and runs it through
//! [`tangle_circuit::eval::evaluate_direct`] rather than computing on native
//! machine integers. This is deliberate, not an optimization opportunity:
//! the whole point is that a compile-time constant fold produces the exact
//! same bit pattern — including overflow, truncation, and signed-division
//! edge cases — that runtime garbled evaluation of the same circuit would.

use ahash::AHashMap;
use tangle_circuit::alloc::WireAllocator;
use tangle_circuit::arith;
use tangle_circuit::coords::WireId;
use tangle_circuit::eval::evaluate_direct;
use tangle_circuit::special::SpecialWires;

/// Ordering produced by [`BigInt::compare`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Ordering {
    Less,
    Equal,
    Greater,
}

/// A fixed-width integer, little-endian bit order, with an explicit
/// signedness tag (§4.1: signed and unsigned integers are distinct types
/// even at equal width).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BigInt {
    bits: Vec<bool>,
    signed: bool,
}

impl BigInt {
    /// Builds an unsigned value, truncating to `width` bits.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let bits = (0..width).map(|i| i < 64 && (value >> i) & 1 == 1).collect();
        Self { bits, signed: false }
    }

    /// Builds a signed value, sign-extending or truncating to `width` bits.
    pub fn from_i64(value: i64, width: usize) -> Self {
        let bits = (0..width)
            .map(|i| if i < 64 { (value >> i) & 1 == 1 } else { value < 0 })
            .collect();
        Self { bits, signed: true }
    }

    fn from_bits(bits: Vec<bool>, signed: bool) -> Self {
        Self { bits, signed }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn bit(&self, i: usize) -> bool {
        self.bits[i]
    }

    /// Reads this value back out as an unsigned `u64`, truncating to 64
    /// bits if `width() > 64`.
    pub fn to_u64(&self) -> u64 {
        self.bits.iter().take(64).enumerate().fold(0u64, |acc, (i, &b)| acc | ((b as u64) << i))
    }

    /// Reads this value back out as a signed `i64`, sign-extending from
    /// this value's declared width.
    pub fn to_i64(&self) -> i64 {
        let raw = self.to_u64();
        let width = self.width().min(64);
        if width == 64 {
            return raw as i64;
        }
        let sign_bit = 1u64 << (width - 1);
        if raw & sign_bit != 0 {
            (raw as i64) - (1i64 << width)
        } else {
            raw as i64
        }
    }

    /// Widens or truncates to `new_width` bits: unsigned values zero-extend,
    /// signed values sign-extend, both truncate by dropping the high bits.
    /// Used by constant folding to align mismatched-width operands before
    /// calling into an ephemeral circuit (§4.2, §4.4.5) without the
    /// precision loss a `to_u64`/`from_u64` round trip would cause above 64
    /// bits.
    pub fn resize(&self, new_width: usize) -> Self {
        let sign = self.signed && self.width() > 0 && self.bits[self.width() - 1];
        let bits = (0..new_width)
            .map(|i| if i < self.width() { self.bits[i] } else { sign })
            .collect();
        Self { bits, signed: self.signed }
    }
}

fn push_wires(alloc: &mut WireAllocator, inputs: &mut AHashMap<WireId, bool>, value: &BigInt) -> Vec<WireId> {
    let wires = alloc.wires(value.width());
    for (&w, &b) in wires.iter().zip(value.bits.iter()) {
        inputs.insert(w, b);
    }
    wires
}

fn read_out(values: &AHashMap<WireId, bool>, out: &[WireId]) -> Vec<bool> {
    out.iter().map(|w| values[w]).collect()
}

fn binary_op(
    a: &BigInt,
    b: &BigInt,
    build: impl FnOnce(&mut WireAllocator, &mut SpecialWires, &[WireId], &[WireId]) -> Vec<WireId>,
) -> BigInt {
    assert_eq!(a.signed, b.signed, "bigint: mixed signedness in binary op");
    let mut alloc = WireAllocator::new();
    let mut special = SpecialWires::new();
    let mut inputs = AHashMap::new();

    let wa = push_wires(&mut alloc, &mut inputs, a);
    let wb = push_wires(&mut alloc, &mut inputs, b);
    let out_wires = build(&mut alloc, &mut special, &wa, &wb);

    let values = evaluate_direct(&alloc, &inputs);
    BigInt::from_bits(read_out(&values, &out_wires), a.signed)
}

fn compare_op(a: &BigInt, b: &BigInt, build: impl FnOnce(&mut WireAllocator, &mut SpecialWires, &[WireId], &[WireId]) -> WireId) -> bool {
    assert_eq!(a.signed, b.signed, "bigint: mixed signedness in compare");
    let mut alloc = WireAllocator::new();
    let mut special = SpecialWires::new();
    let mut inputs = AHashMap::new();

    let wa = push_wires(&mut alloc, &mut inputs, a);
    let wb = push_wires(&mut alloc, &mut inputs, b);
    let out = build(&mut alloc, &mut special, &wa, &wb);

    let values = evaluate_direct(&alloc, &inputs);
    values[&out]
}

/// `a + b`, truncated to `max(a.width(), b.width())` bits, dropping the
/// carry-out (§4.2 overflow policy).
pub fn add(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| arith::ripple_add(alloc, special, wa, wb))
}

/// `a - b`, two's-complement, same truncation policy as [`add`].
pub fn sub(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| arith::ripple_sub(alloc, special, wa, wb))
}

/// `a * b`, truncated to `a.width()` bits. Dispatches to the Karatsuba
/// circuit above [`arith::KARATSUBA_THRESHOLD`] bits, array multiply below.
pub fn mul(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| {
        if wa.len() >= arith::KARATSUBA_THRESHOLD {
            arith::karatsuba_multiply(alloc, special, wa, wb)
        } else {
            arith::array_multiply(alloc, special, wa, wb)
        }
    })
}

/// `a / b`. Division by zero yields an all-ones quotient per §4.2; see
/// [`arith::divide_unsigned`]'s doc comment for why no special-casing is
/// needed to get that behavior.
pub fn div(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| {
        if a.signed {
            arith::divide_signed(alloc, special, wa, wb).0
        } else {
            arith::divide_unsigned(alloc, special, wa, wb).0
        }
    })
}

/// `a % b`, same divide-by-zero policy as [`div`] (remainder equals the
/// dividend).
pub fn rem(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| {
        if a.signed {
            arith::divide_signed(alloc, special, wa, wb).1
        } else {
            arith::divide_unsigned(alloc, special, wa, wb).1
        }
    })
}

/// Bitwise AND, max-width operands (§4.2).
pub fn and(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| arith::bitwise_and(alloc, special, wa, wb))
}

pub fn or(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| arith::bitwise_or(alloc, special, wa, wb))
}

pub fn xor(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| arith::bitwise_xor(alloc, special, wa, wb))
}

/// `a & !b` (bit-clear / `and_not`).
pub fn and_not(a: &BigInt, b: &BigInt) -> BigInt {
    binary_op(a, b, |alloc, special, wa, wb| {
        let not_b: Vec<WireId> = wb
            .iter()
            .map(|&w| {
                let o = alloc.wire();
                alloc.inv_gate(w, o);
                o
            })
            .collect();
        arith::bitwise_and(alloc, special, wa, &not_b)
    })
}

/// Shifts `a` left by `amount` bits, shifting in zero; `amount >= width`
/// zeroes the whole value (§4.2: no implicit modulo-width wraparound).
pub fn shift_left(a: &BigInt, amount: usize) -> BigInt {
    let mut alloc = WireAllocator::new();
    let mut special = SpecialWires::new();
    let mut inputs = AHashMap::new();
    let wa = push_wires(&mut alloc, &mut inputs, a);
    let out = arith::shift_left_const(&mut alloc, &mut special, &wa, amount);
    let values = evaluate_direct(&alloc, &inputs);
    BigInt::from_bits(read_out(&values, &out), a.signed)
}

/// Logical right shift; see [`shift_left`] for the ≥-width policy.
pub fn shift_right(a: &BigInt, amount: usize) -> BigInt {
    let mut alloc = WireAllocator::new();
    let mut special = SpecialWires::new();
    let mut inputs = AHashMap::new();
    let wa = push_wires(&mut alloc, &mut inputs, a);
    let out = arith::shift_right_const(&mut alloc, &mut special, &wa, amount);
    let values = evaluate_direct(&alloc, &inputs);
    BigInt::from_bits(read_out(&values, &out), a.signed)
}

/// Three-way comparison, dispatching to the signed or unsigned ripple
/// comparator circuits according to this value's signedness.
pub fn compare(a: &BigInt, b: &BigInt) -> Ordering {
    if compare_op(a, b, |alloc, special, wa, wb| arith::compare_eq(alloc, special, wa, wb)) {
        return Ordering::Equal;
    }
    let lt = if a.signed {
        compare_op(a, b, |alloc, special, wa, wb| arith::compare_lt_signed(alloc, special, wa, wb))
    } else {
        compare_op(a, b, |alloc, special, wa, wb| arith::compare_lt_unsigned(alloc, special, wa, wb))
    };
    if lt { Ordering::Less } else { Ordering::Greater }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wraps_at_declared_width() {
        let a = BigInt::from_u64(200, 8);
        let b = BigInt::from_u64(100, 8);
        assert_eq!(add(&a, &b).to_u64(), 44); // (200 + 100) % 256
    }

    #[test]
    fn sub_wraps_on_underflow() {
        let a = BigInt::from_u64(10, 8);
        let b = BigInt::from_u64(20, 8);
        assert_eq!(sub(&a, &b).to_u64(), 246); // (10 - 20) mod 256
    }

    #[test]
    fn mul_truncates_to_operand_width() {
        let a = BigInt::from_u64(17, 8);
        let b = BigInt::from_u64(19, 8);
        assert_eq!(mul(&a, &b).to_u64(), (17 * 19) % 256);
    }

    #[test]
    fn div_by_zero_yields_all_ones() {
        let a = BigInt::from_u64(42, 8);
        let zero = BigInt::from_u64(0, 8);
        assert_eq!(div(&a, &zero).to_u64(), 0xFF);
        assert_eq!(rem(&a, &zero).to_u64(), 42);
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        let a = BigInt::from_i64(-7, 8);
        let b = BigInt::from_i64(2, 8);
        assert_eq!(div(&a, &b).to_i64(), -3);
        assert_eq!(rem(&a, &b).to_i64(), -1);
    }

    #[test]
    fn shift_past_width_zeroes_value() {
        let a = BigInt::from_u64(0xFF, 8);
        assert_eq!(shift_left(&a, 10).to_u64(), 0);
        assert_eq!(shift_right(&a, 10).to_u64(), 0);
    }

    #[test]
    fn compare_orders_unsigned_values() {
        let a = BigInt::from_u64(5, 8);
        let b = BigInt::from_u64(9, 8);
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&b, &a), Ordering::Greater);
        assert_eq!(compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn compare_orders_signed_values_across_zero() {
        let neg = BigInt::from_i64(-1, 8);
        let pos = BigInt::from_i64(1, 8);
        assert_eq!(compare(&neg, &pos), Ordering::Less);
    }

    #[test]
    fn resize_sign_extends_signed_values() {
        let a = BigInt::from_i64(-1, 8);
        assert_eq!(a.resize(16).to_i64(), -1);
    }

    #[test]
    fn resize_zero_extends_unsigned_values() {
        let a = BigInt::from_u64(0xFF, 8);
        assert_eq!(a.resize(16).to_u64(), 0xFF);
    }

    #[test]
    fn resize_truncates_to_narrower_width() {
        let a = BigInt::from_u64(0x1FF, 9);
        assert_eq!(a.resize(8).to_u64(), 0xFF);
    }

    #[test]
    fn bitwise_ops_match_native_semantics() {
        let a = BigInt::from_u64(0b1100, 8);
        let b = BigInt::from_u64(0b1010, 8);
        assert_eq!(and(&a, &b).to_u64(), 0b1000);
        assert_eq!(or(&a, &b).to_u64(), 0b1110);
        assert_eq!(xor(&a, &b).to_u64(), 0b0110);
        assert_eq!(and_not(&a, &b).to_u64(), 0b0100);
    }
}
