//! Multi-bit arithmetic, comparison, and data-movement circuit primitives.
//!
//! Every bundle here is little-endian: index 0 is the least-significant bit.
//! Widths are preserved (wrapping) the way fixed-width integer arithmetic in
//! the source language wraps (§4.3.2, §6): a result wider than its inputs is
//! truncated to the requested output width rather than growing the bundle.

use crate::alloc::WireAllocator;
use crate::coords::WireId;
use crate::gate::GateOp;
use crate::special::SpecialWires;

/// Bundles with at least this many bits use [`karatsuba_multiply`] instead
/// of the quadratic [`array_multiply`] (§4.3.2).
pub const KARATSUBA_THRESHOLD: usize = 8;

fn and(alloc: &mut WireAllocator, a: WireId, b: WireId) -> WireId {
    let o = alloc.wire();
    alloc.binary_gate(GateOp::And, a, b, o);
    o
}

fn or(alloc: &mut WireAllocator, a: WireId, b: WireId) -> WireId {
    let o = alloc.wire();
    alloc.binary_gate(GateOp::Or, a, b, o);
    o
}

fn xor(alloc: &mut WireAllocator, a: WireId, b: WireId) -> WireId {
    let o = alloc.wire();
    alloc.binary_gate(GateOp::Xor, a, b, o);
    o
}

fn xnor(alloc: &mut WireAllocator, a: WireId, b: WireId) -> WireId {
    let o = alloc.wire();
    alloc.binary_gate(GateOp::Xnor, a, b, o);
    o
}

fn inv(alloc: &mut WireAllocator, a: WireId) -> WireId {
    let o = alloc.wire();
    alloc.inv_gate(a, o);
    o
}

/// `sum = a ^ b`, `carry = a & b`.
pub fn half_adder(alloc: &mut WireAllocator, a: WireId, b: WireId) -> (WireId, WireId) {
    (xor(alloc, a, b), and(alloc, a, b))
}

/// `sum = a ^ b ^ cin`, `carry = (a & b) | (cin & (a ^ b))`.
pub fn full_adder(alloc: &mut WireAllocator, a: WireId, b: WireId, cin: WireId) -> (WireId, WireId) {
    let axb = xor(alloc, a, b);
    let sum = xor(alloc, axb, cin);
    let a_and_b = and(alloc, a, b);
    let cin_and_axb = and(alloc, cin, axb);
    let carry = or(alloc, a_and_b, cin_and_axb);
    (sum, carry)
}

fn pad_to(a: &[WireId], width: usize, zero: WireId) -> Vec<WireId> {
    let mut v = a.to_vec();
    v.resize(width, zero);
    v
}

/// Ripple-carry adder. Output width is `max(a.len(), b.len())`; the final
/// carry-out is discarded (wrapping semantics).
pub fn ripple_add(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);

    let mut out = Vec::with_capacity(width);
    let mut carry = zero;
    for i in 0..width {
        let (sum, c) = full_adder(alloc, a[i], b[i], carry);
        out.push(sum);
        carry = c;
    }
    out
}

/// Ripple-carry adder that also returns the final carry-out bit.
pub fn ripple_add_with_carry(
    alloc: &mut WireAllocator,
    special: &mut SpecialWires,
    a: &[WireId],
    b: &[WireId],
) -> (Vec<WireId>, WireId) {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);

    let mut out = Vec::with_capacity(width);
    let mut carry = zero;
    for i in 0..width {
        let (sum, c) = full_adder(alloc, a[i], b[i], carry);
        out.push(sum);
        carry = c;
    }
    (out, carry)
}

fn bitwise_not(alloc: &mut WireAllocator, a: &[WireId]) -> Vec<WireId> {
    a.iter().map(|&w| inv(alloc, w)).collect()
}

/// Two's-complement subtraction: `a - b = a + (!b) + 1`, truncated to
/// `max(a.len(), b.len())` bits.
pub fn ripple_sub(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let one = special.one(alloc);
    let a = pad_to(a, width, zero);
    let b_inv = bitwise_not(alloc, &pad_to(b, width, zero));

    let mut out = Vec::with_capacity(width);
    let mut carry = one;
    for i in 0..width {
        let (sum, c) = full_adder(alloc, a[i], b_inv[i], carry);
        out.push(sum);
        carry = c;
    }
    out
}

/// Schoolbook (quadratic) multiplier, truncated to `a.len()` bits (the
/// output width a fixed-width multiply in the source language produces).
pub fn array_multiply(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    let width = a.len();
    let zero = special.zero(alloc);
    let b = pad_to(b, width, zero);

    let mut acc = vec![zero; width];
    for (i, &bi) in b.iter().enumerate() {
        if i >= width {
            break;
        }
        // partial[k] = a[k - i] & bi, shifted left by i and truncated to width
        let mut partial = vec![zero; width];
        for k in i..width {
            partial[k] = and(alloc, a[k - i], bi);
        }
        acc = ripple_add(alloc, special, &acc, &partial);
    }
    acc
}

/// Karatsuba multiplier for bundles with at least [`KARATSUBA_THRESHOLD`]
/// bits, truncated to `a.len()` bits. Falls back to [`array_multiply`]
/// below the threshold, where Karatsuba's split overhead is not worth it.
pub fn karatsuba_multiply(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    let width = a.len();
    if width < KARATSUBA_THRESHOLD {
        return array_multiply(alloc, special, a, b);
    }
    let zero = special.zero(alloc);
    let b = pad_to(b, width, zero);

    let half = width.div_ceil(2);
    let (a_lo, a_hi) = (&a[..half], &a[half..]);
    let (b_lo, b_hi) = (&b[..half], &b[half..]);

    let z0 = karatsuba_multiply(alloc, special, a_lo, b_lo);
    let z2 = karatsuba_multiply(alloc, special, a_hi, b_hi);

    let a_sum = ripple_add(alloc, special, a_lo, a_hi);
    let b_sum = ripple_add(alloc, special, b_lo, b_hi);
    let z1_full = karatsuba_multiply(alloc, special, &a_sum, &b_sum);
    let z1_minus_z0 = ripple_sub(alloc, special, &z1_full, &z0);
    let z1 = ripple_sub(alloc, special, &z1_minus_z0, &z2);

    // result = z0 + (z1 << half) + (z2 << (2*half)), truncated to `width`
    let mut shifted_z1 = vec![zero; half];
    shifted_z1.extend_from_slice(&z1);
    let mut shifted_z2 = vec![zero; 2 * half];
    shifted_z2.extend_from_slice(&z2);

    let sum1 = ripple_add(alloc, special, &pad_to(&z0, width, zero), &pad_to(&shifted_z1, width, zero));
    ripple_add(alloc, special, &sum1, &pad_to(&shifted_z2, width, zero))
}

/// Restoring shift-subtract divider. Returns `(quotient, remainder)`, both
/// `a.len()` bits wide. Unsigned semantics; see [`divide_signed`] for the
/// signed wrapper.
///
/// Division by zero needs no special-casing: every trial subtraction
/// against an all-zero divisor always "fits" (`remainder >= 0` unsigned),
/// so the quotient bits all come out set (all-ones) and the remainder ends
/// up equal to the dividend, which is exactly the policy §4.2 mandates.
pub fn divide_unsigned(
    alloc: &mut WireAllocator,
    special: &mut SpecialWires,
    a: &[WireId],
    b: &[WireId],
) -> (Vec<WireId>, Vec<WireId>) {
    let width = a.len();
    let zero = special.zero(alloc);
    let divisor = pad_to(b, width, zero);

    let mut remainder = vec![zero; width];
    let mut quotient = vec![zero; width];

    for i in (0..width).rev() {
        // remainder = (remainder << 1) | a[i], dropping any overflow out of `width`
        let mut shifted = vec![zero; width];
        shifted[0] = a[i];
        shifted[1..].copy_from_slice(&remainder[..width - 1]);
        remainder = shifted;

        let trial = ripple_sub(alloc, special, &remainder, &divisor);
        let fits = compare_ge_unsigned(alloc, special, &remainder, &divisor);
        quotient[i] = fits;

        for (r, t) in remainder.iter_mut().zip(trial.iter()) {
            *r = mux_bit(alloc, fits, *t, *r);
        }
    }

    (quotient, remainder)
}

/// Signed division: magnitude-divide and restore the sign of both results
/// according to truncating (toward-zero) division, the convention a Go-like
/// language's `/` and `%` operators use.
pub fn divide_signed(
    alloc: &mut WireAllocator,
    special: &mut SpecialWires,
    a: &[WireId],
    b: &[WireId],
) -> (Vec<WireId>, Vec<WireId>) {
    let width = a.len();
    let a_sign = a[width - 1];
    let b_sign = b[width - 1];

    let a_mag = conditional_negate(alloc, special, a, a_sign);
    let b_mag = conditional_negate(alloc, special, b, b_sign);

    let (q_mag, r_mag) = divide_unsigned(alloc, special, &a_mag, &b_mag);

    let result_sign = xor(alloc, a_sign, b_sign);
    let quotient = conditional_negate(alloc, special, &q_mag, result_sign);
    let remainder = conditional_negate(alloc, special, &r_mag, a_sign);
    (quotient, remainder)
}

fn conditional_negate(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], cond: WireId) -> Vec<WireId> {
    let width = a.len();
    let zero = special.zero(alloc);
    let negated = ripple_sub(alloc, special, &vec![zero; width], a);
    a.iter()
        .zip(negated.iter())
        .map(|(&orig, &neg)| mux_bit(alloc, cond, neg, orig))
        .collect()
}

/// Unsigned ripple comparator: `a < b`.
pub fn compare_lt_unsigned(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);

    // lt_so_far starts false; at each bit from MSB to LSB, a tie keeps the
    // previous verdict and a difference decides it.
    let mut lt = zero;
    let mut tie = special.one(alloc);
    for i in (0..width).rev() {
        let bit_lt = and(alloc, inv(alloc, a[i]), b[i]);
        let bit_eq = xnor(alloc, a[i], b[i]);
        let decided_here = and(alloc, tie, bit_lt);
        lt = or(alloc, lt, decided_here);
        tie = and(alloc, tie, bit_eq);
    }
    lt
}

/// Signed ripple comparator: `a < b`, via the sign-bit inversion trick
/// (invert the MSB of both operands, then run the unsigned comparator).
pub fn compare_lt_signed(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let mut a = pad_to(a, width, zero);
    let mut b = pad_to(b, width, zero);
    let last = width - 1;
    a[last] = inv(alloc, a[last]);
    b[last] = inv(alloc, b[last]);
    compare_lt_unsigned(alloc, special, &a, &b)
}

pub fn compare_le_unsigned(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let gt = compare_lt_unsigned(alloc, special, b, a);
    inv(alloc, gt)
}

pub fn compare_ge_unsigned(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let lt = compare_lt_unsigned(alloc, special, a, b);
    inv(alloc, lt)
}

pub fn compare_gt_unsigned(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    compare_lt_unsigned(alloc, special, b, a)
}

pub fn compare_le_signed(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let gt = compare_lt_signed(alloc, special, b, a);
    inv(alloc, gt)
}

pub fn compare_ge_signed(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let lt = compare_lt_signed(alloc, special, a, b);
    inv(alloc, lt)
}

pub fn compare_gt_signed(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    compare_lt_signed(alloc, special, b, a)
}

/// Bitwise equality reduction: `AND` over `XNOR(a[i], b[i])`.
pub fn compare_eq(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);

    let mut acc = special.one(alloc);
    for i in 0..width {
        let eq_bit = xnor(alloc, a[i], b[i]);
        acc = and(alloc, acc, eq_bit);
    }
    acc
}

pub fn compare_neq(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> WireId {
    let eq = compare_eq(alloc, special, a, b);
    inv(alloc, eq)
}

/// Bitwise `AND`/`OR`/`XOR` over equal-width bundles (padded to the wider
/// width with the zero wire).
pub fn bitwise_and(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    bitwise_op(alloc, special, a, b, GateOp::And)
}

pub fn bitwise_or(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    bitwise_op(alloc, special, a, b, GateOp::Or)
}

pub fn bitwise_xor(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    bitwise_op(alloc, special, a, b, GateOp::Xor)
}

fn bitwise_op(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId], op: GateOp) -> Vec<WireId> {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);
    (0..width)
        .map(|i| {
            let o = alloc.wire();
            alloc.binary_gate(op, a[i], b[i], o);
            o
        })
        .collect()
}

/// Single-bit multiplexer: `sel ? a : b`, built as `b ^ (sel & (a ^ b))`.
pub fn mux_bit(alloc: &mut WireAllocator, sel: WireId, a: WireId, b: WireId) -> WireId {
    let diff = xor(alloc, a, b);
    let masked = and(alloc, sel, diff);
    xor(alloc, b, masked)
}

/// Bundle multiplexer: `sel ? a : b`, bit by bit.
pub fn mux(alloc: &mut WireAllocator, special: &mut SpecialWires, sel: WireId, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);
    (0..width).map(|i| mux_bit(alloc, sel, a[i], b[i])).collect()
}

/// Returns a bundle identical to `bundle` except bit `idx`, which is forced
/// high (the `bts`, bit-test-and-set, primitive).
pub fn bit_set(alloc: &mut WireAllocator, special: &mut SpecialWires, bundle: &[WireId], idx: usize) -> Vec<WireId> {
    let one = special.one(alloc);
    let mut out = bundle.to_vec();
    out[idx] = one;
    out
}

/// Returns a bundle identical to `bundle` except bit `idx`, which is
/// inverted (the `btc`, bit-test-and-complement, primitive).
pub fn bit_complement(alloc: &mut WireAllocator, bundle: &[WireId], idx: usize) -> Vec<WireId> {
    let mut out = bundle.to_vec();
    out[idx] = inv(alloc, out[idx]);
    out
}

/// Selects one of `elements` by `index`, via a balanced binary mux tree
/// (§4.3.2): `log2(elements.len())` levels of pairwise [`mux`].
///
/// `index` is little-endian; `elements.len()` need not be a power of two,
/// but out-of-range selections are the caller's responsibility (the source
/// language's bounds checks happen before lowering reaches this point).
pub fn select_indexed(
    alloc: &mut WireAllocator,
    special: &mut SpecialWires,
    elements: &[Vec<WireId>],
    index: &[WireId],
) -> Vec<WireId> {
    assert!(!elements.is_empty(), "select_indexed: empty element list");
    let mut layer: Vec<Vec<WireId>> = elements.to_vec();
    for &sel_bit in index {
        if layer.len() == 1 {
            break;
        }
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        for pair in layer.chunks(2) {
            if pair.len() == 2 {
                next.push(mux(alloc, special, sel_bit, &pair[1], &pair[0]));
            } else {
                next.push(pair[0].clone());
            }
        }
        layer = next;
    }
    layer.into_iter().next().expect("select_indexed: reduced to nothing")
}

/// Hamming distance: the number of differing bits between `a` and `b`,
/// computed by summing the per-bit XOR results through an adder-reduction
/// tree. Output width is `ceil(log2(width + 1))` bits, enough to represent
/// `width` itself.
pub fn hamming_distance(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], b: &[WireId]) -> Vec<WireId> {
    let width = a.len().max(b.len());
    let zero = special.zero(alloc);
    let a = pad_to(a, width, zero);
    let b = pad_to(b, width, zero);

    let diffs: Vec<WireId> = (0..width).map(|i| xor(alloc, a[i], b[i])).collect();
    let out_width = (u32::BITS - (width as u32).leading_zeros()) as usize + 1;

    let mut acc = vec![zero; out_width];
    for d in diffs {
        let one_bit_value = {
            let mut v = vec![zero; out_width];
            v[0] = d;
            v
        };
        acc = ripple_add(alloc, special, &acc, &one_bit_value);
    }
    acc
}

/// Logical (short-circuit-free) AND/OR over single-bit boolean wires; an
/// alias for the single-gate primitives, kept distinct from [`bitwise_and`]
/// for call sites operating on `bool`-typed values rather than bundles.
pub fn logical_and(alloc: &mut WireAllocator, a: WireId, b: WireId) -> WireId {
    and(alloc, a, b)
}

pub fn logical_or(alloc: &mut WireAllocator, a: WireId, b: WireId) -> WireId {
    or(alloc, a, b)
}

/// Constant (compile-time-known) left shift, filling vacated low bits with
/// zero and truncating to the original width.
pub fn shift_left_const(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], amount: usize) -> Vec<WireId> {
    let width = a.len();
    let zero = special.zero(alloc);
    (0..width)
        .map(|i| if i >= amount { a[i - amount] } else { zero })
        .collect()
}

/// Constant (compile-time-known) logical right shift, filling vacated high
/// bits with zero.
pub fn shift_right_const(alloc: &mut WireAllocator, special: &mut SpecialWires, a: &[WireId], amount: usize) -> Vec<WireId> {
    let width = a.len();
    let zero = special.zero(alloc);
    (0..width)
        .map(|i| if i + amount < width { a[i + amount] } else { zero })
        .collect()
}

/// Extracts a contiguous bit range `[start, start + len)`, the circuit-level
/// counterpart of the language's slice expression (§6) over a fixed-width
/// value. Pure rewiring: no gates are allocated.
pub fn slice(a: &[WireId], start: usize, len: usize) -> Vec<WireId> {
    a[start..start + len].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate_direct;
    use ahash::AHashMap;

    fn const_bundle(alloc: &mut WireAllocator, special: &mut SpecialWires, value: u64, width: usize) -> Vec<WireId> {
        (0..width)
            .map(|i| if (value >> i) & 1 == 1 { special.one(alloc) } else { special.zero(alloc) })
            .collect()
    }

    fn read_bundle(values: &AHashMap<WireId, bool>, bundle: &[WireId]) -> u64 {
        bundle.iter().enumerate().fold(0u64, |acc, (i, w)| acc | ((values[w] as u64) << i))
    }

    #[test]
    fn ripple_add_matches_wrapping_addition() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 200, 8);
        let b = const_bundle(&mut alloc, &mut special, 100, 8);
        let sum = ripple_add(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &sum), (200u64 + 100) % 256);
    }

    #[test]
    fn ripple_sub_matches_wrapping_subtraction() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 10, 8);
        let b = const_bundle(&mut alloc, &mut special, 20, 8);
        let diff = ripple_sub(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &diff), (10i64 - 20i64).rem_euclid(256) as u64);
    }

    #[test]
    fn array_multiply_matches_wrapping_multiplication() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 17, 8);
        let b = const_bundle(&mut alloc, &mut special, 19, 8);
        let prod = array_multiply(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &prod), (17u64 * 19) % 256);
    }

    #[test]
    fn karatsuba_matches_array_multiply_above_threshold() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 12345, 16);
        let b = const_bundle(&mut alloc, &mut special, 6789, 16);
        let prod = karatsuba_multiply(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &prod), (12345u64 * 6789) % 65536);
    }

    #[test]
    fn unsigned_division_matches_integer_semantics() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 100, 8);
        let b = const_bundle(&mut alloc, &mut special, 7, 8);
        let (q, r) = divide_unsigned(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &q), 100 / 7);
        assert_eq!(read_bundle(&values, &r), 100 % 7);
    }

    #[test]
    fn division_by_zero_yields_all_ones_quotient_and_dividend_remainder() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 42, 8);
        let zero_divisor = const_bundle(&mut alloc, &mut special, 0, 8);
        let (q, r) = divide_unsigned(&mut alloc, &mut special, &a, &zero_divisor);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &q), 0xFF);
        assert_eq!(read_bundle(&values, &r), 42);
    }

    #[test]
    fn unsigned_comparators_agree_with_integer_order() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 5, 8);
        let b = const_bundle(&mut alloc, &mut special, 9, 8);
        let lt = compare_lt_unsigned(&mut alloc, &mut special, &a, &b);
        let gt = compare_gt_unsigned(&mut alloc, &mut special, &a, &b);
        let eq = compare_eq(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert!(values[&lt]);
        assert!(!values[&gt]);
        assert!(!values[&eq]);
    }

    #[test]
    fn mux_selects_correct_operand() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 0b1010, 4);
        let b = const_bundle(&mut alloc, &mut special, 0b0101, 4);
        let sel_true = special.one(&mut alloc);
        let sel_false = special.zero(&mut alloc);

        let picked_a = mux(&mut alloc, &mut special, sel_true, &a, &b);
        let picked_b = mux(&mut alloc, &mut special, sel_false, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &picked_a), 0b1010);
        assert_eq!(read_bundle(&values, &picked_b), 0b0101);
    }

    #[test]
    fn select_indexed_picks_matching_element() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let elements: Vec<Vec<WireId>> = (0..4u64)
            .map(|v| const_bundle(&mut alloc, &mut special, v * 10, 8))
            .collect();
        // index = 2 (little-endian: bit0=0, bit1=1)
        let idx = vec![special.zero(&mut alloc), special.one(&mut alloc)];
        let picked = select_indexed(&mut alloc, &mut special, &elements, &idx);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &picked), 20);
    }

    #[test]
    fn hamming_distance_counts_differing_bits() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 0b1111_0000, 8);
        let b = const_bundle(&mut alloc, &mut special, 0b1010_1010, 8);
        let dist = hamming_distance(&mut alloc, &mut special, &a, &b);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &dist), (0b1111_0000u32 ^ 0b1010_1010).count_ones() as u64);
    }

    #[test]
    fn shifts_are_pure_rewiring() {
        let mut alloc = WireAllocator::new();
        let mut special = SpecialWires::new();
        let a = const_bundle(&mut alloc, &mut special, 0b0011, 8);
        let left = shift_left_const(&mut alloc, &mut special, &a, 2);
        let right = shift_right_const(&mut alloc, &mut special, &a, 1);

        let values = evaluate_direct(&alloc, &AHashMap::new());
        assert_eq!(read_bundle(&values, &left), 0b0011 << 2);
        assert_eq!(read_bundle(&values, &right), 0b0011 >> 1);
    }
}
