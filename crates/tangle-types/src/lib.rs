//! Type descriptors (§4.1): `Info` describes every value type the core
//! knows about — sized integers, `bool`, `string`, arrays, slices, structs,
//! and pointers — along with the four operations that drive assignment and
//! generic-parameter resolution: [`parse`], [`equal`], [`can_assign`] /
//! [`can_assign_value`], and [`instantiate`].
//!
//! This crate has no notion of SSA values or constants; it only describes
//! shapes. [`AssignSource`] is the narrow seam `tangle-ssa`'s `Value` hooks
//! into so `can_assign_value` can ask "is this concrete or constant?"
//! without this crate depending on the value table that answers it.

use std::fmt;

/// The closed set of type shapes a value can have (§4.1, §3).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Tag {
    Undefined,
    Bool,
    Signed,
    Unsigned,
    Float,
    String,
    Struct,
    Array,
    Slice,
    Pointer,
}

/// One named field of a struct type, at a known bit offset within the
/// struct's packed layout.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub info: Info,
    pub offset: u32,
}

/// A type descriptor (§3 "Info").
///
/// Invariants enforced by the constructors in this module (not by a
/// validating parser layered on top — callers who build `Info` values by
/// hand, e.g. `tangle-ssa`'s struct-literal lowering, must preserve them):
/// concrete ⇒ `bits > 0`; `min_bits <= bits`; array `bits = size *
/// elem.bits`; struct `bits = sum(field.bits)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Info {
    pub tag: Tag,
    pub bits: u32,
    pub min_bits: u32,
    pub is_concrete: bool,
    pub elem: Option<Box<Info>>,
    pub array_size: Option<u32>,
    pub fields: Option<Vec<Field>>,
    pub container: Option<Box<Info>>,
}

impl Info {
    fn base(tag: Tag, bits: u32, is_concrete: bool) -> Self {
        Self {
            tag,
            bits,
            min_bits: bits,
            is_concrete,
            elem: None,
            array_size: None,
            fields: None,
            container: None,
        }
    }

    pub fn undefined() -> Self {
        Self::base(Tag::Undefined, 0, false)
    }

    pub fn bool() -> Self {
        Self::base(Tag::Bool, 1, true)
    }

    /// A signed integer of `bits` width, or an un-concretised template when
    /// `bits == 0`.
    pub fn signed(bits: u32) -> Self {
        Self::base(Tag::Signed, bits, bits > 0)
    }

    pub fn unsigned(bits: u32) -> Self {
        Self::base(Tag::Unsigned, bits, bits > 0)
    }

    pub fn float(bits: u32) -> Self {
        Self::base(Tag::Float, bits, bits > 0)
    }

    pub fn string() -> Self {
        Self::base(Tag::String, 0, true)
    }

    /// A constant's minimal (smallest lossless) width, distinct from its
    /// declared `bits`; used by literal folding to report `min_bits` without
    /// forcing `bits` to shrink.
    pub fn with_min_bits(mut self, min_bits: u32) -> Self {
        self.min_bits = min_bits;
        self
    }

    /// Arrays are always concrete: their size is part of the spec (§4.1).
    pub fn array(elem: Info, size: u32) -> Self {
        let bits = elem.bits * size;
        let min_bits = bits;
        Self {
            tag: Tag::Array,
            bits,
            min_bits,
            is_concrete: true,
            elem: Some(Box::new(elem)),
            array_size: Some(size),
            fields: None,
            container: None,
        }
    }

    pub fn slice(elem: Info) -> Self {
        Self {
            tag: Tag::Slice,
            bits: 0,
            min_bits: 0,
            is_concrete: false,
            elem: Some(Box::new(elem)),
            array_size: None,
            fields: None,
            container: None,
        }
    }

    pub fn struct_(fields: Vec<Field>) -> Self {
        let bits = fields.iter().map(|f| f.info.bits).sum();
        Self {
            tag: Tag::Struct,
            bits,
            min_bits: bits,
            is_concrete: true,
            elem: None,
            array_size: None,
            fields: Some(fields),
            container: None,
        }
    }

    pub fn pointer(elem: Info) -> Self {
        Self {
            tag: Tag::Pointer,
            bits: 0,
            min_bits: 0,
            is_concrete: false,
            elem: Some(Box::new(elem)),
            array_size: None,
            fields: None,
            container: None,
        }
    }

    pub fn with_container(mut self, container: Info) -> Self {
        self.container = Some(Box::new(container));
        self
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.tag, Tag::Signed | Tag::Unsigned | Tag::Float)
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Tag::Undefined => write!(f, "undefined"),
            Tag::Bool => write!(f, "bool"),
            Tag::Signed => write!(f, "int{}", self.bits),
            Tag::Unsigned => write!(f, "uint{}", self.bits),
            Tag::Float => write!(f, "float{}", self.bits),
            Tag::String => write!(f, "string"),
            Tag::Struct => write!(f, "struct{{{} fields}}", self.fields.as_ref().map_or(0, Vec::len)),
            Tag::Array => write!(f, "[{}]{}", self.array_size.unwrap_or(0), self.elem.as_deref().unwrap()),
            Tag::Slice => write!(f, "[]{}", self.elem.as_deref().unwrap()),
            Tag::Pointer => write!(f, "*{}", self.elem.as_deref().unwrap()),
        }
    }
}

/// Parse error for [`parse`].
#[derive(Debug, thiserror::Error)]
pub enum TypeSpecError {
    #[error("type spec: empty input")]
    Empty,
    #[error("type spec: unrecognized shape {0:?}")]
    Unrecognized(String),
    #[error("type spec: invalid digits in {0:?}")]
    InvalidDigits(String),
    #[error("type spec: array element type must be concrete in {0:?}")]
    NonConcreteElement(String),
}

/// Parses a type spec of the shape `bool|byte|rune|(int|uint|string)<digits>?
/// |[<digits>]<elem-spec>` (§4.1).
///
/// `byte` is `uint8`; `rune` is `int32`. Omitted digits on `int`/`uint`
/// produce an un-concretised template (`bits = 0`). Arrays are always
/// concrete, so the element spec must itself resolve to a concrete `Info`.
pub fn parse(spec: &str) -> Result<Info, TypeSpecError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(TypeSpecError::Empty);
    }
    match spec {
        "bool" => return Ok(Info::bool()),
        "byte" => return Ok(Info::unsigned(8)),
        "rune" => return Ok(Info::signed(32)),
        "string" => return Ok(Info::string()),
        _ => {}
    }
    if let Some(rest) = spec.strip_prefix('[') {
        let close = rest.find(']').ok_or_else(|| TypeSpecError::Unrecognized(spec.to_string()))?;
        let (digits, elem_spec) = rest.split_at(close);
        let elem_spec = &elem_spec[1..];
        let size: u32 = digits.parse().map_err(|_| TypeSpecError::InvalidDigits(spec.to_string()))?;
        let elem = parse(elem_spec)?;
        if !elem.is_concrete {
            return Err(TypeSpecError::NonConcreteElement(spec.to_string()));
        }
        return Ok(Info::array(elem, size));
    }
    for (prefix, ctor) in [("int", Info::signed as fn(u32) -> Info), ("uint", Info::unsigned as fn(u32) -> Info)] {
        if let Some(digits) = spec.strip_prefix(prefix) {
            if digits.is_empty() {
                return Ok(ctor(0));
            }
            let bits: u32 = digits.parse().map_err(|_| TypeSpecError::InvalidDigits(spec.to_string()))?;
            return Ok(ctor(bits));
        }
    }
    Err(TypeSpecError::Unrecognized(spec.to_string()))
}

/// Structural equality: same tag, same bits, and (recursively) same element/
/// field/container shapes. `min_bits` and `is_concrete` are not compared —
/// they describe provenance, not shape.
pub fn equal(a: &Info, b: &Info) -> bool {
    if a.tag != b.tag {
        return false;
    }
    match a.tag {
        Tag::Array => a.array_size == b.array_size && elem_equal(a, b),
        Tag::Slice | Tag::Pointer => elem_equal(a, b),
        Tag::Struct => fields_equal(a.fields.as_deref(), b.fields.as_deref()),
        _ => a.bits == b.bits,
    }
}

fn elem_equal(a: &Info, b: &Info) -> bool {
    match (&a.elem, &b.elem) {
        (Some(ea), Some(eb)) => equal(ea, eb),
        (None, None) => true,
        _ => false,
    }
}

fn fields_equal(a: Option<&[Field]>, b: Option<&[Field]>) -> bool {
    match (a, b) {
        (Some(fa), Some(fb)) => {
            fa.len() == fb.len() && fa.iter().zip(fb.iter()).all(|(x, y)| x.name == y.name && equal(&x.info, &y.info))
        }
        (None, None) => true,
        _ => false,
    }
}

/// Can a constant of type `rhs` be assigned to a binding of type `lhs`?
/// (§4.1). Signed `lhs` additionally accepts unsigned constants, since an
/// unsigned constant's `min_bits` already proves it fits without a sign
/// change; every other shape requires an identical tag.
pub fn can_assign(lhs: &Info, rhs: &Info) -> bool {
    match lhs.tag {
        Tag::Signed => matches!(rhs.tag, Tag::Signed | Tag::Unsigned) && rhs.min_bits <= lhs.bits,
        _ => lhs.tag == rhs.tag && rhs.min_bits <= lhs.bits,
    }
}

/// Minimal seam a value-table entry implements so [`can_assign_value`] can
/// ask "is this a constant, and what's its type?" without this crate
/// depending on `tangle-ssa`'s `Value`.
pub trait AssignSource {
    fn is_const(&self) -> bool;
    fn info(&self) -> &Info;
}

/// Can `rhs` (constant or not) be assigned to a binding of type `lhs`?
/// (§4.1). Constants delegate to [`can_assign`]; non-constant values require
/// [`equal`] types, except that an array `lhs` accepts a pointer-to-array
/// `rhs` (transparently dereferenced) and a slice `lhs` accepts an array or
/// pointer-to-array `rhs` with a matching element type.
pub fn can_assign_value<T: AssignSource>(lhs: &Info, rhs: &T) -> bool {
    if rhs.is_const() {
        return can_assign(lhs, rhs.info());
    }
    let rinfo = rhs.info();
    if equal(lhs, rinfo) {
        return true;
    }
    match lhs.tag {
        Tag::Array => deref_array(rinfo).is_some_and(|arr| equal(lhs, arr)),
        Tag::Slice => {
            let Some(lhs_elem) = lhs.elem.as_deref() else {
                return false;
            };
            let array_elem_matches = |arr: &Info| arr.elem.as_deref().is_some_and(|e| equal(lhs_elem, e));
            (rinfo.tag == Tag::Array && array_elem_matches(rinfo)) || deref_array(rinfo).is_some_and(array_elem_matches)
        }
        _ => false,
    }
}

fn deref_array(info: &Info) -> Option<&Info> {
    if info.tag != Tag::Pointer {
        return None;
    }
    let pointee = info.elem.as_deref()?;
    (pointee.tag == Tag::Array).then_some(pointee)
}

/// Mutates `template` in place to adopt `concrete`'s size, returning whether
/// instantiation succeeded (§4.1).
///
/// An already-concrete template is left untouched; success then means
/// "already structurally equal to `concrete`", not "updated". Struct
/// templates never auto-instantiate, matching the source language's
/// generics, which only parametrise over scalar/array/slice shapes.
pub fn instantiate(template: &mut Info, concrete: &Info) -> bool {
    if template.is_concrete {
        return equal(template, concrete);
    }
    match template.tag {
        Tag::Signed => match concrete.tag {
            Tag::Signed => adopt_scalar(template, concrete),
            Tag::Unsigned if concrete.min_bits < concrete.bits => adopt_scalar(template, concrete),
            _ => false,
        },
        Tag::Array => {
            let Some(src) = (if concrete.tag == Tag::Pointer { deref_array(concrete) } else { Some(concrete) }) else {
                return false;
            };
            if src.tag != Tag::Array || src.array_size != template.array_size {
                return false;
            }
            let mut elem_template = template.elem.as_deref().cloned().unwrap_or_else(Info::undefined);
            if !instantiate(&mut elem_template, src.elem.as_deref().unwrap()) {
                return false;
            }
            *template = Info::array(elem_template, src.array_size.unwrap());
            true
        }
        Tag::Slice => {
            let src = match concrete.tag {
                Tag::Array => Some(concrete),
                Tag::Pointer => deref_array(concrete),
                _ => None,
            };
            let Some(src) = src else {
                return false;
            };
            let mut elem_template = template.elem.as_deref().cloned().unwrap_or_else(Info::undefined);
            if !instantiate(&mut elem_template, src.elem.as_deref().unwrap()) {
                return false;
            }
            template.elem = Some(Box::new(elem_template));
            true
        }
        Tag::Struct => false,
        _ => {
            if template.tag == concrete.tag {
                adopt_scalar(template, concrete)
            } else {
                false
            }
        }
    }
}

fn adopt_scalar(template: &mut Info, concrete: &Info) -> bool {
    template.bits = concrete.bits;
    template.min_bits = concrete.min_bits;
    template.is_concrete = true;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scalar_shapes() {
        assert_eq!(parse("bool").unwrap().tag, Tag::Bool);
        assert_eq!(parse("byte").unwrap(), Info::unsigned(8));
        assert_eq!(parse("rune").unwrap(), Info::signed(32));
        assert_eq!(parse("int32").unwrap(), Info::signed(32));
        assert_eq!(parse("uint").unwrap(), Info::unsigned(0));
        assert!(!parse("uint").unwrap().is_concrete);
    }

    #[test]
    fn parse_array_of_concrete_elements() {
        let info = parse("[4]int8").unwrap();
        assert_eq!(info.tag, Tag::Array);
        assert_eq!(info.array_size, Some(4));
        assert_eq!(info.bits, 32);
        assert!(info.is_concrete);
    }

    #[test]
    fn parse_rejects_non_concrete_array_element() {
        assert!(parse("[4]int").is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("whatever").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn equal_ignores_min_bits_and_concreteness() {
        let a = Info::signed(8).with_min_bits(3);
        let mut b = Info::signed(0);
        b.bits = 8;
        assert!(equal(&a, &b));
    }

    #[test]
    fn equal_compares_struct_fields_by_name_and_type() {
        let fa = vec![Field { name: "x".into(), info: Info::signed(8), offset: 0 }];
        let fb = vec![Field { name: "x".into(), info: Info::signed(8), offset: 0 }];
        assert!(equal(&Info::struct_(fa), &Info::struct_(fb)));
    }

    #[test]
    fn can_assign_signed_accepts_narrower_unsigned_const() {
        let lhs = Info::signed(16);
        let rhs = Info::unsigned(8).with_min_bits(8);
        assert!(can_assign(&lhs, &rhs));
    }

    #[test]
    fn can_assign_rejects_wider_constant() {
        let lhs = Info::signed(8);
        let rhs = Info::signed(16).with_min_bits(16);
        assert!(!can_assign(&lhs, &rhs));
    }

    #[test]
    fn can_assign_requires_same_tag_outside_signed() {
        let lhs = Info::unsigned(8);
        let rhs = Info::signed(8).with_min_bits(8);
        assert!(!can_assign(&lhs, &rhs));
    }

    struct Fixture {
        is_const: bool,
        info: Info,
    }
    impl AssignSource for Fixture {
        fn is_const(&self) -> bool {
            self.is_const
        }
        fn info(&self) -> &Info {
            &self.info
        }
    }

    #[test]
    fn can_assign_value_array_accepts_pointer_to_array() {
        let lhs = Info::array(Info::signed(8), 4);
        let rhs = Fixture {
            is_const: false,
            info: Info::pointer(Info::array(Info::signed(8), 4)),
        };
        assert!(can_assign_value(&lhs, &rhs));
    }

    #[test]
    fn can_assign_value_array_rejects_mismatched_size() {
        let lhs = Info::array(Info::signed(8), 4);
        let rhs = Fixture {
            is_const: false,
            info: Info::pointer(Info::array(Info::signed(8), 5)),
        };
        assert!(!can_assign_value(&lhs, &rhs));
    }

    #[test]
    fn can_assign_value_slice_accepts_array_with_matching_element() {
        let lhs = Info::slice(Info::signed(8));
        let rhs = Fixture {
            is_const: false,
            info: Info::array(Info::signed(8), 10),
        };
        assert!(can_assign_value(&lhs, &rhs));
    }

    #[test]
    fn instantiate_signed_template_from_unsigned_proof_of_nonneg() {
        let mut template = Info::signed(0);
        let concrete = Info::unsigned(8).with_min_bits(7);
        assert!(instantiate(&mut template, &concrete));
        assert_eq!(template.bits, 8);
        assert!(template.is_concrete);
    }

    #[test]
    fn instantiate_signed_template_rejects_unsigned_that_might_be_negative() {
        let mut template = Info::signed(0);
        let concrete = Info::unsigned(8).with_min_bits(8);
        assert!(!instantiate(&mut template, &concrete));
        assert!(!template.is_concrete);
    }

    #[test]
    fn instantiate_struct_template_never_succeeds() {
        let mut template = Info::struct_(vec![]);
        template.is_concrete = false;
        let concrete = Info::struct_(vec![]);
        assert!(!instantiate(&mut template, &concrete));
    }

    #[test]
    fn instantiate_array_template_from_pointer_to_array() {
        let mut template = Info::array(Info::signed(0), 4);
        template.is_concrete = false;
        let concrete = Info::pointer(Info::array(Info::signed(16), 4));
        assert!(instantiate(&mut template, &concrete));
        assert_eq!(template.elem.unwrap().bits, 16);
    }
}
