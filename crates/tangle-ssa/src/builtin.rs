//! The three injected collaborators (§6 "Binding to external collaborators")
//! plus the `CompilerOptions` knobs this workspace's ambient configuration
//! layer adds on top of them, grounded on the teacher's
//! `GarblingInstanceConfig`/`ExecutionInstanceConfig` plain-struct-of-knobs
//! pattern (`crates/gobble/src/traits.rs`) rather than a builder or a
//! globally dispatched singleton.

use ahash::AHashMap;
use tangle_ast::Expr;
use tangle_circuit::emit::Circuit as EmittedCircuit;
use tangle_diag::{CompileError, ErrorLogger, SourceLoc};

use crate::generator::Generator;
use crate::value::{ConstPayload, ValueId};

/// §6: `builtin_registry` entries are only ever "function", but the tag is
/// kept (rather than collapsing to a single shape) so a future collaborator
/// kind doesn't require widening every call site's match.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuiltinKind {
    Function,
}

/// `ssa-lowerer`: called when the builtin appears in a position that must
/// produce SSA values (almost always — `size` is the one builtin whose
/// result is known to be constant up front, handled by `const_eval`
/// instead).
pub type SsaLowerer = fn(&mut Generator<'_>, &[Expr], SourceLoc) -> Result<Vec<ValueId>, CompileError>;

/// `const-evaluator`: an optional compile-time-only fast path. `size`
/// implements this since an array/slice's length is part of its `Info` and
/// never needs to reach the circuit at all.
pub type ConstEvaluator = fn(&Generator<'_>, &[Expr], SourceLoc) -> Result<Option<ConstPayload>, CompileError>;

#[derive(Clone, Copy)]
pub struct BuiltinDef {
    pub kind: BuiltinKind,
    pub lower: SsaLowerer,
    pub const_eval: Option<ConstEvaluator>,
}

/// The static `name → {kind, ssa-lowerer, const-evaluator}` table (§6).
/// Holds `make`, `size`, `native`, and any installed primitive functions
/// (`hamming`, ...); a host embedding this workspace can register
/// additional entries before compiling.
#[derive(Clone)]
pub struct BuiltinRegistry {
    defs: AHashMap<String, BuiltinDef>,
}

impl BuiltinRegistry {
    pub fn empty() -> Self {
        Self { defs: AHashMap::new() }
    }

    /// `make`, `size`, `native`, `hamming` — the builtins §6 names
    /// explicitly.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("make", BuiltinDef { kind: BuiltinKind::Function, lower: crate::generator::lower_make, const_eval: None });
        registry.register(
            "size",
            BuiltinDef { kind: BuiltinKind::Function, lower: crate::generator::lower_size, const_eval: Some(crate::generator::const_eval_size) },
        );
        registry.register("native", BuiltinDef { kind: BuiltinKind::Function, lower: crate::generator::lower_native, const_eval: None });
        registry.register("hamming", BuiltinDef { kind: BuiltinKind::Function, lower: crate::generator::lower_hamming, const_eval: None });
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, def: BuiltinDef) {
        self.defs.insert(name.into(), def);
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinDef> {
        self.defs.get(name)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Multiplier strategy and unrolling limits a host can tune per compile
/// (§4.4.3, §4.2's Karatsuba-vs-array choice, §9 open question 1: the
/// source's hard-coded `true` toggle becomes a real field here).
#[derive(Copy, Clone, Debug)]
pub struct CompilerOptions {
    /// When true, constant folding and the lowering driver prefer the
    /// Karatsuba multiplier above [`tangle_circuit::arith::KARATSUBA_THRESHOLD`]
    /// bits; when false, the array multiplier is used unconditionally
    /// (useful for the §8 Karatsuba-vs-array equivalence test).
    pub use_karatsuba: bool,
    /// Hard cap on `for`-loop iterations unrolled in a single compile, so a
    /// runaway non-terminating (but constant-controlled) loop fails with a
    /// diagnosable error instead of hanging the compiler.
    pub max_unroll_iterations: u64,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { use_karatsuba: true, max_unroll_iterations: 1_000_000 }
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn default_options_prefer_karatsuba_with_a_generous_unroll_cap() {
        let opts = CompilerOptions::default();
        assert!(opts.use_karatsuba);
        assert_eq!(opts.max_unroll_iterations, 1_000_000);
    }
}

/// The three collaborators (§6), injected rather than globally dispatched
/// so tests can supply fixtures (a silent logger, an in-memory circuit
/// table) in place of production implementations.
#[allow(missing_debug_implementations)] // holds trait objects/closures; no meaningful Debug rendering
pub struct Collaborators {
    pub error_logger: Box<dyn ErrorLogger>,
    pub native_circuit_loader: Box<dyn Fn(&str) -> Result<EmittedCircuit, CompileError>>,
    pub builtin_registry: BuiltinRegistry,
}

impl Collaborators {
    /// A silent logger, a loader that always fails (no real backing store),
    /// and the default builtin table — the fixture a test wires up when it
    /// doesn't exercise `native(...)`.
    pub fn for_testing() -> Self {
        Self {
            error_logger: Box::new(tangle_diag::SilentLogger),
            native_circuit_loader: Box::new(|path| Err(CompileError::resolution(SourceLoc::UNKNOWN, format!("no native circuit loader configured for {path:?}")))),
            builtin_registry: BuiltinRegistry::with_defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_exposes_the_four_named_builtins() {
        let registry = BuiltinRegistry::with_defaults();
        for name in ["make", "size", "native", "hamming"] {
            assert!(registry.get(name).is_some(), "expected builtin {name:?} to be registered");
        }
        assert!(registry.get("no_such_builtin").is_none());
    }

    #[test]
    fn empty_registry_has_no_builtins() {
        assert!(BuiltinRegistry::empty().get("make").is_none());
    }

    #[test]
    fn size_is_the_only_default_with_a_const_evaluator() {
        let registry = BuiltinRegistry::with_defaults();
        assert!(registry.get("size").unwrap().const_eval.is_some());
        assert!(registry.get("make").unwrap().const_eval.is_none());
        assert!(registry.get("native").unwrap().const_eval.is_none());
        assert!(registry.get("hamming").unwrap().const_eval.is_none());
    }

    #[test]
    fn for_testing_collaborators_native_loader_fails_closed() {
        let collaborators = Collaborators::for_testing();
        let err = (collaborators.native_circuit_loader)("anything.circ").unwrap_err();
        assert!(format!("{err}").contains("no native circuit loader"));
    }
}
