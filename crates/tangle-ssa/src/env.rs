//! Environments and lazy merge-selects (§4.4.1, §9 "φ via Select").
//!
//! An [`Environment`] is a flat, last-write-wins binding list, cheap to
//! clone: cloning deep-copies the binding vector but every binding is
//! either a plain [`ValueId`] (already `Copy`) or an `Rc` to shared
//! [`SelectData`] (§9 "Ownership of values" — cloning an environment shares
//! values, it does not duplicate them).

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::ValueId;
use tangle_types::Info;

/// A binding not yet forced to a single value: the classic SSA φ-node,
/// represented lazily so two structurally-identical merges collapse to one
/// `phi` instruction instead of one per read (§9).
#[derive(Debug)]
pub struct SelectData {
    pub cond: ValueId,
    pub ty: Info,
    pub t: BoundValue,
    pub f: BoundValue,
    /// Populated the first time this Select is materialized; every
    /// subsequent read returns the cached value instead of emitting
    /// another `phi`.
    pub resolved: Option<ValueId>,
}

#[derive(Clone, Debug)]
pub enum BoundValue {
    Concrete(ValueId),
    Select(Rc<RefCell<SelectData>>),
}

impl BoundValue {
    pub fn select(cond: ValueId, ty: Info, t: BoundValue, f: BoundValue) -> Self {
        BoundValue::Select(Rc::new(RefCell::new(SelectData { cond, ty, t, f, resolved: None })))
    }
}

/// Structural equality used by merge to decide whether two bindings need a
/// new Select at all (§8: "identical bindings resolve to no instruction").
pub fn bound_values_equal(a: &BoundValue, b: &BoundValue) -> bool {
    match (a, b) {
        (BoundValue::Concrete(x), BoundValue::Concrete(y)) => x == y,
        (BoundValue::Select(x), BoundValue::Select(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

#[derive(Clone, Debug, Default)]
pub struct Environment {
    /// Last-write-wins; scanned from the end on lookup so a shadowing
    /// definition in a narrower scope is found before an outer one.
    entries: Vec<(String, BoundValue)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: BoundValue) {
        self.entries.push((name.into(), value));
    }

    pub fn lookup(&self, name: &str) -> Option<&BoundValue> {
        self.entries.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Every distinct name currently bound, most-recent binding only.
    fn live_names(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for (name, _) in self.entries.iter().rev() {
            if !seen.contains(&name.as_str()) {
                seen.push(name.as_str());
            }
        }
        seen
    }

    /// Merges two branch environments that diverged from a common parent at
    /// `cond` (§4.4.1). Only names bound on both sides survive into the
    /// merged environment — a name a single branch introduced does not
    /// escape its own scope.
    pub fn merge(cond: ValueId, then_env: &Environment, else_env: &Environment, ty_of: impl Fn(&BoundValue) -> Info) -> Environment {
        let mut merged = Environment::new();
        for name in then_env.live_names() {
            let Some(else_bound) = else_env.lookup(name) else { continue };
            let then_bound = then_env.lookup(name).expect("live_names came from then_env");
            let bound = if bound_values_equal(then_bound, else_bound) {
                then_bound.clone()
            } else {
                BoundValue::select(cond, ty_of(then_bound), then_bound.clone(), else_bound.clone())
            };
            merged.define(name, bound);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_most_recent_binding() {
        let mut env = Environment::new();
        env.define("x", BoundValue::Concrete(ValueId(0)));
        env.define("x", BoundValue::Concrete(ValueId(1)));
        assert!(matches!(env.lookup("x"), Some(BoundValue::Concrete(ValueId(1)))));
    }

    #[test]
    fn merge_keeps_identical_bindings_without_a_select() {
        let mut then_env = Environment::new();
        then_env.define("x", BoundValue::Concrete(ValueId(5)));
        let mut else_env = Environment::new();
        else_env.define("x", BoundValue::Concrete(ValueId(5)));
        let merged = Environment::merge(ValueId(99), &then_env, &else_env, |_| Info::bool());
        assert!(matches!(merged.lookup("x"), Some(BoundValue::Concrete(ValueId(5)))));
    }

    #[test]
    fn merge_builds_a_select_for_divergent_bindings() {
        let mut then_env = Environment::new();
        then_env.define("x", BoundValue::Concrete(ValueId(1)));
        let mut else_env = Environment::new();
        else_env.define("x", BoundValue::Concrete(ValueId(2)));
        let merged = Environment::merge(ValueId(99), &then_env, &else_env, |_| Info::signed(8));
        assert!(matches!(merged.lookup("x"), Some(BoundValue::Select(_))));
    }

    #[test]
    fn merge_drops_names_not_bound_on_both_sides() {
        let mut then_env = Environment::new();
        then_env.define("x", BoundValue::Concrete(ValueId(1)));
        then_env.define("y", BoundValue::Concrete(ValueId(2)));
        let else_env = Environment::new();
        let merged = Environment::merge(ValueId(99), &then_env, &else_env, |_| Info::signed(8));
        assert!(merged.lookup("x").is_none());
        assert!(merged.lookup("y").is_none());
    }
}
