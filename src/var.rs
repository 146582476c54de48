use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, Sub};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A discrete random variable with a stable integer label and a number of
/// states.
///
/// Identity, ordering and hashing use the label alone, so a variable can be
/// looked up in a graph or a set without knowing its state count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Var {
    label: usize,
    states: usize,
}

impl Var {
    pub fn new(label: usize, states: usize) -> Self {
        assert!(states >= 1, "a variable needs at least one state");
        Self { label, states }
    }

    pub fn label(&self) -> usize {
        self.label
    }

    /// Size of the state space of this variable.
    pub fn states(&self) -> usize {
        self.states
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for Var {}

impl PartialOrd for Var {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Var {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label.cmp(&other.label)
    }
}

impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.label)
    }
}

/// An ordered set of variables, kept sorted by ascending label with no
/// duplicates.
///
/// The set defines a linear code over the joint state space of its members:
/// an assignment `(s_0, ..., s_{k-1})` in label order maps to
/// `sum_i s_i * prod_{j<i} states_j`. The smallest label is the fastest
/// varying dimension. All factor storage in this crate is laid out in this
/// code, so the mapping here is the single source of truth for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarSet {
    vars: Vec<Var>,
}

impl VarSet {
    /// The empty set. Its joint state space has exactly one state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Var> {
        self.vars.iter()
    }

    pub fn contains(&self, n: &Var) -> bool {
        self.vars.binary_search(n).is_ok()
    }

    pub fn insert(&mut self, n: Var) {
        if let Err(pos) = self.vars.binary_search(&n) {
            self.vars.insert(pos, n);
        }
    }

    /// Number of joint states, the product of the member state counts.
    pub fn nr_states(&self) -> usize {
        self.vars.iter().map(|v| v.states()).product()
    }

    pub fn is_subset_of(&self, other: &VarSet) -> bool {
        self.vars.iter().all(|v| other.contains(v))
    }

    pub fn is_superset_of(&self, other: &VarSet) -> bool {
        other.is_subset_of(self)
    }

    /// Linear index of a joint assignment, given in ascending label order.
    pub fn calc_state(&self, states: &[usize]) -> usize {
        debug_assert_eq!(states.len(), self.vars.len());
        let mut ls = 0;
        let mut stride = 1;
        for (v, &s) in self.vars.iter().zip(states.iter()) {
            debug_assert!(s < v.states());
            ls += s * stride;
            stride *= v.states();
        }
        ls
    }

    /// Inverse of [`calc_state`](Self::calc_state): decodes a linear index
    /// into the per-variable states in ascending label order.
    pub fn calc_states(&self, mut ls: usize) -> Vec<usize> {
        debug_assert!(ls < self.nr_states());
        let mut states = Vec::with_capacity(self.vars.len());
        for v in self.vars.iter() {
            states.push(ls % v.states());
            ls /= v.states();
        }
        states
    }
}

impl From<Var> for VarSet {
    fn from(n: Var) -> Self {
        Self { vars: vec![n] }
    }
}

impl FromIterator<Var> for VarSet {
    fn from_iter<I: IntoIterator<Item = Var>>(iter: I) -> Self {
        let mut vars: Vec<Var> = iter.into_iter().collect();
        vars.sort_unstable();
        vars.dedup();
        Self { vars }
    }
}

impl BitOr<&VarSet> for &VarSet {
    type Output = VarSet;

    /// Set union.
    fn bitor(self, other: &VarSet) -> VarSet {
        self.vars.iter().chain(other.vars.iter()).copied().collect()
    }
}

impl BitAnd<&VarSet> for &VarSet {
    type Output = VarSet;

    /// Set intersection.
    fn bitand(self, other: &VarSet) -> VarSet {
        self.vars
            .iter()
            .filter(|v| other.contains(v))
            .copied()
            .collect()
    }
}

impl Sub<&VarSet> for &VarSet {
    type Output = VarSet;

    /// Set difference, the members of `self` not in `other`.
    fn sub(self, other: &VarSet) -> VarSet {
        self.vars
            .iter()
            .filter(|v| !other.contains(v))
            .copied()
            .collect()
    }
}

impl fmt::Display for VarSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.vars.iter().format(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vs(labels_states: &[(usize, usize)]) -> VarSet {
        labels_states
            .iter()
            .map(|&(l, s)| Var::new(l, s))
            .collect()
    }

    #[test]
    fn set_ops_keep_order() {
        let a = vs(&[(0, 2), (2, 3)]);
        let b = vs(&[(1, 2), (2, 3)]);
        let u = &a | &b;
        assert_eq!(
            u.iter().map(|v| v.label()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!((&a & &b).len(), 1);
        assert_eq!((&a - &b).iter().next().unwrap().label(), 0);
        assert!(a.is_subset_of(&u));
        assert!(u.is_superset_of(&b));
    }

    #[test]
    fn empty_set_has_one_state() {
        assert_eq!(VarSet::new().nr_states(), 1);
    }

    #[test]
    fn calc_state_roundtrip() {
        let s = vs(&[(0, 2), (1, 3), (5, 4)]);
        assert_eq!(s.nr_states(), 24);
        for ls in 0..s.nr_states() {
            assert_eq!(s.calc_state(&s.calc_states(ls)), ls);
        }
        // smallest label varies fastest
        assert_eq!(s.calc_state(&[1, 0, 0]), 1);
        assert_eq!(s.calc_state(&[0, 1, 0]), 2);
        assert_eq!(s.calc_state(&[0, 0, 1]), 6);
    }

    #[test]
    fn display_form() {
        let s = vs(&[(3, 2), (1, 2)]);
        assert_eq!(format!("{}", s), "{x1,x3}");
    }
}
