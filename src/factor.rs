use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::index::IndexFor;
use crate::prob::{DistType, NormType, Prob};
use crate::var::{Var, VarSet};

/// A nonnegative function over the joint states of a set of discrete
/// variables, stored as a flat value vector indexed by the linear code of
/// its [`VarSet`].
///
/// The value vector always has exactly `vars().nr_states()` entries.
/// Pointwise arithmetic between factors over different variable sets is
/// defined on the union set; both operands are read through an [`IndexFor`]
/// cursor into the union. Sum and difference require identical sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    vs: VarSet,
    p: Prob,
}

impl Factor {
    /// Uniform factor over `vs`.
    pub fn uniform(vs: VarSet) -> Self {
        let n = vs.nr_states();
        Self {
            vs,
            p: Prob::uniform(n),
        }
    }

    /// Factor over `vs` with every entry set to `value`.
    pub fn filled(vs: VarSet, value: f64) -> Self {
        let n = vs.nr_states();
        Self {
            vs,
            p: Prob::filled(n, value),
        }
    }

    /// Factor over no variables holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self::filled(VarSet::new(), value)
    }

    pub fn from_prob(vs: VarSet, p: Prob) -> Self {
        assert_eq!(vs.nr_states(), p.len(), "value vector does not match the joint state space");
        Self { vs, p }
    }

    pub fn vars(&self) -> &VarSet {
        &self.vs
    }

    pub fn p(&self) -> &Prob {
        &self.p
    }

    pub fn p_mut(&mut self) -> &mut Prob {
        &mut self.p
    }

    /// Number of joint states, equal to the length of the value vector.
    pub fn states(&self) -> usize {
        self.p.len()
    }

    pub fn fill(&mut self, value: f64) {
        self.p.fill(value);
    }

    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        self.p.randomize(rng);
    }

    pub fn log(&self, zero: bool) -> Self {
        Self {
            vs: self.vs.clone(),
            p: self.p.log(zero),
        }
    }

    pub fn exp(&self) -> Self {
        Self {
            vs: self.vs.clone(),
            p: self.p.exp(),
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            vs: self.vs.clone(),
            p: self.p.abs(),
        }
    }

    pub fn inverse(&self, zero: bool) -> Self {
        Self {
            vs: self.vs.clone(),
            p: self.p.inverse(zero),
        }
    }

    pub fn pow(&self, a: f64) -> Self {
        Self {
            vs: self.vs.clone(),
            p: self.p.pow(a),
        }
    }

    pub fn make_zero(&mut self, epsilon: f64) {
        self.p.make_zero(epsilon);
    }

    pub fn make_positive(&mut self, epsilon: f64) {
        self.p.make_positive(epsilon);
    }

    pub fn normalize(&mut self, norm: NormType) -> f64 {
        self.p.normalize(norm)
    }

    pub fn normalized(&self, norm: NormType) -> Self {
        Self {
            vs: self.vs.clone(),
            p: self.p.normalized(norm),
        }
    }

    pub fn has_nans(&self) -> bool {
        self.p.has_nans()
    }

    pub fn has_negatives(&self) -> bool {
        self.p.has_negatives()
    }

    pub fn total_sum(&self) -> f64 {
        self.p.total_sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.p.max_abs()
    }

    pub fn max_val(&self) -> f64 {
        self.p.max()
    }

    pub fn min_val(&self) -> f64 {
        self.p.min()
    }

    pub fn entropy(&self) -> f64 {
        self.p.entropy()
    }

    /// Sums out every variable not in `ns`. The result ranges over the
    /// intersection of `ns` with this factor's variables.
    pub fn marginal(&self, ns: &VarSet, normed: bool) -> Self {
        let res_vs = ns & &self.vs;
        let mut p = Prob::zeros(res_vs.nr_states());
        for (i, i_res) in IndexFor::new(&res_vs, &self.vs).enumerate() {
            p[i_res] += self.p[i];
        }
        let mut res = Self::from_prob(res_vs, p);
        if normed {
            res.normalize(NormType::Prob);
        }
        res
    }

    /// Fixes the variables of `ns` to the joint state `ns_state` and
    /// returns the restriction to the remaining variables. `ns` must be
    /// contained in this factor's variables.
    pub fn slice(&self, ns: &VarSet, ns_state: usize) -> Self {
        assert!(ns.is_subset_of(&self.vs));
        assert!(ns_state < ns.nr_states());
        let rem = &self.vs - ns;
        let mut p = Prob::zeros(rem.nr_states());
        let cursors = IndexFor::new(ns, &self.vs).zip(IndexFor::new(&rem, &self.vs));
        for (i, (i_ns, i_rem)) in cursors.enumerate() {
            if i_ns == ns_state {
                p[i_rem] = self.p[i];
            }
        }
        Self::from_prob(rem, p)
    }

    /// Extends this factor to the larger set `ns` without changing its
    /// value on any joint state.
    pub fn embed(&self, ns: &VarSet) -> Self {
        assert!(self.vs.is_subset_of(ns));
        if self.vs == *ns {
            self.clone()
        } else {
            self * &Factor::filled(ns - &self.vs, 1.0)
        }
    }

    /// Interaction strength between two of this factor's variables,
    /// `tanh(log(M) / 4)` with `M` the extremal product of slice ratios.
    pub fn strength(&self, i: &Var, j: &Var) -> f64 {
        assert!(self.vs.contains(i));
        assert!(self.vs.contains(j));
        assert!(i != j);
        let ij: VarSet = [*i, *j].into_iter().collect();
        // encode through the set's own linear code rather than spelling
        // out strides, so the label order stays authoritative
        let enc = |a: usize, b: usize| {
            if i < j {
                ij.calc_state(&[a, b])
            } else {
                ij.calc_state(&[b, a])
            }
        };
        let mut max = 0.0f64;
        for alpha1 in 0..i.states() {
            for alpha2 in 0..i.states() {
                if alpha2 == alpha1 {
                    continue;
                }
                for beta1 in 0..j.states() {
                    for beta2 in 0..j.states() {
                        if beta2 == beta1 {
                            continue;
                        }
                        let f1 = (&self.slice(&ij, enc(alpha1, beta1))
                            / &self.slice(&ij, enc(alpha2, beta1)))
                            .max_val();
                        let f2 = (&self.slice(&ij, enc(alpha2, beta2))
                            / &self.slice(&ij, enc(alpha1, beta2)))
                            .max_val();
                        max = max.max(f1 * f2);
                    }
                }
            }
        }
        (0.25 * max.ln()).tanh()
    }

    /// Pointwise combination on the union of the variable sets.
    fn join(&self, g: &Factor, op: impl Fn(f64, f64) -> f64) -> Factor {
        let vs = &self.vs | &g.vs;
        let mut p = Prob::zeros(vs.nr_states());
        let cursors = IndexFor::new(&self.vs, &vs).zip(IndexFor::new(&g.vs, &vs));
        for (r, (i1, i2)) in cursors.enumerate() {
            p[r] = op(self.p[i1], g.p[i2]);
        }
        Factor::from_prob(vs, p)
    }
}

impl Mul<&Factor> for &Factor {
    type Output = Factor;

    fn mul(self, g: &Factor) -> Factor {
        if self.vs == g.vs {
            let mut r = self.clone();
            r.p *= &g.p;
            r
        } else {
            self.join(g, |x, y| x * y)
        }
    }
}

impl Div<&Factor> for &Factor {
    type Output = Factor;

    /// Pointwise quotient with `x / 0 = 0`.
    fn div(self, g: &Factor) -> Factor {
        if self.vs == g.vs {
            let mut r = self.clone();
            r.p /= &g.p;
            r
        } else {
            self.join(g, |x, y| if y == 0.0 { 0.0 } else { x / y })
        }
    }
}

impl MulAssign<&Factor> for Factor {
    fn mul_assign(&mut self, g: &Factor) {
        if self.vs == g.vs {
            self.p *= &g.p;
        } else {
            *self = &*self * g;
        }
    }
}

impl DivAssign<&Factor> for Factor {
    fn div_assign(&mut self, g: &Factor) {
        if self.vs == g.vs {
            self.p /= &g.p;
        } else {
            *self = &*self / g;
        }
    }
}

impl Add<&Factor> for &Factor {
    type Output = Factor;

    fn add(self, g: &Factor) -> Factor {
        assert_eq!(self.vs, g.vs, "factor sum needs identical variable sets");
        let mut r = self.clone();
        r.p += &g.p;
        r
    }
}

impl Sub<&Factor> for &Factor {
    type Output = Factor;

    fn sub(self, g: &Factor) -> Factor {
        assert_eq!(self.vs, g.vs, "factor difference needs identical variable sets");
        let mut r = self.clone();
        r.p -= &g.p;
        r
    }
}

impl AddAssign<f64> for Factor {
    fn add_assign(&mut self, t: f64) {
        self.p += t;
    }
}

impl SubAssign<f64> for Factor {
    fn sub_assign(&mut self, t: f64) {
        self.p -= t;
    }
}

impl MulAssign<f64> for Factor {
    fn mul_assign(&mut self, t: f64) {
        self.p *= t;
    }
}

impl DivAssign<f64> for Factor {
    fn div_assign(&mut self, t: f64) {
        self.p /= t;
    }
}

impl Mul<f64> for &Factor {
    type Output = Factor;

    fn mul(self, t: f64) -> Factor {
        let mut r = self.clone();
        r *= t;
        r
    }
}

impl Div<f64> for &Factor {
    type Output = Factor;

    fn div(self, t: f64) -> Factor {
        let mut r = self.clone();
        r /= t;
        r
    }
}

impl Index<usize> for Factor {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.p[i]
    }
}

impl IndexMut<usize> for Factor {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.p[i]
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} <{} >)", self.vs, self.p.iter().format(" "))
    }
}

/// Distance between two factors over the same variables. Factors over
/// empty sets compare as `-1` by convention.
pub fn dist(f: &Factor, g: &Factor, dt: DistType) -> f64 {
    if f.vars().is_empty() || g.vars().is_empty() {
        return -1.0;
    }
    debug_assert_eq!(f.vs, g.vs);
    crate::prob::dist(&f.p, &g.p, dt)
}

/// Mutual information between the two variables of a pairwise factor,
/// under the normalized distribution the factor defines.
pub fn mutual_info(f: &Factor) -> f64 {
    assert_eq!(f.vars().len(), 2);
    let mut vars = f.vars().iter();
    let i = *vars.next().unwrap();
    let j = *vars.next().unwrap();
    let projection = &f.marginal(&VarSet::from(i), true) * &f.marginal(&VarSet::from(j), true);
    dist(&f.normalized(NormType::Prob), &projection, DistType::Kl)
}
