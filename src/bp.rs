//! Loopy belief propagation with parallel, sequential and residual
//! message schedules.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use num_complex::Complex64;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::factor::Factor;
use crate::graph::FactorGraph;
use crate::index::IndexFor;
use crate::prob::{dist, DistType, NormType, Prob};
use crate::properties::PropertySet;
use crate::utils::{with_progress, Diffs};
use crate::var::{Var, VarSet};
use crate::{Config, Error, InfAlg};

/// Message update schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateType {
    /// Propose every message, then commit every message.
    Parall,
    /// Propose and commit eagerly, in a fixed edge order.
    SeqFix,
    /// Propose and commit eagerly, in a freshly shuffled edge order each
    /// sweep.
    SeqRnd,
    /// Residual scheduling: always commit the edge whose proposal differs
    /// most from its committed message.
    SeqMax,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateType::Parall => "PARALL",
            UpdateType::SeqFix => "SEQFIX",
            UpdateType::SeqRnd => "SEQRND",
            UpdateType::SeqMax => "SEQMAX",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for UpdateType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "PARALL" => Ok(UpdateType::Parall),
            "SEQFIX" => Ok(UpdateType::SeqFix),
            "SEQRND" => Ok(UpdateType::SeqRnd),
            "SEQMAX" => Ok(UpdateType::SeqMax),
            _ => Err(()),
        }
    }
}

/// Options of the belief propagation solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpOptions {
    pub updates: UpdateType,
    /// Convergence threshold on the maximum belief change.
    pub tol: f64,
    /// Hard cap on the number of sweeps.
    pub max_iter: usize,
    /// Diagnostic verbosity.
    pub verbose: usize,
    /// Store messages as log probabilities.
    pub log_domain: bool,
    /// Seed of the solver's private random source.
    pub seed: u64,
}

impl Default for BpOptions {
    fn default() -> Self {
        Self {
            updates: UpdateType::SeqFix,
            tol: 1e-9,
            max_iter: 10_000,
            verbose: 0,
            log_domain: false,
            seed: 0,
        }
    }
}

impl BpOptions {
    /// Reads the required `updates`, `tol`, `maxiter`, `verbose` and
    /// `logdomain` properties, plus an optional `seed`.
    pub fn from_properties(ps: &PropertySet) -> Result<Self, Error> {
        Ok(Self {
            updates: ps.get_as("updates")?,
            tol: ps.get_as("tol")?,
            max_iter: ps.get_as("maxiter")?,
            verbose: ps.get_as("verbose")?,
            log_domain: ps.get_as("logdomain")?,
            seed: ps.get_or("seed", 0)?,
        })
    }
}

/// State attached to one edge, stored on the variable side.
#[derive(Debug, Clone)]
struct EdgeProp {
    /// Last committed message from the factor to the variable.
    message: Prob,
    /// Proposed message, waiting to be committed.
    new_message: Prob,
    /// For every linear state of the factor, the state of the variable.
    index: Vec<usize>,
    /// Priority score under residual scheduling.
    residual: f64,
}

/// Loopy belief propagation on a factor graph.
///
/// Per-edge messages are driven to a fixed point under one of four
/// schedules; variable and factor beliefs and a Bethe estimate of the log
/// partition function can be queried afterwards. Messages can be kept in
/// the linear or the log domain; the latter trades a little speed for
/// robustness on factors with a large dynamic range.
pub struct Bp {
    graph: Arc<FactorGraph>,
    opts: BpOptions,
    pub config: Config,
    /// Edge state, addressed as `edges[variable][neighbor ordinal]`.
    edges: Vec<Vec<EdgeProp>>,
    max_diff: f64,
    rng: Xoshiro256StarStar,
}

impl Bp {
    pub const NAME: &'static str = "BP";

    pub fn new(graph: Arc<FactorGraph>, opts: BpOptions) -> Self {
        let edges = (0..graph.nr_vars())
            .map(|i| {
                let states = graph.var(i).states();
                let single = VarSet::from(graph.var(i));
                graph
                    .nb_v(i)
                    .iter()
                    .map(|nb| EdgeProp {
                        message: Prob::filled(states, 1.0),
                        new_message: Prob::filled(states, 1.0),
                        index: IndexFor::new(&single, graph.factor(nb.node).vars()).collect(),
                        residual: 0.0,
                    })
                    .collect()
            })
            .collect();
        let rng = Xoshiro256StarStar::seed_from_u64(opts.seed);
        let mut bp = Self {
            graph,
            opts,
            config: Config::default(),
            edges,
            max_diff: 0.0,
            rng,
        };
        bp.init();
        bp
    }

    pub fn graph(&self) -> &Arc<FactorGraph> {
        &self.graph
    }

    pub fn options(&self) -> &BpOptions {
        &self.opts
    }

    /// Identity element of the message domain.
    fn identity(&self) -> f64 {
        if self.opts.log_domain {
            0.0
        } else {
            1.0
        }
    }

    /// Resets every message and residual.
    pub fn init(&mut self) {
        let c = self.identity();
        for var_edges in self.edges.iter_mut() {
            for ep in var_edges.iter_mut() {
                ep.message.fill(c);
                ep.new_message.fill(c);
                ep.residual = 0.0;
            }
        }
        self.rng = Xoshiro256StarStar::seed_from_u64(self.opts.seed);
    }

    /// Resets only the messages on edges incident to the given variables.
    pub fn init_vars(&mut self, ns: &VarSet) {
        let c = self.identity();
        for n in ns.iter() {
            let i = self.graph.find_var(n);
            for ep in self.edges[i].iter_mut() {
                ep.message.fill(c);
                ep.new_message.fill(c);
                ep.residual = 0.0;
            }
        }
    }

    /// Proposes an updated message from the factor behind neighbor `ni`
    /// of variable `i`.
    fn calc_new_message(&mut self, i: usize, ni: usize) {
        let graph = self.graph.clone();
        let fac = graph.nb_v(i)[ni].node;
        let log_domain = self.opts.log_domain;

        let mut prod = graph.factor(fac).p().clone();
        if log_domain {
            prod.take_log(false);
        }

        // fold in the messages of every other variable of the factor
        for j in graph.nb_f(fac) {
            if j.node == i {
                continue;
            }
            // product of the messages flowing into j from elsewhere
            let mut prod_j = Prob::filled(graph.var(j.node).states(), self.identity());
            for jj in graph.nb_v(j.node) {
                if jj.node != fac {
                    if log_domain {
                        prod_j += &self.edges[j.node][jj.iter].message;
                    } else {
                        prod_j *= &self.edges[j.node][jj.iter].message;
                    }
                }
            }
            let ind = &self.edges[j.node][j.dual].index;
            for r in 0..prod.len() {
                if log_domain {
                    prod[r] += prod_j[ind[r]];
                } else {
                    prod[r] *= prod_j[ind[r]];
                }
            }
        }
        if log_domain {
            let m = prod.max();
            prod -= m;
            prod.take_exp();
        }

        // marginalize onto the receiving variable
        let mut marg = Prob::zeros(graph.var(i).states());
        {
            let ind = &self.edges[i][ni].index;
            for r in 0..prod.len() {
                marg[ind[r]] += prod[r];
            }
        }
        marg.normalize(NormType::Prob);
        if log_domain {
            marg.take_log(false);
        }
        self.edges[i][ni].new_message = marg;
    }

    /// Edge with the largest residual; the first one in scan order wins
    /// on ties.
    fn find_max_residual(&self) -> (usize, usize) {
        let (mut mi, mut mni) = (0, 0);
        let mut maxres = self.edges[0][0].residual;
        for i in 0..self.graph.nr_vars() {
            for nb in self.graph.nb_v(i) {
                if self.edges[i][nb.iter].residual > maxres {
                    mi = i;
                    mni = nb.iter;
                    maxres = self.edges[i][nb.iter].residual;
                }
            }
        }
        (mi, mni)
    }

    /// First residual pass: propose every message and score it.
    fn init_residuals(&mut self) {
        for i in 0..self.graph.nr_vars() {
            for ni in 0..self.graph.nb_v(i).len() {
                self.calc_new_message(i, ni);
                let ep = &self.edges[i][ni];
                let r = dist(&ep.new_message, &ep.message, DistType::LInf);
                self.edges[i][ni].residual = r;
            }
        }
    }

    /// Commits the highest-residual edge, then rescores every proposal it
    /// invalidated. Returns the committed edge.
    fn seqmax_step(&mut self) -> (usize, usize) {
        let graph = self.graph.clone();
        let (i, ni) = self.find_max_residual();
        self.edges[i][ni].message = self.edges[i][ni].new_message.clone();
        self.edges[i][ni].residual = 0.0;

        // a message into i went live, so every proposal leaving one of
        // i's other factors toward another variable is now stale
        for nb_j in graph.nb_v(i) {
            if nb_j.iter == ni {
                continue;
            }
            for j in graph.nb_f(nb_j.node) {
                if j.node == i {
                    continue;
                }
                self.calc_new_message(j.node, j.dual);
                let ep = &self.edges[j.node][j.dual];
                let r = dist(&ep.new_message, &ep.message, DistType::LInf);
                self.edges[j.node][j.dual].residual = r;
            }
        }
        (i, ni)
    }

    /// Runs sweeps until the window of belief changes drops below `tol`
    /// or the sweep cap is reached. Returns the final maximum belief
    /// change; convergence failure is reported through that value, never
    /// as an error.
    pub fn run(&mut self) -> f64 {
        if self.opts.verbose >= 1 {
            eprintln!("Starting {}...", self.identify());
        }
        let graph = self.graph.clone();
        let nr_vars = graph.nr_vars();
        let nr_edges = graph.nr_edges();
        let mut diffs = Diffs::new(nr_vars, 1.0);
        let mut old_beliefs: Vec<Factor> = (0..nr_vars).map(|i| self.belief_v(i)).collect();

        let mut update_seq: Vec<(usize, usize)> = Vec::new();
        if self.opts.updates == UpdateType::SeqMax {
            self.init_residuals();
        } else {
            update_seq.reserve(nr_edges);
            for i in 0..nr_vars {
                for nb in graph.nb_v(i) {
                    update_seq.push((i, nb.iter));
                }
            }
        }

        let max_iter = self.opts.max_iter;
        let tol = self.opts.tol;
        let config = self.config.clone();
        let mut iter = 0;
        with_progress(
            |it_cnt| {
                while iter < max_iter && diffs.max() > tol {
                    match self.opts.updates {
                        UpdateType::SeqMax => {
                            for _ in 0..nr_edges {
                                self.seqmax_step();
                            }
                        }
                        UpdateType::Parall => {
                            for &(i, ni) in update_seq.iter() {
                                self.calc_new_message(i, ni);
                            }
                            for &(i, ni) in update_seq.iter() {
                                self.edges[i][ni].message = self.edges[i][ni].new_message.clone();
                            }
                        }
                        UpdateType::SeqFix | UpdateType::SeqRnd => {
                            if self.opts.updates == UpdateType::SeqRnd {
                                update_seq.shuffle(&mut self.rng);
                            }
                            for &(i, ni) in update_seq.iter() {
                                self.calc_new_message(i, ni);
                                self.edges[i][ni].message = self.edges[i][ni].new_message.clone();
                            }
                        }
                    }

                    // compare fresh beliefs against the previous sweep
                    for (i, old) in old_beliefs.iter_mut().enumerate() {
                        let fresh = self.belief_v(i);
                        diffs.push(crate::factor::dist(&fresh, old, DistType::LInf));
                        *old = fresh;
                    }
                    iter += 1;
                    it_cnt.inc(1);
                    if self.opts.verbose >= 3 {
                        eprintln!(
                            "{}: maxdiff {:.3e} after {} sweeps",
                            Self::NAME,
                            diffs.max(),
                            iter
                        );
                    }
                }
            },
            max_iter as u64,
            "BP sweeps",
            &config,
        );

        self.max_diff = diffs.max();
        if self.opts.verbose >= 1 {
            if self.max_diff > tol {
                eprintln!(
                    "{}: WARNING: not converged within {} sweeps, final maxdiff {:.3e}",
                    Self::NAME,
                    max_iter,
                    self.max_diff
                );
            } else {
                eprintln!("{}: converged in {} sweeps", Self::NAME, iter);
            }
        }
        self.max_diff
    }

    /// Variable belief, the normalized product of the incoming proposals.
    pub fn belief_v(&self, i: usize) -> Factor {
        let mut prod = Prob::filled(self.graph.var(i).states(), self.identity());
        for nb in self.graph.nb_v(i) {
            if self.opts.log_domain {
                prod += &self.edges[i][nb.iter].new_message;
            } else {
                prod *= &self.edges[i][nb.iter].new_message;
            }
        }
        if self.opts.log_domain {
            let m = prod.max();
            prod -= m;
            prod.take_exp();
        }
        prod.normalize(NormType::Prob);
        Factor::from_prob(VarSet::from(self.graph.var(i)), prod)
    }

    /// Factor belief, the factor times all incoming proposals, without
    /// marginalization.
    pub fn belief_f(&self, fac: usize) -> Factor {
        let graph = &self.graph;
        let log_domain = self.opts.log_domain;
        let mut prod = graph.factor(fac).p().clone();
        if log_domain {
            prod.take_log(false);
        }
        for j in graph.nb_f(fac) {
            let mut prod_j = Prob::filled(graph.var(j.node).states(), self.identity());
            for jj in graph.nb_v(j.node) {
                if jj.node != fac {
                    if log_domain {
                        prod_j += &self.edges[j.node][jj.iter].new_message;
                    } else {
                        prod_j *= &self.edges[j.node][jj.iter].new_message;
                    }
                }
            }
            let ind = &self.edges[j.node][j.dual].index;
            for r in 0..prod.len() {
                if log_domain {
                    prod[r] += prod_j[ind[r]];
                } else {
                    prod[r] *= prod_j[ind[r]];
                }
            }
        }
        if log_domain {
            let m = prod.max();
            prod -= m;
            prod.take_exp();
        }
        let mut result = Factor::from_prob(graph.factor(fac).vars().clone(), prod);
        result.normalize(NormType::Prob);
        result
    }

    /// Belief of a single variable.
    pub fn belief(&self, n: &Var) -> Factor {
        self.belief_v(self.graph.find_var(n))
    }

    /// Joint belief over a set of variables, served from any factor
    /// covering the whole set.
    pub fn belief_set(&self, ns: &VarSet) -> Result<Factor, Error> {
        if ns.len() == 1 {
            return Ok(self.belief(ns.iter().next().unwrap()));
        }
        for fac in 0..self.graph.nr_factors() {
            if self.graph.factor(fac).vars().is_superset_of(ns) {
                return Ok(self.belief_f(fac).marginal(ns, true));
            }
        }
        Err(Error::NoContainingFactor)
    }

    /// All variable beliefs followed by all factor beliefs.
    pub fn beliefs(&self) -> Vec<Factor> {
        let mut result: Vec<Factor> = (0..self.graph.nr_vars()).map(|i| self.belief_v(i)).collect();
        result.extend((0..self.graph.nr_factors()).map(|fac| self.belief_f(fac)));
        result
    }

    /// Bethe estimate of the log partition function. Always real for this
    /// solver; the widened return type matches related algorithms whose
    /// estimates can pick up an imaginary part.
    pub fn log_z(&self) -> Complex64 {
        let mut sum = Complex64::new(0.0, 0.0);
        for i in 0..self.graph.nr_vars() {
            let cnt = self.graph.nb_v(i).len() as f64;
            sum += Complex64::from((1.0 - cnt) * self.belief_v(i).entropy());
        }
        for fac in 0..self.graph.nr_factors() {
            sum -= Complex64::from(crate::factor::dist(
                &self.belief_f(fac),
                self.graph.factor(fac),
                DistType::Kl,
            ));
        }
        sum
    }

    /// Maximum belief change of the last [`run`](Self::run).
    pub fn max_diff(&self) -> f64 {
        self.max_diff
    }

    pub fn identify(&self) -> String {
        format!(
            "{}[updates={},tol={:e},maxiter={},verbose={},logdomain={}]",
            Self::NAME,
            self.opts.updates,
            self.opts.tol,
            self.opts.max_iter,
            self.opts.verbose,
            self.opts.log_domain
        )
    }
}

impl InfAlg for Bp {
    fn identify(&self) -> String {
        Bp::identify(self)
    }

    fn init(&mut self) {
        Bp::init(self)
    }

    fn init_vars(&mut self, ns: &VarSet) {
        Bp::init_vars(self, ns)
    }

    fn run(&mut self) -> f64 {
        Bp::run(self)
    }

    fn belief_v(&self, i: usize) -> Factor {
        Bp::belief_v(self, i)
    }

    fn belief(&self, n: &Var) -> Factor {
        Bp::belief(self, n)
    }

    fn belief_set(&self, ns: &VarSet) -> Result<Factor, Error> {
        Bp::belief_set(self, ns)
    }

    fn beliefs(&self) -> Vec<Factor> {
        Bp::beliefs(self)
    }

    fn log_z(&self) -> Complex64 {
        Bp::log_z(self)
    }

    fn max_diff(&self) -> f64 {
        Bp::max_diff(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairwise(i: Var, j: Var, values: [f64; 4]) -> Factor {
        Factor::from_prob(
            [i, j].into_iter().collect(),
            Prob::from_vec(values.to_vec()),
        )
    }

    /// On a perturbed cycle, the first committed edge under residual
    /// scheduling is the proposal furthest from its committed message,
    /// with ties broken by scan order.
    #[test]
    fn seqmax_commits_largest_residual_first() {
        let vars: Vec<Var> = (0..4).map(|l| Var::new(l, 2)).collect();
        let graph = FactorGraph::new(vec![
            pairwise(vars[0], vars[1], [10.0, 1.0, 1.0, 10.0]),
            pairwise(vars[1], vars[2], [2.0, 1.0, 1.0, 2.0]),
            pairwise(vars[2], vars[3], [1.2, 1.0, 1.0, 1.2]),
            pairwise(vars[0], vars[3], [1.0, 1.0, 1.0, 1.0]),
            Factor::from_prob(VarSet::from(vars[0]), Prob::from_vec(vec![3.0, 1.0])),
        ]);
        let mut bp = Bp::new(
            Arc::new(graph),
            BpOptions {
                updates: UpdateType::SeqMax,
                ..BpOptions::default()
            },
        );
        bp.init_residuals();

        // expectation computed straight from the proposed messages
        let mut expected = (0, 0);
        let mut maxres = f64::NEG_INFINITY;
        for i in 0..bp.graph.nr_vars() {
            for (ni, ep) in bp.edges[i].iter().enumerate() {
                let r = dist(&ep.new_message, &ep.message, DistType::LInf);
                if r > maxres {
                    expected = (i, ni);
                    maxres = r;
                }
            }
        }
        assert_eq!(bp.seqmax_step(), expected);
    }

    /// With equal residuals everywhere, the scan-order first edge wins.
    #[test]
    fn seqmax_breaks_ties_in_scan_order() {
        let vars: Vec<Var> = (0..3).map(|l| Var::new(l, 2)).collect();
        let graph = FactorGraph::new(vec![
            pairwise(vars[0], vars[1], [2.0, 1.0, 1.0, 2.0]),
            pairwise(vars[1], vars[2], [2.0, 1.0, 1.0, 2.0]),
            pairwise(vars[0], vars[2], [2.0, 1.0, 1.0, 2.0]),
        ]);
        let mut bp = Bp::new(
            Arc::new(graph),
            BpOptions {
                updates: UpdateType::SeqMax,
                ..BpOptions::default()
            },
        );
        bp.init_residuals();
        assert_eq!(bp.seqmax_step(), (0, 0));
    }
}
