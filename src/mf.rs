//! Naive mean field approximation.

use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::factor::Factor;
use crate::graph::FactorGraph;
use crate::prob::{DistType, NormType};
use crate::properties::PropertySet;
use crate::utils::{with_progress, Diffs};
use crate::var::{Var, VarSet};
use crate::{Config, Error, InfAlg};

/// Options of the mean field solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfOptions {
    /// Convergence threshold on the maximum belief change.
    pub tol: f64,
    /// Cap on the number of passes, each `nr_vars` site updates long.
    pub max_iter: usize,
    /// Diagnostic verbosity.
    pub verbose: usize,
    /// Seed of the solver's private random source.
    pub seed: u64,
}

impl Default for MfOptions {
    fn default() -> Self {
        Self {
            tol: 1e-9,
            max_iter: 10_000,
            verbose: 0,
            seed: 0,
        }
    }
}

impl MfOptions {
    /// Reads the required `tol`, `maxiter` and `verbose` properties, plus
    /// an optional `seed`.
    pub fn from_properties(ps: &PropertySet) -> Result<Self, Error> {
        Ok(Self {
            tol: ps.get_as("tol")?,
            max_iter: ps.get_as("maxiter")?,
            verbose: ps.get_as("verbose")?,
            seed: ps.get_or("seed", 0)?,
        })
    }
}

/// Fully factorized variational approximation on a factor graph.
///
/// Keeps one belief per variable and relaxes them one randomly chosen
/// site at a time toward the product distribution minimizing the free
/// energy. `log_z` is the variational estimate, a lower bound on the true
/// log partition function.
pub struct Mf {
    graph: Arc<FactorGraph>,
    opts: MfOptions,
    pub config: Config,
    beliefs: Vec<Factor>,
    max_diff: f64,
    rng: Xoshiro256StarStar,
}

impl Mf {
    pub const NAME: &'static str = "MF";

    pub fn new(graph: Arc<FactorGraph>, opts: MfOptions) -> Self {
        let beliefs = graph
            .vars()
            .iter()
            .map(|v| Factor::filled(VarSet::from(*v), 1.0))
            .collect();
        let rng = Xoshiro256StarStar::seed_from_u64(opts.seed);
        Self {
            graph,
            opts,
            config: Config::default(),
            beliefs,
            max_diff: 0.0,
            rng,
        }
    }

    pub fn options(&self) -> &MfOptions {
        &self.opts
    }

    pub fn init(&mut self) {
        for b in self.beliefs.iter_mut() {
            b.fill(1.0);
        }
        self.rng = Xoshiro256StarStar::seed_from_u64(self.opts.seed);
    }

    /// Resets the beliefs of the given variables only.
    pub fn init_vars(&mut self, ns: &VarSet) {
        for (i, b) in self.beliefs.iter_mut().enumerate() {
            if ns.contains(&self.graph.var(i)) {
                b.fill(1.0);
            }
        }
    }

    /// Fixed-point update of site `i` given the current neighborhood.
    fn site_update(&self, i: usize) -> Factor {
        let graph = &self.graph;
        let single = VarSet::from(graph.var(i));
        let mut updated = Factor::scalar(1.0);
        for nb_i in graph.nb_v(i) {
            // product of the site beliefs of the factor's other variables
            let mut neighborhood = Factor::scalar(1.0);
            for j in graph.nb_f(nb_i.node) {
                if j.node != i {
                    neighborhood *= &self.beliefs[j.node];
                }
            }
            let mut contrib = graph.factor(nb_i.node).log(true);
            contrib *= &neighborhood;
            let contrib = contrib.marginal(&single, false).exp();
            updated *= &contrib;
        }
        updated.normalize(NormType::Prob);
        updated
    }

    /// Sweeps random site updates until the window of belief changes
    /// drops below `tol` or the pass cap is reached. Returns the final
    /// maximum belief change; a NaN belief aborts with NaN.
    pub fn run(&mut self) -> f64 {
        if self.opts.verbose >= 1 {
            eprintln!("Starting {}...", self.identify());
        }
        let pass_size = self.beliefs.len();
        let max_steps = self.opts.max_iter * pass_size;
        let tol = self.opts.tol;
        let config = self.config.clone();
        let mut diffs = Diffs::new(pass_size * 3, 1.0);
        let mut t = 0;
        let mut poisoned = false;
        with_progress(
            |it_cnt| {
                while t < max_steps && diffs.max() > tol {
                    let i = self.rng.gen_range(0..self.graph.nr_vars());
                    let updated = self.site_update(i);
                    if updated.has_nans() {
                        if self.opts.verbose >= 1 {
                            eprintln!(
                                "{}: belief of {} turned NaN",
                                Self::NAME,
                                self.graph.var(i)
                            );
                        }
                        poisoned = true;
                        return;
                    }
                    diffs.push(crate::factor::dist(
                        &updated,
                        &self.beliefs[i],
                        DistType::LInf,
                    ));
                    self.beliefs[i] = updated;
                    t += 1;
                    it_cnt.inc(1);
                }
            },
            max_steps as u64,
            "MF site updates",
            &config,
        );
        if poisoned {
            self.max_diff = f64::NAN;
            return f64::NAN;
        }
        self.max_diff = diffs.max();
        if self.opts.verbose >= 1 {
            if self.max_diff > self.opts.tol {
                eprintln!(
                    "{}: WARNING: not converged within {} passes, final maxdiff {:.3e}",
                    Self::NAME,
                    self.opts.max_iter,
                    self.max_diff
                );
            } else {
                eprintln!("{}: converged in {} passes", Self::NAME, t / pass_size);
            }
        }
        self.max_diff
    }

    pub fn belief_v(&self, i: usize) -> Factor {
        self.beliefs[i].normalized(NormType::Prob)
    }

    pub fn belief(&self, n: &Var) -> Factor {
        self.belief_v(self.graph.find_var(n))
    }

    /// Only single-variable queries are answerable from a fully
    /// factorized approximation.
    pub fn belief_set(&self, ns: &VarSet) -> Result<Factor, Error> {
        if ns.len() == 1 {
            Ok(self.belief(ns.iter().next().unwrap()))
        } else {
            Err(Error::NoContainingFactor)
        }
    }

    pub fn beliefs(&self) -> Vec<Factor> {
        (0..self.graph.nr_vars()).map(|i| self.belief_v(i)).collect()
    }

    /// Variational estimate of the log partition function, the entropy of
    /// the product approximation plus the expected log factor values.
    pub fn log_z(&self) -> Complex64 {
        let graph = &self.graph;
        let mut sum = 0.0;
        for i in 0..graph.nr_vars() {
            sum += self.belief_v(i).entropy();
        }
        for fac in 0..graph.nr_factors() {
            let mut approx = Factor::scalar(1.0);
            for j in graph.nb_f(fac) {
                approx *= &self.beliefs[j.node];
            }
            approx.normalize(NormType::Prob);
            let mut expect = graph.factor(fac).log(true);
            expect *= &approx;
            sum += expect.total_sum();
        }
        Complex64::from(sum)
    }

    pub fn max_diff(&self) -> f64 {
        self.max_diff
    }

    pub fn identify(&self) -> String {
        format!(
            "{}[tol={:e},maxiter={},verbose={}]",
            Self::NAME,
            self.opts.tol,
            self.opts.max_iter,
            self.opts.verbose
        )
    }
}

impl InfAlg for Mf {
    fn identify(&self) -> String {
        Mf::identify(self)
    }

    fn init(&mut self) {
        Mf::init(self)
    }

    fn init_vars(&mut self, ns: &VarSet) {
        Mf::init_vars(self, ns)
    }

    fn run(&mut self) -> f64 {
        Mf::run(self)
    }

    fn belief_v(&self, i: usize) -> Factor {
        Mf::belief_v(self, i)
    }

    fn belief(&self, n: &Var) -> Factor {
        Mf::belief(self, n)
    }

    fn belief_set(&self, ns: &VarSet) -> Result<Factor, Error> {
        Mf::belief_set(self, ns)
    }

    fn beliefs(&self) -> Vec<Factor> {
        Mf::beliefs(self)
    }

    fn log_z(&self) -> Complex64 {
        Mf::log_z(self)
    }

    fn max_diff(&self) -> f64 {
        Mf::max_diff(self)
    }
}
