//! Factor algebra and approximate inference on discrete factor graphs.
//!
//! The algebra lives in [`prob`], [`var`], [`index`] and [`factor`]:
//! flat value vectors indexed by a mixed-radix code over variable state
//! spaces, with product, quotient, marginalization, slicing and embedding
//! across differing variable sets. The solvers in [`bp`] and [`mf`] drive
//! that algebra to approximate marginals and a log partition function
//! estimate on a [`graph::FactorGraph`].

pub mod bp;
pub mod factor;
pub mod graph;
pub mod index;
pub mod mf;
pub mod prob;
pub mod properties;
pub(crate) mod utils;
pub mod var;

pub use bp::{Bp, BpOptions, UpdateType};
pub use factor::Factor;
pub use graph::{FactorGraph, Neighbor};
pub use index::IndexFor;
pub use mf::{Mf, MfOptions};
pub use prob::{DistType, NormType, Prob};
pub use properties::PropertySet;
pub use var::{Var, VarSet};

use num_complex::Complex64;
use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum Error {
    #[error("Missing required property {0}.")]
    MissingProperty(String),
    #[error("Cannot parse property {name} from value {value:?}.")]
    BadProperty { name: String, value: String },
    #[error("No factor contains all queried variables.")]
    NoContainingFactor,
}

/// Run-time environment of the solvers (progress reporting).
#[derive(Clone)]
pub struct Config {
    /// Show progress bars.
    pub show_progress: bool,
    /// Computation time after which a progress bar is displayed. This
    /// avoids drawing bars for negligible amounts of work.
    pub progress_min_time: std::time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_progress: true,
            progress_min_time: std::time::Duration::from_millis(500),
        }
    }
}

impl Config {
    pub fn no_progress() -> Self {
        Self {
            show_progress: false,
            ..Self::default()
        }
    }
}

/// Common interface of the inference algorithms in this crate.
pub trait InfAlg {
    /// Name and configuration of the algorithm.
    fn identify(&self) -> String;

    /// Resets all solver state.
    fn init(&mut self);

    /// Resets only the state attached to the given variables.
    fn init_vars(&mut self, ns: &VarSet);

    /// Runs until convergence or the iteration cap, returning the final
    /// maximum belief change. Callers detect convergence failure by
    /// comparing against their tolerance.
    fn run(&mut self) -> f64;

    /// Belief of the `i`-th variable of the graph.
    fn belief_v(&self, i: usize) -> Factor;

    /// Belief of a single variable.
    fn belief(&self, n: &Var) -> Factor;

    /// Joint belief over a set of variables, when the approximation can
    /// serve it.
    fn belief_set(&self, ns: &VarSet) -> Result<Factor, Error>;

    /// All beliefs the algorithm maintains.
    fn beliefs(&self) -> Vec<Factor>;

    /// Estimate of the natural log of the partition function.
    fn log_z(&self) -> Complex64;

    /// Maximum belief change of the last [`run`](Self::run).
    fn max_diff(&self) -> f64;
}
