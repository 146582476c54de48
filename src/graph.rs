use serde::{Deserialize, Serialize};

use crate::factor::Factor;
use crate::var::{Var, VarSet};

/// One endpoint record of an edge in the bipartite adjacency.
///
/// `iter` is the ordinal of the record within the list it sits in, `dual`
/// the ordinal of the mirrored record in the list on the other side. The
/// solvers address per-edge state as `(variable, ordinal)` pairs, so both
/// numbers are carried on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Ordinal of this record in its own adjacency list.
    pub iter: usize,
    /// Index of the node on the other side of the edge.
    pub node: usize,
    /// Ordinal of the mirrored record in the other node's list.
    pub dual: usize,
}

/// Bipartite graph of variables and factors. An edge connects a variable
/// to every factor whose variable set contains it.
///
/// Variables are ordered by ascending label; factors keep the order they
/// were supplied in. Adjacency lists are fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorGraph {
    vars: Vec<Var>,
    factors: Vec<Factor>,
    nb_v: Vec<Vec<Neighbor>>,
    nb_f: Vec<Vec<Neighbor>>,
    nr_edges: usize,
}

impl FactorGraph {
    pub fn new(factors: Vec<Factor>) -> Self {
        let var_set: VarSet = factors
            .iter()
            .flat_map(|f| f.vars().iter().copied())
            .collect();
        let vars: Vec<Var> = var_set.iter().copied().collect();
        let mut nb_v = vec![Vec::new(); vars.len()];
        let mut nb_f = vec![Vec::new(); factors.len()];
        let mut nr_edges = 0;
        for (fac, f) in factors.iter().enumerate() {
            for v in f.vars().iter() {
                let var = vars.binary_search(v).unwrap();
                let iter_v = nb_v[var].len();
                let iter_f = nb_f[fac].len();
                nb_v[var].push(Neighbor {
                    iter: iter_v,
                    node: fac,
                    dual: iter_f,
                });
                nb_f[fac].push(Neighbor {
                    iter: iter_f,
                    node: var,
                    dual: iter_v,
                });
                nr_edges += 1;
            }
        }
        Self {
            vars,
            factors,
            nb_v,
            nb_f,
            nr_edges,
        }
    }

    pub fn nr_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn nr_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn nr_edges(&self) -> usize {
        self.nr_edges
    }

    pub fn var(&self, i: usize) -> Var {
        self.vars[i]
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn factor(&self, i: usize) -> &Factor {
        &self.factors[i]
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Factor neighbors of variable `i`, in factor-supply order.
    pub fn nb_v(&self, i: usize) -> &[Neighbor] {
        &self.nb_v[i]
    }

    /// Variable neighbors of factor `i`, in ascending label order.
    pub fn nb_f(&self, i: usize) -> &[Neighbor] {
        &self.nb_f[i]
    }

    /// Position of a variable in the graph ordering. The variable must be
    /// part of the graph.
    pub fn find_var(&self, n: &Var) -> usize {
        self.vars
            .binary_search(n)
            .expect("variable not part of the graph")
    }
}
