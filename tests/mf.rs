use std::sync::Arc;

use sumprod::factor::dist;
use sumprod::{
    Config, DistType, Error, Factor, FactorGraph, InfAlg, Mf, MfOptions, Prob, PropertySet, Var,
    VarSet,
};

fn solver(graph: &Arc<FactorGraph>, opts: MfOptions) -> Mf {
    let mut mf = Mf::new(graph.clone(), opts);
    mf.config = Config::no_progress();
    mf
}

#[test]
fn independent_variables_are_recovered_exactly() {
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 2);
    let f0 = Factor::from_prob(VarSet::from(x0), Prob::from_vec(vec![2.0, 1.0]));
    let f1 = Factor::from_prob(VarSet::from(x1), Prob::from_vec(vec![1.0, 3.0]));
    let graph = Arc::new(FactorGraph::new(vec![f0.clone(), f1.clone()]));
    let mut mf = solver(&graph, MfOptions::default());
    let max_diff = mf.run();
    assert!(max_diff <= mf.options().tol);
    assert!(dist(
        &mf.belief(&x0),
        &f0.normalized(sumprod::NormType::Prob),
        DistType::LInf
    ) < 1e-9);
    assert!(dist(
        &mf.belief(&x1),
        &f1.normalized(sumprod::NormType::Prob),
        DistType::LInf
    ) < 1e-9);
    // without couplings the free energy estimate is the true log Z
    assert!((mf.log_z().re - 12.0f64.ln()).abs() < 1e-9);
}

#[test]
fn estimate_lower_bounds_the_partition_function() {
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 2);
    let coupling = Factor::from_prob(
        [x0, x1].into_iter().collect(),
        Prob::from_vec(vec![0.9, 0.1, 0.1, 0.9]),
    );
    let fields = vec![
        Factor::from_prob(VarSet::from(x0), Prob::from_vec(vec![2.0, 1.0])),
        Factor::from_prob(VarSet::from(x1), Prob::from_vec(vec![1.0, 3.0])),
    ];
    let mut factors = fields;
    factors.push(coupling);
    let mut joint = Factor::scalar(1.0);
    for f in factors.iter() {
        joint *= f;
    }
    let exact_log_z = joint.total_sum().ln();

    let graph = Arc::new(FactorGraph::new(factors));
    let mut mf = solver(&graph, MfOptions::default());
    let max_diff = mf.run();
    assert!(max_diff < 1e-6);
    assert!(mf.log_z().re <= exact_log_z + 1e-9);
}

#[test]
fn partial_reinit_only_touches_named_variables() {
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 2);
    let graph = Arc::new(FactorGraph::new(vec![
        Factor::from_prob(VarSet::from(x0), Prob::from_vec(vec![2.0, 1.0])),
        Factor::from_prob(VarSet::from(x1), Prob::from_vec(vec![1.0, 3.0])),
    ]));
    let mut mf = solver(&graph, MfOptions::default());
    mf.run();
    let kept = mf.belief(&x1);
    mf.init_vars(&VarSet::from(x0));
    assert_eq!(dist(&mf.belief(&x1), &kept, DistType::LInf), 0.0);
    let reset = mf.belief(&x0);
    assert!((reset[0] - 0.5).abs() < 1e-12);
}

#[test]
fn options_from_properties_and_identify() {
    let ps = PropertySet::new()
        .set("tol", 1e-9)
        .set("maxiter", 50usize)
        .set("verbose", 0usize);
    let opts = MfOptions::from_properties(&ps).unwrap();
    assert_eq!(opts.max_iter, 50);
    assert!(matches!(
        MfOptions::from_properties(&PropertySet::new()),
        Err(Error::MissingProperty(_))
    ));

    let graph = Arc::new(FactorGraph::new(vec![Factor::from_prob(
        VarSet::from(Var::new(0, 2)),
        Prob::from_vec(vec![1.0, 1.0]),
    )]));
    let mf = solver(&graph, opts);
    assert_eq!(mf.identify(), "MF[tol=1e-9,maxiter=50,verbose=0]");
}

#[test]
fn joint_queries_are_refused() {
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 2);
    let graph = Arc::new(FactorGraph::new(vec![Factor::uniform(
        [x0, x1].into_iter().collect(),
    )]));
    let mut mf = solver(&graph, MfOptions::default());
    mf.run();
    let pair: VarSet = [x0, x1].into_iter().collect();
    assert!(matches!(
        mf.belief_set(&pair),
        Err(Error::NoContainingFactor)
    ));
    let alg: &dyn InfAlg = &mf;
    assert_eq!(alg.beliefs().len(), graph.nr_vars());
}
