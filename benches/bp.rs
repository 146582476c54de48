use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar as Prng;
use sumprod::{Bp, BpOptions, Config, Factor, FactorGraph, Prob, UpdateType, Var};

fn chain_graph(n: usize, states: usize, rng: &mut Prng) -> FactorGraph {
    let vars: Vec<Var> = (0..n).map(|l| Var::new(l, states)).collect();
    let mut factors = Vec::with_capacity(n - 1);
    for w in vars.windows(2) {
        let mut f = Factor::uniform([w[0], w[1]].into_iter().collect());
        f.randomize(rng);
        f.make_positive(0.1);
        factors.push(f);
    }
    factors.push(Factor::from_prob(
        sumprod::VarSet::from(vars[0]),
        Prob::from_vec((1..=states).map(|s| s as f64).collect()),
    ));
    FactorGraph::new(factors)
}

fn bench_bp_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("bp_run");
    for n in [8usize, 32, 128] {
        for updates in [UpdateType::Parall, UpdateType::SeqFix, UpdateType::SeqMax] {
            let mut rng = Prng::seed_from_u64(0);
            let graph = Arc::new(chain_graph(n, 4, &mut rng));
            group.bench_with_input(
                BenchmarkId::new(format!("{}", updates), n),
                &n,
                |b, _| {
                    let mut bp = Bp::new(
                        graph.clone(),
                        BpOptions {
                            updates,
                            max_iter: 10,
                            tol: 0.0,
                            ..BpOptions::default()
                        },
                    );
                    bp.config = Config::no_progress();
                    b.iter(|| {
                        bp.init();
                        bp.run()
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_bp_run);
criterion_main!(benches);
