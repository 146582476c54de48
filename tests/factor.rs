use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar as Prng;
use sumprod::factor::{dist, mutual_info};
use sumprod::{DistType, Factor, NormType, Prob, Var, VarSet};

fn vset(vars: &[Var]) -> VarSet {
    vars.iter().copied().collect()
}

fn random_factor(vs: &VarSet, rng: &mut Prng) -> Factor {
    let mut f = Factor::uniform(vs.clone());
    f.randomize(rng);
    f
}

#[test]
fn product_commutes_and_associates() {
    let mut rng = Prng::seed_from_u64(1);
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 3);
    let x2 = Var::new(2, 2);
    let f = random_factor(&vset(&[x0, x1]), &mut rng);
    let g = random_factor(&vset(&[x1, x2]), &mut rng);
    let h = random_factor(&vset(&[x2]), &mut rng);

    assert_eq!(&f * &g, &g * &f);
    let left = &(&f * &g) * &h;
    let right = &f * &(&g * &h);
    assert_eq!(left.vars(), right.vars());
    assert!(dist(&left, &right, DistType::LInf) < 1e-12);
}

#[test]
fn embed_is_multiplication_by_unit() {
    let mut rng = Prng::seed_from_u64(2);
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 3);
    let x2 = Var::new(2, 2);
    let f = random_factor(&vset(&[x0, x1]), &mut rng);
    let big = vset(&[x0, x1, x2]);
    let unit = Factor::filled(vset(&[x2]), 1.0);
    assert_eq!(f.embed(&big), &f * &unit);
    // embedding into the own set is the identity
    assert_eq!(f.embed(f.vars()), f);
}

#[test]
fn marginal_to_empty_set_is_total_sum() {
    let mut rng = Prng::seed_from_u64(3);
    let f = random_factor(&vset(&[Var::new(0, 3), Var::new(1, 2)]), &mut rng);
    let scalar = f.marginal(&VarSet::new(), false);
    assert!(scalar.vars().is_empty());
    assert_eq!(scalar.states(), 1);
    assert!((scalar[0] - f.total_sum()).abs() < 1e-12);
}

#[test]
fn marginal_distributes_over_product() {
    let mut rng = Prng::seed_from_u64(4);
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 3);
    let x2 = Var::new(2, 2);
    let f = random_factor(&vset(&[x0, x1]), &mut rng);
    let g = random_factor(&vset(&[x1, x2]), &mut rng);
    let left = (&f * &g).marginal(f.vars(), false);
    let inter = f.vars() & g.vars();
    let right = &f * &g.marginal(&inter, false);
    assert_eq!(left.vars(), right.vars());
    assert!(dist(&left, &right, DistType::LInf) < 1e-10);
}

#[test]
fn slice_inverts_embed() {
    let mut rng = Prng::seed_from_u64(5);
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 3);
    let x2 = Var::new(2, 4);
    let f = random_factor(&vset(&[x0, x1]), &mut rng);
    let big = vset(&[x0, x1, x2]);
    let ns = vset(&[x2]);
    let embedded = f.embed(&big);
    let rem = &big - &ns;
    for s in 0..ns.nr_states() {
        let sliced = embedded.slice(&ns, s);
        assert_eq!(*sliced.vars(), rem);
        assert_eq!(sliced, f);
    }
}

#[test]
fn normalization_is_idempotent() {
    let mut rng = Prng::seed_from_u64(6);
    let f = random_factor(&vset(&[Var::new(0, 4)]), &mut rng);
    let once = f.normalized(NormType::Prob);
    let twice = once.normalized(NormType::Prob);
    assert!(dist(&once, &twice, DistType::LInf) < 1e-12);
    assert!((once.total_sum() - 1.0).abs() < 1e-12);
}

#[test]
fn log_and_exp_are_inverse() {
    let mut rng = Prng::seed_from_u64(7);
    let mut f = random_factor(&vset(&[Var::new(0, 2), Var::new(1, 2)]), &mut rng);
    f.make_positive(1e-3);
    let through_log = f.log(true).exp();
    let through_exp = f.exp().log(true);
    assert!(dist(&through_log, &f, DistType::LInf) < 1e-12);
    assert!(dist(&through_exp, &f, DistType::LInf) < 1e-12);
}

#[test]
fn quotient_undoes_product() {
    let mut rng = Prng::seed_from_u64(8);
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 3);
    let x2 = Var::new(2, 2);
    let f = random_factor(&vset(&[x0, x1]), &mut rng);
    let mut g = random_factor(&vset(&[x1, x2]), &mut rng);
    g += 0.5;
    let roundtrip = &(&f * &g) / &g;
    let union = f.vars() | g.vars();
    assert_eq!(*roundtrip.vars(), union);
    assert!(dist(&roundtrip, &f.embed(&union), DistType::LInf) < 1e-10);
}

#[test]
fn strength_of_uniform_factor_is_zero() {
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 2);
    let f = Factor::filled(vset(&[x0, x1]), 1.0);
    assert!(f.strength(&x0, &x1).abs() < 1e-12);
    // a deterministic coupling has strength close to one
    let g = Factor::from_prob(
        vset(&[x0, x1]),
        Prob::from_vec(vec![1e6, 1.0, 1.0, 1e6]),
    );
    assert!(g.strength(&x0, &x1) > 0.99);
}

#[test]
fn independent_pair_has_no_mutual_information() {
    let x0 = Var::new(0, 2);
    let x1 = Var::new(1, 2);
    let a = Factor::from_prob(vset(&[x0]), Prob::from_vec(vec![0.3, 0.7]));
    let b = Factor::from_prob(vset(&[x1]), Prob::from_vec(vec![0.6, 0.4]));
    assert!(mutual_info(&(&a * &b)).abs() < 1e-12);
    let coupled = Factor::from_prob(
        vset(&[x0, x1]),
        Prob::from_vec(vec![0.45, 0.05, 0.05, 0.45]),
    );
    assert!(mutual_info(&coupled) > 0.1);
}

#[test]
fn text_form() {
    let x0 = Var::new(0, 2);
    let f = Factor::from_prob(VarSet::from(x0), Prob::from_vec(vec![1.0, 2.0]));
    assert_eq!(format!("{}", f), "({x0} <1 2 >)");
    let x1 = Var::new(1, 2);
    let g = Factor::from_prob(
        vset(&[x0, x1]),
        Prob::from_vec(vec![0.9, 0.1, 0.1, 0.9]),
    );
    assert_eq!(format!("{}", g), "({x0,x1} <0.9 0.1 0.1 0.9 >)");
}

#[test]
fn serde_roundtrip() {
    let mut rng = Prng::seed_from_u64(9);
    let f = random_factor(&vset(&[Var::new(0, 2), Var::new(3, 3)]), &mut rng);
    let bytes = bincode::serialize(&f).unwrap();
    let back: Factor = bincode::deserialize(&bytes).unwrap();
    assert_eq!(f, back);
}
