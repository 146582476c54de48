use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

use ndarray::Array1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Normalization modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormType {
    /// Divide by the sum of the entries.
    Prob,
    /// Divide by the maximum absolute entry.
    LinInf,
}

/// Distance measures between vectors of equal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistType {
    /// Sum of absolute differences.
    L1,
    /// Maximum absolute difference.
    LInf,
    /// Total variation, half the L1 distance.
    Tv,
    /// Kullback-Leibler divergence.
    Kl,
}

/// Dense vector of reals, the value storage of a factor and the payload of
/// a message.
///
/// Elementwise arithmetic is defined between vectors of identical length
/// only; scalar arithmetic broadcasts. The elementwise quotient maps
/// `x / 0` to `0`, which is the convention the solvers rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prob {
    p: Array1<f64>,
}

impl Prob {
    /// Uniform distribution over `n` states.
    pub fn uniform(n: usize) -> Self {
        assert!(n >= 1);
        Self::filled(n, 1.0 / (n as f64))
    }

    pub fn filled(n: usize, value: f64) -> Self {
        assert!(n >= 1);
        Self {
            p: Array1::from_elem(n, value),
        }
    }

    pub fn zeros(n: usize) -> Self {
        Self::filled(n, 0.0)
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        assert!(!values.is_empty());
        Self {
            p: Array1::from(values),
        }
    }

    pub fn len(&self) -> usize {
        self.p.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    pub fn iter(&self) -> ndarray::iter::Iter<'_, f64, ndarray::Ix1> {
        self.p.iter()
    }

    pub fn fill(&mut self, value: f64) {
        self.p.fill(value);
    }

    /// Redraws every entry iid uniform on `[0, 1)`.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        self.p = Array1::random_using(self.p.len(), Uniform::new(0.0, 1.0), rng);
    }

    pub fn max(&self) -> f64 {
        self.p.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.p.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_abs(&self) -> f64 {
        self.p.iter().map(|x| x.abs()).fold(0.0, f64::max)
    }

    pub fn total_sum(&self) -> f64 {
        self.p.sum()
    }

    /// Shannon entropy, with the convention `0 * log 0 = 0`.
    pub fn entropy(&self) -> f64 {
        self.p
            .iter()
            .filter(|&&x| x != 0.0)
            .map(|&x| -x * x.ln())
            .sum()
    }

    pub fn has_nans(&self) -> bool {
        self.p.iter().any(|x| x.is_nan())
    }

    pub fn has_negatives(&self) -> bool {
        self.p.iter().any(|&x| x < 0.0)
    }

    /// Sets entries with `|x| < epsilon` to zero.
    pub fn make_zero(&mut self, epsilon: f64) {
        self.p.mapv_inplace(|x| if x.abs() < epsilon { 0.0 } else { x });
    }

    /// Raises entries in `[0, epsilon)` to `epsilon`.
    pub fn make_positive(&mut self, epsilon: f64) {
        self.p
            .mapv_inplace(|x| if (0.0..epsilon).contains(&x) { epsilon } else { x });
    }

    /// Pointwise inverse. With `zero` set, `0` maps to `0`, otherwise to
    /// infinity.
    pub fn inverse(&self, zero: bool) -> Self {
        let zv = if zero { 0.0 } else { f64::INFINITY };
        Self {
            p: self.p.mapv(|x| if x == 0.0 { zv } else { 1.0 / x }),
        }
    }

    /// Pointwise natural log. With `zero` set, `0` maps to `0`, otherwise
    /// to negative infinity.
    pub fn log(&self, zero: bool) -> Self {
        let mut r = self.clone();
        r.take_log(zero);
        r
    }

    pub fn exp(&self) -> Self {
        let mut r = self.clone();
        r.take_exp();
        r
    }

    pub fn abs(&self) -> Self {
        Self {
            p: self.p.mapv(f64::abs),
        }
    }

    /// In-place variant of [`log`](Self::log).
    pub fn take_log(&mut self, zero: bool) {
        let zv = if zero { 0.0 } else { f64::NEG_INFINITY };
        self.p.mapv_inplace(|x| if x == 0.0 { zv } else { x.ln() });
    }

    /// In-place pointwise exponential.
    pub fn take_exp(&mut self) {
        self.p.mapv_inplace(f64::exp);
    }

    /// Pointwise power.
    pub fn pow(&self, a: f64) -> Self {
        Self {
            p: self.p.mapv(|x| x.powf(a)),
        }
    }

    /// Normalizes in place and returns the normalization constant. The
    /// constant must be strictly positive.
    pub fn normalize(&mut self, norm: NormType) -> f64 {
        let z = match norm {
            NormType::Prob => self.total_sum(),
            NormType::LinInf => self.max_abs(),
        };
        assert!(z > 0.0, "cannot normalize a vector with zero norm");
        self.p.mapv_inplace(|x| x / z);
        z
    }

    pub fn normalized(&self, norm: NormType) -> Self {
        let mut r = self.clone();
        r.normalize(norm);
        r
    }
}

/// Distance between two vectors of equal length.
pub fn dist(a: &Prob, b: &Prob, dt: DistType) -> f64 {
    assert_eq!(a.len(), b.len(), "distance needs equal lengths");
    let diffs = a.p.iter().zip(b.p.iter());
    match dt {
        DistType::L1 => diffs.map(|(x, y)| (x - y).abs()).sum(),
        DistType::LInf => diffs.map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
        DistType::Tv => 0.5 * dist(a, b, DistType::L1),
        DistType::Kl => diffs
            .filter(|(&x, _)| x != 0.0)
            .map(|(&x, &y)| x * (x / y).ln())
            .sum(),
    }
}

impl Index<usize> for Prob {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.p[i]
    }
}

impl IndexMut<usize> for Prob {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.p[i]
    }
}

impl AddAssign<&Prob> for Prob {
    fn add_assign(&mut self, rhs: &Prob) {
        debug_assert_eq!(self.len(), rhs.len());
        self.p += &rhs.p;
    }
}

impl SubAssign<&Prob> for Prob {
    fn sub_assign(&mut self, rhs: &Prob) {
        debug_assert_eq!(self.len(), rhs.len());
        self.p -= &rhs.p;
    }
}

impl MulAssign<&Prob> for Prob {
    fn mul_assign(&mut self, rhs: &Prob) {
        debug_assert_eq!(self.len(), rhs.len());
        self.p *= &rhs.p;
    }
}

impl DivAssign<&Prob> for Prob {
    fn div_assign(&mut self, rhs: &Prob) {
        debug_assert_eq!(self.len(), rhs.len());
        ndarray::Zip::from(&mut self.p)
            .and(&rhs.p)
            .for_each(|x, &y| *x = if y == 0.0 { 0.0 } else { *x / y });
    }
}

impl AddAssign<f64> for Prob {
    fn add_assign(&mut self, rhs: f64) {
        self.p += rhs;
    }
}

impl SubAssign<f64> for Prob {
    fn sub_assign(&mut self, rhs: f64) {
        self.p -= rhs;
    }
}

impl MulAssign<f64> for Prob {
    fn mul_assign(&mut self, rhs: f64) {
        self.p *= rhs;
    }
}

impl DivAssign<f64> for Prob {
    fn div_assign(&mut self, rhs: f64) {
        self.p /= rhs;
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $assign:tt) => {
        impl $trait<&Prob> for &Prob {
            type Output = Prob;

            fn $method(self, rhs: &Prob) -> Prob {
                let mut r = self.clone();
                r $assign rhs;
                r
            }
        }

        impl $trait<f64> for &Prob {
            type Output = Prob;

            fn $method(self, rhs: f64) -> Prob {
                let mut r = self.clone();
                r $assign rhs;
                r
            }
        }
    };
}

binary_op!(Add, add, +=);
binary_op!(Sub, sub, -=);
binary_op!(Mul, mul, *=);
binary_op!(Div, div, /=);
