//! Clause-kernel primitives of the soft-spin energy landscape.
//!
//! Every function here is a pure map from (clause structure, spin state)
//! to a scalar; no buffers, no caching. Products run over the clause
//! support only — a variable absent from a clause contributes a factor
//! of one — so each kernel costs `O(arity)`.

use crate::clause::{pair_index, ClauseSet};
use crate::traits::Real;
use serde::{Deserialize, Serialize};

/// Literal satisfaction margin `1 - c s`.
#[inline]
pub(crate) fn margin<T: Real>(sign: i8, spin: T) -> T {
    T::one() - T::from_i8(sign).unwrap() * spin
}

/// Product of the literal margins of clause `m` over every variable
/// except `skip`, scaled by `2^-arity`.
pub fn literal_factor<T: Real>(clauses: &ClauseSet, m: usize, skip: usize, spins: &[T]) -> T {
    let mut product = T::from_f64(clauses.kernel_scale()).unwrap();
    for &j in clauses.support(m) {
        let j = j as usize;
        if j != skip {
            product = product * margin(clauses.sign(m, j), spins[j]);
        }
    }
    product
}

/// The clause factor `K_m`: scaled product of all literal margins of
/// clause `m`. Lies in `[0, 1]` while every spin stays in `[-1, 1]` and
/// vanishes exactly when some literal of the clause is fully satisfied.
pub fn clause_factor<T: Real>(clauses: &ClauseSet, m: usize, spins: &[T]) -> T {
    let mut product = T::from_f64(clauses.kernel_scale()).unwrap();
    for &j in clauses.support(m) {
        let j = j as usize;
        product = product * margin(clauses.sign(m, j), spins[j]);
    }
    product
}

/// `K_m^2`, the driving term of the squared auxiliary laws.
pub fn clause_factor_squared<T: Real>(clauses: &ClauseSet, m: usize, spins: &[T]) -> T {
    let k = clause_factor(clauses, m, spins);
    k * k
}

/// Weighted literal factor in the literal-factor-squared form:
/// `literal_factor(m, i)^2 * (1 - c[m][i] s[i])`.
pub fn weighted_literal_factor<T: Real>(
    clauses: &ClauseSet,
    m: usize,
    i: usize,
    spins: &[T],
) -> T {
    let lf = literal_factor(clauses, m, i, spins);
    lf * lf * margin(clauses.sign(m, i), spins[i])
}

/// Weighted literal factor in the clause-factor-squared form:
/// `clause_factor(m)^2 * (1 - c[m][i] s[i])`.
///
/// Historical revisions of the model disagree on which of the two forms
/// drives the gradient, and they are not equal (this one carries the
/// `i`-th margin cubed). Both stay available; [`WeightedKernel`] selects
/// one per evaluator.
pub fn weighted_clause_factor<T: Real>(
    clauses: &ClauseSet,
    m: usize,
    i: usize,
    spins: &[T],
) -> T {
    let k = clause_factor(clauses, m, spins);
    k * k * margin(clauses.sign(m, i), spins[i])
}

/// Selects which weighted-factor form the gradient terms use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightedKernel {
    /// `literal_factor^2 * (1 - c s)`.
    LiteralSquared,
    /// `clause_factor^2 * (1 - c s)`.
    ClauseSquared,
}

impl WeightedKernel {
    #[inline]
    pub fn eval<T: Real>(self, clauses: &ClauseSet, m: usize, i: usize, spins: &[T]) -> T {
        match self {
            WeightedKernel::LiteralSquared => weighted_literal_factor(clauses, m, i, spins),
            WeightedKernel::ClauseSquared => weighted_clause_factor(clauses, m, i, spins),
        }
    }
}

/// Gradient force on spin `i`: `sum_m 2 a_m c[m][i] w(m, i)` with `w`
/// the selected weighted factor. Only the clauses containing `i`
/// contribute, so the sum walks the occurrence list.
pub fn spin_force<T: Real>(
    clauses: &ClauseSet,
    i: usize,
    kernel: WeightedKernel,
    spins: &[T],
    weights: &[T],
) -> T {
    let two = T::from_f64(2.0).unwrap();
    let mut sum = T::zero();
    for &m in clauses.occurrences(i) {
        let m = m as usize;
        let sign = T::from_i8(clauses.sign(m, i)).unwrap();
        sum = sum + two * weights[m] * sign * kernel.eval(clauses, m, i, spins);
    }
    sum
}

/// Per-clause term the pairwise memory distributes onto variable `i`:
/// `c[m][i] (1 - c[m][i] s[i]) literal_factor(m, i)^2`. Zero when `i`
/// does not appear in clause `m`.
pub fn pair_potential_term<T: Real>(clauses: &ClauseSet, m: usize, i: usize, spins: &[T]) -> T {
    let sign = clauses.sign(m, i);
    if sign == 0 {
        return T::zero();
    }
    let lf = literal_factor(clauses, m, i, spins);
    T::from_i8(sign).unwrap() * margin(sign, spins[i]) * lf * lf
}

/// Second-order pairwise force on spin `i`: every clause pair `(m, n)`
/// with `n >= m` contributes its packed weight times the sum of both
/// clauses' potential terms.
pub fn second_order_potential<T: Real>(
    clauses: &ClauseSet,
    i: usize,
    spins: &[T],
    pair_weights: &[T],
) -> T {
    let m_count = clauses.num_clauses();
    let mut sum = T::zero();
    for m in 0..m_count {
        let term_m = pair_potential_term(clauses, m, i, spins);
        for n in m..m_count {
            let b = pair_weights[pair_index(m, n, m_count)];
            let term_n = pair_potential_term(clauses, n, i, spins);
            sum = sum + b * (term_m + term_n);
        }
    }
    sum
}
