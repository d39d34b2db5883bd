//! Right-hand-side evaluation for the soft-spin clause dynamics.
//!
//! Each recognized variant pairs a spin-force law with an
//! auxiliary-update law; the evaluator dispatches on the two laws so the
//! loop bodies are shared instead of duplicated per variant.

use crate::clause::{pair_index, ClauseSet};
use crate::error::CtdsError;
use crate::kernel::{clause_factor, pair_potential_term, spin_force, WeightedKernel};
use crate::traits::{Real, VectorField};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::f64::consts::PI;

/// Tags one complete right-hand side. Selection is a caller-side
/// configuration choice; the evaluator itself never switches variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RhsVariant {
    /// Gradient force, auxiliary law `a K`.
    Basic,
    /// Gradient force, auxiliary law `a K^2`.
    SquaredAux,
    /// Gradient force plus central potential, auxiliary law `a K^2`.
    PotentialSquared,
    /// Gradient force plus central potential, auxiliary law `a K`.
    PotentialLinear,
    /// Exact negation of `SquaredAux` in both blocks.
    TimeReversed,
    /// Exponential memory trace `exp(z_m)` in place of the weight, with
    /// relaxing law `K - lambda z`.
    ExponentialMemory,
    /// Gradient force plus central potential, auxiliary law
    /// `a (K^2 - lambda ln a)`.
    LogBarrier,
    /// Gradient force with the auxiliary weights held constant.
    FrozenAux,
    /// Second-order pairwise memory over clause pairs.
    PairwiseMemory,
}

/// How the spin block of the derivative is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinLaw {
    Gradient,
    PotentialGradient,
    ReversedGradient,
    MemoryTrace,
    Pairwise,
}

/// How the auxiliary block of the derivative is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxLaw {
    Linear,
    Squared,
    ReversedSquared,
    Relaxing,
    LogBarrier,
    Frozen,
    PairProduct,
}

impl RhsVariant {
    pub fn spin_law(self) -> SpinLaw {
        match self {
            RhsVariant::Basic | RhsVariant::SquaredAux | RhsVariant::FrozenAux => SpinLaw::Gradient,
            RhsVariant::PotentialSquared | RhsVariant::PotentialLinear | RhsVariant::LogBarrier => {
                SpinLaw::PotentialGradient
            }
            RhsVariant::TimeReversed => SpinLaw::ReversedGradient,
            RhsVariant::ExponentialMemory => SpinLaw::MemoryTrace,
            RhsVariant::PairwiseMemory => SpinLaw::Pairwise,
        }
    }

    pub fn aux_law(self) -> AuxLaw {
        match self {
            RhsVariant::Basic | RhsVariant::PotentialLinear => AuxLaw::Linear,
            RhsVariant::SquaredAux | RhsVariant::PotentialSquared => AuxLaw::Squared,
            RhsVariant::TimeReversed => AuxLaw::ReversedSquared,
            RhsVariant::ExponentialMemory => AuxLaw::Relaxing,
            RhsVariant::LogBarrier => AuxLaw::LogBarrier,
            RhsVariant::FrozenAux => AuxLaw::Frozen,
            RhsVariant::PairwiseMemory => AuxLaw::PairProduct,
        }
    }

    /// State dimension the variant expects: `N + M`, or
    /// `N + M (M + 1) / 2` for the pairwise-memory law.
    pub fn state_dimension(self, clauses: &ClauseSet) -> usize {
        match self {
            RhsVariant::PairwiseMemory => clauses.num_variables() + clauses.pair_count(),
            _ => clauses.num_variables() + clauses.num_clauses(),
        }
    }

    /// Variants with an analytic Jacobian.
    pub fn has_jacobian(self) -> bool {
        matches!(self, RhsVariant::Basic)
    }
}

/// Scalar parameters of the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelParams {
    /// Strength of the central potential; enters the spin law as
    /// `(pi / 2) * potential_strength * alpha * mean(a)`.
    pub potential_strength: f64,
    /// Relaxation rate `lambda` of the memory-suppression laws.
    pub relaxation: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            potential_strength: 0.0725,
            relaxation: 0.1,
        }
    }
}

/// Polymorphic evaluator for every right-hand-side variant.
///
/// Holds a borrowed clause structure plus the variant tag; each call is
/// a pure function of the state vector and writes the full derivative
/// into the caller's buffer. The pairwise law folds its weights through
/// an interior scratch buffer, which makes the evaluator `!Sync`; for
/// data-parallel ensembles build one evaluator per thread.
#[derive(Debug)]
pub struct SoftSpinSystem<'a, T: Real> {
    clauses: &'a ClauseSet,
    variant: RhsVariant,
    params: ModelParams,
    kernel: WeightedKernel,
    scratch: RefCell<Vec<T>>,
}

impl<'a, T: Real> SoftSpinSystem<'a, T> {
    pub fn new(
        clauses: &'a ClauseSet,
        variant: RhsVariant,
        params: ModelParams,
    ) -> Result<Self, CtdsError> {
        if !params.potential_strength.is_finite() {
            return Err(CtdsError::BadParameter {
                name: "potential_strength",
                value: params.potential_strength,
            });
        }
        if !params.relaxation.is_finite() || params.relaxation < 0.0 {
            return Err(CtdsError::BadParameter {
                name: "relaxation",
                value: params.relaxation,
            });
        }
        Ok(Self {
            clauses,
            variant,
            params,
            kernel: WeightedKernel::LiteralSquared,
            scratch: RefCell::new(Vec::new()),
        })
    }

    /// Replaces the weighted-kernel form the gradient terms use.
    pub fn with_kernel(mut self, kernel: WeightedKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn clauses(&self) -> &ClauseSet {
        self.clauses
    }

    pub fn variant(&self) -> RhsVariant {
        self.variant
    }

    pub fn params(&self) -> ModelParams {
        self.params
    }

    pub(crate) fn kernel(&self) -> WeightedKernel {
        self.kernel
    }

    /// State/result dimension of the chosen variant.
    pub fn dimension(&self) -> usize {
        self.variant.state_dimension(self.clauses)
    }

    /// Evaluates the derivative of `y` into `dydt`, overwriting every
    /// entry. Fails fast on buffer-length mismatches.
    pub fn rhs(&self, y: &[T], dydt: &mut [T]) -> Result<(), CtdsError> {
        let dim = self.dimension();
        if y.len() != dim {
            return Err(CtdsError::BufferLength {
                name: "state",
                expected: dim,
                got: y.len(),
            });
        }
        if dydt.len() != dim {
            return Err(CtdsError::BufferLength {
                name: "result",
                expected: dim,
                got: dydt.len(),
            });
        }
        self.eval_unchecked(y, dydt);
        Ok(())
    }

    fn eval_unchecked(&self, y: &[T], out: &mut [T]) {
        let n = self.clauses.num_variables();
        let (spins, aux) = y.split_at(n);
        let (ds, da) = out.split_at_mut(n);

        match self.variant.spin_law() {
            SpinLaw::Gradient => {
                for (i, slot) in ds.iter_mut().enumerate() {
                    *slot = spin_force(self.clauses, i, self.kernel, spins, aux);
                }
            }
            SpinLaw::ReversedGradient => {
                for (i, slot) in ds.iter_mut().enumerate() {
                    *slot = -spin_force(self.clauses, i, self.kernel, spins, aux);
                }
            }
            SpinLaw::PotentialGradient => {
                let c = self.potential_constant(aux);
                let pi = T::from_f64(PI).unwrap();
                for (i, slot) in ds.iter_mut().enumerate() {
                    *slot = spin_force(self.clauses, i, self.kernel, spins, aux)
                        + c * (pi * spins[i]).sin();
                }
            }
            SpinLaw::MemoryTrace => {
                let two = T::from_f64(2.0).unwrap();
                for (i, slot) in ds.iter_mut().enumerate() {
                    let mut sum = T::zero();
                    for &m in self.clauses.occurrences(i) {
                        let m = m as usize;
                        let sign = T::from_i8(self.clauses.sign(m, i)).unwrap();
                        sum = sum
                            + two
                                * sign
                                * self.kernel.eval(self.clauses, m, i, spins)
                                * aux[m].exp();
                    }
                    *slot = sum;
                }
            }
            SpinLaw::Pairwise => {
                let mut folded = self.scratch.borrow_mut();
                fold_pair_weights(self.clauses.num_clauses(), aux, &mut folded);
                for (i, slot) in ds.iter_mut().enumerate() {
                    let mut sum = T::zero();
                    for &m in self.clauses.occurrences(i) {
                        let m = m as usize;
                        sum = sum + folded[m] * pair_potential_term(self.clauses, m, i, spins);
                    }
                    *slot = sum;
                }
            }
        }

        match self.variant.aux_law() {
            AuxLaw::Linear => {
                for (m, slot) in da.iter_mut().enumerate() {
                    *slot = aux[m] * clause_factor(self.clauses, m, spins);
                }
            }
            AuxLaw::Squared => {
                for (m, slot) in da.iter_mut().enumerate() {
                    let k = clause_factor(self.clauses, m, spins);
                    *slot = aux[m] * k * k;
                }
            }
            AuxLaw::ReversedSquared => {
                for (m, slot) in da.iter_mut().enumerate() {
                    let k = clause_factor(self.clauses, m, spins);
                    *slot = -(aux[m] * k * k);
                }
            }
            AuxLaw::Relaxing => {
                let lambda = T::from_f64(self.params.relaxation).unwrap();
                for (m, slot) in da.iter_mut().enumerate() {
                    *slot = clause_factor(self.clauses, m, spins) - lambda * aux[m];
                }
            }
            AuxLaw::LogBarrier => {
                // ln(a) assumes the integrator keeps the weights
                // positive; a nonpositive weight is a step-size failure,
                // not a state to recover from.
                let lambda = T::from_f64(self.params.relaxation).unwrap();
                for (m, slot) in da.iter_mut().enumerate() {
                    let k = clause_factor(self.clauses, m, spins);
                    *slot = aux[m] * (k * k - lambda * aux[m].ln());
                }
            }
            AuxLaw::Frozen => {
                for slot in da.iter_mut() {
                    *slot = T::zero();
                }
            }
            AuxLaw::PairProduct => {
                let m_count = self.clauses.num_clauses();
                let mut factors = self.scratch.borrow_mut();
                factors.clear();
                for m in 0..m_count {
                    let k = clause_factor(self.clauses, m, spins);
                    factors.push(k);
                }
                for m in 0..m_count {
                    for n in m..m_count {
                        let idx = pair_index(m, n, m_count);
                        da[idx] = aux[idx] * factors[m] * factors[n];
                    }
                }
            }
        }
    }

    /// Central-potential prefactor
    /// `(pi / 2) * potential_strength * alpha * mean(a)`, recomputed
    /// once per call.
    fn potential_constant(&self, aux: &[T]) -> T {
        let mut total = T::zero();
        for &a in aux {
            total = total + a;
        }
        let mean = total / T::from_usize(aux.len()).unwrap();
        let base = 0.5 * PI * self.params.potential_strength * self.clauses.alpha();
        T::from_f64(base).unwrap() * mean
    }
}

impl<T: Real> VectorField<T> for SoftSpinSystem<'_, T> {
    fn dimension(&self) -> usize {
        self.variant.state_dimension(self.clauses)
    }

    fn eval(&self, y: &[T], dydt: &mut [T]) {
        debug_assert_eq!(y.len(), self.variant.state_dimension(self.clauses));
        debug_assert_eq!(dydt.len(), self.variant.state_dimension(self.clauses));
        self.eval_unchecked(y, dydt);
    }
}

/// Folds the packed pair weights into one effective weight per clause:
/// `w_m = sum_{n >= m} b_{mn} + sum_{q <= m} b_{qm}`, the diagonal
/// entering twice. The pairwise force then aggregates per clause instead
/// of per pair, which is algebraically identical to the pair double sum.
fn fold_pair_weights<T: Real>(num_clauses: usize, pair_weights: &[T], folded: &mut Vec<T>) {
    folded.clear();
    folded.resize(num_clauses, T::zero());
    let mut idx = 0usize;
    for m in 0..num_clauses {
        for n in m..num_clauses {
            let b = pair_weights[idx];
            idx += 1;
            folded[m] = folded[m] + b;
            folded[n] = folded[n] + b;
        }
    }
}
