//! Analytic Jacobian of the basic first-order right-hand side.
//!
//! The `(N + M) x (N + M)` matrix splits into four blocks (spin-spin,
//! spin-auxiliary, auxiliary-spin, auxiliary-auxiliary), every one of
//! which vanishes outside a clause's support. Assembly therefore walks
//! each clause's literals instead of scanning dense index pairs, after
//! zero-filling the whole buffer.

use crate::clause::ClauseSet;
use crate::error::CtdsError;
use crate::kernel::{clause_factor, literal_factor, weighted_literal_factor, WeightedKernel};
use crate::rhs::{RhsVariant, SoftSpinSystem};
use crate::traits::Real;
use anyhow::Result;
use nalgebra::DMatrix;
use num_complex::Complex;

impl<T: Real> SoftSpinSystem<'_, T> {
    /// Fills `jac` (row-major, `dim x dim`) with the Jacobian of the
    /// variant's right-hand side.
    ///
    /// Only the basic first-order variant carries an analytic Jacobian.
    /// Every other variant — the squared-auxiliary law included —
    /// reports unsupported rather than borrowing a neighboring law's
    /// formula and silently returning a wrong matrix.
    pub fn jacobian(&self, y: &[T], jac: &mut [T]) -> Result<(), CtdsError> {
        if self.variant() != RhsVariant::Basic {
            return Err(CtdsError::UnsupportedJacobian(self.variant()));
        }
        if self.kernel() != WeightedKernel::LiteralSquared {
            return Err(CtdsError::UnsupportedKernel);
        }
        let dim = self.dimension();
        if y.len() != dim {
            return Err(CtdsError::BufferLength {
                name: "state",
                expected: dim,
                got: y.len(),
            });
        }
        if jac.len() != dim * dim {
            return Err(CtdsError::BufferLength {
                name: "jacobian",
                expected: dim * dim,
                got: jac.len(),
            });
        }
        basic_jacobian(self.clauses(), y, jac);
        Ok(())
    }
}

pub(crate) fn basic_jacobian<T: Real>(clauses: &ClauseSet, y: &[T], jac: &mut [T]) {
    let n = clauses.num_variables();
    let m_count = clauses.num_clauses();
    let dim = n + m_count;
    let (spins, aux) = y.split_at(n);

    for entry in jac.iter_mut() {
        *entry = T::zero();
    }

    let two = T::from_f64(2.0).unwrap();
    let diag_scale = T::from_f64(clauses.jacobian_scale()).unwrap();
    let off_scale = two * diag_scale;

    for m in 0..m_count {
        let support = clauses.support(m);

        for &iu in support {
            let i = iu as usize;
            let ci = T::from_i8(clauses.sign(m, i)).unwrap();

            // Spin-spin block: d(force_i)/d(s_j), accumulated over the
            // clauses containing both variables.
            for &ju in support {
                let j = ju as usize;
                let cj = T::from_i8(clauses.sign(m, j)).unwrap();
                let term = if i == j {
                    // Only the i-th margin of the weighted factor
                    // depends on s_i.
                    diag_scale * aux[m] * ci * (-ci)
                        * squared_margins_excluding(clauses, m, spins, i, i)
                } else {
                    let mu_i = margin_of(clauses, m, i, spins);
                    let mu_j = margin_of(clauses, m, j, spins);
                    off_scale * aux[m] * ci * (-cj) * mu_i * mu_j
                        * squared_margins_excluding(clauses, m, spins, i, j)
                };
                jac[i * dim + j] = jac[i * dim + j] + term;
            }

            // Spin-auxiliary block: d(force_i)/d(a_m).
            jac[i * dim + n + m] = two * ci * weighted_literal_factor(clauses, m, i, spins);

            // Auxiliary-spin block: d(a_m K_m)/d(s_i).
            jac[(n + m) * dim + i] = aux[m] * (-ci) * literal_factor(clauses, m, i, spins);
        }

        // Auxiliary-auxiliary block: the law is linear in its own weight
        // and independent of the other weights.
        jac[(n + m) * dim + n + m] = clause_factor(clauses, m, spins);
    }
}

#[inline]
fn margin_of<T: Real>(clauses: &ClauseSet, m: usize, i: usize, spins: &[T]) -> T {
    T::one() - T::from_i8(clauses.sign(m, i)).unwrap() * spins[i]
}

/// Product of squared margins over the support of clause `m`, excluding
/// `skip_a` and `skip_b`.
fn squared_margins_excluding<T: Real>(
    clauses: &ClauseSet,
    m: usize,
    spins: &[T],
    skip_a: usize,
    skip_b: usize,
) -> T {
    let mut product = T::one();
    for &lu in clauses.support(m) {
        let l = lu as usize;
        if l != skip_a && l != skip_b {
            let mu = margin_of(clauses, m, l, spins);
            product = product * mu * mu;
        }
    }
    product
}

/// Complex spectrum of the analytic Jacobian at `y`, for stability
/// analysis of the flow around a state.
pub fn jacobian_eigenvalues(
    system: &SoftSpinSystem<'_, f64>,
    y: &[f64],
) -> Result<Vec<Complex<f64>>> {
    let dim = system.dimension();
    let mut jac = vec![0.0; dim * dim];
    system.jacobian(y, &mut jac)?;
    let matrix = DMatrix::from_row_slice(dim, dim, &jac);
    Ok(matrix.complex_eigenvalues().iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::jacobian_eigenvalues;
    use crate::clause::ClauseSet;
    use crate::error::CtdsError;
    use crate::rhs::{ModelParams, RhsVariant, SoftSpinSystem};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_instance(rng: &mut SmallRng) -> (ClauseSet, Vec<f64>) {
        let n = rng.gen_range(4..=8);
        let m_count = rng.gen_range(4..=12);
        let mut signs = vec![0i8; n * m_count];
        for m in 0..m_count {
            let mut picked = Vec::new();
            while picked.len() < 3 {
                let i = rng.gen_range(0..n);
                if !picked.contains(&i) {
                    picked.push(i);
                }
            }
            for &i in &picked {
                signs[m * n + i] = if rng.gen_bool(0.5) { 1 } else { -1 };
            }
        }
        let clauses = ClauseSet::new(n, m_count, 3, signs).unwrap();
        let mut y = Vec::with_capacity(n + m_count);
        for _ in 0..n {
            y.push(rng.gen_range(-0.95..0.95));
        }
        for _ in 0..m_count {
            y.push(rng.gen_range(0.5..2.0));
        }
        (clauses, y)
    }

    fn finite_difference(
        system: &SoftSpinSystem<'_, f64>,
        y: &[f64],
        step: f64,
    ) -> Vec<f64> {
        let dim = system.dimension();
        let mut fd = vec![0.0; dim * dim];
        let mut plus = vec![0.0; dim];
        let mut minus = vec![0.0; dim];
        for j in 0..dim {
            let mut perturbed = y.to_vec();
            perturbed[j] = y[j] + step;
            system.rhs(&perturbed, &mut plus).unwrap();
            perturbed[j] = y[j] - step;
            system.rhs(&perturbed, &mut minus).unwrap();
            for i in 0..dim {
                fd[i * dim + j] = (plus[i] - minus[i]) / (2.0 * step);
            }
        }
        fd
    }

    #[test]
    fn basic_jacobian_matches_finite_differences() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for trial in 0..6 {
            let (clauses, y) = random_instance(&mut rng);
            let system =
                SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap();
            let dim = system.dimension();
            let mut jac = vec![0.0; dim * dim];
            system.jacobian(&y, &mut jac).unwrap();
            let fd = finite_difference(&system, &y, 1e-5);
            for i in 0..dim {
                for j in 0..dim {
                    let analytic = jac[i * dim + j];
                    let numeric = fd[i * dim + j];
                    let tolerance = 1e-6 * analytic.abs().max(1.0);
                    assert!(
                        (analytic - numeric).abs() <= tolerance,
                        "trial {trial}, entry ({i}, {j}): analytic {analytic}, numeric {numeric}"
                    );
                }
            }
        }
    }

    #[test]
    fn auxiliary_blocks_have_the_closed_forms() {
        // One clause keeps every block a single term.
        let clauses = ClauseSet::new(3, 1, 3, vec![1, -1, 1]).unwrap();
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap();
        let y = [0.5f64, -0.25, 0.0, 2.0];
        let mut jac = vec![0.0f64; 16];
        system.jacobian(&y, &mut jac).unwrap();

        let spins = &y[..3];
        let k = crate::kernel::clause_factor(&clauses, 0, spins);
        // d(a K)/da = K on the diagonal of the auxiliary block.
        assert!((jac[3 * 4 + 3] - k).abs() < 1e-15);
        for j in 0..3 {
            let sign = clauses.sign(0, j) as f64;
            let lf = crate::kernel::literal_factor(&clauses, 0, j, spins);
            assert!((jac[3 * 4 + j] - y[3] * (-sign) * lf).abs() < 1e-15, "column {j}");
            let wlf = crate::kernel::weighted_literal_factor(&clauses, 0, j, spins);
            assert!((jac[j * 4 + 3] - 2.0 * sign * wlf).abs() < 1e-15, "row {j}");
        }
    }

    #[test]
    fn non_basic_variants_report_unsupported() {
        let clauses = ClauseSet::new(3, 1, 3, vec![1, -1, 1]).unwrap();
        for variant in [
            RhsVariant::SquaredAux,
            RhsVariant::PotentialSquared,
            RhsVariant::TimeReversed,
            RhsVariant::PairwiseMemory,
        ] {
            let system =
                SoftSpinSystem::new(&clauses, variant, ModelParams::default()).unwrap();
            let dim = system.dimension();
            let mut jac = vec![0.0; dim * dim];
            let err = system
                .jacobian(&vec![0.5; dim], &mut jac)
                .expect_err("no analytic jacobian");
            assert!(matches!(err, CtdsError::UnsupportedJacobian(v) if v == variant));
        }
    }

    #[test]
    fn alternate_kernel_has_no_analytic_jacobian() {
        let clauses = ClauseSet::new(3, 1, 3, vec![1, -1, 1]).unwrap();
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default())
                .unwrap()
                .with_kernel(crate::kernel::WeightedKernel::ClauseSquared);
        let mut jac = vec![0.0; 16];
        let err = system.jacobian(&[0.0; 4], &mut jac).expect_err("kernel");
        assert!(matches!(err, CtdsError::UnsupportedKernel));
    }

    #[test]
    fn jacobian_rejects_mismatched_buffers() {
        let clauses = ClauseSet::new(3, 1, 3, vec![1, -1, 1]).unwrap();
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap();
        let mut jac = vec![0.0; 16];
        let err = system.jacobian(&[0.0; 3], &mut jac).expect_err("state");
        assert!(matches!(err, CtdsError::BufferLength { name: "state", .. }));
        let mut short = vec![0.0; 15];
        let err = system.jacobian(&[0.0; 4], &mut short).expect_err("jacobian");
        assert!(matches!(err, CtdsError::BufferLength { name: "jacobian", .. }));
    }

    #[test]
    fn eigenvalue_sum_matches_the_trace() {
        let mut rng = SmallRng::seed_from_u64(42);
        let (clauses, y) = random_instance(&mut rng);
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap();
        let dim = system.dimension();
        let mut jac = vec![0.0; dim * dim];
        system.jacobian(&y, &mut jac).unwrap();
        let trace: f64 = (0..dim).map(|i| jac[i * dim + i]).sum();

        let eigenvalues = jacobian_eigenvalues(&system, &y).unwrap();
        assert_eq!(eigenvalues.len(), dim);
        let re_sum: f64 = eigenvalues.iter().map(|e| e.re).sum();
        let im_sum: f64 = eigenvalues.iter().map(|e| e.im).sum();
        assert!((re_sum - trace).abs() < 1e-8 * trace.abs().max(1.0));
        assert!(im_sum.abs() < 1e-8);
    }
}
