//! Variational (tangent-space) extension of a soft-spin flow.
//!
//! Augments the state with a row-major tangent matrix `Phi` and evolves
//! it by `dPhi/dt = J(y) Phi` alongside the flow — the system a
//! Lyapunov-spectrum driver integrates. The augmented evaluation is
//! itself a plain vector field, so any external stepper can consume it;
//! re-orthonormalization and exponent extraction stay with the caller.

use crate::error::CtdsError;
use crate::jacobian::basic_jacobian;
use crate::kernel::WeightedKernel;
use crate::rhs::SoftSpinSystem;
use crate::traits::VectorField;
use std::cell::RefCell;

#[derive(Debug)]
pub struct VariationalSystem<'a> {
    system: SoftSpinSystem<'a, f64>,
    base_dimension: usize,
    jac_scratch: RefCell<Vec<f64>>,
}

impl<'a> VariationalSystem<'a> {
    /// Wraps a flow whose variant carries an analytic Jacobian.
    pub fn new(system: SoftSpinSystem<'a, f64>) -> Result<Self, CtdsError> {
        if !system.variant().has_jacobian() {
            return Err(CtdsError::UnsupportedJacobian(system.variant()));
        }
        if system.kernel() != WeightedKernel::LiteralSquared {
            return Err(CtdsError::UnsupportedKernel);
        }
        let base_dimension = system.dimension();
        Ok(Self {
            system,
            base_dimension,
            jac_scratch: RefCell::new(vec![0.0; base_dimension * base_dimension]),
        })
    }

    /// Dimension of the wrapped flow (the tangent matrix adds its
    /// square on top).
    pub fn base_dimension(&self) -> usize {
        self.base_dimension
    }
}

impl VectorField<f64> for VariationalSystem<'_> {
    fn dimension(&self) -> usize {
        self.base_dimension + self.base_dimension * self.base_dimension
    }

    fn eval(&self, y: &[f64], dydt: &mut [f64]) {
        let d = self.base_dimension;
        debug_assert_eq!(y.len(), d + d * d);
        debug_assert_eq!(dydt.len(), d + d * d);

        let (base, phi) = y.split_at(d);
        let (base_out, phi_out) = dydt.split_at_mut(d);
        self.system.eval(base, base_out);

        let mut jac = self.jac_scratch.borrow_mut();
        basic_jacobian(self.system.clauses(), base, jac.as_mut_slice());

        // dPhi = J * Phi, everything row-major.
        for i in 0..d {
            for j in 0..d {
                let mut sum = 0.0;
                for k in 0..d {
                    sum += jac[i * d + k] * phi[k * d + j];
                }
                phi_out[i * d + j] = sum;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VariationalSystem;
    use crate::clause::ClauseSet;
    use crate::error::CtdsError;
    use crate::rhs::{ModelParams, RhsVariant, SoftSpinSystem};
    use crate::traits::VectorField;

    fn single_clause() -> ClauseSet {
        ClauseSet::new(3, 1, 3, vec![1, -1, 1]).unwrap()
    }

    #[test]
    fn identity_tangent_reproduces_the_jacobian() {
        let clauses = single_clause();
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap();
        let y = [0.5, -0.25, 0.0, 2.0];
        let mut jac = vec![0.0; 16];
        system.jacobian(&y, &mut jac).unwrap();
        let mut flow = vec![0.0; 4];
        system.rhs(&y, &mut flow).unwrap();

        let variational = VariationalSystem::new(
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap(),
        )
        .unwrap();
        assert_eq!(variational.base_dimension(), 4);
        assert_eq!(variational.dimension(), 4 + 16);

        let mut augmented = y.to_vec();
        for i in 0..4 {
            for j in 0..4 {
                augmented.push(if i == j { 1.0 } else { 0.0 });
            }
        }
        let mut out = vec![0.0; augmented.len()];
        variational.eval(&augmented, &mut out);

        assert_eq!(&out[..4], &flow[..]);
        for (idx, &expected) in jac.iter().enumerate() {
            assert!((out[4 + idx] - expected).abs() < 1e-15, "entry {idx}");
        }
    }

    #[test]
    fn tangent_columns_transform_independently() {
        let clauses = single_clause();
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap();
        let y = [0.1, 0.2, -0.3, 1.5];
        let mut jac = vec![0.0; 16];
        system.jacobian(&y, &mut jac).unwrap();

        let variational = VariationalSystem::new(
            SoftSpinSystem::new(&clauses, RhsVariant::Basic, ModelParams::default()).unwrap(),
        )
        .unwrap();
        // Phi with a single nonzero column v in column 0.
        let v = [0.5, -1.0, 2.0, 0.25];
        let mut augmented = y.to_vec();
        let mut phi = vec![0.0; 16];
        for i in 0..4 {
            phi[i * 4] = v[i];
        }
        augmented.extend_from_slice(&phi);
        let mut out = vec![0.0; augmented.len()];
        variational.eval(&augmented, &mut out);

        for i in 0..4 {
            let expected: f64 = (0..4).map(|k| jac[i * 4 + k] * v[k]).sum();
            assert!((out[4 + i * 4] - expected).abs() < 1e-15, "row {i}");
            for j in 1..4 {
                assert_eq!(out[4 + i * 4 + j], 0.0);
            }
        }
    }

    #[test]
    fn construction_requires_an_analytic_jacobian() {
        let clauses = single_clause();
        let system =
            SoftSpinSystem::new(&clauses, RhsVariant::SquaredAux, ModelParams::default()).unwrap();
        let err = VariationalSystem::new(system).expect_err("no jacobian");
        assert!(matches!(
            err,
            CtdsError::UnsupportedJacobian(RhsVariant::SquaredAux)
        ));
    }
}
