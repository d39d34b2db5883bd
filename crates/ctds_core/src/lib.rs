//! The `ctds_core` crate is the evaluation engine for continuous-time
//! dynamical-system SAT solving. A Boolean instance is relaxed into a
//! flow over soft spins (one per variable) coupled to adaptive clause
//! weights; an external integrator owns the state and repeatedly asks
//! this crate for the right-hand side and, for implicit stepping, the
//! Jacobian. The crate itself never steps, never detects convergence,
//! and never parses problem files.
//!
//! Key components:
//! - **`clause`**: validated literal-sign matrix with per-clause support
//!   and per-variable occurrence lists.
//! - **`kernel`**: the per-clause satisfaction kernels and force terms.
//! - **`rhs`**: the variant-tagged polymorphic evaluator.
//! - **`jacobian`**: the analytic four-block Jacobian and its spectrum.
//! - **`variational`**: the tangent-space extension `[f | J Phi]`.

pub mod clause;
pub mod error;
pub mod jacobian;
pub mod kernel;
pub mod rhs;
pub mod traits;
pub mod variational;
