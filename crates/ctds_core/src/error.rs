use crate::rhs::RhsVariant;
use thiserror::Error;

/// Failure conditions of the evaluation core.
///
/// Everything here is a caller-contract violation caught at the
/// boundary; once evaluation starts there are no recoverable errors.
#[derive(Debug, Error)]
pub enum CtdsError {
    #[error("variable count must be positive")]
    NoVariables,

    #[error("clause count must be positive")]
    NoClauses,

    #[error("clause arity must be between 1 and the variable count, got {arity}")]
    BadArity { arity: usize },

    #[error("{name} has length {got}, expected {expected}")]
    BufferLength {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("sign of variable {variable} in clause {clause} must be -1, 0 or +1, got {value}")]
    BadSign {
        clause: usize,
        variable: usize,
        value: i32,
    },

    #[error("clause {clause} carries {got} literals, expected {expected}")]
    WrongLiteralCount {
        clause: usize,
        expected: usize,
        got: usize,
    },

    #[error("parameter {name} is out of range: {value}")]
    BadParameter { name: &'static str, value: f64 },

    #[error("no analytic Jacobian is implemented for the {0:?} right-hand side")]
    UnsupportedJacobian(RhsVariant),

    #[error("the analytic Jacobian covers only the literal-squared weighted kernel")]
    UnsupportedKernel,
}
