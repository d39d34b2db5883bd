//! C ABI for the CTDS evaluation core.
//!
//! Host integrators (for example a Python driver loading this library
//! through `ctypes`) call these entry points with flat buffers: the
//! clause matrix as row-major `int32`, state and result as `double`.
//! Every call is stateless and reentrant — nothing is retained between
//! calls, so concurrent callers only need disjoint buffers.
//!
//! All entry points return `CTDS_OK` (0) on success and a negative
//! status code on failure; panics are caught at the boundary and
//! reported as `CTDS_PANIC` instead of unwinding into the host.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::slice;

use ctds_core::clause::ClauseSet;
use ctds_core::error::CtdsError;
use ctds_core::rhs::{ModelParams, RhsVariant, SoftSpinSystem};

pub const CTDS_OK: i32 = 0;
pub const CTDS_NULL_POINTER: i32 = -1;
pub const CTDS_BAD_VARIANT: i32 = -2;
pub const CTDS_BAD_PROBLEM: i32 = -3;
pub const CTDS_BAD_STATE: i32 = -4;
pub const CTDS_UNSUPPORTED_JACOBIAN: i32 = -5;
pub const CTDS_PANIC: i32 = -6;

fn variant_from_tag(tag: i32) -> Option<RhsVariant> {
    match tag {
        1 => Some(RhsVariant::Basic),
        2 => Some(RhsVariant::SquaredAux),
        3 => Some(RhsVariant::PotentialSquared),
        4 => Some(RhsVariant::PotentialLinear),
        5 => Some(RhsVariant::TimeReversed),
        6 => Some(RhsVariant::ExponentialMemory),
        7 => Some(RhsVariant::LogBarrier),
        8 => Some(RhsVariant::FrozenAux),
        9 => Some(RhsVariant::PairwiseMemory),
        _ => None,
    }
}

fn status_from(err: CtdsError) -> i32 {
    match err {
        CtdsError::UnsupportedJacobian(_) | CtdsError::UnsupportedKernel => {
            CTDS_UNSUPPORTED_JACOBIAN
        }
        CtdsError::BufferLength { .. } => CTDS_BAD_STATE,
        _ => CTDS_BAD_PROBLEM,
    }
}

/// Rebuilds and revalidates the clause structure from the host's
/// row-major `int32` matrix. Arity is uniform across clauses and read
/// off the first row.
///
/// # Safety
///
/// `c` must point to `n * m` readable `int32` values.
unsafe fn build_clauses(n: i32, m: i32, c: *const i32) -> Result<ClauseSet, i32> {
    if c.is_null() {
        return Err(CTDS_NULL_POINTER);
    }
    if n <= 0 || m <= 0 {
        return Err(CTDS_BAD_PROBLEM);
    }
    let (n, m) = (n as usize, m as usize);
    let raw = slice::from_raw_parts(c, n * m);
    let mut signs = Vec::with_capacity(raw.len());
    for &value in raw {
        if !(-1..=1).contains(&value) {
            return Err(CTDS_BAD_PROBLEM);
        }
        signs.push(value as i8);
    }
    let arity = signs[..n].iter().filter(|&&s| s != 0).count();
    ClauseSet::new(n, m, arity, signs).map_err(|_| CTDS_BAD_PROBLEM)
}

/// Evaluates the right-hand side of the selected variant into `out`.
///
/// Variant tags: 1 basic, 2 squared-auxiliary, 3 central potential with
/// squared auxiliary, 4 central potential with linear auxiliary, 5
/// time-reversed, 6 exponential memory, 7 log-barrier, 8 frozen
/// auxiliary, 9 pairwise memory. `b_const` and `lambda` are ignored by
/// the variants that do not use them.
///
/// # Safety
///
/// `c` must point to `n * m` readable `int32` values; `y` and `out`
/// must point to `dim` readable (resp. writable) doubles, where
/// `dim = n + m` for tags 1-8 and `n + m (m + 1) / 2` for tag 9.
#[no_mangle]
pub unsafe extern "C" fn ctds_rhs(
    variant: i32,
    n: i32,
    m: i32,
    b_const: f64,
    lambda: f64,
    c: *const i32,
    y: *const f64,
    out: *mut f64,
) -> i32 {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let variant = match variant_from_tag(variant) {
            Some(v) => v,
            None => return CTDS_BAD_VARIANT,
        };
        if y.is_null() || out.is_null() {
            return CTDS_NULL_POINTER;
        }
        let clauses = match unsafe { build_clauses(n, m, c) } {
            Ok(clauses) => clauses,
            Err(status) => return status,
        };
        let params = ModelParams {
            potential_strength: b_const,
            relaxation: lambda,
        };
        let system = match SoftSpinSystem::<f64>::new(&clauses, variant, params) {
            Ok(system) => system,
            Err(err) => return status_from(err),
        };
        let dim = system.dimension();
        let state = unsafe { slice::from_raw_parts(y, dim) };
        let result = unsafe { slice::from_raw_parts_mut(out, dim) };
        match system.rhs(state, result) {
            Ok(()) => CTDS_OK,
            Err(err) => status_from(err),
        }
    }));
    outcome.unwrap_or(CTDS_PANIC)
}

/// Fills `out` with the row-major `(n + m) x (n + m)` Jacobian of the
/// selected variant. Only the basic variant (tag 1) carries an analytic
/// Jacobian; every other tag returns `CTDS_UNSUPPORTED_JACOBIAN`
/// without touching `out`.
///
/// # Safety
///
/// `c` must point to `n * m` readable `int32` values; `y` must point to
/// `n + m` readable doubles and `out` to `(n + m)^2` writable doubles.
#[no_mangle]
pub unsafe extern "C" fn ctds_jacobian(
    variant: i32,
    n: i32,
    m: i32,
    c: *const i32,
    y: *const f64,
    out: *mut f64,
) -> i32 {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let variant = match variant_from_tag(variant) {
            Some(v) => v,
            None => return CTDS_BAD_VARIANT,
        };
        if !variant.has_jacobian() {
            return CTDS_UNSUPPORTED_JACOBIAN;
        }
        if y.is_null() || out.is_null() {
            return CTDS_NULL_POINTER;
        }
        let clauses = match unsafe { build_clauses(n, m, c) } {
            Ok(clauses) => clauses,
            Err(status) => return status,
        };
        let system =
            match SoftSpinSystem::<f64>::new(&clauses, variant, ModelParams::default()) {
                Ok(system) => system,
                Err(err) => return status_from(err),
            };
        let dim = system.dimension();
        let state = unsafe { slice::from_raw_parts(y, dim) };
        let result = unsafe { slice::from_raw_parts_mut(out, dim * dim) };
        match system.jacobian(state, result) {
            Ok(()) => CTDS_OK,
            Err(err) => status_from(err),
        }
    }));
    outcome.unwrap_or(CTDS_PANIC)
}
