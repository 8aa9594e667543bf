//! Common utilities used across the crate.
//!
//! This module provides the small numeric helpers shared by the ensemble
//! representation, the encoders and the reference solver.

// =============================================================================
// Statistical Utilities
// =============================================================================

/// Euler–Mascheroni constant, used by the harmonic-number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful search in a binary search tree
/// built from `n` samples.
///
/// This is the normalization term `c(n)` of isolation forests. It is added to
/// a leaf's depth to account for the unbuilt subtree below it:
///
/// - `c(n) = 0` for `n <= 1`
/// - `c(2) = 1`
/// - `c(n) = 2 H(n - 1) - 2 (n - 1) / n` otherwise, with `H(i) ≈ ln(i) + γ`
#[inline]
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Index of the largest value, breaking ties towards the lowest index.
///
/// Returns `None` for an empty iterator.
pub fn argmax_lowest<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

// =============================================================================
// Float Helpers
// =============================================================================

/// Whether `value` is within `tol` of an integer.
#[inline]
pub fn is_integral(value: f64, tol: f64) -> bool {
    (value - value.round()).abs() <= tol
}
