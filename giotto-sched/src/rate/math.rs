/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pure arithmetic helpers: GCD and checked LCM over task frequencies.
//!
//! These are free functions rather than methods so they can be used and tested
//! independently of [`RateInfo`](super::RateInfo).

use super::RateError;

/// Iterative Euclidean GCD.  Returns the other operand when one input is `0`.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Checked LCM: returns `Err(RateError::Overflow { a, b })` if the result
/// would overflow `u64`.
///
/// Uses `(a / gcd(a, b)) * b` so the division happens first; the final
/// multiplication is still checked.
///
/// Returns `Ok(0)` when either input is `0`, matching standard LCM convention.
pub fn lcm(a: u64, b: u64) -> Result<u64, RateError> {
    if a == 0 || b == 0 {
        return Ok(0);
    }

    let g = gcd(a, b);
    // a / g is exact (g divides a by definition)
    let reduced = a / g;

    reduced
        .checked_mul(b)
        .ok_or(RateError::Overflow { a, b })
}

/// Greatest common divisor of a whole frequency set.
///
/// # Errors
/// [`RateError::EmptyInput`] for an empty slice.
pub fn gcd_of_slice(values: &[u64]) -> Result<u64, RateError> {
    let (&first, rest) = values.split_first().ok_or(RateError::EmptyInput)?;
    Ok(rest.iter().fold(first, |acc, &v| gcd(acc, v)))
}

/// Least common multiple of a whole frequency set.
///
/// # Errors
/// * [`RateError::EmptyInput`] for an empty slice.
/// * [`RateError::Overflow`] on the first overflow encountered.
pub fn lcm_of_slice(values: &[u64]) -> Result<u64, RateError> {
    let (&first, rest) = values.split_first().ok_or(RateError::EmptyInput)?;
    rest.iter().try_fold(first, |acc, &v| lcm(acc, v))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
