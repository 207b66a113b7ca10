/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Rate arithmetic for a set of periodic tasks.
//!
//! Every task fires `frequency` times per period.  The LCM of all frequencies
//! is the number of elementary units (slots) one period is divided into; the
//! GCD is the number of times the whole firing pattern repeats inside one
//! period.
//!
//! | Value | Meaning |
//! |---|---|
//! | `lcm` | slots per period, each `period / lcm` long |
//! | `interval[i]` | `lcm / frequency[i]`, slots between two firings of task `i` |
//! | `gcd` | repetitions of the firing pattern within one period |

pub mod math;

use tracing::{debug, warn};

use math::{gcd_of_slice, lcm_of_slice};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default upper limit on the LCM of a frequency set, i.e. on the number of
/// slots in one schedule cycle.
pub const DEFAULT_MAX_SLOTS: u64 = 1_000_000;

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors that can occur while reducing a frequency set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    /// The frequency sequence was empty.
    EmptyInput,

    /// LCM calculation overflowed `u64`.
    Overflow { a: u64, b: u64 },

    /// The LCM (slot count) exceeded the configured limit.
    TooLarge { lcm: u64, limit: u64 },
}

impl std::fmt::Display for RateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateError::EmptyInput => write!(f, "frequency set is empty"),
            RateError::Overflow { a, b } => write!(f, "LCM overflow computing lcm({a}, {b})"),
            RateError::TooLarge { lcm, limit } => {
                write!(f, "LCM of frequencies is {lcm}, exceeding the slot limit {limit}")
            }
        }
    }
}

impl std::error::Error for RateError {}

// ── RateInfo ──────────────────────────────────────────────────────────────────

/// Reduced rate information for one ordered frequency set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateInfo {
    /// Frequencies in task order.
    pub frequencies: Vec<u64>,

    /// LCM of all frequencies.
    pub lcm: u64,

    /// GCD of all frequencies.
    pub gcd: u64,

    /// `lcm / frequency` per task, in task order.
    pub intervals: Vec<u64>,
}

impl RateInfo {
    /// Reduce `frequencies` using the default slot limit.
    pub fn compute(frequencies: &[u64]) -> Result<Self, RateError> {
        Self::compute_with_limit(frequencies, DEFAULT_MAX_SLOTS)
    }

    /// Reduce `frequencies`, rejecting an LCM above `max_slots`.
    ///
    /// Callers are expected to have validated every frequency as `>= 1`.
    ///
    /// # Errors
    /// * [`RateError::EmptyInput`] – `frequencies` is empty.
    /// * [`RateError::Overflow`] – LCM computation exceeded `u64`.
    /// * [`RateError::TooLarge`] – LCM exceeds `max_slots`.
    pub fn compute_with_limit(frequencies: &[u64], max_slots: u64) -> Result<Self, RateError> {
        let lcm = lcm_of_slice(frequencies)?;
        let gcd = gcd_of_slice(frequencies)?;

        if lcm > max_slots {
            warn!(lcm, limit = max_slots, "Frequency LCM exceeds slot limit");
            return Err(RateError::TooLarge {
                lcm,
                limit: max_slots,
            });
        }

        let intervals: Vec<u64> = frequencies.iter().map(|&f| lcm / f).collect();

        let info = Self {
            frequencies: frequencies.to_vec(),
            lcm,
            gcd,
            intervals,
        };

        debug!(
            lcm,
            gcd,
            task_count = frequencies.len(),
            unique = ?info.unique_frequencies(),
            "Reduced frequency set"
        );

        Ok(info)
    }

    /// Sorted, deduplicated frequencies.
    pub fn unique_frequencies(&self) -> Vec<u64> {
        let mut v = self.frequencies.clone();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// Length of one slot for the given period: `period / lcm`.
    pub fn unit_increment(&self, period: f64) -> f64 {
        period / self.lcm as f64
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
