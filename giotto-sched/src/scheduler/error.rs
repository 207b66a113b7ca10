/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for schedule construction.
//!
//! Two enums model the two failure layers:
//!
//! * [`ConfigIssue`]: which configuration value is unusable (carries the
//!   exact offending value).
//! * [`SchedulerError`]: top-level failure returned from
//!   [`ScheduleBuilder::build()`](super::ScheduleBuilder::build).
//!
//! Every variant is fatal: a director whose schedule cannot be built must not
//! start.

use thiserror::Error;

use crate::rate::RateError;

// ── Configuration issues ──────────────────────────────────────────────────────

/// A configuration value that makes scheduling impossible.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    /// A task's frequency resolved to zero or a negative value.
    NonPositiveFrequency { task: String, frequency: i64 },

    /// The director period is zero, negative or not finite.
    NonPositivePeriod { period: f64 },

    /// A nested director's container frequency is zero or negative.
    NonPositiveContainerFrequency { frequency: i64 },
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigIssue::NonPositiveFrequency { task, frequency } => write!(
                f,
                "task '{}' has frequency {}, frequencies must be >= 1",
                task, frequency
            ),

            ConfigIssue::NonPositivePeriod { period } => {
                write!(f, "period {} is not a positive duration", period)
            }

            ConfigIssue::NonPositiveContainerFrequency { frequency } => write!(
                f,
                "container frequency {} is not positive, cannot derive nested period",
                frequency
            ),
        }
    }
}

// ── Top-level scheduler errors ────────────────────────────────────────────────

/// Error returned while building a [`Schedule`](super::Schedule).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No tasks to schedule.
    #[error("not schedulable: task list is empty ({task_count} tasks)")]
    NotSchedulable { task_count: usize },

    /// A frequency or period value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(ConfigIssue),

    /// The frequency set could not be reduced (overflow or too many slots).
    #[error("rate computation failed: {0}")]
    Rate(#[from] RateError),
}

impl From<ConfigIssue> for SchedulerError {
    fn from(issue: ConfigIssue) -> Self {
        SchedulerError::InvalidConfiguration(issue)
    }
}
