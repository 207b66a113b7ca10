/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! WCET budget analysis for a built schedule.
//!
//! # Status: warning only
//!
//! The report is **computed and logged** by the director at preinitialize
//! time.  A violation never prevents the director from starting; runtime
//! overruns are tracked separately by the
//! [`TimingMonitor`](crate::director::TimingMonitor).
//!
//! # Theory
//! Under the logical-execution-time model a task with frequency `f` is
//! released at the start of its window and must finish before the next one,
//! so each firing has `period / f` time units available:
//!
//! $$C_i \leq \frac{P}{f_i}$$
//!
//! Since all tasks share one processor and run to completion one after the
//! other, the summed demand of one full cycle must also fit into the period:
//!
//! $$\sum_{i} C_i \cdot f_i \leq P$$
//!
//! Tasks without a WCET attribute contribute nothing.

use super::Schedule;
use crate::task::AttributeTable;

// ── Public API ────────────────────────────────────────────────────────────────

/// Logical execution window of one firing: `period / frequency`.
///
/// Returns `0.0` for `frequency == 0`.
pub fn execution_window(period: f64, frequency: u64) -> f64 {
    if frequency == 0 {
        return 0.0;
    }
    period / frequency as f64
}

/// A task whose WCET does not fit into its execution window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowViolation {
    pub task: String,
    pub wcet: f64,
    pub window: f64,
}

/// Outcome of [`check_wcet_budget`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibilityReport {
    pub period: f64,

    /// `Σ wcet · frequency` over all tasks with a WCET.
    pub total_demand: f64,

    pub window_violations: Vec<WindowViolation>,
}

impl FeasibilityReport {
    pub fn demand_exceeds_period(&self) -> bool {
        self.total_demand > self.period
    }

    /// `true` if no task overruns its window and the total demand fits.
    pub fn is_feasible(&self) -> bool {
        self.window_violations.is_empty() && !self.demand_exceeds_period()
    }
}

/// Check every task of `schedule` against its WCET attribute.
pub fn check_wcet_budget(
    schedule: &Schedule,
    attributes: &AttributeTable,
    period: f64,
) -> FeasibilityReport {
    let mut total_demand = 0.0;
    let mut window_violations = Vec::new();

    for (i, name) in schedule.task_names().iter().enumerate() {
        let Some(wcet) = attributes.wcet(name) else {
            continue;
        };
        let frequency = schedule.frequency(i).unwrap_or(1);
        total_demand += wcet * frequency as f64;

        let window = execution_window(period, frequency);
        if wcet > window {
            window_violations.push(WindowViolation {
                task: name.clone(),
                wcet,
                window,
            });
        }
    }

    FeasibilityReport {
        period,
        total_demand,
        window_violations,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
