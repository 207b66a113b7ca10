/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Runtime execution-time bookkeeping.
//!
//! Each firing's wall-clock duration is compared against the task's WCET
//! attribute, and the summed execution time of one cycle against the period.
//! Waiting in real-time mode is not execution time and is never recorded.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::warn;

/// Execution time bookkeeping for one director.
#[derive(Debug, Clone, Default)]
pub struct TimingMonitor {
    observed: Duration,
    task_overruns: BTreeMap<String, u64>,
    iteration_overruns: u64,
}

impl TimingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one firing.  Returns `true` if it exceeded `wcet` seconds.
    pub fn record_firing(&mut self, task: &str, wcet: Option<f64>, elapsed: Duration) -> bool {
        self.observed += elapsed;

        let Some(wcet) = wcet else {
            return false;
        };
        let took = elapsed.as_secs_f64();
        if took <= wcet {
            return false;
        }

        let count = self.task_overruns.entry(task.to_string()).or_insert(0);
        *count += 1;
        warn!(
            task,
            took_s = took,
            wcet_s = wcet,
            overruns = *count,
            "task exceeded its WCET"
        );
        true
    }

    /// Close the current cycle.  Returns the observed execution time in
    /// seconds when it exceeded `period`; the accumulator is reset either way.
    pub fn finish_iteration(&mut self, iteration: u64, period: f64) -> Option<f64> {
        let observed = std::mem::take(&mut self.observed).as_secs_f64();
        if observed <= period {
            return None;
        }
        self.iteration_overruns += 1;
        warn!(
            iteration,
            observed_s = observed,
            period_s = period,
            "cycle execution time exceeded the period"
        );
        Some(observed)
    }

    /// Execution time accumulated in the current cycle.
    pub fn observed(&self) -> Duration {
        self.observed
    }

    pub fn task_overruns(&self, task: &str) -> u64 {
        self.task_overruns.get(task).copied().unwrap_or(0)
    }

    pub fn total_task_overruns(&self) -> u64 {
        self.task_overruns.values().sum()
    }

    pub fn iteration_overruns(&self) -> u64 {
        self.iteration_overruns
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
