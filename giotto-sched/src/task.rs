/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task abstraction and per-task timing attributes.
//!
//! ```text
//! model config ──► AttributeTable ──(frequency / wcet)──► ScheduleBuilder
//!                                                          │
//! Vec<Box<dyn Task>> ─────────(fire / output_connections)──► GiottoDirector
//! ```
//!
//! # Ownership model
//! Tasks are **owned** by the [`GiottoDirector`](crate::director::GiottoDirector)
//! for the duration of a run.  Timing attributes are *not* stored on the tasks
//! themselves: they live in an [`AttributeTable`] side-table keyed by task
//! name, populated once while the topology is resolved.  The scheduler only
//! reads names and frequencies and never mutates a task.

use std::collections::HashMap;

use tracing::debug;

use crate::channel::CommitHandle;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Name of the per-task frequency attribute.
pub const FREQUENCY_ATTRIBUTE: &str = "frequency";

/// Frequency used when the attribute is missing or malformed.
pub const DEFAULT_FREQUENCY: i64 = 1;

// ── Firing ────────────────────────────────────────────────────────────────────

/// Result of one task firing.
///
/// Replaces a magic integer return code with a typed outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireOutcome {
    /// The firing ran to completion.
    Completed,

    /// The task asks to be fired again after the given delay (seconds).
    /// A time-triggered director only fires tasks in their slots, so this is
    /// logged and otherwise treated as [`FireOutcome::Completed`].
    Retrigger(f64),

    /// The task wishes to halt.  Logged as a warning; the schedule carries on.
    StopIterating,
}

/// Read-only view of the director state handed to each firing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireContext {
    /// Logical time of the slot being fired.
    pub model_time: f64,

    /// Index of the slot within the schedule.
    pub slot: usize,

    /// Number of completed schedule cycles.
    pub iteration: u64,
}

/// A schedulable unit of work.
///
/// Task bodies are opaque to the director: they run to completion, one at a
/// time, in schedule order.  Failures are plain `anyhow` errors.
pub trait Task {
    /// Stable identity; also the key into the [`AttributeTable`].
    fn name(&self) -> &str;

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn fire(&mut self, ctx: &FireContext) -> anyhow::Result<FireOutcome>;

    fn wrapup(&mut self) {}

    /// Every channel fed by this task's output ports.  The director commits
    /// them right before the task's next scheduled firing.
    fn output_connections(&self) -> Vec<CommitHandle> {
        Vec::new()
    }
}

// ── Attributes ────────────────────────────────────────────────────────────────

/// Timing attributes attached to one task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskAttributes {
    /// Raw frequency expression as it appeared in the configuration.
    pub frequency: Option<String>,

    /// Worst-case execution time in seconds.
    pub wcet: Option<f64>,
}

/// Source of per-task frequencies for the schedule builder.
///
/// Implementations may return non-positive values; the builder rejects them
/// with [`SchedulerError::InvalidConfiguration`](crate::scheduler::SchedulerError).
pub trait FrequencyResolver {
    fn frequency(&self, task: &str) -> i64;
}

impl<F> FrequencyResolver for F
where
    F: Fn(&str) -> i64,
{
    fn frequency(&self, task: &str) -> i64 {
        self(task)
    }
}

/// Parse a frequency expression.  Only integers `>= 1` are accepted.
pub fn parse_frequency(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|&f| f >= 1)
}

/// Side-table: task name → [`TaskAttributes`].
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    entries: HashMap<String, TaskAttributes>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a raw frequency expression to `task`.
    pub fn set_frequency_expr(&mut self, task: &str, expr: impl Into<String>) {
        self.entries.entry(task.to_string()).or_default().frequency = Some(expr.into());
    }

    /// Attach an integer frequency to `task`.
    pub fn set_frequency(&mut self, task: &str, frequency: i64) {
        self.set_frequency_expr(task, frequency.to_string());
    }

    pub fn set_wcet(&mut self, task: &str, wcet: f64) {
        self.entries.entry(task.to_string()).or_default().wcet = Some(wcet);
    }

    pub fn insert(&mut self, task: &str, attrs: TaskAttributes) {
        self.entries.insert(task.to_string(), attrs);
    }

    pub fn get(&self, task: &str) -> Option<&TaskAttributes> {
        self.entries.get(task)
    }

    pub fn wcet(&self, task: &str) -> Option<f64> {
        self.entries.get(task).and_then(|a| a.wcet)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FrequencyResolver for AttributeTable {
    /// Permissive lookup: a missing or malformed frequency resolves to
    /// [`DEFAULT_FREQUENCY`].  Never fails.
    fn frequency(&self, task: &str) -> i64 {
        let raw = match self.entries.get(task).and_then(|a| a.frequency.as_deref()) {
            Some(raw) => raw,
            None => return DEFAULT_FREQUENCY,
        };
        match parse_frequency(raw) {
            Some(f) => f,
            None => {
                debug!(
                    task,
                    attribute = FREQUENCY_ATTRIBUTE,
                    value = raw,
                    "malformed frequency, using default"
                );
                DEFAULT_FREQUENCY
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
