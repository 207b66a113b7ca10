/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Errors returned by [`GiottoDirector`](super::GiottoDirector).

use thiserror::Error;

use crate::scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum DirectorError {
    /// The schedule could not be built, or the period is unusable.
    #[error(transparent)]
    Schedule(#[from] SchedulerError),

    /// `initialize()` or `fire()` was called before `preinitialize()`.
    #[error("director has no schedule, preinitialize() must run first")]
    NotPreinitialized,

    #[error("task '{task}' failed to initialize")]
    TaskInit {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// First task failure of a slot under
    /// [`ErrorPolicy::Propagate`](crate::config::ErrorPolicy::Propagate).
    #[error("task '{task}' failed at model time {model_time}")]
    TaskFailed {
        task: String,
        model_time: f64,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "iteration {iteration} took {observed:.6}s of execution time, period is {period}s"
    )]
    TimingOverrun {
        iteration: u64,
        observed: f64,
        period: f64,
    },
}
