/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! giotto-sched – static time-triggered task scheduling
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── rate/           – GCD / LCM helpers and frequency-set reduction
//! ├── task.rs         – Task trait, timing attributes, frequency resolution
//! ├── channel.rs      – double-buffered channels and ports
//! ├── scheduler/      – slot schedule construction and WCET budget check
//! ├── director/       – time-triggered fire loop, stop handle, timing monitor
//! └── config/         – director parameters and YAML model loading
//! ```

pub mod channel;
pub mod config;
pub mod director;
pub mod rate;
pub mod scheduler;
pub mod task;
