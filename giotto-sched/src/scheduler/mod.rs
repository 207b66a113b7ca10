//! Static time-triggered schedule construction.
//!
//! [`ScheduleBuilder`] turns an ordered task list plus per-task frequencies
//! into a [`Schedule`]: one [`TimeSlot`] per elementary unit of
//! `period / lcm`, each holding the [`Firing`]s due in that unit.
//!
//! # Slot granularity
//!
//! Task `i` with frequency `f_i` fires every `interval_i = lcm / f_i` slots,
//! i.e. in slot `t` iff `t % interval_i == 0`.  One schedule cycle therefore
//! has exactly `lcm` slots and every task appears `f_i` times in it.  Because
//! `lcm` is the *least* common multiple, the GCD of all intervals is 1, so
//! stepping the simulated clock by the interval GCD and stepping by one
//! elementary unit produce the same slots.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | State | Stateless `build()`: rates, intervals and the cursor are locals |
//! | Ordering | Firings inside a slot keep task-list order; no re-sorting |
//! | Empty slots | Kept, so slot index == elapsed units since the cycle start |
//! | Frequency lookup | Through the [`FrequencyResolver`] trait; the builder validates `>= 1` |
//!
//! # Example
//! ```rust
//! use giotto_sched::scheduler::ScheduleBuilder;
//! use giotto_sched::task::AttributeTable;
//!
//! let mut attrs = AttributeTable::new();
//! attrs.set_frequency("C", 2);
//!
//! let schedule = ScheduleBuilder::new().build(&["A", "B", "C"], &attrs).unwrap();
//! assert_eq!(schedule.len(), 2);
//! assert_eq!(schedule.slot_task_names(0), vec!["A", "B", "C"]);
//! assert_eq!(schedule.slot_task_names(1), vec!["C"]);
//! ```

pub mod error;
pub mod feasibility;

pub use error::{ConfigIssue, SchedulerError};

use std::fmt;

use tracing::{debug, info};

use crate::rate::{RateInfo, DEFAULT_MAX_SLOTS};
use crate::task::FrequencyResolver;

// ── Schedule types ────────────────────────────────────────────────────────────

/// One task placed into one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    /// Position of the task in the list the schedule was built from.
    pub task_index: usize,

    pub task: String,
}

/// The set of firings due at one elementary unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub index: usize,
    pub firings: Vec<Firing>,
}

impl TimeSlot {
    pub fn is_empty(&self) -> bool {
        self.firings.is_empty()
    }
}

/// Immutable firing schedule for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    slots: Vec<TimeSlot>,
    rates: RateInfo,
    task_names: Vec<String>,
}

impl Schedule {
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&TimeSlot> {
        self.slots.get(index)
    }

    /// Number of slots (== `lcm`).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn rates(&self) -> &RateInfo {
        &self.rates
    }

    pub fn lcm(&self) -> u64 {
        self.rates.lcm
    }

    pub fn gcd(&self) -> u64 {
        self.rates.gcd
    }

    /// Task names in build order.
    pub fn task_names(&self) -> &[String] {
        &self.task_names
    }

    /// Resolved frequency of the task at `task_index`.
    pub fn frequency(&self, task_index: usize) -> Option<u64> {
        self.rates.frequencies.get(task_index).copied()
    }

    /// Logical time covered by one slot: `period / lcm`.
    pub fn unit_increment(&self, period: f64) -> f64 {
        self.rates.unit_increment(period)
    }

    /// Slot indices in which the task at `task_index` fires.
    pub fn appearances(&self, task_index: usize) -> Vec<usize> {
        self.slots
            .iter()
            .filter(|s| s.firings.iter().any(|f| f.task_index == task_index))
            .map(|s| s.index)
            .collect()
    }

    /// Names of the tasks firing in slot `index`, in firing order.
    pub fn slot_task_names(&self, index: usize) -> Vec<&str> {
        self.slots
            .get(index)
            .map(|s| s.firings.iter().map(|f| f.task.as_str()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "schedule: {} slot(s), lcm={}, gcd={}",
            self.slots.len(),
            self.rates.lcm,
            self.rates.gcd
        )?;
        for slot in &self.slots {
            let names: Vec<&str> = slot.firings.iter().map(|fi| fi.task.as_str()).collect();
            writeln!(f, "  slot {:>4}: [{}]", slot.index, names.join(", "))?;
        }
        Ok(())
    }
}

// ── ScheduleBuilder ───────────────────────────────────────────────────────────

/// Builds [`Schedule`]s from ordered task lists.
#[derive(Debug, Clone)]
pub struct ScheduleBuilder {
    max_slots: u64,
}

impl ScheduleBuilder {
    /// Builder with the default slot limit.
    pub fn new() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
        }
    }

    /// Builder rejecting frequency sets whose LCM exceeds `max_slots`.
    pub fn with_max_slots(max_slots: u64) -> Self {
        Self { max_slots }
    }

    /// Build the schedule for `tasks`, in order, using `resolver` for the
    /// frequencies.
    ///
    /// # Errors
    /// * [`SchedulerError::NotSchedulable`] – `tasks` is empty.
    /// * [`SchedulerError::InvalidConfiguration`] – a frequency resolved to
    ///   a value `<= 0`.
    /// * [`SchedulerError::Rate`] – LCM overflow or slot limit exceeded.
    pub fn build<S, R>(&self, tasks: &[S], resolver: &R) -> Result<Schedule, SchedulerError>
    where
        S: AsRef<str>,
        R: FrequencyResolver + ?Sized,
    {
        if tasks.is_empty() {
            return Err(SchedulerError::NotSchedulable { task_count: 0 });
        }

        let task_names: Vec<String> = tasks.iter().map(|t| t.as_ref().to_string()).collect();

        // ── Resolve frequencies ───────────────────────────────────────────────
        let mut frequencies = Vec::with_capacity(task_names.len());
        for name in &task_names {
            let frequency = resolver.frequency(name);
            if frequency <= 0 {
                return Err(ConfigIssue::NonPositiveFrequency {
                    task: name.clone(),
                    frequency,
                }
                .into());
            }
            frequencies.push(frequency as u64);
        }

        let rates = RateInfo::compute_with_limit(&frequencies, self.max_slots)?;

        // ── Walk one cycle ────────────────────────────────────────────────────
        let mut slots = Vec::with_capacity(rates.lcm as usize);
        for t in 0..rates.lcm {
            let firings: Vec<Firing> = rates
                .intervals
                .iter()
                .enumerate()
                .filter(|&(_, &interval)| t % interval == 0)
                .map(|(i, _)| Firing {
                    task_index: i,
                    task: task_names[i].clone(),
                })
                .collect();

            debug!(slot = t, firing_count = firings.len(), "slot built");
            slots.push(TimeSlot {
                index: t as usize,
                firings,
            });
        }

        info!(
            task_count = task_names.len(),
            slot_count = slots.len(),
            lcm = rates.lcm,
            gcd = rates.gcd,
            "Schedule built"
        );

        Ok(Schedule {
            slots,
            rates,
            task_names,
        })
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a schedule with the default builder.
pub fn build_schedule<S, R>(tasks: &[S], resolver: &R) -> Result<Schedule, SchedulerError>
where
    S: AsRef<str>,
    R: FrequencyResolver + ?Sized,
{
    ScheduleBuilder::new().build(tasks, resolver)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
