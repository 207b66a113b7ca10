/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Time-triggered execution of a [`Schedule`].
//!
//! # Lifecycle
//! ```text
//!  Preparing ──preinitialize()──► Ready ──fire()──► Firing ──► Advancing
//!                                   ▲                  ▲           │
//!                                   │                  └─ next slot┤
//!                                   └──postfire()── CycleComplete ◄┘ (wrap)
//! ```
//!
//! For each slot the director
//! 1. sets model time to the slot's expected time,
//! 2. commits every output channel of every task in the slot,
//! 3. fires the slot's tasks in order,
//! 4. advances the cursor and the expected time by `period / lcm`,
//! 5. optionally blocks until wall-clock time catches up.
//!
//! When the cursor wraps, the expected time is recomputed as
//! `start_time + period * iteration_count` so rounding error never
//! accumulates across cycles.
//!
//! A stop request is honoured between slots only: a slot that has started
//! always completes, so channels are never left half-committed.

pub mod error;
pub mod monitor;
pub mod stop;

pub use error::DirectorError;
pub use monitor::TimingMonitor;
pub use stop::{StopHandle, WaitOutcome};

use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::channel::CommitHandle;
use crate::config::{DirectorConfig, ErrorPolicy};
use crate::scheduler::feasibility::{check_wcet_budget, FeasibilityReport};
use crate::scheduler::{Schedule, ScheduleBuilder, SchedulerError};
use crate::task::{AttributeTable, FireContext, FireOutcome, Task};

/// Where the director is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorState {
    /// No schedule built yet.
    Preparing,
    /// Schedule built, waiting for the next `fire()`.
    Ready,
    /// Running the tasks of the current slot.
    Firing,
    /// Moving the cursor and model time to the next slot.
    Advancing,
    /// The last slot of a cycle finished; `postfire()` has not run yet.
    CycleComplete,
}

/// Summary of a run, as logged by [`GiottoDirector::wrapup`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub iterations: u64,
    pub model_time: f64,
    pub task_overruns: u64,
    pub iteration_overruns: u64,
    pub stopped: bool,
}

/// Static time-triggered director.
pub struct GiottoDirector {
    config: DirectorConfig,
    attributes: AttributeTable,
    tasks: Vec<Box<dyn Task>>,

    schedule: Option<Rc<Schedule>>,
    /// Output channels per task, indexed like `tasks`.
    connections: Vec<Vec<CommitHandle>>,
    feasibility: Option<FeasibilityReport>,

    state: DirectorState,
    slot_index: usize,
    iteration_count: u64,
    model_time: f64,
    expected_next_time: f64,
    unit_increment: f64,
    cycle_completed: bool,

    real_start: Option<Instant>,
    stop: StopHandle,
    monitor: TimingMonitor,
}

impl GiottoDirector {
    pub fn new(config: DirectorConfig, attributes: AttributeTable) -> Self {
        let start = config.start_time;
        Self {
            config,
            attributes,
            tasks: Vec::new(),
            schedule: None,
            connections: Vec::new(),
            feasibility: None,
            state: DirectorState::Preparing,
            slot_index: 0,
            iteration_count: 0,
            model_time: start,
            expected_next_time: start,
            unit_increment: 0.0,
            cycle_completed: false,
            real_start: None,
            stop: StopHandle::new(),
            monitor: TimingMonitor::new(),
        }
    }

    /// Append a task.  Declaration order is the firing order inside a slot.
    ///
    /// Adding a task discards any schedule already built.
    pub fn add_task(&mut self, task: Box<dyn Task>) {
        if self.schedule.take().is_some() {
            debug!(task = task.name(), "topology changed, schedule discarded");
        }
        self.state = DirectorState::Preparing;
        self.tasks.push(task);
    }

    /// Replace the stop handle, e.g. with one created before the director
    /// was moved onto its own thread.
    pub fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = stop;
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Build the schedule and collect every task's output channels.
    ///
    /// A WCET budget that does not fit is logged but does not fail.
    ///
    /// # Errors
    /// [`DirectorError::Schedule`] if the period is unusable or the task set
    /// cannot be scheduled.
    pub fn preinitialize(&mut self) -> Result<(), DirectorError> {
        self.config.validate().map_err(SchedulerError::from)?;

        let names: Vec<&str> = self.tasks.iter().map(|t| t.name()).collect();
        let schedule =
            ScheduleBuilder::with_max_slots(self.config.max_slots).build(&names, &self.attributes)?;

        self.connections = self.tasks.iter().map(|t| t.output_connections()).collect();
        self.unit_increment = schedule.unit_increment(self.config.period);

        let report = check_wcet_budget(&schedule, &self.attributes, self.config.period);
        for v in &report.window_violations {
            warn!(
                task = %v.task,
                wcet_s = v.wcet,
                window_s = v.window,
                "WCET does not fit the task's execution window"
            );
        }
        if report.demand_exceeds_period() {
            warn!(
                demand_s = report.total_demand,
                period_s = report.period,
                "summed WCET demand exceeds the period"
            );
        }

        info!(
            period = self.config.period,
            slots = schedule.len(),
            unit_increment = self.unit_increment,
            feasible = report.is_feasible(),
            "Director preinitialized"
        );

        self.feasibility = Some(report);
        self.schedule = Some(Rc::new(schedule));
        self.slot_index = 0;
        self.state = DirectorState::Ready;
        Ok(())
    }

    /// Reset channels, counters and model time, then initialize every task.
    ///
    /// The stop handle is left untouched; use [`StopHandle::clear`] to run
    /// again after a stop.
    pub fn initialize(&mut self) -> Result<(), DirectorError> {
        if self.schedule.is_none() {
            return Err(DirectorError::NotPreinitialized);
        }

        for handle in self.connections.iter().flatten() {
            handle.reset();
        }

        for task in &mut self.tasks {
            task.initialize().map_err(|source| DirectorError::TaskInit {
                task: task.name().to_string(),
                source,
            })?;
        }

        let start = self.config.start_time;
        self.slot_index = 0;
        self.iteration_count = 0;
        self.model_time = start;
        self.expected_next_time = start;
        self.cycle_completed = false;
        self.real_start = None;
        self.monitor.reset();
        self.state = DirectorState::Ready;

        debug!(start_time = start, "Director initialized");
        Ok(())
    }

    /// Run slots until the cycle completes, a stop is requested, or (when
    /// embedded) after exactly one slot.
    ///
    /// # Errors
    /// * [`DirectorError::NotPreinitialized`] – no schedule.
    /// * [`DirectorError::TaskFailed`] – a task failed under
    ///   [`ErrorPolicy::Propagate`]; the failing slot has completed and the
    ///   cursor already points at the next one.
    pub fn fire(&mut self) -> Result<(), DirectorError> {
        let schedule = self
            .schedule
            .clone()
            .ok_or(DirectorError::NotPreinitialized)?;

        self.cycle_completed = false;
        if self.syncs_to_real_time() && self.real_start.is_none() {
            self.real_start = Some(Instant::now());
        }

        loop {
            if self.stop.is_stop_requested() {
                info!(
                    slot = self.slot_index,
                    iteration = self.iteration_count,
                    "Stop requested, leaving fire()"
                );
                self.state = DirectorState::Ready;
                return Ok(());
            }

            let failure = self.fire_slot(&schedule);
            let wrapped = self.advance(&schedule);
            if !wrapped {
                self.state = DirectorState::Ready;
            }

            if let Some(err) = failure {
                return Err(err);
            }
            if self.config.embedded {
                return Ok(());
            }
            if self.syncs_to_real_time() && self.wait_for_real_time() == WaitOutcome::Stopped {
                info!(
                    model_time = self.model_time,
                    "Stop requested during real-time wait"
                );
                return Ok(());
            }
            if wrapped {
                return Ok(());
            }
        }
    }

    /// Close the cycle bookkeeping and decide whether to keep going.
    ///
    /// Returns `Ok(false)` once a stop was requested or, for a top-level
    /// director, the iteration limit is reached.
    ///
    /// # Errors
    /// [`DirectorError::TimingOverrun`] when a cycle's execution time exceeded
    /// the period and `fail_on_overrun` is set.
    pub fn postfire(&mut self) -> Result<bool, DirectorError> {
        if self.cycle_completed {
            self.cycle_completed = false;
            self.state = DirectorState::Ready;

            let finished = self.iteration_count.saturating_sub(1);
            if let Some(observed) = self.monitor.finish_iteration(finished, self.config.period) {
                if self.config.fail_on_overrun {
                    return Err(DirectorError::TimingOverrun {
                        iteration: finished,
                        observed,
                        period: self.config.period,
                    });
                }
            }
        }

        if self.stop.is_stop_requested() {
            return Ok(false);
        }
        if !self.config.embedded && self.config.iteration_limit_reached(self.iteration_count) {
            info!(iterations = self.iteration_count, "Iteration limit reached");
            return Ok(false);
        }
        Ok(true)
    }

    /// Let every task release its resources and log run statistics.
    pub fn wrapup(&mut self) -> RunStats {
        for task in &mut self.tasks {
            task.wrapup();
        }
        let stats = self.stats();
        info!(
            iterations = stats.iterations,
            model_time = stats.model_time,
            task_overruns = stats.task_overruns,
            iteration_overruns = stats.iteration_overruns,
            stopped = stats.stopped,
            "Director wrapped up"
        );
        stats
    }

    /// preinitialize → initialize → fire/postfire until done → wrapup.
    ///
    /// `wrapup()` runs even when the loop fails.
    pub fn run(&mut self) -> Result<RunStats, DirectorError> {
        self.preinitialize()?;
        self.initialize()?;
        let outcome = self.iterate();
        let stats = self.wrapup();
        outcome.map(|()| stats)
    }

    fn iterate(&mut self) -> Result<(), DirectorError> {
        loop {
            self.fire()?;
            if !self.postfire()? {
                return Ok(());
            }
        }
    }

    // ── Slot protocol ─────────────────────────────────────────────────────────

    /// Commit, then fire, every task of the current slot.  Returns the first
    /// failure when the policy is [`ErrorPolicy::Propagate`].
    fn fire_slot(&mut self, schedule: &Schedule) -> Option<DirectorError> {
        self.state = DirectorState::Firing;
        self.model_time = self.expected_next_time;

        let slot = schedule.slot(self.slot_index)?;

        for firing in &slot.firings {
            if let Some(handles) = self.connections.get(firing.task_index) {
                for handle in handles {
                    handle.update();
                }
            }
        }

        let ctx = FireContext {
            model_time: self.model_time,
            slot: self.slot_index,
            iteration: self.iteration_count,
        };
        trace!(slot = ctx.slot, model_time = ctx.model_time, "firing slot");

        let mut first_failure = None;
        for firing in &slot.firings {
            let Some(task) = self.tasks.get_mut(firing.task_index) else {
                continue;
            };

            let started = Instant::now();
            let result = task.fire(&ctx);
            self.monitor.record_firing(
                &firing.task,
                self.attributes.wcet(&firing.task),
                started.elapsed(),
            );

            match result {
                Ok(FireOutcome::Completed) => {}
                Ok(FireOutcome::Retrigger(after)) => {
                    debug!(task = %firing.task, after, "retrigger request ignored");
                }
                Ok(FireOutcome::StopIterating) => {
                    warn!(
                        task = %firing.task,
                        model_time = ctx.model_time,
                        "task asked to stop iterating, schedule continues"
                    );
                }
                Err(source) => {
                    error!(
                        task = %firing.task,
                        model_time = ctx.model_time,
                        "task firing failed: {:#}",
                        source
                    );
                    if self.config.error_policy == ErrorPolicy::Propagate
                        && first_failure.is_none()
                    {
                        first_failure = Some(DirectorError::TaskFailed {
                            task: firing.task.clone(),
                            model_time: ctx.model_time,
                            source,
                        });
                    }
                }
            }
        }
        first_failure
    }

    /// Move to the next slot.  Returns `true` when the cycle wrapped.
    fn advance(&mut self, schedule: &Schedule) -> bool {
        self.state = DirectorState::Advancing;
        self.slot_index += 1;

        let wrapped = self.slot_index >= schedule.len();
        if wrapped {
            self.slot_index = 0;
            self.iteration_count += 1;
            self.expected_next_time =
                self.config.start_time + self.config.period * self.iteration_count as f64;
            self.cycle_completed = true;
            self.state = DirectorState::CycleComplete;
            debug!(
                iteration = self.iteration_count,
                model_time = self.expected_next_time,
                "cycle complete"
            );
        } else {
            self.expected_next_time += self.unit_increment;
        }

        self.model_time = self.expected_next_time;
        wrapped
    }

    fn syncs_to_real_time(&self) -> bool {
        self.config.synchronize_to_real_time && !self.config.embedded
    }

    fn wait_for_real_time(&self) -> WaitOutcome {
        let Some(real_start) = self.real_start else {
            return WaitOutcome::Elapsed;
        };
        let offset = self.expected_next_time - self.config.start_time;
        let offset = Duration::try_from_secs_f64(offset).unwrap_or(Duration::ZERO);
        match real_start.checked_add(offset) {
            Some(deadline) => self.stop.wait_until(deadline),
            None => {
                warn!(
                    offset_s = offset.as_secs_f64(),
                    "real-time deadline not representable, not waiting"
                );
                WaitOutcome::Elapsed
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    pub fn state(&self) -> DirectorState {
        self.state
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_deref()
    }

    pub fn feasibility(&self) -> Option<&FeasibilityReport> {
        self.feasibility.as_ref()
    }

    pub fn monitor(&self) -> &TimingMonitor {
        &self.monitor
    }

    /// Current logical time.
    pub fn model_time(&self) -> f64 {
        self.model_time
    }

    /// Logical time at which the next slot is due.  An outer director uses
    /// this to schedule the next firing of an embedded one.
    pub fn next_fire_time(&self) -> f64 {
        self.expected_next_time
    }

    /// Number of completed cycles.
    pub fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    /// Index of the next slot to fire.
    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            iterations: self.iteration_count,
            model_time: self.model_time,
            task_overruns: self.monitor.total_task_overruns(),
            iteration_overruns: self.monitor.iteration_overruns(),
            stopped: self.stop.is_stop_requested(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{InputPort, OutputPort};
    use crate::scheduler::ConfigIssue;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::thread;

    type Log = Rc<RefCell<Vec<(String, f64)>>>;

    #[derive(Clone)]
    enum Behaviour {
        Complete,
        Fail,
        StopIterating,
        Sleep(Duration),
        RequestStop(StopHandle),
    }

    struct Recorder {
        name: String,
        log: Log,
        behaviour: Behaviour,
        wrapups: Rc<Cell<u32>>,
    }

    impl Task for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn fire(&mut self, ctx: &FireContext) -> anyhow::Result<FireOutcome> {
            self.log
                .borrow_mut()
                .push((self.name.clone(), ctx.model_time));
            match &self.behaviour {
                Behaviour::Complete => Ok(FireOutcome::Completed),
                Behaviour::Fail => Err(anyhow!("{} exploded", self.name)),
                Behaviour::StopIterating => Ok(FireOutcome::StopIterating),
                Behaviour::Sleep(d) => {
                    thread::sleep(*d);
                    Ok(FireOutcome::Completed)
                }
                Behaviour::RequestStop(handle) => {
                    handle.request_stop();
                    Ok(FireOutcome::Completed)
                }
            }
        }

        fn wrapup(&mut self) {
            self.wrapups.set(self.wrapups.get() + 1);
        }
    }

    struct Fixture {
        director: GiottoDirector,
        log: Log,
        wrapups: Rc<Cell<u32>>,
    }

    fn fixture(config: DirectorConfig, tasks: &[(&str, i64, Behaviour)]) -> Fixture {
        let log: Log = Rc::default();
        let wrapups = Rc::new(Cell::new(0));
        let mut attributes = AttributeTable::new();
        for (name, frequency, _) in tasks {
            attributes.set_frequency(name, *frequency);
        }
        let mut director = GiottoDirector::new(config, attributes);
        for (name, _, behaviour) in tasks {
            director.add_task(Box::new(Recorder {
                name: name.to_string(),
                log: Rc::clone(&log),
                behaviour: behaviour.clone(),
                wrapups: Rc::clone(&wrapups),
            }));
        }
        Fixture {
            director,
            log,
            wrapups,
        }
    }

    fn config(period: f64, iterations: i64) -> DirectorConfig {
        DirectorConfig {
            iterations,
            ..DirectorConfig::with_period(period)
        }
    }

    fn abc() -> Vec<(&'static str, i64, Behaviour)> {
        vec![
            ("A", 1, Behaviour::Complete),
            ("B", 1, Behaviour::Complete),
            ("C", 2, Behaviour::Complete),
        ]
    }

    fn fired(log: &Log, task: &str) -> Vec<f64> {
        log.borrow()
            .iter()
            .filter(|(n, _)| n == task)
            .map(|&(_, t)| t)
            .collect()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[test]
    fn one_cycle_of_three_tasks() {
        let mut f = fixture(config(0.1, 1), &abc());
        let stats = f.director.run().unwrap();

        let order: Vec<String> = f.log.borrow().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(order, vec!["A", "B", "C", "C"]);
        assert_eq!(fired(&f.log, "A"), vec![0.0]);
        assert_eq!(fired(&f.log, "B"), vec![0.0]);
        assert_eq!(fired(&f.log, "C"), vec![0.0, 0.05]);

        // exactly, not approximately
        assert_eq!(f.director.model_time(), 0.1);
        assert_eq!(stats.iterations, 1);
        assert!(!stats.stopped);
        assert_eq!(f.wrapups.get(), 3);
    }

    #[test]
    fn states_follow_the_lifecycle() {
        let mut f = fixture(config(0.1, 1), &abc());
        assert_eq!(f.director.state(), DirectorState::Preparing);
        f.director.preinitialize().unwrap();
        assert_eq!(f.director.state(), DirectorState::Ready);
        f.director.initialize().unwrap();
        f.director.fire().unwrap();
        assert_eq!(f.director.state(), DirectorState::CycleComplete);
        assert!(!f.director.postfire().unwrap());
        assert_eq!(f.director.state(), DirectorState::Ready);
    }

    #[test]
    fn fire_before_preinitialize_fails() {
        let mut f = fixture(config(0.1, 1), &abc());
        assert!(matches!(
            f.director.fire(),
            Err(DirectorError::NotPreinitialized)
        ));
        assert!(matches!(
            f.director.initialize(),
            Err(DirectorError::NotPreinitialized)
        ));
    }

    #[test]
    fn empty_director_refuses_to_start() {
        let mut f = fixture(config(0.1, 1), &[]);
        let err = f.director.run().unwrap_err();
        assert!(matches!(
            err,
            DirectorError::Schedule(SchedulerError::NotSchedulable { .. })
        ));
    }

    #[test]
    fn non_positive_period_refuses_to_start() {
        let mut f = fixture(config(0.0, 1), &abc());
        let err = f.director.preinitialize().unwrap_err();
        assert!(matches!(
            err,
            DirectorError::Schedule(SchedulerError::InvalidConfiguration(
                ConfigIssue::NonPositivePeriod { .. }
            ))
        ));
        assert!(f.director.schedule().is_none());
    }

    #[test]
    fn adding_a_task_discards_the_schedule() {
        let mut f = fixture(config(0.1, 1), &abc());
        f.director.preinitialize().unwrap();
        assert_eq!(f.director.schedule().unwrap().len(), 2);

        f.director.add_task(Box::new(Recorder {
            name: "D".into(),
            log: Rc::clone(&f.log),
            behaviour: Behaviour::Complete,
            wrapups: Rc::clone(&f.wrapups),
        }));
        assert!(f.director.schedule().is_none());
        assert_eq!(f.director.state(), DirectorState::Preparing);
    }

    #[test]
    fn task_initialize_failure_is_reported() {
        struct Broken;
        impl Task for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn initialize(&mut self) -> anyhow::Result<()> {
                Err(anyhow!("no device"))
            }
            fn fire(&mut self, _: &FireContext) -> anyhow::Result<FireOutcome> {
                Ok(FireOutcome::Completed)
            }
        }

        let mut director = GiottoDirector::new(config(0.1, 1), AttributeTable::new());
        director.add_task(Box::new(Broken));
        director.preinitialize().unwrap();
        match director.initialize() {
            Err(DirectorError::TaskInit { task, .. }) => assert_eq!(task, "broken"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn iteration_limit_stops_the_run() {
        let mut f = fixture(config(0.1, 3), &abc());
        let stats = f.director.run().unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(fired(&f.log, "C").len(), 6);
        assert_eq!(fired(&f.log, "A"), vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn model_time_is_resynchronised_on_wrap() {
        let tasks = [("T", 3, Behaviour::Complete)];
        let mut f = fixture(config(0.1, 10), &tasks);
        f.director.run().unwrap();

        assert_eq!(f.director.model_time(), 0.1 * 10.0);
        let times = fired(&f.log, "T");
        assert_eq!(times.len(), 30);
        for (k, t) in times.iter().enumerate().step_by(3) {
            assert_eq!(*t, 0.1 * (k / 3) as f64, "cycle start {k}");
        }
    }

    #[test]
    fn start_time_offsets_model_time() {
        let cfg = DirectorConfig {
            start_time: 2.0,
            ..config(0.5, 2)
        };
        let mut f = fixture(cfg, &[("A", 1, Behaviour::Complete)]);
        f.director.run().unwrap();
        assert_eq!(fired(&f.log, "A"), vec![2.0, 2.5]);
        assert_eq!(f.director.model_time(), 3.0);
    }

    #[test]
    fn initialize_resets_a_finished_run() {
        let mut f = fixture(config(0.1, 1), &abc());
        f.director.run().unwrap();
        f.director.initialize().unwrap();
        assert_eq!(f.director.iteration_count(), 0);
        assert_eq!(f.director.model_time(), 0.0);
        assert_eq!(f.director.slot_index(), 0);
    }

    // ── Task outcomes ─────────────────────────────────────────────────────────

    #[test]
    fn stop_iterating_is_not_fatal() {
        let tasks = [
            ("A", 1, Behaviour::StopIterating),
            ("B", 2, Behaviour::Complete),
        ];
        let mut f = fixture(config(0.1, 2), &tasks);
        let stats = f.director.run().unwrap();
        assert_eq!(stats.iterations, 2);
        assert_eq!(fired(&f.log, "A").len(), 2);
        assert_eq!(fired(&f.log, "B").len(), 4);
    }

    #[test]
    fn isolated_failure_does_not_stop_the_schedule() {
        let tasks = [
            ("A", 1, Behaviour::Complete),
            ("B", 1, Behaviour::Fail),
            ("C", 2, Behaviour::Complete),
        ];
        let mut f = fixture(config(0.1, 2), &tasks);
        let stats = f.director.run().unwrap();
        assert_eq!(stats.iterations, 2);
        assert_eq!(fired(&f.log, "C").len(), 4);
    }

    #[test]
    fn propagated_failure_completes_the_slot_first() {
        let tasks = [
            ("A", 1, Behaviour::Complete),
            ("B", 1, Behaviour::Fail),
            ("C", 2, Behaviour::Complete),
        ];
        let cfg = DirectorConfig {
            error_policy: ErrorPolicy::Propagate,
            ..config(0.1, 1)
        };
        let mut f = fixture(cfg, &tasks);
        f.director.preinitialize().unwrap();
        f.director.initialize().unwrap();

        match f.director.fire() {
            Err(DirectorError::TaskFailed {
                task, model_time, ..
            }) => {
                assert_eq!(task, "B");
                assert_eq!(model_time, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        // C still ran in slot 0 and the cursor moved on
        assert_eq!(fired(&f.log, "C"), vec![0.0]);
        assert_eq!(f.director.slot_index(), 1);
        assert_eq!(f.director.model_time(), 0.05);

        // resuming finishes the cycle
        f.director.fire().unwrap();
        assert_eq!(fired(&f.log, "C"), vec![0.0, 0.05]);
        assert_eq!(f.director.iteration_count(), 1);
    }

    // ── Stop requests ─────────────────────────────────────────────────────────

    #[test]
    fn stop_is_honoured_between_slots() {
        let stop = StopHandle::new();
        let tasks = [
            ("A", 1, Behaviour::RequestStop(stop.clone())),
            ("B", 1, Behaviour::Complete),
            ("C", 2, Behaviour::Complete),
        ];
        let mut f = fixture(config(0.1, 0), &tasks);
        f.director.set_stop_handle(stop.clone());

        let stats = f.director.run().unwrap();
        assert!(stats.stopped);

        // slot 0 ran to completion, slot 1 never started
        assert_eq!(fired(&f.log, "B"), vec![0.0]);
        assert_eq!(fired(&f.log, "C"), vec![0.0]);
        assert_eq!(f.director.slot_index(), 1);
        assert_eq!(f.director.iteration_count(), 0);
        assert_eq!(f.director.model_time(), 0.05);
    }

    #[test]
    fn stopped_director_resumes_where_it_left_off() {
        let stop = StopHandle::new();
        let tasks = [
            ("A", 1, Behaviour::RequestStop(stop.clone())),
            ("C", 2, Behaviour::Complete),
        ];
        let mut f = fixture(config(0.1, 1), &tasks);
        f.director.set_stop_handle(stop.clone());
        f.director.preinitialize().unwrap();
        f.director.initialize().unwrap();

        f.director.fire().unwrap();
        assert!(!f.director.postfire().unwrap());
        assert_eq!(f.director.slot_index(), 1);

        stop.clear();
        f.director.fire().unwrap();
        assert_eq!(fired(&f.log, "C"), vec![0.0, 0.05]);
        assert_eq!(f.director.iteration_count(), 1);
        assert_eq!(f.director.model_time(), 0.1);
    }

    // ── Channels ──────────────────────────────────────────────────────────────

    /// Sends its firing count.  Optionally fails (without sending) or asks
    /// the director to stop on a given firing.
    struct Producer {
        count: u64,
        out: OutputPort<u64>,
        fail_on: Option<u64>,
        stop_on: Option<(u64, StopHandle)>,
    }

    impl Producer {
        fn new(out: OutputPort<u64>) -> Self {
            Self {
                count: 0,
                out,
                fail_on: None,
                stop_on: None,
            }
        }
    }

    impl Task for Producer {
        fn name(&self) -> &str {
            "producer"
        }
        fn fire(&mut self, _: &FireContext) -> anyhow::Result<FireOutcome> {
            self.count += 1;
            if self.fail_on == Some(self.count) {
                return Err(anyhow!("producer failed on firing {}", self.count));
            }
            self.out.send(self.count);
            if let Some((n, handle)) = &self.stop_on {
                if *n == self.count {
                    handle.request_stop();
                }
            }
            Ok(FireOutcome::Completed)
        }
        fn output_connections(&self) -> Vec<CommitHandle> {
            self.out.remote_connections()
        }
    }

    struct Consumer {
        input: InputPort<u64>,
        seen: Rc<RefCell<Vec<Option<u64>>>>,
    }

    impl Task for Consumer {
        fn name(&self) -> &str {
            "consumer"
        }
        fn fire(&mut self, _: &FireContext) -> anyhow::Result<FireOutcome> {
            self.seen.borrow_mut().push(self.input.get().ok());
            Ok(FireOutcome::Completed)
        }
    }

    #[test]
    fn consumers_only_see_committed_values() {
        let input = InputPort::new("consumer.in");
        let mut out = OutputPort::new("producer.out");
        out.connect(&input);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut attrs = AttributeTable::new();
        attrs.set_frequency("producer", 2);
        attrs.set_frequency("consumer", 1);
        let mut director = GiottoDirector::new(config(0.1, 3), attrs);
        director.add_task(Box::new(Producer::new(out)));
        director.add_task(Box::new(Consumer {
            input: input.clone(),
            seen: Rc::clone(&seen),
        }));
        director.run().unwrap();

        // slot 0 of cycle n commits the value sent in slot 1 of cycle n-1,
        // never the one the producer has just sent in the same slot
        assert_eq!(*seen.borrow(), vec![None, Some(2), Some(4)]);
        assert_eq!(input.get().unwrap(), 5);
        assert!(input.channel().has_pending());
    }

    /// Producer at frequency 4 wired to a consumer at frequency 1.
    fn producer_consumer(
        cfg: DirectorConfig,
        producer: Producer,
        input: &InputPort<u64>,
    ) -> (GiottoDirector, Rc<RefCell<Vec<Option<u64>>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut attrs = AttributeTable::new();
        attrs.set_frequency("producer", 4);
        attrs.set_frequency("consumer", 1);
        let mut director = GiottoDirector::new(cfg, attrs);
        director.add_task(Box::new(producer));
        director.add_task(Box::new(Consumer {
            input: input.clone(),
            seen: Rc::clone(&seen),
        }));
        (director, seen)
    }

    #[test]
    fn stop_leaves_channels_committed_for_the_last_slot() {
        let stop = StopHandle::new();
        let input = InputPort::new("consumer.in");
        let mut out = OutputPort::new("producer.out");
        out.connect(&input);
        let producer = Producer {
            stop_on: Some((2, stop.clone())),
            ..Producer::new(out)
        };
        let (mut director, _) = producer_consumer(config(0.1, 0), producer, &input);
        director.set_stop_handle(stop.clone());
        director.preinitialize().unwrap();
        director.initialize().unwrap();

        director.fire().unwrap();
        assert!(!director.postfire().unwrap());
        assert_eq!(director.slot_index(), 2);

        // slot 1 committed the first send; its own send is still pending
        assert_eq!(input.get().unwrap(), 1);
        assert!(input.channel().has_pending());

        stop.clear();
        director.fire().unwrap();
        assert_eq!(director.iteration_count(), 1);
        assert_eq!(input.get().unwrap(), 3);
    }

    #[test]
    fn failed_task_outputs_are_committed_before_the_slot() {
        let input = InputPort::new("consumer.in");
        let mut out = OutputPort::new("producer.out");
        out.connect(&input);
        let producer = Producer {
            fail_on: Some(2),
            ..Producer::new(out)
        };
        let cfg = DirectorConfig {
            error_policy: ErrorPolicy::Propagate,
            ..config(0.1, 0)
        };
        let (mut director, seen) = producer_consumer(cfg, producer, &input);
        director.preinitialize().unwrap();
        director.initialize().unwrap();

        match director.fire() {
            Err(DirectorError::TaskFailed { task, .. }) => assert_eq!(task, "producer"),
            other => panic!("unexpected {other:?}"),
        }
        // slot 1 committed the value sent in slot 0 before the body failed
        assert_eq!(director.slot_index(), 2);
        assert_eq!(input.get().unwrap(), 1);

        // the rest of the cycle carries on from a consistent channel
        director.fire().unwrap();
        assert_eq!(input.get().unwrap(), 3);
        director.fire().unwrap();
        assert_eq!(*seen.borrow(), vec![None, Some(4)]);
    }

    #[test]
    fn unreachable_real_time_deadline_does_not_wait() {
        let cfg = DirectorConfig {
            synchronize_to_real_time: true,
            // fits a Duration but not an Instant offset
            ..config(1.5e19, 1)
        };
        let mut f = fixture(cfg, &[("A", 1, Behaviour::Complete)]);
        let started = Instant::now();
        let stats = f.director.run().unwrap();
        assert_eq!(stats.iterations, 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn initialize_resets_channels() {
        let input = InputPort::new("in");
        let mut out = OutputPort::new("out");
        out.connect(&input);
        out.send(9);
        input.channel().update();

        let mut director = GiottoDirector::new(config(0.1, 1), AttributeTable::new());
        director.add_task(Box::new(Producer::new(out)));
        director.preinitialize().unwrap();
        director.initialize().unwrap();
        assert!(!input.has_token());
    }

    // ── Timing ────────────────────────────────────────────────────────────────

    #[test]
    fn real_time_run_is_paced_by_the_wall_clock() {
        let cfg = DirectorConfig {
            synchronize_to_real_time: true,
            ..config(0.02, 2)
        };
        let mut f = fixture(cfg, &[("A", 2, Behaviour::Complete)]);
        let started = Instant::now();
        f.director.run().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(fired(&f.log, "A").len(), 4);
    }

    #[test]
    fn stop_wakes_a_real_time_wait() {
        let cfg = DirectorConfig {
            synchronize_to_real_time: true,
            ..config(30.0, 0)
        };
        let mut f = fixture(cfg, &[("A", 1, Behaviour::Complete)]);
        let stop = f.director.stop_handle();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stop.request_stop();
        });

        let started = Instant::now();
        let stats = f.director.run().unwrap();
        waker.join().unwrap();

        assert!(stats.stopped);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(fired(&f.log, "A"), vec![0.0]);
    }

    #[test]
    fn wcet_overruns_are_counted() {
        let tasks = [("slow", 1, Behaviour::Sleep(Duration::from_millis(5)))];
        let mut f = fixture(config(1.0, 2), &tasks);
        f.director.preinitialize().unwrap();
        // WCETs are looked up at fire time
        f.director.attributes.set_wcet("slow", 0.001);
        f.director.initialize().unwrap();
        while f.director.postfire().unwrap() {
            f.director.fire().unwrap();
        }
        assert_eq!(f.director.monitor().task_overruns("slow"), 2);
        assert_eq!(f.director.stats().iteration_overruns, 0);
    }

    #[test]
    fn cycle_overrun_fails_when_configured() {
        let cfg = DirectorConfig {
            fail_on_overrun: true,
            ..config(0.001, 5)
        };
        let tasks = [("slow", 1, Behaviour::Sleep(Duration::from_millis(5)))];
        let mut f = fixture(cfg, &tasks);
        match f.director.run() {
            Err(DirectorError::TimingOverrun {
                iteration, period, ..
            }) => {
                assert_eq!(iteration, 0);
                assert_eq!(period, 0.001);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.wrapups.get(), 1);
    }

    #[test]
    fn infeasible_budget_is_reported_but_runs() {
        let tasks = [("A", 2, Behaviour::Complete)];
        let mut f = fixture(config(0.1, 1), &tasks);
        f.director.attributes.set_wcet("A", 0.08);
        f.director.run().unwrap();
        let report = f.director.feasibility().unwrap();
        assert!(!report.is_feasible());
        assert_eq!(report.window_violations[0].task, "A");
    }

    // ── Embedding ─────────────────────────────────────────────────────────────

    #[test]
    fn embedded_director_fires_one_slot_at_a_time() {
        let cfg = DirectorConfig {
            iterations: 1,
            ..DirectorConfig::nested(0.1, 2).unwrap()
        };
        let mut f = fixture(cfg, &[("X", 1, Behaviour::Complete), ("Y", 2, Behaviour::Complete)]);
        f.director.preinitialize().unwrap();
        f.director.initialize().unwrap();

        f.director.fire().unwrap();
        assert_eq!(f.director.slot_index(), 1);
        assert_eq!(f.director.next_fire_time(), 0.025);
        assert!(f.director.postfire().unwrap());

        f.director.fire().unwrap();
        assert_eq!(f.director.next_fire_time(), 0.05);
        // the iteration limit does not apply when embedded
        assert!(f.director.postfire().unwrap());
        assert_eq!(f.director.iteration_count(), 1);
        assert_eq!(fired(&f.log, "Y"), vec![0.0, 0.025]);
    }

    struct Container {
        inner: GiottoDirector,
    }

    impl Task for Container {
        fn name(&self) -> &str {
            "container"
        }
        fn initialize(&mut self) -> anyhow::Result<()> {
            self.inner.preinitialize()?;
            self.inner.initialize()?;
            Ok(())
        }
        fn fire(&mut self, _: &FireContext) -> anyhow::Result<FireOutcome> {
            let slots = self.inner.schedule().map_or(0, |s| s.len());
            for _ in 0..slots {
                self.inner.fire()?;
                self.inner.postfire()?;
            }
            Ok(FireOutcome::Completed)
        }
    }

    #[test]
    fn nested_director_completes_once_per_container_firing() {
        let inner_log: Log = Rc::default();
        let mut inner_attrs = AttributeTable::new();
        inner_attrs.set_frequency("fast", 2);
        let mut inner = GiottoDirector::new(DirectorConfig::nested(0.1, 2).unwrap(), inner_attrs);
        inner.add_task(Box::new(Recorder {
            name: "fast".into(),
            log: Rc::clone(&inner_log),
            behaviour: Behaviour::Complete,
            wrapups: Rc::default(),
        }));

        let mut outer_attrs = AttributeTable::new();
        outer_attrs.set_frequency("container", 2);
        let mut outer = GiottoDirector::new(config(0.1, 1), outer_attrs);
        outer.add_task(Box::new(Container { inner }));
        outer.run().unwrap();

        // container fires twice per 0.1 s, inner period 0.05 s, 2 slots each
        let times = fired(&inner_log, "fast");
        assert_eq!(times.len(), 4);
        for (t, expected) in times.iter().zip([0.0, 0.025, 0.05, 0.075]) {
            assert!((t - expected).abs() < 1e-12, "{t} != {expected}");
        }
    }
}
