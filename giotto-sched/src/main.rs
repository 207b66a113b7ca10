/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{debug, error, info, warn};

use giotto_sched::channel::{CommitHandle, InputPort, OutputPort};
use giotto_sched::config::ModelConfig;
use giotto_sched::director::{DirectorError, GiottoDirector, RunStats, StopHandle};
use giotto_sched::scheduler::feasibility::check_wcet_budget;
use giotto_sched::scheduler::ScheduleBuilder;
use giotto_sched::task::{FireContext, FireOutcome, Task};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Runs a YAML task model under a static time-triggered director.
///
/// Example:
///   giotto-sched --model model.yaml --iterations 10 --realtime
#[derive(Debug, Parser)]
#[command(
    name = "giotto-sched",
    about = "Static time-triggered task scheduler",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML model file.
    #[arg(short = 'm', long = "model")]
    model: PathBuf,

    /// Override the number of cycles to run (0 runs until Ctrl-C).
    #[arg(short = 'i', long = "iterations")]
    iterations: Option<i64>,

    /// Pace the run against the wall clock.
    #[arg(short = 'r', long = "realtime", default_value_t = false)]
    realtime: bool,

    /// Print the schedule and exit without running it.
    #[arg(long = "dry-run", default_value_t = false)]
    dry_run: bool,
}

// ── Demo task ─────────────────────────────────────────────────────────────────

/// Emits its firing count and logs whatever its inputs have committed.
struct CounterTask {
    name: String,
    fired: u64,
    output: OutputPort<u64>,
    inputs: Vec<InputPort<u64>>,
}

impl CounterTask {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fired: 0,
            output: OutputPort::new(format!("{name}.out")),
            inputs: Vec::new(),
        }
    }
}

impl Task for CounterTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.fired = 0;
        Ok(())
    }

    fn fire(&mut self, ctx: &FireContext) -> anyhow::Result<FireOutcome> {
        self.fired += 1;
        for input in &self.inputs {
            match input.get() {
                Ok(value) => debug!(task = %self.name, input = input.name(), value, "read"),
                Err(e) => debug!(task = %self.name, "{}", e),
            }
        }
        self.output.send(self.fired);
        debug!(
            task = %self.name,
            model_time = ctx.model_time,
            slot = ctx.slot,
            iteration = ctx.iteration,
            count = self.fired,
            "fired"
        );
        Ok(FireOutcome::Completed)
    }

    fn wrapup(&mut self) {
        info!(task = %self.name, firings = self.fired, "task wrapped up");
    }

    fn output_connections(&self) -> Vec<CommitHandle> {
        self.output.remote_connections()
    }
}

/// Build one counter per declared task and wire the connections.
fn build_director(model: ModelConfig, stop: StopHandle) -> GiottoDirector {
    let mut counters: Vec<CounterTask> = model.tasks.iter().map(|n| CounterTask::new(n)).collect();
    let index: HashMap<String, usize> = model
        .tasks
        .iter()
        .enumerate()
        .map(|(i, n)| (n.clone(), i))
        .collect();

    for c in &model.connections {
        let (Some(&from), Some(&to)) = (index.get(&c.from), index.get(&c.to)) else {
            continue;
        };
        let input = InputPort::new(format!("{}.in.{}", c.to, c.from));
        counters[from].output.connect(&input);
        counters[to].inputs.push(input);
    }

    let mut director = GiottoDirector::new(model.director, model.attributes);
    director.set_stop_handle(stop);
    for counter in counters {
        director.add_task(Box::new(counter));
    }
    director
}

fn run_model(model: ModelConfig, stop: StopHandle) -> Result<RunStats, DirectorError> {
    build_director(model, stop).run()
}

fn print_schedule(model: &ModelConfig) {
    let builder = ScheduleBuilder::with_max_slots(model.director.max_slots);
    let schedule = match builder.build(&model.tasks, &model.attributes) {
        Ok(s) => s,
        Err(e) => {
            error!("Cannot build schedule: {}", e);
            process::exit(1);
        }
    };

    print!("{schedule}");
    println!(
        "period {}s, slot length {}s",
        model.director.period,
        schedule.unit_increment(model.director.period)
    );

    let report = check_wcet_budget(&schedule, &model.attributes, model.director.period);
    for v in &report.window_violations {
        println!(
            "  WCET {}s of '{}' exceeds its window of {}s",
            v.wcet, v.task, v.window
        );
    }
    if report.demand_exceeds_period() {
        println!(
            "  summed WCET demand {}s exceeds the period",
            report.total_demand
        );
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        model      = %cli.model.display(),
        iterations = ?cli.iterations,
        realtime   = cli.realtime,
        dry_run    = cli.dry_run,
        "Configuration"
    );

    // ── Load model ────────────────────────────────────────────────────────────
    let mut model = match ModelConfig::load_from_file(&cli.model) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to load model: {:#}", e);
            process::exit(1);
        }
    };
    if let Some(n) = cli.iterations {
        model.director.iterations = n;
    }
    if cli.realtime {
        model.director.synchronize_to_real_time = true;
    }

    print_schedule(&model);
    if cli.dry_run {
        return;
    }

    if model.director.iterations <= 0 && !model.director.synchronize_to_real_time {
        warn!("Unbounded run without real-time pacing, stop with Ctrl-C");
    }

    // ── Run ───────────────────────────────────────────────────────────────────
    // Tasks and channels are single-threaded, so the whole director lives on
    // one blocking thread; only the stop handle crosses over.
    let stop = StopHandle::new();
    let runner_stop = stop.clone();
    let mut runner = tokio::task::spawn_blocking(move || run_model(model, runner_stop));

    let joined = tokio::select! {
        joined = &mut runner => joined,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C received, stopping director");
            stop.request_stop();
            runner.await
        }
    };

    match joined {
        Ok(Ok(stats)) => {
            info!(
                iterations = stats.iterations,
                model_time = stats.model_time,
                stopped = stats.stopped,
                "Run finished"
            );
        }
        Ok(Err(e)) => {
            error!("Director failed: {:#}", anyhow::Error::new(e));
            process::exit(1);
        }
        Err(e) => {
            error!("Director thread panicked: {}", e);
            process::exit(1);
        }
    }
}
