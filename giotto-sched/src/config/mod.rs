//! Director and model configuration.
//!
//! [`DirectorConfig`] holds the runtime parameters of one
//! [`GiottoDirector`](crate::director::GiottoDirector).  [`ModelConfig`] is
//! the full model description loaded from YAML: director parameters, the
//! ordered task list with timing attributes, and the producer → consumer
//! connections.
//!
//! The expected YAML structure is:
//! ```yaml
//! director:
//!   period: 0.1
//!   iterations: 10
//!   synchronize_to_real_time: false
//!   error_policy: isolate
//! tasks:
//!   - name: A
//!     frequency: 1
//!     wcet: 0.01
//!   - name: C
//!     frequency: 2
//! connections:
//!   - from: A
//!     to: C
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::rate::DEFAULT_MAX_SLOTS;
use crate::scheduler::ConfigIssue;
use crate::task::{AttributeTable, TaskAttributes};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct ModelFile {
    director: DirectorSection,
    #[serde(default)]
    tasks: Vec<TaskEntry>,
    #[serde(default)]
    connections: Vec<ConnectionEntry>,
}

#[derive(Debug, Deserialize)]
struct DirectorSection {
    period: f64,
    #[serde(default)]
    iterations: i64,
    #[serde(default)]
    synchronize_to_real_time: bool,
    #[serde(default)]
    error_policy: ErrorPolicy,
    #[serde(default)]
    fail_on_overrun: bool,
    #[serde(default = "default_max_slots")]
    max_slots: u64,
    #[serde(default)]
    start_time: f64,
}

/// Per-task fields.  `frequency` is kept as a raw YAML value so malformed
/// entries degrade to the default instead of failing the whole file.
#[derive(Debug, Deserialize)]
struct TaskEntry {
    name: String,
    #[serde(default)]
    frequency: Option<serde_yaml::Value>,
    #[serde(default)]
    wcet: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConnectionEntry {
    from: String,
    to: String,
}

fn default_max_slots() -> u64 {
    DEFAULT_MAX_SLOTS
}

/// Render a raw YAML frequency as an expression string for the
/// [`AttributeTable`].  `null` means "not set".
fn frequency_expr(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        other => Some(format!("{other:?}")),
    }
}

// ── DirectorConfig ────────────────────────────────────────────────────────────

/// What the director does when a task body returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure and carry on with the schedule.
    #[default]
    Isolate,

    /// Finish the current slot, then return the first failure from `fire()`.
    Propagate,
}

/// Runtime parameters of one director.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorConfig {
    /// Duration of one schedule cycle, in seconds.
    pub period: f64,

    /// Number of cycles to run; `<= 0` runs until stopped.
    pub iterations: i64,

    /// Block between slots until wall-clock time catches up with model time.
    pub synchronize_to_real_time: bool,

    pub error_policy: ErrorPolicy,

    /// Turn a per-iteration execution time overrun into an error.
    pub fail_on_overrun: bool,

    /// Upper bound on the number of slots per cycle.
    pub max_slots: u64,

    /// Model time of the first slot.
    pub start_time: f64,

    /// Embedded inside an outer director: one slot per `fire()`, no
    /// iteration limit, no real-time wait.
    pub embedded: bool,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            period: 1.0,
            iterations: 0,
            synchronize_to_real_time: false,
            error_policy: ErrorPolicy::Isolate,
            fail_on_overrun: false,
            max_slots: DEFAULT_MAX_SLOTS,
            start_time: 0.0,
            embedded: false,
        }
    }
}

impl DirectorConfig {
    /// Top-level configuration with the given period and defaults elsewhere.
    pub fn with_period(period: f64) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    /// Configuration for a director embedded in a task of an outer director.
    ///
    /// The inner period is `outer_period / container_frequency`: the inner
    /// schedule completes once per firing of its container.
    pub fn nested(outer_period: f64, container_frequency: i64) -> Result<Self, ConfigIssue> {
        if container_frequency <= 0 {
            return Err(ConfigIssue::NonPositiveContainerFrequency {
                frequency: container_frequency,
            });
        }
        let cfg = Self {
            period: outer_period / container_frequency as f64,
            embedded: true,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the period is a positive, finite duration.
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(ConfigIssue::NonPositivePeriod {
                period: self.period,
            });
        }
        Ok(())
    }

    /// `true` when `iteration_count` completed cycles reach the limit.
    pub fn iteration_limit_reached(&self, iteration_count: u64) -> bool {
        self.iterations > 0 && iteration_count >= self.iterations as u64
    }
}

// ── ModelConfig ───────────────────────────────────────────────────────────────

/// A producer → consumer edge between two tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

/// Full model description.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub director: DirectorConfig,

    /// Task names in declaration order (firing order inside a slot).
    pub tasks: Vec<String>,

    pub attributes: AttributeTable,

    pub connections: Vec<Connection>,
}

impl ModelConfig {
    /// Parse and validate the YAML file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is structurally
    /// invalid, or the model fails validation (non-positive period, duplicate
    /// task names, negative WCET, connections naming unknown tasks).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading model configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open model file: {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid model file: {}", path.display()))
    }

    /// Parse and validate a YAML model description.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ModelFile =
            serde_yaml::from_str(content).context("Failed to parse model YAML")?;

        let director = DirectorConfig {
            period: file.director.period,
            iterations: file.director.iterations,
            synchronize_to_real_time: file.director.synchronize_to_real_time,
            error_policy: file.director.error_policy,
            fail_on_overrun: file.director.fail_on_overrun,
            max_slots: file.director.max_slots,
            start_time: file.director.start_time,
            embedded: false,
        };
        director
            .validate()
            .map_err(|issue| anyhow::anyhow!("{issue}"))?;

        let mut tasks = Vec::with_capacity(file.tasks.len());
        let mut attributes = AttributeTable::new();
        let mut seen = HashSet::new();

        for entry in file.tasks {
            if !seen.insert(entry.name.clone()) {
                bail!("duplicate task name '{}'", entry.name);
            }
            if let Some(wcet) = entry.wcet {
                if !(wcet.is_finite() && wcet >= 0.0) {
                    bail!("task '{}' has invalid wcet {}", entry.name, wcet);
                }
            }

            let attrs = TaskAttributes {
                frequency: entry.frequency.and_then(frequency_expr),
                wcet: entry.wcet,
            };
            debug!(
                "  Task: {} | frequency: {:?} | wcet: {:?}",
                entry.name, attrs.frequency, attrs.wcet
            );
            attributes.insert(&entry.name, attrs);
            tasks.push(entry.name);
        }

        if tasks.is_empty() {
            warn!("Model declares no tasks, the director will refuse to start");
        }

        let mut connections = Vec::with_capacity(file.connections.len());
        for c in file.connections {
            for endpoint in [&c.from, &c.to] {
                if !seen.contains(endpoint) {
                    bail!(
                        "connection {} -> {} names unknown task '{}'",
                        c.from,
                        c.to,
                        endpoint
                    );
                }
            }
            connections.push(Connection {
                from: c.from,
                to: c.to,
            });
        }

        info!(
            period = director.period,
            iterations = director.iterations,
            task_count = tasks.len(),
            connection_count = connections.len(),
            "Model configuration loaded"
        );

        Ok(Self {
            director,
            tasks,
            attributes,
            connections,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
