//! Engine configuration.
//!
//! Every section is optional in the TOML source; missing keys fall back
//! to the defaults below.
//!
//! ```toml
//! [validation]
//! email_domain = "code.berlin"
//!
//! [solver]
//! seed = 7
//! workers = 2
//!
//! [penalty.weights]
//! student_overlap = 250
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default exam length (minutes) for modules created from a roster.
pub const DEFAULT_EXAM_LENGTH: u32 = 20;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Input validation rules.
    pub validation: ValidationConfig,
    /// Search budgets and seeding.
    pub solver: SolverConfig,
    /// Objective weights.
    pub penalty: PenaltyConfig,
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Replaces the solver section.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Replaces the penalty section.
    pub fn with_penalty(mut self, penalty: PenaltyConfig) -> Self {
        self.penalty = penalty;
        self
    }
}

/// Inclusive range of allowed minute values with an optional step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub min: u32,
    pub max: u32,
    /// Granularity measured from `min`; 0 or 1 disables the step check.
    #[serde(default)]
    pub step: u32,
}

impl DurationBounds {
    pub fn new(min: u32, max: u32, step: u32) -> Self {
        Self { min, max, step }
    }

    /// Whether `minutes` is an allowed value.
    pub fn contains(&self, minutes: u32) -> bool {
        if minutes < self.min || minutes > self.max {
            return false;
        }
        self.step <= 1 || (minutes - self.min) % self.step == 0
    }
}

/// Rules applied by [`crate::validation`] and the roster parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Institutional email domain, without the `@`.
    pub email_domain: String,
    /// Allowed module exam lengths.
    pub exam_length: DurationBounds,
    /// Allowed window block lengths.
    pub block_length: DurationBounds,
    /// Exam length assigned to modules that do not state one.
    pub default_exam_length: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            email_domain: "code.berlin".to_string(),
            exam_length: DurationBounds::new(10, 360, 10),
            block_length: DurationBounds::new(10, 420, 0),
            default_exam_length: DEFAULT_EXAM_LENGTH,
        }
    }
}

impl ValidationConfig {
    /// Sets the institutional email domain.
    pub fn with_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.email_domain = domain.into();
        self
    }
}

/// Search budgets, parallelism and seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Base seed; worker `k` derives its own stream from it.
    pub seed: u64,
    /// Number of independent search workers.
    pub workers: usize,
    /// Annealing iterations per worker.
    pub max_iterations: u64,
    /// Wall-clock budget for one solve (ms).
    pub time_limit_ms: u64,
    /// Node budget for the construction search.
    pub max_backtrack_nodes: u64,
    /// Starting annealing temperature.
    pub initial_temperature: f64,
    /// Temperature reached at the last iteration.
    pub final_temperature: f64,
    /// Cap on sittings running in the same block, on top of room capacity.
    pub max_concurrent_sittings: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            workers: 4,
            max_iterations: 20_000,
            time_limit_ms: 30_000,
            max_backtrack_nodes: 200_000,
            initial_temperature: 10.0,
            final_temperature: 0.05,
            max_concurrent_sittings: None,
        }
    }
}

impl SolverConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_time_limit_ms(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = time_limit_ms;
        self
    }

    pub fn with_max_backtrack_nodes(mut self, nodes: u64) -> Self {
        self.max_backtrack_nodes = nodes;
        self
    }

    pub fn with_max_concurrent_sittings(mut self, limit: usize) -> Self {
        self.max_concurrent_sittings = Some(limit);
        self
    }
}

/// Objective weights and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub weights: PenaltyWeights,
    /// Two same-day exams of a student closer than this are "shortly followed".
    pub shortly_followed_minutes: i64,
    /// Two sittings of an assessor closer than this are back to back.
    pub back_to_back_gap_minutes: i64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            weights: PenaltyWeights::default(),
            shortly_followed_minutes: 180,
            back_to_back_gap_minutes: 30,
        }
    }
}

/// Weight per penalty category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    pub student_overlap: u64,
    pub student_shortly_followed: u64,
    pub student_same_day: u64,
    pub student_consecutive_days: u64,
    pub assessor_back_to_back: u64,
    pub assessor_extra_days: u64,
    pub helper_imbalance: u64,
    pub module_switches: u64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            student_overlap: 100,
            student_shortly_followed: 10,
            student_same_day: 3,
            student_consecutive_days: 1,
            assessor_back_to_back: 2,
            assessor_extra_days: 1,
            helper_imbalance: 1,
            module_switches: 1,
        }
    }
}
