//! Exam-assessment scheduling engine.
//!
//! Turns a window's roster, module durations, rooms and staff availability
//! into a feasible, penalty-minimized exam timetable. Infeasible input is
//! diagnosed before any search, and results are scored and exported as CSV.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Window`, `Block`, `BlockTemplate`, `Module`,
//!   `Exam`, `Staff`, `AvailableBlock`, `Room`, `Schedule`
//! - **`validation`**: Creation checks with stable reason codes
//! - **`roster`**: Roster CSV ingestion
//! - **`availability`**: Per-block lookup of available assessors and helpers
//! - **`workload`**: Packing of exams into sittings
//! - **`instance`**: Validated input lowered to dense indices
//! - **`feasibility`**: Structured diagnostics before search
//! - **`plan`**: Index-based schedules and the hard-constraint check
//! - **`solver`**: Backtracking construction and simulated annealing on
//!   parallel seeded workers
//! - **`evaluation`**: Penalty objective and summary counters
//! - **`export`**: Schedule CSV rendering
//! - **`service`**: Per-window `idle → ongoing → done` lifecycle
//! - **`config`**: TOML-loadable engine configuration
//!
//! # Pipeline
//!
//! ```text
//! WindowInput ─► Instance::compile ─► feasibility::check ─► Solver::solve
//!                                                               │
//!                          CsvExport ◄─ export_csv ◄─ evaluate_plan
//! ```
//!
//! # References
//!
//! - Burke & Petrovic (2002), "Recent research directions in automated
//!   timetabling", *European Journal of Operational Research* 140(2)
//! - Qu et al. (2009), "A survey of search methodologies and automated
//!   system development for examination timetabling", *Journal of
//!   Scheduling* 12(1)

pub mod availability;
pub mod config;
pub mod evaluation;
pub mod export;
pub mod feasibility;
pub mod instance;
pub mod models;
pub mod plan;
pub mod roster;
pub mod service;
pub mod solver;
pub mod validation;
pub mod workload;

pub use config::EngineConfig;
pub use service::SchedulingService;
