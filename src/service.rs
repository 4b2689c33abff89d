//! Per-window scheduling lifecycle.
//!
//! Each window moves through `idle → ongoing → done`. A run is started by
//! [`SchedulingService::trigger`] (background thread) or
//! [`SchedulingService::run_blocking`]; queries never wait on a solve.
//!
//! Run states are typestate records: a transition consumes the record it
//! starts from, so a finished run cannot finish again and a running one
//! cannot be restarted. Every run carries an id and a worker only writes
//! its result while the registry still holds its own ongoing record.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::evaluation::{evaluate_plan, Evaluation};
use crate::export::{export_csv, CsvExport};
use crate::feasibility::{self, ScheduleErrors};
use crate::instance::Instance;
use crate::models::{Schedule, WindowId, WindowInput};
use crate::solver::{Infeasibility, SolveOutcome, SolveStats, SolveStatus, Solver};
use crate::validation::{ValidationError, ValidationErrorKind};

/// Poll interval of [`SchedulingService::wait`].
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Client-facing lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingStatus {
    Idle,
    Ongoing,
    Done,
}

/// `{"scheduling_status": ...}` response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub scheduling_status: SchedulingStatus,
}

/// Returned once a run has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReceipt {
    pub window: WindowId,
    pub run_id: u64,
}

/// Why a run ended without a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFailure {
    Invalid(Vec<ValidationError>),
    Infeasible(ScheduleErrors),
}

/// Outcome of one run, as seen by whoever executed it.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Completed {
        run_id: u64,
        penalty: u64,
        status: SolveStatus,
    },
    Failed(RunFailure),
    /// The run was reset while executing; its result was dropped.
    Superseded,
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("window {0} is already being scheduled")]
    ConcurrencyConflict(WindowId),
    #[error("failed to spawn scheduling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("window {0} has never been scheduled")]
    UnknownWindow(WindowId),
    #[error("window {0} has no finished schedule")]
    NotReady(WindowId),
}

/// A window with no schedule, possibly after a failed run.
#[derive(Debug, Clone, Default)]
pub struct IdleRun {
    pub failure: Option<RunFailure>,
}

/// A run in progress.
#[derive(Debug, Clone)]
pub struct OngoingRun {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
}

/// A finished run and everything the queries serve from it.
#[derive(Debug, Clone)]
pub struct DoneRun {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub schedule: Schedule,
    pub evaluation: Evaluation,
    pub csv: CsvExport,
    pub stats: SolveStats,
    pub status: SolveStatus,
}

/// Product of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct Completed {
    pub schedule: Schedule,
    pub evaluation: Evaluation,
    pub csv: CsvExport,
    pub stats: SolveStats,
    pub status: SolveStatus,
}

impl IdleRun {
    pub fn start(self, run_id: u64) -> OngoingRun {
        OngoingRun {
            run_id,
            started_at: Utc::now(),
        }
    }
}

impl DoneRun {
    /// Starts a new run; the current schedule is dropped.
    pub fn restart(self, run_id: u64) -> OngoingRun {
        OngoingRun {
            run_id,
            started_at: Utc::now(),
        }
    }
}

impl OngoingRun {
    pub fn complete(self, done: Completed) -> DoneRun {
        DoneRun {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            schedule: done.schedule,
            evaluation: done.evaluation,
            csv: done.csv,
            stats: done.stats,
            status: done.status,
        }
    }

    pub fn fail(self, failure: RunFailure) -> IdleRun {
        IdleRun {
            failure: Some(failure),
        }
    }
}

/// Lifecycle state of one window.
#[derive(Debug, Clone)]
pub enum RunState {
    Idle(IdleRun),
    Ongoing(OngoingRun),
    Done(Box<DoneRun>),
}

impl RunState {
    pub fn status(&self) -> SchedulingStatus {
        match self {
            Self::Idle(_) => SchedulingStatus::Idle,
            Self::Ongoing(_) => SchedulingStatus::Ongoing,
            Self::Done(_) => SchedulingStatus::Done,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle(IdleRun::default())
    }
}

/// Permission to execute one run; obtained from [`SchedulingService::start`].
#[derive(Debug)]
pub struct RunTicket {
    window: WindowId,
    run_id: u64,
}

impl RunTicket {
    pub fn receipt(&self) -> TriggerReceipt {
        TriggerReceipt {
            window: self.window,
            run_id: self.run_id,
        }
    }
}

/// Runs the full pipeline for one window.
pub fn execute(input: &WindowInput, config: &EngineConfig) -> Result<Completed, RunFailure> {
    let window = input.window.id;
    let instance = Instance::compile(input, config).map_err(|errors| {
        log::warn!("window {}: input rejected with {} errors", window, errors.len());
        RunFailure::Invalid(errors)
    })?;
    feasibility::check(&instance).map_err(RunFailure::Infeasible)?;

    let solution = match Solver::new(config.solver.clone()).solve(&instance) {
        SolveOutcome::Feasible(solution) => solution,
        SolveOutcome::Infeasible(reason) => {
            log::warn!("window {}: solver found no schedule ({:?})", window, reason);
            return Err(RunFailure::Infeasible(ScheduleErrors::unfeasible(
                reason == Infeasibility::BudgetExceeded,
            )));
        }
    };

    let evaluation = evaluate_plan(&instance, &solution.plan);
    let csv = export_csv(&input.window, &solution.schedule, input);
    Ok(Completed {
        schedule: solution.schedule,
        evaluation,
        csv,
        stats: solution.stats,
        status: solution.status,
    })
}

/// Registry of scheduling runs, one per window.
#[derive(Clone)]
pub struct SchedulingService {
    config: Arc<EngineConfig>,
    runs: Arc<Mutex<FxHashMap<WindowId, RunState>>>,
    next_run: Arc<AtomicU64>,
}

impl SchedulingService {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            runs: Arc::new(Mutex::new(FxHashMap::default())),
            next_run: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Marks `window` ongoing and hands out the ticket to run it.
    pub fn start(&self, window: WindowId) -> Result<RunTicket, TriggerError> {
        let mut runs = self.runs.lock();
        let state = runs.remove(&window).unwrap_or_default();
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let ongoing = match state {
            RunState::Ongoing(current) => {
                runs.insert(window, RunState::Ongoing(current));
                return Err(TriggerError::ConcurrencyConflict(window));
            }
            RunState::Idle(idle) => idle.start(run_id),
            RunState::Done(done) => done.restart(run_id),
        };
        runs.insert(window, RunState::Ongoing(ongoing));
        log::info!("window {}: run {} started", window, run_id);
        Ok(RunTicket { window, run_id })
    }

    /// Executes a started run on the calling thread and records the result.
    pub fn run_ticket(&self, ticket: RunTicket, input: &WindowInput) -> RunReport {
        let result = if input.window.id == ticket.window {
            execute(input, &self.config)
        } else {
            Err(RunFailure::Invalid(vec![ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!(
                    "Input for window {} used to run window {}",
                    input.window.id, ticket.window
                ),
            )]))
        };
        self.finish(ticket, result)
    }

    fn finish(&self, ticket: RunTicket, result: Result<Completed, RunFailure>) -> RunReport {
        let mut runs = self.runs.lock();
        let current = match runs.remove(&ticket.window) {
            Some(RunState::Ongoing(run)) if run.run_id == ticket.run_id => run,
            other => {
                if let Some(state) = other {
                    runs.insert(ticket.window, state);
                }
                log::debug!(
                    "window {}: dropping result of superseded run {}",
                    ticket.window,
                    ticket.run_id
                );
                return RunReport::Superseded;
            }
        };

        match result {
            Ok(done) => {
                let penalty = done.evaluation.penalty;
                let status = done.status;
                runs.insert(ticket.window, RunState::Done(Box::new(current.complete(done))));
                log::info!(
                    "window {}: run {} done with penalty {}",
                    ticket.window,
                    ticket.run_id,
                    penalty
                );
                RunReport::Completed {
                    run_id: ticket.run_id,
                    penalty,
                    status,
                }
            }
            Err(failure) => {
                runs.insert(ticket.window, RunState::Idle(current.fail(failure.clone())));
                log::info!("window {}: run {} failed", ticket.window, ticket.run_id);
                RunReport::Failed(failure)
            }
        }
    }

    /// Starts a run on a background thread.
    pub fn trigger(&self, input: WindowInput) -> Result<TriggerReceipt, TriggerError> {
        let window = input.window.id;
        let ticket = self.start(window)?;
        let receipt = ticket.receipt();

        let service = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("schedule-window-{window}"))
            .spawn(move || {
                service.run_ticket(ticket, &input);
            });
        if let Err(e) = spawned {
            let mut runs = self.runs.lock();
            let ours = matches!(
                runs.get(&window),
                Some(RunState::Ongoing(r)) if r.run_id == receipt.run_id
            );
            if ours {
                runs.insert(window, RunState::default());
            }
            return Err(TriggerError::Spawn(e));
        }
        Ok(receipt)
    }

    /// Starts and executes a run on the calling thread.
    pub fn run_blocking(&self, input: &WindowInput) -> Result<RunReport, TriggerError> {
        let ticket = self.start(input.window.id)?;
        Ok(self.run_ticket(ticket, input))
    }

    /// Forgets `window`; a run still executing for it will not write back.
    pub fn reset(&self, window: WindowId) {
        self.runs.lock().remove(&window);
    }

    pub fn status(&self, window: WindowId) -> StatusResponse {
        let scheduling_status = self
            .runs
            .lock()
            .get(&window)
            .map_or(SchedulingStatus::Idle, RunState::status);
        StatusResponse { scheduling_status }
    }

    /// Feasibility findings of the last failed run.
    pub fn errors(&self, window: WindowId) -> Option<ScheduleErrors> {
        match self.failure(window)? {
            RunFailure::Infeasible(errors) => Some(errors),
            RunFailure::Invalid(_) => None,
        }
    }

    /// Validation errors of the last failed run.
    pub fn validation_errors(&self, window: WindowId) -> Option<Vec<ValidationError>> {
        match self.failure(window)? {
            RunFailure::Invalid(errors) => Some(errors),
            RunFailure::Infeasible(_) => None,
        }
    }

    fn failure(&self, window: WindowId) -> Option<RunFailure> {
        match self.runs.lock().get(&window)? {
            RunState::Idle(idle) => idle.failure.clone(),
            _ => None,
        }
    }

    fn with_done<T>(
        &self,
        window: WindowId,
        f: impl FnOnce(&DoneRun) -> T,
    ) -> Result<T, QueryError> {
        match self.runs.lock().get(&window) {
            None => Err(QueryError::UnknownWindow(window)),
            Some(RunState::Done(done)) => Ok(f(done)),
            Some(_) => Err(QueryError::NotReady(window)),
        }
    }

    pub fn evaluation(&self, window: WindowId) -> Result<Evaluation, QueryError> {
        self.with_done(window, |done| done.evaluation.clone())
    }

    pub fn schedule(&self, window: WindowId) -> Result<Schedule, QueryError> {
        self.with_done(window, |done| done.schedule.clone())
    }

    pub fn csv(&self, window: WindowId) -> Result<CsvExport, QueryError> {
        self.with_done(window, |done| done.csv.clone())
    }

    /// Polls until `window` is no longer ongoing or `timeout` passes.
    pub fn wait(&self, window: WindowId, timeout: Duration) -> SchedulingStatus {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status(window).scheduling_status;
            if status != SchedulingStatus::Ongoing || Instant::now() >= deadline {
                return status;
            }
            thread::sleep(WAIT_POLL);
        }
    }
}

impl Default for SchedulingService {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::models::{AvailableBlock, Exam, Module, Semester, StaffRole, Window};
    use chrono::{NaiveDate, NaiveTime};

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn service() -> SchedulingService {
        SchedulingService::new(EngineConfig::default().with_solver(
            SolverConfig::default()
                .with_workers(1)
                .with_max_iterations(200),
        ))
    }

    fn input(id: u64) -> WindowInput {
        let window = Window::new(WindowId(id), Semester::Spring, 2024, d(), d(), 60)
            .with_slots(d(), [t(9), t(11)]);
        WindowInput::new(window)
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s@code.berlin", "a@code.berlin"))
            .with_availability(AvailableBlock::new(
                WindowId(id),
                StaffRole::Assessor,
                "a@code.berlin",
                d(),
                t(9),
            ))
    }

    #[test]
    fn test_typestate_transitions() {
        let ongoing = IdleRun::default().start(1);
        let idle = ongoing.fail(RunFailure::Infeasible(ScheduleErrors::unfeasible(false)));
        assert!(idle.failure.is_some());
        let again = idle.start(2);
        assert_eq!(again.run_id, 2);
        assert_eq!(RunState::Ongoing(again).status(), SchedulingStatus::Ongoing);
    }

    #[test]
    fn test_blocking_run_reaches_done() {
        let svc = service();
        assert_eq!(svc.status(WindowId(1)).scheduling_status, SchedulingStatus::Idle);
        assert_eq!(svc.evaluation(WindowId(1)), Err(QueryError::UnknownWindow(WindowId(1))));

        let report = svc.run_blocking(&input(1)).unwrap();
        assert!(matches!(report, RunReport::Completed { penalty: 0, .. }));
        assert_eq!(svc.status(WindowId(1)).scheduling_status, SchedulingStatus::Done);
        assert_eq!(svc.evaluation(WindowId(1)).unwrap().to_response().penalty, 0);
        assert_eq!(svc.schedule(WindowId(1)).unwrap().exam_count(), 1);
        assert_eq!(
            svc.csv(WindowId(1)).unwrap().filename,
            "schedule_spring_2024_window_1.csv"
        );
    }

    #[test]
    fn test_second_start_conflicts() {
        let svc = service();
        let ticket = svc.start(WindowId(1)).unwrap();
        assert!(matches!(
            svc.start(WindowId(1)),
            Err(TriggerError::ConcurrencyConflict(WindowId(1)))
        ));
        assert_eq!(svc.csv(WindowId(1)), Err(QueryError::NotReady(WindowId(1))));
        svc.run_ticket(ticket, &input(1));
        assert!(svc.start(WindowId(1)).is_ok());
    }

    #[test]
    fn test_reset_drops_stale_result() {
        let svc = service();
        let ticket = svc.start(WindowId(1)).unwrap();
        svc.reset(WindowId(1));
        let fresh = svc.start(WindowId(1)).unwrap();
        assert_eq!(svc.run_ticket(ticket, &input(1)), RunReport::Superseded);
        assert_eq!(svc.status(WindowId(1)).scheduling_status, SchedulingStatus::Ongoing);
        assert!(matches!(svc.run_ticket(fresh, &input(1)), RunReport::Completed { .. }));
    }

    #[test]
    fn test_failed_run_keeps_errors() {
        let svc = service();
        let input = input(1).with_csv_uploaded(false);
        let report = svc.run_blocking(&input).unwrap();
        assert!(matches!(report, RunReport::Failed(RunFailure::Infeasible(_))));
        assert_eq!(svc.status(WindowId(1)).scheduling_status, SchedulingStatus::Idle);
        let errors = svc.errors(WindowId(1)).unwrap();
        assert!(errors.unfeasible_input);
        assert_eq!(errors.missing, vec!["csv".to_string()]);
        assert!(svc.validation_errors(WindowId(1)).is_none());
    }

    #[test]
    fn test_failed_rerun_discards_previous_schedule() {
        let svc = service();
        svc.run_blocking(&input(1)).unwrap();
        assert!(svc.csv(WindowId(1)).is_ok());

        let ticket = svc.start(WindowId(1)).unwrap();
        assert_eq!(svc.csv(WindowId(1)), Err(QueryError::NotReady(WindowId(1))));
        let report = svc.run_ticket(ticket, &input(1).with_csv_uploaded(false));
        assert!(matches!(report, RunReport::Failed(RunFailure::Infeasible(_))));
        assert_eq!(svc.status(WindowId(1)).scheduling_status, SchedulingStatus::Idle);
        assert_eq!(svc.csv(WindowId(1)), Err(QueryError::NotReady(WindowId(1))));
        assert_eq!(svc.errors(WindowId(1)).unwrap().missing, vec!["csv".to_string()]);
    }

    #[test]
    fn test_trigger_runs_in_background() {
        let svc = service();
        let receipt = svc.trigger(input(2)).unwrap();
        assert_eq!(receipt.window, WindowId(2));
        assert_eq!(svc.wait(WindowId(2), Duration::from_secs(30)), SchedulingStatus::Done);
    }
}
