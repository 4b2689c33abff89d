//! Exam placement solver.
//!
//! Each worker builds a feasible plan by backtracking and then improves it
//! by simulated annealing. Workers run on scoped threads with independent
//! seeded streams; the lowest penalty wins, ties going to the lower worker
//! index, so a fixed seed and worker count always yield the same schedule.
//!
//! # Reference
//!
//! - Haralick & Elliott (1980), "Increasing Tree Search Efficiency for
//!   Constraint Satisfaction Problems", *Artificial Intelligence* 14(3)
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated
//!   Annealing", *Science* 220(4598)

mod anneal;
mod construct;
mod seats;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SolverConfig;
use crate::evaluation::{score, PenaltyBreakdown};
use crate::instance::Instance;
use crate::models::Schedule;
use crate::plan::Plan;

/// Golden-ratio increment used to derive worker seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Why no schedule was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Infeasibility {
    /// The search space was exhausted.
    Proven,
    /// The node or time budget ran out first; a retry may succeed.
    BudgetExceeded,
}

/// How the returned solution relates to the optimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Penalty zero; nothing can be better.
    Optimal,
    /// Best found before the iteration or time budget ran out.
    BudgetExhausted,
}

/// Search counters of the winning worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveStats {
    pub worker: usize,
    /// Construction nodes visited.
    pub nodes: u64,
    /// Annealing iterations run.
    pub iterations: u64,
    pub timed_out: bool,
}

/// A feasible schedule and its score.
#[derive(Debug, Clone)]
pub struct Solution {
    pub plan: Plan,
    pub schedule: Schedule,
    pub penalty: u64,
    pub breakdown: PenaltyBreakdown,
    pub status: SolveStatus,
    pub stats: SolveStats,
}

/// Result of one solve.
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Feasible(Box<Solution>),
    Infeasible(Infeasibility),
}

impl SolveOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Self::Feasible(s) => Some(s),
            Self::Infeasible(_) => None,
        }
    }
}

/// What one worker produced.
struct WorkerResult {
    worker: usize,
    outcome: Result<(Plan, u64), Infeasibility>,
    nodes: u64,
    iterations: u64,
    timed_out: bool,
}

/// Parallel construct-then-anneal solver.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Seed of worker `k`.
    pub fn worker_seed(&self, k: usize) -> u64 {
        self.config.seed ^ (k as u64).wrapping_mul(SEED_STRIDE)
    }

    /// Solves `instance`.
    ///
    /// Exams that fit no sitting make the instance infeasible outright.
    pub fn solve(&self, instance: &Instance) -> SolveOutcome {
        if !instance.oversized.is_empty() {
            return SolveOutcome::Infeasible(Infeasibility::Proven);
        }
        let deadline = Instant::now() + Duration::from_millis(self.config.time_limit_ms);
        let workers = self.config.workers.max(1);
        log::debug!(
            "window {}: solving {} sittings with {} workers",
            instance.window.id,
            instance.sittings.len(),
            workers
        );

        let mut results: Vec<WorkerResult> = Vec::with_capacity(workers);
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|k| {
                    let seed = self.worker_seed(k);
                    scope.spawn(move || self.run_worker(instance, k, seed, deadline))
                })
                .collect();
            for h in handles {
                match h.join() {
                    Ok(r) => results.push(r),
                    Err(_) => log::error!("solver worker panicked"),
                }
            }
        });

        self.reduce(instance, results)
    }

    fn run_worker(
        &self,
        instance: &Instance,
        worker: usize,
        seed: u64,
        deadline: Instant,
    ) -> WorkerResult {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let max_nodes = self.config.max_backtrack_nodes;
        let built = construct::construct(instance, &mut rng, max_nodes, deadline);
        let plan = match built.result {
            Ok(plan) => plan,
            Err(reason) => {
                log::debug!("worker {}: construction ended {:?}", worker, reason);
                return WorkerResult {
                    worker,
                    outcome: Err(reason),
                    nodes: built.nodes,
                    iterations: 0,
                    timed_out: false,
                };
            }
        };

        let annealed = anneal::anneal(instance, plan, &self.config, &mut rng, deadline);
        log::debug!(
            "worker {}: penalty {} after {} iterations",
            worker,
            annealed.penalty,
            annealed.iterations
        );
        WorkerResult {
            worker,
            outcome: Ok((annealed.plan, annealed.penalty)),
            nodes: built.nodes,
            iterations: annealed.iterations,
            timed_out: annealed.timed_out,
        }
    }

    fn reduce(&self, instance: &Instance, results: Vec<WorkerResult>) -> SolveOutcome {
        let mut proven = false;
        let mut best: Option<(u64, WorkerResult)> = None;
        for r in results {
            match r.outcome {
                Ok((_, penalty)) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |(p, b)| (penalty, r.worker) < (*p, b.worker));
                    if better {
                        best = Some((penalty, r));
                    }
                }
                Err(Infeasibility::Proven) => proven = true,
                Err(Infeasibility::BudgetExceeded) => {}
            }
        }

        let Some((penalty, winner)) = best else {
            let reason = if proven {
                Infeasibility::Proven
            } else {
                Infeasibility::BudgetExceeded
            };
            log::info!("window {}: no schedule found ({:?})", instance.window.id, reason);
            return SolveOutcome::Infeasible(reason);
        };
        let Ok((plan, _)) = winner.outcome else {
            return SolveOutcome::Infeasible(Infeasibility::BudgetExceeded);
        };

        let status = if penalty == 0 {
            SolveStatus::Optimal
        } else {
            SolveStatus::BudgetExhausted
        };
        log::info!(
            "window {}: worker {} won with penalty {}",
            instance.window.id,
            winner.worker,
            penalty
        );
        SolveOutcome::Feasible(Box::new(Solution {
            schedule: plan.to_schedule(instance),
            breakdown: score(instance, &plan),
            plan,
            penalty,
            status,
            stats: SolveStats {
                worker: winner.worker,
                nodes: winner.nodes,
                iterations: winner.iterations,
                timed_out: winner.timed_out,
            },
        }))
    }
}
