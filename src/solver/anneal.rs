//! Simulated annealing over feasible plans.
//!
//! Every move keeps the plan feasible or is rejected outright, so the
//! search only ever compares valid schedules.
//!
//! # Moves
//!
//! | Move | Effect |
//! |------|--------|
//! | Relocate | Sitting to another block its assessor is available in |
//! | Swap blocks | Two sittings exchange blocks |
//! | Swap exams | Exams trade places between two sittings of one assessor and length |
//! | Reorder | Two exams of one sitting trade positions |
//! | Redraw helper | One helper seat goes to another free helper |
//!
//! Helpers of a moved sitting are re-seated from the target block's free
//! pool; rooms are re-assigned after every move. A move that puts one
//! student into two sittings of a block is rejected.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use super::seats::{busy_in, clashes, count_in, fill_helpers};
use crate::config::SolverConfig;
use crate::evaluation::penalty;
use crate::instance::Instance;
use crate::models::StaffRole;
use crate::plan::Plan;

/// Iterations between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 64;

/// Best plan found by one annealing run.
#[derive(Debug, Clone)]
pub(super) struct Annealed {
    pub plan: Plan,
    pub penalty: u64,
    pub iterations: u64,
    pub timed_out: bool,
}

/// Improves `plan` until the iteration budget, the deadline or a zero
/// penalty is reached.
pub(super) fn anneal(
    instance: &Instance,
    plan: Plan,
    config: &SolverConfig,
    rng: &mut ChaCha8Rng,
    deadline: Instant,
) -> Annealed {
    let mut current_penalty = penalty(instance, &plan);
    let mut best = Annealed {
        plan: plan.clone(),
        penalty: current_penalty,
        iterations: 0,
        timed_out: false,
    };
    if plan.sittings.is_empty() || current_penalty == 0 {
        return best;
    }

    let t0 = config.initial_temperature.max(1e-9);
    let tf = config.final_temperature.clamp(1e-9, t0);
    let mut current = plan;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        if iterations % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
            best.timed_out = true;
            break;
        }
        let progress = iterations as f64 / config.max_iterations as f64;
        let temperature = t0 * (tf / t0).powf(progress);
        iterations += 1;

        let mut candidate = current.clone();
        if !propose(instance, &mut candidate, rng) {
            continue;
        }
        candidate.assign_rooms(instance);
        let candidate_penalty = penalty(instance, &candidate);

        let accept = candidate_penalty <= current_penalty || {
            let delta = candidate_penalty as f64 - current_penalty as f64;
            rng.random::<f64>() < (-delta / temperature).exp()
        };
        if !accept {
            continue;
        }
        current = candidate;
        current_penalty = candidate_penalty;
        if current_penalty < best.penalty {
            best.plan = current.clone();
            best.penalty = current_penalty;
            log::trace!("iteration {}: penalty {}", iterations, best.penalty);
            if best.penalty == 0 {
                break;
            }
        }
    }

    best.iterations = iterations;
    best
}

/// Applies one random move in place; `false` when it was not applicable.
fn propose(instance: &Instance, plan: &mut Plan, rng: &mut ChaCha8Rng) -> bool {
    match rng.random_range(0..4) {
        0 => relocate(instance, plan, rng),
        1 => swap_blocks(instance, plan, rng),
        2 => swap_exams(instance, plan, rng),
        _ => redraw_helper(instance, plan, rng),
    }
}

fn relocate(instance: &Instance, plan: &mut Plan, rng: &mut ChaCha8Rng) -> bool {
    let s = rng.random_range(0..plan.sittings.len());
    let assessor = plan.sittings[s].assessor;
    let domain = instance.index.blocks_of(assessor, StaffRole::Assessor);
    if domain.len() < 2 {
        return false;
    }
    let target = domain[rng.random_range(0..domain.len())];
    if target == plan.sittings[s].block
        || count_in(plan, target, &[s]) >= instance.block_capacity
        || busy_in(plan, target, &[s]).binary_search(&assessor).is_ok()
    {
        return false;
    }
    plan.sittings[s].block = target;
    !clashes(instance, plan, s) && fill_helpers(instance, plan, s, rng)
}

fn swap_blocks(instance: &Instance, plan: &mut Plan, rng: &mut ChaCha8Rng) -> bool {
    let n = plan.sittings.len();
    if n < 2 {
        return false;
    }
    let a = rng.random_range(0..n);
    let b = rng.random_range(0..n);
    let (block_a, block_b) = (plan.sittings[a].block, plan.sittings[b].block);
    if a == b || block_a == block_b {
        return false;
    }
    let (assessor_a, assessor_b) = (plan.sittings[a].assessor, plan.sittings[b].assessor);
    let index = &instance.index;
    if !index.is_available(assessor_a, block_b, StaffRole::Assessor)
        || !index.is_available(assessor_b, block_a, StaffRole::Assessor)
    {
        return false;
    }

    plan.sittings[a].block = block_b;
    plan.sittings[b].block = block_a;
    plan.sittings[a].helpers.clear();
    plan.sittings[b].helpers.clear();
    if busy_in(plan, block_b, &[a]).binary_search(&assessor_a).is_ok()
        || busy_in(plan, block_a, &[b]).binary_search(&assessor_b).is_ok()
    {
        return false;
    }
    if clashes(instance, plan, a) || clashes(instance, plan, b) {
        return false;
    }
    fill_helpers(instance, plan, a, rng) && fill_helpers(instance, plan, b, rng)
}

fn swap_exams(instance: &Instance, plan: &mut Plan, rng: &mut ChaCha8Rng) -> bool {
    let a = rng.random_range(0..plan.sittings.len());
    let (assessor, exam_length) = (plan.sittings[a].assessor, plan.sittings[a].exam_length);
    let peers: Vec<usize> = plan
        .sittings
        .iter()
        .enumerate()
        .filter(|(_, s)| s.assessor == assessor && s.exam_length == exam_length)
        .map(|(i, _)| i)
        .collect();
    let b = peers[rng.random_range(0..peers.len())];
    let i = rng.random_range(0..plan.sittings[a].exams.len());
    let j = rng.random_range(0..plan.sittings[b].exams.len());

    if a == b {
        if i == j {
            return false;
        }
        plan.sittings[a].exams.swap(i, j);
        return true;
    }

    let exam_a = plan.sittings[a].exams[i];
    plan.sittings[a].exams[i] = plan.sittings[b].exams[j];
    plan.sittings[b].exams[j] = exam_a;
    if clashes(instance, plan, a) || clashes(instance, plan, b) {
        return false;
    }

    for s in [a, b] {
        let need = instance.helpers_needed(&plan.sittings[s].exams) as usize;
        if plan.sittings[s].helpers.len() != need && !fill_helpers(instance, plan, s, rng) {
            return false;
        }
    }
    true
}

fn redraw_helper(instance: &Instance, plan: &mut Plan, rng: &mut ChaCha8Rng) -> bool {
    let s = rng.random_range(0..plan.sittings.len());
    let seats = plan.sittings[s].helpers.len();
    if seats == 0 {
        return false;
    }
    let block = plan.sittings[s].block;
    let busy = busy_in(plan, block, &[]);
    let free: Vec<_> = instance
        .index
        .helpers_at(block)
        .iter()
        .copied()
        .filter(|h| busy.binary_search(h).is_err())
        .collect();
    if free.is_empty() {
        return false;
    }

    let seat = rng.random_range(0..seats);
    let helpers = &mut plan.sittings[s].helpers;
    helpers[seat] = free[rng.random_range(0..free.len())];
    helpers.sort_unstable();
    true
}
