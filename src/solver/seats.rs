//! Helper seating shared by construction and local search.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::availability::StaffId;
use crate::instance::Instance;
use crate::models::BlockId;
use crate::plan::Plan;

/// People holding a seat in `block`, ignoring the sittings in `skip`.
pub(super) fn busy_in(plan: &Plan, block: BlockId, skip: &[usize]) -> Vec<StaffId> {
    let mut busy = Vec::new();
    for (i, s) in plan.sittings.iter().enumerate() {
        if s.block != block || skip.contains(&i) {
            continue;
        }
        busy.push(s.assessor);
        busy.extend_from_slice(&s.helpers);
    }
    busy.sort_unstable();
    busy.dedup();
    busy
}

/// Sittings placed in `block`, ignoring the sittings in `skip`.
pub(super) fn count_in(plan: &Plan, block: BlockId, skip: &[usize]) -> usize {
    plan.sittings
        .iter()
        .enumerate()
        .filter(|(i, s)| s.block == block && !skip.contains(i))
        .count()
}

/// Whether sitting `s` shares a student with another sitting of its block.
pub(super) fn clashes(instance: &Instance, plan: &Plan, s: usize) -> bool {
    let block = plan.sittings[s].block;
    let mine = instance.students_of(&plan.sittings[s].exams);
    plan.sittings.iter().enumerate().any(|(i, other)| {
        i != s
            && other.block == block
            && other
                .exams
                .iter()
                .any(|&e| mine.binary_search(&instance.exams[e].student).is_ok())
    })
}

/// Re-seats the helpers of sitting `s` from its block's free pool.
///
/// Least-loaded helpers go first; ties are broken by the worker's stream.
/// Returns `false` and leaves the sitting without helpers when the pool is
/// too small.
pub(super) fn fill_helpers(
    instance: &Instance,
    plan: &mut Plan,
    s: usize,
    rng: &mut ChaCha8Rng,
) -> bool {
    plan.sittings[s].helpers.clear();
    let need = instance.helpers_needed(&plan.sittings[s].exams) as usize;
    if need == 0 {
        return true;
    }

    let block = plan.sittings[s].block;
    let assessor = plan.sittings[s].assessor;
    let busy = busy_in(plan, block, &[s]);
    let loads = plan.helper_loads(instance.index.staff().len());

    let mut pool: Vec<(u32, u32, StaffId)> = instance
        .index
        .helpers_at(block)
        .iter()
        .filter(|&&h| h != assessor && busy.binary_search(&h).is_err())
        .map(|&h| (loads[h.index()], rng.random::<u32>(), h))
        .collect();
    if pool.len() < need {
        return false;
    }
    pool.sort_unstable();

    let mut chosen: Vec<StaffId> = pool.into_iter().take(need).map(|(_, _, h)| h).collect();
    chosen.sort_unstable();
    plan.sittings[s].helpers = chosen;
    true
}
