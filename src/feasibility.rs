//! Feasibility checks run before any search.
//!
//! Each check is a necessary condition for a complete schedule; passing
//! all of them does not guarantee the solver succeeds. All checks run and
//! their findings are aggregated into one [`ScheduleErrors`].
//!
//! 1. A roster was uploaded.
//! 2. Every assessor with exams has at least as many available blocks as
//!    sittings to hold.
//! 3. Helpers can cover the helper demand: enough helper-block pairs, and
//!    enough distinct helpers for the peak per-block demand implied by
//!    spreading the demand over the usable blocks (or forced into one).
//! 4. Pigeonhole: sittings forced into a block fit its capacity, and all
//!    sittings fit the blocks' combined assessor and room supply.

use serde::{Deserialize, Serialize};

use crate::availability::StaffId;
use crate::instance::Instance;
use crate::models::{BlockId, StaffRole};
use crate::workload::sittings_per_assessor;

/// Aggregated feasibility findings, in the shape the web client renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleErrors {
    /// Assessors without enough available blocks, sorted.
    pub insufficient_avails: Vec<String>,
    pub helpers_needed: bool,
    pub unfeasible_input: bool,
    /// Missing uploads, e.g. `csv`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Set when the search ran out of budget rather than proving infeasibility.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retry_hint: bool,
}

/// `{"errors": {...}}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: ScheduleErrors,
}

impl ScheduleErrors {
    /// Error for a search that found no schedule.
    pub fn unfeasible(retry_hint: bool) -> Self {
        Self {
            unfeasible_input: true,
            retry_hint,
            ..Self::default()
        }
    }

    /// Whether no finding was recorded.
    pub fn is_empty(&self) -> bool {
        self.insufficient_avails.is_empty()
            && !self.helpers_needed
            && !self.unfeasible_input
            && self.missing.is_empty()
    }

    /// Wraps the findings as a response body.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            errors: self.clone(),
        }
    }

    /// The response body as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_response())
    }
}

/// Runs all checks against a compiled instance.
pub fn check(instance: &Instance) -> Result<(), ScheduleErrors> {
    let mut errors = ScheduleErrors::default();
    let index = &instance.index;
    let blocks = index.blocks();

    // 1. roster
    if !instance.csv_uploaded {
        errors.unfeasible_input = true;
        errors.missing.push("csv".to_string());
    }

    if !instance.oversized.is_empty() {
        errors.unfeasible_input = true;
    }

    // 2. assessor availability
    let staff_count = index.staff().len();
    let needed = sittings_per_assessor(&instance.sittings, staff_count);
    let avail: Vec<usize> = (0..staff_count)
        .map(|s| index.blocks_of(StaffId(s as u32), StaffRole::Assessor).len())
        .collect();
    let short = |a: StaffId| avail[a.index()] == 0 || avail[a.index()] < needed[a.index()];

    let mut insufficient: Vec<String> = instance
        .assessors()
        .into_iter()
        .filter(|&a| short(a))
        .map(|a| instance.email(a).to_string())
        .collect();
    insufficient.sort();
    errors.insufficient_avails = insufficient;

    // An assessor is forced when every available block must host one of their sittings.
    let forced = |a: StaffId| {
        !short(a) && needed[a.index()] > 0 && avail[a.index()] == needed[a.index()]
    };

    // 3. helpers
    let demand: usize = instance
        .sittings
        .iter()
        .map(|s| instance.helpers_needed(&s.exams) as usize)
        .sum();
    if demand > 0 {
        let mut min_need = vec![u32::MAX; staff_count];
        let mut needs_helpers = vec![false; staff_count];
        for s in &instance.sittings {
            let need = instance.helpers_needed(&s.exams);
            let a = s.assessor.index();
            min_need[a] = min_need[a].min(need);
            needs_helpers[a] |= need > 0;
        }

        let mut usable = 0usize;
        let mut supply = 0usize;
        let mut forced_peak = 0usize;
        let mut forced_over = false;
        for block in blocks {
            let helpers = index.helpers_at(block.id).len();
            let assessors = index.assessors_at(block.id);
            if helpers > 0 && assessors.iter().any(|a| needs_helpers[a.index()]) {
                usable += 1;
                supply += helpers;
            }
            let forced_demand: usize = assessors
                .iter()
                .filter(|&&a| forced(a))
                .map(|a| min_need[a.index()] as usize)
                .sum();
            forced_peak = forced_peak.max(forced_demand);
            forced_over |= forced_demand > helpers;
        }

        let headcount = index.helpers().len();
        let peak = if usable == 0 {
            demand
        } else {
            demand.div_ceil(usable).max(forced_peak)
        };
        if usable == 0 || headcount < peak || supply < demand || forced_over {
            errors.helpers_needed = true;
            log::debug!(
                "window {}: helper demand {} over {} usable blocks, {} helpers, supply {}",
                instance.window.id,
                demand,
                usable,
                headcount,
                supply
            );
        }
    }

    // 4. pigeonhole over assessors whose own availability suffices
    let placeable: usize = instance
        .sittings
        .iter()
        .filter(|s| !short(s.assessor))
        .count();
    let mut seats = 0usize;
    for block in blocks {
        let assessors = index.assessors_at(block.id);
        let forced_here = assessors.iter().filter(|&&a| forced(a)).count();
        if forced_here > instance.block_capacity {
            errors.unfeasible_input = true;
            log::debug!(
                "window {}: {} forced sittings exceed capacity of block {}",
                instance.window.id,
                forced_here,
                block_label(instance, block.id)
            );
        }
        seats = seats.saturating_add(assessors.len().min(instance.block_capacity));
    }
    if placeable > seats {
        errors.unfeasible_input = true;
    }

    if errors.is_empty() {
        Ok(())
    } else {
        log::warn!(
            "window {}: feasibility failed ({} short, helpers_needed={}, unfeasible_input={})",
            instance.window.id,
            errors.insufficient_avails.len(),
            errors.helpers_needed,
            errors.unfeasible_input
        );
        Err(errors)
    }
}

fn block_label(instance: &Instance, block: BlockId) -> String {
    let b = instance.index.block(block);
    format!("{} {}", b.date, b.start_time.format("%H:%M"))
}
