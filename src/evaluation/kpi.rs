//! Schedule summary counters.
//!
//! The figures the scheduling dashboard shows next to the penalty.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Exams scheduled | Distinct exams placed in some sitting |
//! | Scheduled rate | Exams scheduled / total exams |
//! | Assessor coverage | Available blocks vs. sittings needed: full, partial or none |
//! | Helpers available | Helpers with at least one available block |
//! | Helpers used | Helpers holding at least one seat |

use serde::{Deserialize, Serialize};

use crate::instance::Instance;
use crate::models::StaffRole;
use crate::plan::Plan;
use crate::workload::sittings_per_assessor;

/// Summary counters for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub total_exams: usize,
    pub exams_scheduled: usize,
    pub sittings: usize,
    /// Fraction of exams placed (0.0..=1.0); 1.0 when there are no exams.
    pub scheduled_rate: f64,
    pub assessors_full: usize,
    pub assessors_partial: usize,
    pub assessors_none: usize,
    pub helpers_available: usize,
    pub helpers_used: usize,
    pub helper_seats: usize,
}

impl ScheduleSummary {
    /// Computes the counters for `plan`.
    pub fn calculate(instance: &Instance, plan: &Plan) -> Self {
        let total_exams = instance.exams.len();
        let mut placed = vec![false; total_exams];
        for s in &plan.sittings {
            for &e in &s.exams {
                placed[e] = true;
            }
        }
        let exams_scheduled = placed.iter().filter(|&&p| p).count();

        let staff_count = instance.index.staff().len();
        let needed = sittings_per_assessor(&instance.sittings, staff_count);
        let (mut full, mut partial, mut none) = (0, 0, 0);
        for a in instance.assessors() {
            let avail = instance
                .index
                .blocks_of(a, StaffRole::Assessor)
                .len();
            if avail == 0 {
                none += 1;
            } else if avail < needed[a.index()] {
                partial += 1;
            } else {
                full += 1;
            }
        }

        let loads = plan.helper_loads(staff_count);
        let helpers_used = loads.iter().filter(|&&l| l > 0).count();
        let helper_seats = loads.iter().map(|&l| l as usize).sum();

        let scheduled_rate = if total_exams == 0 {
            1.0
        } else {
            exams_scheduled as f64 / total_exams as f64
        };

        Self {
            total_exams,
            exams_scheduled,
            sittings: plan.sittings.len(),
            scheduled_rate,
            assessors_full: full,
            assessors_partial: partial,
            assessors_none: none,
            helpers_available: instance.index.helpers().len(),
            helpers_used,
            helper_seats,
        }
    }

    /// Whether every exam is placed.
    pub fn is_complete(&self) -> bool {
        self.exams_scheduled == self.total_exams
    }

    /// Helpers with availability who hold no seat.
    pub fn idle_helpers(&self) -> usize {
        self.helpers_available.saturating_sub(self.helpers_used)
    }
}
