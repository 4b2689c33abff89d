//! Penalty objective.
//!
//! The single scoring function for plans. The solver minimizes it and the
//! evaluator reports it, so both always agree on a given plan.
//!
//! # Categories
//!
//! | Category | Counted per |
//! |----------|-------------|
//! | `student_overlap` | pair of a student's exams that overlap |
//! | `student_shortly_followed` | same-day pair with gap below `shortly_followed_minutes` |
//! | `student_same_day` | other same-day pair |
//! | `student_consecutive_days` | pair on consecutive days |
//! | `assessor_back_to_back` | assessor's consecutive sittings within `back_to_back_gap_minutes` |
//! | `assessor_extra_days` | assessor day on site beyond the minimum possible |
//! | `helper_imbalance` | max minus min helper seats across available helpers |
//! | `module_switches` | adjacent exams of different modules in one sitting |
//!
//! Student pairs are counted over all pairs, not only neighbours. A student
//! in two sittings of one block is also a hard violation, so solver output
//! never scores `student_overlap`; the category still prices schedules read
//! back from outside.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::availability::StaffId;
use crate::config::PenaltyWeights;
use crate::instance::Instance;
use crate::models::StaffRole;
use crate::plan::Plan;

/// Unweighted counts per penalty category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub student_overlap: u64,
    pub student_shortly_followed: u64,
    pub student_same_day: u64,
    pub student_consecutive_days: u64,
    pub assessor_back_to_back: u64,
    pub assessor_extra_days: u64,
    pub helper_imbalance: u64,
    pub module_switches: u64,
}

impl PenaltyBreakdown {
    /// Weighted sum.
    pub fn total(&self, w: &PenaltyWeights) -> u64 {
        self.student_overlap * w.student_overlap
            + self.student_shortly_followed * w.student_shortly_followed
            + self.student_same_day * w.student_same_day
            + self.student_consecutive_days * w.student_consecutive_days
            + self.assessor_back_to_back * w.assessor_back_to_back
            + self.assessor_extra_days * w.assessor_extra_days
            + self.helper_imbalance * w.helper_imbalance
            + self.module_switches * w.module_switches
    }

    /// Each category multiplied by its weight.
    pub fn weighted(&self, w: &PenaltyWeights) -> Self {
        Self {
            student_overlap: self.student_overlap * w.student_overlap,
            student_shortly_followed: self.student_shortly_followed * w.student_shortly_followed,
            student_same_day: self.student_same_day * w.student_same_day,
            student_consecutive_days: self.student_consecutive_days * w.student_consecutive_days,
            assessor_back_to_back: self.assessor_back_to_back * w.assessor_back_to_back,
            assessor_extra_days: self.assessor_extra_days * w.assessor_extra_days,
            helper_imbalance: self.helper_imbalance * w.helper_imbalance,
            module_switches: self.module_switches * w.module_switches,
        }
    }
}

/// Minutes since 0001-01-01.
fn stamp(date: NaiveDate, time: NaiveTime) -> i64 {
    i64::from(date.num_days_from_ce()) * 24 * 60 + i64::from(time.num_seconds_from_midnight() / 60)
}

/// Counts every penalty category for `plan`.
pub fn score(instance: &Instance, plan: &Plan) -> PenaltyBreakdown {
    let cfg = &instance.penalty;
    let index = &instance.index;
    let staff_count = index.staff().len();
    let mut out = PenaltyBreakdown::default();

    // (start, end, day) per student and per assessor
    let mut by_student: Vec<Vec<(i64, i64, i32)>> = vec![Vec::new(); instance.students.len()];
    let mut by_assessor: Vec<Vec<(i64, i64, i32)>> = vec![Vec::new(); staff_count];

    for s in &plan.sittings {
        let block = index.block(s.block);
        let base = stamp(block.date, block.start_time);
        let day = block.date.num_days_from_ce();
        by_assessor[s.assessor.index()].push((base, base + i64::from(block.length), day));

        for (pos, &e) in s.exams.iter().enumerate() {
            let start = base + i64::from(instance.offset_of(s.exam_length, pos));
            let end = start + i64::from(s.exam_length);
            by_student[instance.exams[e].student as usize].push((start, end, day));
        }

        out.module_switches += s
            .exams
            .windows(2)
            .filter(|w| instance.exams[w[0]].module != instance.exams[w[1]].module)
            .count() as u64;
    }

    for exams in &mut by_student {
        exams.sort_unstable();
        for i in 0..exams.len() {
            let (_, end_i, day_i) = exams[i];
            for &(start_j, _, day_j) in &exams[i + 1..] {
                if start_j < end_i {
                    out.student_overlap += 1;
                } else if day_i == day_j {
                    if start_j - end_i < cfg.shortly_followed_minutes {
                        out.student_shortly_followed += 1;
                    } else {
                        out.student_same_day += 1;
                    }
                } else if day_j == day_i + 1 {
                    out.student_consecutive_days += 1;
                }
            }
        }
    }

    for (a, blocks) in by_assessor.iter_mut().enumerate() {
        if blocks.is_empty() {
            continue;
        }
        blocks.sort_unstable();
        for pair in blocks.windows(2) {
            let gap = pair[1].0 - pair[0].1;
            if pair[0].2 == pair[1].2 && (0..=cfg.back_to_back_gap_minutes).contains(&gap) {
                out.assessor_back_to_back += 1;
            }
        }

        let mut days: Vec<i32> = blocks.iter().map(|b| b.2).collect();
        days.dedup();
        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for &b in index.blocks_of(StaffId(a as u32), StaffRole::Assessor) {
            *per_day.entry(index.block(b).date).or_default() += 1;
        }
        let max_per_day = per_day.values().copied().max().unwrap_or(1).max(1);
        let min_days = blocks.len().div_ceil(max_per_day);
        out.assessor_extra_days += days.len().saturating_sub(min_days) as u64;
    }

    let helpers = index.helpers();
    let loads = plan.helper_loads(staff_count);
    if !helpers.is_empty() && helpers.iter().any(|h| loads[h.index()] > 0) {
        let max = helpers.iter().map(|h| loads[h.index()]).max().unwrap_or(0);
        let min = helpers.iter().map(|h| loads[h.index()]).min().unwrap_or(0);
        out.helper_imbalance = u64::from(max - min);
    }

    out
}

/// Weighted penalty of `plan`.
pub fn penalty(instance: &Instance, plan: &Plan) -> u64 {
    score(instance, plan).total(&instance.penalty.weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{AvailableBlock, Exam, Module, Semester, Window, WindowId, WindowInput};
    use crate::plan::PlannedSitting;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// 60-minute blocks at 09:00, 10:00, 13:00 on day 3 and 09:00 on days 4 and 6.
    fn instance(exams: &[(&str, &str, &str, &str)]) -> Instance {
        let window = Window::new(WindowId(1), Semester::Spring, 2024, d(3), d(7), 60)
            .with_slots(d(3), [t(9, 0), t(10, 0), t(13, 0)])
            .with_slot(d(4), t(9, 0))
            .with_slot(d(6), t(9, 0));
        let mut input = WindowInput::new(window)
            .with_module(Module::new("M1", "One"))
            .with_module(Module::new("M2", "Two"));
        for &(code, module, student, assessor) in exams {
            input = input.with_exam(Exam::new(code, module, student, assessor));
        }
        for (day, h) in [(3, 9), (3, 10), (3, 13), (4, 9), (6, 9)] {
            for a in ["a@code.berlin", "b@code.berlin"] {
                input = input.with_availability(AvailableBlock::new(
                    WindowId(1),
                    StaffRole::Assessor,
                    a,
                    d(day),
                    t(h, 0),
                ));
            }
        }
        Instance::compile(&input, &EngineConfig::default()).unwrap()
    }

    fn sitting(inst: &Instance, exams: &[usize], day: u32, hour: u32) -> PlannedSitting {
        PlannedSitting {
            assessor: inst.exams[exams[0]].assessor,
            exam_length: 20,
            exams: exams.to_vec(),
            block: inst.index.block_at(d(day), t(hour, 0)).unwrap(),
            room: None,
            helpers: Vec::new(),
        }
    }

    #[test]
    fn test_single_exam_is_clean() {
        let inst = instance(&[("E1", "M1", "s@code.berlin", "a@code.berlin")]);
        let plan = Plan {
            sittings: vec![sitting(&inst, &[0], 3, 9)],
        };
        assert_eq!(score(&inst, &plan), PenaltyBreakdown::default());
        assert_eq!(penalty(&inst, &plan), 0);
    }

    #[test]
    fn test_student_categories() {
        let inst = instance(&[
            ("E1", "M1", "s@code.berlin", "a@code.berlin"),
            ("E2", "M1", "s@code.berlin", "b@code.berlin"),
            ("E3", "M2", "s@code.berlin", "b@code.berlin"),
            ("E4", "M2", "s@code.berlin", "a@code.berlin"),
        ]);
        // E1 09:00-09:20 day 3, E2 09:00-09:20 day 3 (overlap),
        // E3 13:00 day 3, E4 09:00 day 4
        let plan = Plan {
            sittings: vec![
                sitting(&inst, &[0], 3, 9),
                sitting(&inst, &[1], 3, 9),
                sitting(&inst, &[2], 3, 13),
                sitting(&inst, &[3], 4, 9),
            ],
        };
        let b = score(&inst, &plan);
        assert_eq!(b.student_overlap, 1);
        // 09:20 -> 13:00 is 220 minutes
        assert_eq!(b.student_same_day, 2);
        assert_eq!(b.student_shortly_followed, 0);
        assert_eq!(b.student_consecutive_days, 3);
    }

    #[test]
    fn test_back_to_back_counts_as_shortly_followed() {
        let inst = instance(&[
            ("E1", "M1", "s@code.berlin", "a@code.berlin"),
            ("E2", "M2", "s@code.berlin", "a@code.berlin"),
        ]);
        let plan = Plan {
            sittings: vec![sitting(&inst, &[0, 1], 3, 9)],
        };
        let b = score(&inst, &plan);
        assert_eq!(b.student_shortly_followed, 1);
        assert_eq!(b.module_switches, 1);
        let w = PenaltyWeights::default();
        assert_eq!(b.total(&w), w.student_shortly_followed + w.module_switches);
        let weighted = b.weighted(&w);
        assert_eq!(weighted.student_shortly_followed, w.student_shortly_followed);
        assert_eq!(weighted.student_overlap, 0);
    }

    #[test]
    fn test_assessor_back_to_back_and_extra_days() {
        let exams: Vec<(String, String)> = (0..4)
            .map(|i| (format!("E{i}"), format!("s{i}@code.berlin")))
            .collect();
        let refs: Vec<(&str, &str, &str, &str)> = exams
            .iter()
            .map(|(c, s)| (c.as_str(), "M1", s.as_str(), "a@code.berlin"))
            .collect();
        let inst = instance(&refs);

        // 09:00 and 10:00 on day 3 touch; day 6 adds a third day
        let plan = Plan {
            sittings: vec![
                sitting(&inst, &[0], 3, 9),
                sitting(&inst, &[1], 3, 10),
                sitting(&inst, &[2], 4, 9),
                sitting(&inst, &[3], 6, 9),
            ],
        };
        let b = score(&inst, &plan);
        assert_eq!(b.assessor_back_to_back, 1);
        // 4 sittings, at most 3 blocks a day -> 2 days needed, 3 used
        assert_eq!(b.assessor_extra_days, 1);
    }
}
