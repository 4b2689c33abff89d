//! Assessor workload: how many sittings each assessor must hold.
//!
//! An assessor's exams are grouped by exam length. Each group needs
//! `ceil(exams / capacity)` sittings, where capacity is the number of
//! exams the block template for that length holds.
//!
//! Within a group, exams are packed so that helper-requiring exams share
//! sittings (the helper demand of a sitting is its largest per-exam
//! requirement) and exams of one module stay together.

use std::collections::BTreeMap;

use crate::availability::StaffId;
use crate::instance::ExamSpec;

/// A sitting to place: one assessor, one exam length, a run of exams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SittingSpec {
    pub assessor: StaffId,
    pub exam_length: u32,
    /// Exam indices in sitting order.
    pub exams: Vec<usize>,
}

/// Packs exams into sittings.
///
/// `capacity(len)` is the template capacity for exam length `len`.
/// Exams whose length has zero capacity are returned in `Err`.
pub fn plan_sittings(
    exams: &[ExamSpec],
    capacity: impl Fn(u32) -> usize,
) -> Result<Vec<SittingSpec>, Vec<usize>> {
    let mut groups: BTreeMap<(StaffId, u32), Vec<usize>> = BTreeMap::new();
    for (i, exam) in exams.iter().enumerate() {
        groups.entry((exam.assessor, exam.length)).or_default().push(i);
    }

    let mut sittings = Vec::new();
    let mut oversized = Vec::new();
    for ((assessor, exam_length), mut members) in groups {
        let cap = capacity(exam_length);
        if cap == 0 {
            oversized.extend(members);
            continue;
        }

        let mut module_sizes: BTreeMap<usize, usize> = BTreeMap::new();
        for &e in &members {
            *module_sizes.entry(exams[e].module).or_default() += 1;
        }
        members.sort_by(|&a, &b| {
            let (ea, eb) = (&exams[a], &exams[b]);
            eb.helpers
                .cmp(&ea.helpers)
                .then(module_sizes[&eb.module].cmp(&module_sizes[&ea.module]))
                .then(ea.module.cmp(&eb.module))
                .then(a.cmp(&b))
        });

        for chunk in members.chunks(cap) {
            sittings.push(SittingSpec {
                assessor,
                exam_length,
                exams: chunk.to_vec(),
            });
        }
    }

    if oversized.is_empty() {
        Ok(sittings)
    } else {
        oversized.sort_unstable();
        Err(oversized)
    }
}

/// Sittings per assessor, indexed by `StaffId`.
pub fn sittings_per_assessor(sittings: &[SittingSpec], staff_count: usize) -> Vec<usize> {
    let mut counts = vec![0; staff_count];
    for s in sittings {
        counts[s.assessor.index()] += 1;
    }
    counts
}
