//! Index-based schedule representation.
//!
//! A [`Plan`] is the solver's working form of a [`Schedule`]: sittings
//! with block, room, helper and exam indices. It converts both ways, and
//! carries the hard-constraint check used by the solver's tests and the
//! evaluator.

use chrono::{Duration, NaiveDateTime};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::availability::StaffId;
use crate::instance::Instance;
use crate::models::{
    BlockId, ExamPlacement, Schedule, Sitting, StaffRole, Violation, ViolationType, WindowId,
};

/// A placed sitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSitting {
    pub assessor: StaffId,
    pub exam_length: u32,
    /// Exam indices in template order.
    pub exams: Vec<usize>,
    pub block: BlockId,
    /// Index into `Instance::rooms`.
    pub room: Option<usize>,
    pub helpers: Vec<StaffId>,
}

/// A set of placed sittings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub sittings: Vec<PlannedSitting>,
}

/// Errors raised when a schedule names entities the instance lacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("schedule belongs to window {found}, expected {expected}")]
    WindowMismatch { expected: WindowId, found: WindowId },
    #[error("unknown exam '{0}'")]
    UnknownExam(String),
    #[error("unknown staff member '{0}'")]
    UnknownStaff(String),
    #[error("no block starts at {0}")]
    UnknownBlock(NaiveDateTime),
    #[error("unknown room '{0}'")]
    UnknownRoom(String),
}

impl Plan {
    /// Gives each block's sittings distinct rooms in sitting order.
    ///
    /// Without rooms every sitting gets `None`.
    pub fn assign_rooms(&mut self, instance: &Instance) {
        let mut next: FxHashMap<BlockId, usize> = FxHashMap::default();
        for sitting in &mut self.sittings {
            if instance.rooms.is_empty() {
                sitting.room = None;
                continue;
            }
            let slot = next.entry(sitting.block).or_insert(0);
            sitting.room = Some(*slot);
            *slot += 1;
        }
    }

    /// Helper seats held per staff id.
    pub fn helper_loads(&self, staff_count: usize) -> Vec<u32> {
        let mut loads = vec![0; staff_count];
        for s in &self.sittings {
            for h in &s.helpers {
                loads[h.index()] += 1;
            }
        }
        loads
    }

    /// Lists every hard-constraint violation.
    pub fn violations(&self, instance: &Instance) -> Vec<Violation> {
        let index = &instance.index;
        let mut violations = Vec::new();
        let mut per_block: FxHashMap<BlockId, Vec<usize>> = FxHashMap::default();
        let mut seen = vec![0usize; instance.exams.len()];

        for (i, s) in self.sittings.iter().enumerate() {
            per_block.entry(s.block).or_default().push(i);
            let assessor = instance.email(s.assessor);

            if !index.is_available(s.assessor, s.block, StaffRole::Assessor) {
                violations.push(Violation::new(
                    ViolationType::StaffUnavailable,
                    assessor,
                    format!("assessor not available in block {}", s.block.0),
                ));
            }
            for &h in &s.helpers {
                if !index.is_available(h, s.block, StaffRole::Helper) {
                    violations.push(Violation::new(
                        ViolationType::StaffUnavailable,
                        instance.email(h),
                        format!("helper not available in block {}", s.block.0),
                    ));
                }
            }
            let need = instance.helpers_needed(&s.exams) as usize;
            if s.helpers.len() < need {
                violations.push(Violation::new(
                    ViolationType::HelpersMissing,
                    assessor,
                    format!("sitting has {} of {} helpers", s.helpers.len(), need),
                ));
            }
            if s.exams.len() > instance.capacity_for(s.exam_length) {
                violations.push(Violation::new(
                    ViolationType::TemplateOverflow,
                    assessor,
                    format!("{} exams exceed the template", s.exams.len()),
                ));
            }
            for &e in &s.exams {
                let exam = &instance.exams[e];
                seen[e] += 1;
                if exam.length != s.exam_length {
                    violations.push(Violation::new(
                        ViolationType::TemplateOverflow,
                        &exam.code,
                        format!(
                            "{}-minute exam in a {}-minute sitting",
                            exam.length, s.exam_length
                        ),
                    ));
                }
                if exam.assessor != s.assessor {
                    violations.push(Violation::new(
                        ViolationType::WrongAssessor,
                        &exam.code,
                        format!("exam assessed by {}", assessor),
                    ));
                }
            }
        }

        let mut blocks: Vec<_> = per_block.into_iter().collect();
        blocks.sort_by_key(|(b, _)| *b);
        for (block, members) in blocks {
            if members.len() > instance.block_capacity {
                violations.push(Violation::new(
                    ViolationType::CapacityExceeded,
                    format!("block {}", block.0),
                    format!(
                        "{} sittings exceed capacity {}",
                        members.len(),
                        instance.block_capacity
                    ),
                ));
            }
            let mut people = FxHashSet::default();
            let mut students = FxHashSet::default();
            let mut rooms = FxHashSet::default();
            for &i in &members {
                let s = &self.sittings[i];
                for student in instance.students_of(&s.exams) {
                    if !students.insert(student) {
                        violations.push(Violation::new(
                            ViolationType::StudentClash,
                            &instance.students[student as usize],
                            format!("has exams in two sittings of block {}", block.0),
                        ));
                    }
                }
                for &p in std::iter::once(&s.assessor).chain(&s.helpers) {
                    if !people.insert(p) {
                        violations.push(Violation::new(
                            ViolationType::DoubleBooked,
                            instance.email(p),
                            format!("holds two seats in block {}", block.0),
                        ));
                    }
                }
                match s.room {
                    Some(r) if r >= instance.rooms.len() => violations.push(Violation::new(
                        ViolationType::CapacityExceeded,
                        instance.email(s.assessor),
                        format!("room {} does not exist", r),
                    )),
                    Some(r) if !rooms.insert(r) => violations.push(Violation::new(
                        ViolationType::RoomDoubleBooked,
                        &instance.rooms[r].id,
                        format!("hosts two sittings in block {}", block.0),
                    )),
                    None if !instance.rooms.is_empty() => violations.push(Violation::new(
                        ViolationType::CapacityExceeded,
                        instance.email(s.assessor),
                        format!("sitting without a room in block {}", block.0),
                    )),
                    _ => {}
                }
            }
        }

        for (e, &count) in seen.iter().enumerate() {
            if count != 1 {
                violations.push(Violation::new(
                    ViolationType::ExamUnscheduled,
                    &instance.exams[e].code,
                    format!("exam placed {count} times"),
                ));
            }
        }

        violations
    }

    /// Renders the plan as a [`Schedule`] with template exam times.
    pub fn to_schedule(&self, instance: &Instance) -> Schedule {
        let mut schedule = Schedule::new(instance.window.id);
        for s in &self.sittings {
            let block = instance.index.block(s.block);
            let exams = s
                .exams
                .iter()
                .enumerate()
                .map(|(pos, &e)| {
                    let offset = instance.offset_of(s.exam_length, pos);
                    let start = block.start() + Duration::minutes(i64::from(offset));
                    ExamPlacement {
                        exam: instance.exams[e].code.clone(),
                        start,
                        end: start + Duration::minutes(i64::from(s.exam_length)),
                    }
                })
                .collect();
            schedule.sittings.push(Sitting {
                block: s.block,
                block_start: block.start(),
                room: s
                    .room
                    .and_then(|r| instance.rooms.get(r))
                    .map(|r| r.id.clone()),
                assessor: instance.email(s.assessor).to_string(),
                helpers: s
                    .helpers
                    .iter()
                    .map(|&h| instance.email(h).to_string())
                    .collect(),
                exam_length: s.exam_length,
                exams,
            });
        }
        schedule.violations = self.violations(instance);
        schedule
    }

    /// Reads a schedule back into index form.
    ///
    /// Blocks are matched by start time; exam order inside a sitting is
    /// kept.
    pub fn from_schedule(instance: &Instance, schedule: &Schedule) -> Result<Self, PlanError> {
        if schedule.window != instance.window.id {
            return Err(PlanError::WindowMismatch {
                expected: instance.window.id,
                found: schedule.window,
            });
        }
        let staff = |email: &str| {
            instance
                .index
                .staff()
                .get(email)
                .ok_or_else(|| PlanError::UnknownStaff(email.to_string()))
        };

        let mut sittings = Vec::with_capacity(schedule.sittings.len());
        for s in &schedule.sittings {
            let block = instance
                .index
                .block_at(s.block_start.date(), s.block_start.time())
                .ok_or(PlanError::UnknownBlock(s.block_start))?;
            let room = match &s.room {
                None => None,
                Some(id) => Some(
                    instance
                        .rooms
                        .iter()
                        .position(|r| &r.id == id)
                        .ok_or_else(|| PlanError::UnknownRoom(id.clone()))?,
                ),
            };
            let exams = s
                .exams
                .iter()
                .map(|p| {
                    instance
                        .exam_index(&p.exam)
                        .ok_or_else(|| PlanError::UnknownExam(p.exam.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let helpers = s
                .helpers
                .iter()
                .map(|h| staff(h.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            sittings.push(PlannedSitting {
                assessor: staff(s.assessor.as_str())?,
                exam_length: s.exam_length,
                exams,
                block,
                room,
                helpers,
            });
        }
        Ok(Self { sittings })
    }
}
