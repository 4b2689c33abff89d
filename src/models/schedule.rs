//! Schedule (solution) model.
//!
//! A schedule is a set of sittings. A sitting is one assessor holding a
//! run of exams of one length in one block and room, with the helpers
//! the exams need. Each exam's time comes from the block template.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{BlockId, WindowId};

/// A complete or partial schedule for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub window: WindowId,
    pub sittings: Vec<Sitting>,
    /// Hard-constraint violations found when the schedule was checked.
    pub violations: Vec<Violation>,
}

/// One assessor's occupation of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sitting {
    pub block: BlockId,
    pub block_start: NaiveDateTime,
    /// Room id, `None` when the window has no rooms.
    pub room: Option<String>,
    pub assessor: String,
    pub helpers: Vec<String>,
    /// Length of every exam in this sitting (minutes).
    pub exam_length: u32,
    pub exams: Vec<ExamPlacement>,
}

/// An exam's position inside a sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPlacement {
    pub exam: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// A hard-constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    /// Related entity (exam code, staff email, room id).
    pub entity_id: String,
    pub message: String,
}

/// Classification of hard-constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Staff member placed in a block they did not declare.
    StaffUnavailable,
    /// Person holds two seats in one block.
    DoubleBooked,
    /// Room hosts two sittings in one block.
    RoomDoubleBooked,
    /// More sittings in a block than rooms or the concurrency cap allow.
    CapacityExceeded,
    /// Sitting has fewer helpers than its exams require.
    HelpersMissing,
    /// Sitting holds more exams than the template, or mixed lengths.
    TemplateOverflow,
    /// Exam appears nowhere, or more than once.
    ExamUnscheduled,
    /// Exam placed in a sitting of an assessor other than its own.
    WrongAssessor,
    /// Student sits exams in two sittings of one block.
    StudentClash,
}

impl Violation {
    pub fn new(
        violation_type: ViolationType,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            sittings: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Whether no violations were recorded.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of placed exams.
    pub fn exam_count(&self) -> usize {
        self.sittings.iter().map(|s| s.exams.len()).sum()
    }

    /// Finds the sitting and placement of an exam.
    pub fn placement_for(&self, exam_code: &str) -> Option<(&Sitting, &ExamPlacement)> {
        self.sittings.iter().find_map(|s| {
            s.exams
                .iter()
                .find(|p| p.exam == exam_code)
                .map(|p| (s, p))
        })
    }

    /// Sittings in which `email` is the assessor or a helper.
    pub fn sittings_for_staff(&self, email: &str) -> Vec<&Sitting> {
        self.sittings
            .iter()
            .filter(|s| s.assessor == email || s.helpers.iter().any(|h| h == email))
            .collect()
    }
}
