//! Exam model.

use serde::{Deserialize, Serialize};

use super::ExamStyle;

/// One assessment of one student, derived from the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    /// Unique exam code within the window.
    pub code: String,
    /// Module code.
    pub module: String,
    pub style: ExamStyle,
    /// Student email.
    pub student: String,
    /// Email of the assessor fixed by the roster.
    pub assessor: String,
}

impl Exam {
    /// Creates a standard-style exam.
    pub fn new(
        code: impl Into<String>,
        module: impl Into<String>,
        student: impl Into<String>,
        assessor: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            module: module.into(),
            style: ExamStyle::Standard,
            student: student.into(),
            assessor: assessor.into(),
        }
    }

    /// Sets the exam style.
    pub fn with_style(mut self, style: ExamStyle) -> Self {
        self.style = style;
        self
    }
}
