//! Academic modules and exam styles.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::DEFAULT_EXAM_LENGTH;

/// Which of a module's two exam lengths applies to an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStyle {
    Standard,
    Alternative,
}

impl FromStr for ExamStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ExamStyle::Standard),
            "alternative" => Ok(ExamStyle::Alternative),
            other => Err(format!("unknown exam style '{other}'")),
        }
    }
}

/// An academic module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique module code.
    pub code: String,
    pub name: String,
    /// Standard exam length (minutes).
    pub standard_length: u32,
    /// Alternative exam length (minutes).
    pub alternative_length: u32,
    /// Helpers each exam of this module needs.
    pub helpers_required: u32,
}

impl Module {
    /// Creates a module with default exam lengths and no helper requirement.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            standard_length: DEFAULT_EXAM_LENGTH,
            alternative_length: DEFAULT_EXAM_LENGTH,
            helpers_required: 0,
        }
    }

    /// Sets both exam lengths.
    pub fn with_lengths(mut self, standard: u32, alternative: u32) -> Self {
        self.standard_length = standard;
        self.alternative_length = alternative;
        self
    }

    /// Sets the per-exam helper requirement.
    pub fn with_helpers(mut self, helpers: u32) -> Self {
        self.helpers_required = helpers;
        self
    }

    /// Exam length for `style`.
    #[inline]
    pub fn length_for(&self, style: ExamStyle) -> u32 {
        match style {
            ExamStyle::Standard => self.standard_length,
            ExamStyle::Alternative => self.alternative_length,
        }
    }
}
