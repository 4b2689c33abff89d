//! Assessment windows and their blocks.
//!
//! A window is a bounded date range. Administrators pick start times per
//! day; each start time opens one block of `block_length` minutes.
//! Blocks are numbered densely in chronological order.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::BlockTemplate;

/// Window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semester of the assessment phase a window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Semester {
    Spring,
    Fall,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::Spring => "spring",
            Semester::Fall => "fall",
        }
    }
}

/// Dense block index within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub usize);

/// A fixed-length slot inside a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    /// Length in minutes.
    pub length: u32,
}

impl Block {
    #[inline]
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    #[inline]
    pub fn end(&self) -> NaiveDateTime {
        self.start() + Duration::minutes(i64::from(self.length))
    }

    /// Whether two blocks share any instant. Back-to-back blocks do not.
    pub fn overlaps(&self, other: &Block) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

/// An assessment window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    pub semester: Semester,
    pub year: i32,
    /// 1-based position of the window inside its assessment phase.
    pub position: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Block length in minutes.
    pub block_length: u32,
    /// Selected block start times per day.
    pub start_times: BTreeMap<NaiveDate, Vec<NaiveTime>>,
    /// Exam layouts per exam length; lengths without one use back-to-back packing.
    pub templates: Vec<BlockTemplate>,
}

impl Window {
    /// Creates a window without any start times.
    pub fn new(
        id: WindowId,
        semester: Semester,
        year: i32,
        start_date: NaiveDate,
        end_date: NaiveDate,
        block_length: u32,
    ) -> Self {
        Self {
            id,
            semester,
            year,
            position: 1,
            start_date,
            end_date,
            block_length,
            start_times: BTreeMap::new(),
            templates: Vec::new(),
        }
    }

    /// Sets the position inside the assessment phase.
    pub fn with_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    /// Adds one start time on `date`.
    pub fn with_slot(mut self, date: NaiveDate, time: NaiveTime) -> Self {
        self.start_times.entry(date).or_default().push(time);
        self
    }

    /// Adds several start times on `date`.
    pub fn with_slots(
        mut self,
        date: NaiveDate,
        times: impl IntoIterator<Item = NaiveTime>,
    ) -> Self {
        self.start_times.entry(date).or_default().extend(times);
        self
    }

    /// Adds an exam layout.
    pub fn with_template(mut self, template: BlockTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Validates the window and returns it unchanged if it is well formed.
    ///
    /// Overlapping or duplicate start times on one day are rejected with
    /// `overlapping_slots`.
    pub fn validated(
        self,
        config: &crate::config::ValidationConfig,
    ) -> Result<Self, Vec<crate::validation::ValidationError>> {
        crate::validation::validate_window(&self, config)?;
        Ok(self)
    }

    /// All blocks in chronological order with dense ids.
    ///
    /// Duplicate start times collapse into one block.
    pub fn blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        for (date, times) in &self.start_times {
            let mut times = times.clone();
            times.sort();
            times.dedup();
            for time in times {
                blocks.push(Block {
                    id: BlockId(blocks.len()),
                    date: *date,
                    start_time: time,
                    length: self.block_length,
                });
            }
        }
        blocks
    }

    /// Exam layout for `exam_length`: the configured template, or
    /// back-to-back packing from the block start.
    pub fn template_for(&self, exam_length: u32) -> BlockTemplate {
        self.templates
            .iter()
            .find(|t| t.exam_length == exam_length)
            .cloned()
            .unwrap_or_else(|| BlockTemplate::back_to_back(exam_length, self.block_length))
    }

    /// Whether `date` lies inside the window.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
