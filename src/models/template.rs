//! Block templates: where exams of one length start inside a block.

use serde::{Deserialize, Serialize};

/// Exam start offsets (minutes from block start) for one exam length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTemplate {
    /// Exam length in minutes.
    pub exam_length: u32,
    /// Sorted start offsets.
    pub offsets: Vec<u32>,
}

impl BlockTemplate {
    /// Creates a template; offsets are sorted.
    pub fn new(exam_length: u32, mut offsets: Vec<u32>) -> Self {
        offsets.sort_unstable();
        Self {
            exam_length,
            offsets,
        }
    }

    /// Packs exams back to back from offset 0.
    pub fn back_to_back(exam_length: u32, block_length: u32) -> Self {
        let count = if exam_length == 0 {
            0
        } else {
            block_length / exam_length
        };
        Self {
            exam_length,
            offsets: (0..count).map(|i| i * exam_length).collect(),
        }
    }

    /// Number of exams one sitting can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the last exam ends inside a block of `block_length` minutes.
    pub fn fits(&self, block_length: u32) -> bool {
        self.offsets
            .last()
            .map_or(true, |&last| last + self.exam_length <= block_length)
    }

    /// Whether two consecutive exams share a minute.
    pub fn has_overlap(&self) -> bool {
        self.offsets
            .windows(2)
            .any(|w| w[1] < w[0] + self.exam_length)
    }
}
