//! Exam scheduling domain models.
//!
//! Plain data with builder-style constructors. Construction never fails;
//! invariants are checked by [`crate::validation`].
//!
//! # Entities
//!
//! | Type | Meaning |
//! |------|---------|
//! | `Window` | Date range split into `Block`s at chosen start times |
//! | `BlockTemplate` | Exam start offsets inside a block for one exam length |
//! | `Module` | Academic unit with standard and alternative exam lengths |
//! | `Exam` | One student's assessment with a fixed assessor |
//! | `Staff` / `AvailableBlock` | Assessors and helpers with per-window availability |
//! | `Room` | Hosts one sitting per block |
//! | `Schedule` | Solver output: sittings with placed exams |

mod exam;
mod input;
mod module;
mod room;
mod schedule;
mod staff;
mod template;
mod window;

pub use exam::Exam;
pub use input::WindowInput;
pub use module::{ExamStyle, Module};
pub use room::Room;
pub use schedule::{ExamPlacement, Schedule, Sitting, Violation, ViolationType};
pub use staff::{AvailableBlock, Staff, StaffRole};
pub use template::BlockTemplate;
pub use window::{Block, BlockId, Semester, Window, WindowId};
