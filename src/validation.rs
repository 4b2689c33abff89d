//! Input validation for exam scheduling.
//!
//! Checks structural integrity of a window and its roster before any
//! scheduling work. Detects:
//! - Overlapping or duplicate block start times on one day
//! - Start times outside the window, or blocks running past midnight
//! - Exam and block lengths outside the configured bounds
//! - Malformed block templates
//! - Duplicate codes and dangling module references
//! - Non-institutional email addresses
//!
//! Every check runs; all findings are returned together.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::ValidationConfig;
use crate::models::{Window, WindowInput};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Machine-readable reason code.
    #[serde(rename = "code")]
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Offending entities (columns, emails, slots, codes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offending: Vec<String>,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Roster lacks required columns.
    MissingCols,
    /// Email not in the institutional domain.
    WrongEmailFormat,
    /// Two start times on one day overlap or repeat.
    OverlappingSlots,
    /// Module exam length outside the allowed bounds.
    DurationOutOfRange,
    /// Window block length outside the allowed bounds.
    BlockLengthOutOfRange,
    /// Window ends before it starts.
    InvalidDateRange,
    /// Start time or availability record not inside the window's blocks.
    SlotOutsideWindow,
    /// Block template exceeds the block or overlaps itself.
    InvalidTemplate,
    /// Two entities share the same code.
    DuplicateId,
    /// Exam references a module that does not exist.
    UnknownReference,
    /// Roster row cannot be read.
    MalformedRow,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCols => "missing_cols",
            Self::WrongEmailFormat => "wrong_email_format",
            Self::OverlappingSlots => "overlapping_slots",
            Self::DurationOutOfRange => "duration_out_of_range",
            Self::BlockLengthOutOfRange => "block_length_out_of_range",
            Self::InvalidDateRange => "invalid_date_range",
            Self::SlotOutsideWindow => "slot_outside_window",
            Self::InvalidTemplate => "invalid_template",
            Self::DuplicateId => "duplicate_id",
            Self::UnknownReference => "unknown_reference",
            Self::MalformedRow => "malformed_row",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl ValidationError {
    pub(crate) fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offending: Vec::new(),
        }
    }

    pub(crate) fn with_offending(mut self, offending: Vec<String>) -> Self {
        self.offending = offending;
        self
    }
}

/// Whether `email` is a well-formed address in `domain`.
pub fn is_institutional_email(email: &str, domain: &str) -> bool {
    let Some((local, host)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !host.contains('@')
        && !email.chars().any(char::is_whitespace)
        && host.eq_ignore_ascii_case(domain)
}

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Validates a window's dates, block length, start times and templates.
pub fn validate_window(window: &Window, config: &ValidationConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if window.start_date > window.end_date {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidDateRange,
            format!(
                "Window {} ends ({}) before it starts ({})",
                window.id, window.end_date, window.start_date
            ),
        ));
    }

    if !config.block_length.contains(window.block_length) {
        errors.push(ValidationError::new(
            ValidationErrorKind::BlockLengthOutOfRange,
            format!(
                "Block length {} is outside {}..={}",
                window.block_length, config.block_length.min, config.block_length.max
            ),
        ));
    }

    for (date, times) in &window.start_times {
        let mut sorted = times.clone();
        sorted.sort();

        let outside: Vec<String> = sorted
            .iter()
            .filter(|time| {
                let start = time.num_seconds_from_midnight() / 60;
                !window.contains_date(*date) || start + window.block_length > MINUTES_PER_DAY
            })
            .map(|time| format!("{} {}", date, time.format("%H:%M")))
            .collect();
        if !outside.is_empty() {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::SlotOutsideWindow,
                    format!("Start times on {date} fall outside the window"),
                )
                .with_offending(outside),
            );
        }

        let mut overlapping = Vec::new();
        for pair in sorted.windows(2) {
            let prev = pair[0].num_seconds_from_midnight() / 60;
            let next = pair[1].num_seconds_from_midnight() / 60;
            if next < prev + window.block_length {
                overlapping.push(format!(
                    "{} {}/{}",
                    date,
                    pair[0].format("%H:%M"),
                    pair[1].format("%H:%M")
                ));
            }
        }
        if !overlapping.is_empty() {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::OverlappingSlots,
                    format!("Blocks on {date} overlap"),
                )
                .with_offending(overlapping),
            );
        }
    }

    let mut template_lengths = HashSet::new();
    for template in &window.templates {
        if !template_lengths.insert(template.exam_length) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate template for exam length {}", template.exam_length),
            ));
        }
        if template.exam_length == 0
            || template.capacity() == 0
            || !template.fits(window.block_length)
            || template.has_overlap()
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTemplate,
                format!(
                    "Template for {}-minute exams does not fit a {}-minute block",
                    template.exam_length, window.block_length
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates the full input of a scheduling run.
///
/// Checks:
/// 1. The window (see [`validate_window`])
/// 2. No duplicate module, exam or room codes
/// 3. Module lengths within bounds
/// 4. Exams reference existing modules
/// 5. Student, assessor and staff emails are institutional
/// 6. Availability records of this window name an existing block
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(input: &WindowInput, config: &ValidationConfig) -> ValidationResult {
    let mut errors = match validate_window(&input.window, config) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    let mut module_codes = HashSet::new();
    let mut out_of_range = Vec::new();
    for module in &input.modules {
        if !module_codes.insert(module.code.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate module code: {}", module.code),
            ));
        }
        if !config.exam_length.contains(module.standard_length)
            || !config.exam_length.contains(module.alternative_length)
        {
            out_of_range.push(module.code.clone());
        }
    }
    if !out_of_range.is_empty() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::DurationOutOfRange,
                format!(
                    "Exam lengths must be within {}..={} minutes",
                    config.exam_length.min, config.exam_length.max
                ),
            )
            .with_offending(out_of_range),
        );
    }

    let mut exam_codes = HashSet::new();
    let mut bad_emails = Vec::new();
    for exam in &input.exams {
        if !exam_codes.insert(exam.code.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate exam code: {}", exam.code),
            ));
        }
        if !module_codes.contains(exam.module.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!("Exam '{}' references unknown module '{}'", exam.code, exam.module),
            ));
        }
        for email in [&exam.student, &exam.assessor] {
            if !is_institutional_email(email, &config.email_domain) {
                bad_emails.push(email.clone());
            }
        }
    }
    for staff in &input.staff {
        if !is_institutional_email(&staff.email, &config.email_domain) {
            bad_emails.push(staff.email.clone());
        }
    }
    bad_emails.sort();
    bad_emails.dedup();
    if !bad_emails.is_empty() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::WrongEmailFormat,
                format!("Emails must end with @{}", config.email_domain),
            )
            .with_offending(bad_emails),
        );
    }

    let mut room_ids = HashSet::new();
    for room in &input.rooms {
        if !room_ids.insert(room.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate room ID: {}", room.id),
            ));
        }
    }

    let blocks: HashSet<_> = input
        .window
        .blocks()
        .into_iter()
        .map(|b| (b.date, b.start_time))
        .collect();
    let mut stray: Vec<String> = input
        .availability
        .iter()
        .filter(|a| a.window == input.window.id && !blocks.contains(&(a.date, a.time)))
        .map(|a| format!("{} {} {}", a.email, a.date, a.time.format("%H:%M")))
        .collect();
    stray.sort();
    stray.dedup();
    if !stray.is_empty() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::SlotOutsideWindow,
                "Availability names blocks the window does not define",
            )
            .with_offending(stray),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
