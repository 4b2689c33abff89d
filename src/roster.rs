//! Roster upload parsing.
//!
//! A roster is CSV text with a header row. Required columns:
//!
//! | Column | Meaning |
//! |--------|---------|
//! | `exam_code` | Unique exam code |
//! | `module_code` | Module key |
//! | `module_name` | Module display name |
//! | `style` | `standard` or `alternative` |
//! | `student_email` | Institutional student email |
//! | `assessor_email` | Institutional assessor email |
//!
//! `helpers_required` is optional; a module takes the largest value any
//! of its rows states. Column order is free and header names are matched
//! case-insensitively. Fields may be quoted with `"`; a doubled `""`
//! inside quotes is a literal quote.

use crate::config::ValidationConfig;
use crate::models::{Exam, ExamStyle, Module};
use crate::validation::{is_institutional_email, ValidationError, ValidationErrorKind};

/// Columns every roster must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "exam_code",
    "module_code",
    "module_name",
    "style",
    "student_email",
    "assessor_email",
];

const EMAIL_COLUMNS: [&str; 2] = ["student_email", "assessor_email"];
const HELPERS_COLUMN: &str = "helpers_required";

/// Parsed roster contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub exams: Vec<Exam>,
    /// Modules in order of first appearance.
    pub modules: Vec<Module>,
    /// Distinct assessor emails in order of first appearance.
    pub assessors: Vec<String>,
}

/// Parses roster CSV text.
///
/// Missing columns stop parsing with a single `missing_cols` error. Row
/// problems are accumulated: every email column holding a
/// non-institutional value is listed in one `wrong_email_format` error.
pub fn parse_roster(text: &str, config: &ValidationConfig) -> Result<Roster, Vec<ValidationError>> {
    let records = parse_records(text).map_err(|msg| {
        vec![ValidationError::new(ValidationErrorKind::MalformedRow, msg)]
    })?;
    let mut records = records.into_iter();
    let header: Vec<String> = records
        .next()
        .unwrap_or_default()
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !header.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(vec![ValidationError::new(
            ValidationErrorKind::MissingCols,
            format!("Roster is missing columns: {}", missing.join(", ")),
        )
        .with_offending(missing)]);
    }

    let column = |name: &str| header.iter().position(|h| h == name);
    // Required columns are present past this point.
    let idx: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|name| column(name))
        .collect();
    let (exam_col, module_col, name_col, style_col, student_col, assessor_col) =
        (idx[0], idx[1], idx[2], idx[3], idx[4], idx[5]);
    let helpers_col = column(HELPERS_COLUMN);

    let mut roster = Roster::default();
    let mut errors = Vec::new();
    let mut bad_email_cols = Vec::new();

    for (row_no, record) in records.enumerate() {
        // header is line 1
        let line = row_no + 2;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() != header.len() {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::MalformedRow,
                    format!(
                        "Row {line} has {} fields, expected {}",
                        record.len(),
                        header.len()
                    ),
                )
                .with_offending(vec![format!("row {line}")]),
            );
            continue;
        }
        let field = |i: usize| record[i].trim();

        for (col, i) in EMAIL_COLUMNS.iter().zip([student_col, assessor_col]) {
            if !is_institutional_email(field(i), &config.email_domain)
                && !bad_email_cols.contains(&col.to_string())
            {
                bad_email_cols.push(col.to_string());
            }
        }

        let style = match field(style_col).parse::<ExamStyle>() {
            Ok(style) => style,
            Err(msg) => {
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::MalformedRow,
                        format!("Row {line}: {msg}"),
                    )
                    .with_offending(vec![format!("row {line}")]),
                );
                continue;
            }
        };

        let helpers = match helpers_col.map(field).filter(|v| !v.is_empty()) {
            None => 0,
            Some(value) => match value.parse::<u32>() {
                Ok(n) => n,
                Err(_) => {
                    errors.push(
                        ValidationError::new(
                            ValidationErrorKind::MalformedRow,
                            format!("Row {line}: helpers_required '{value}' is not a number"),
                        )
                        .with_offending(vec![format!("row {line}")]),
                    );
                    continue;
                }
            },
        };

        let module_code = field(module_col);
        match roster.modules.iter_mut().find(|m| m.code == module_code) {
            Some(module) => module.helpers_required = module.helpers_required.max(helpers),
            None => roster.modules.push(
                Module::new(module_code, field(name_col))
                    .with_lengths(config.default_exam_length, config.default_exam_length)
                    .with_helpers(helpers),
            ),
        }

        let assessor = field(assessor_col);
        if !roster.assessors.iter().any(|a| a == assessor) {
            roster.assessors.push(assessor.to_string());
        }

        roster.exams.push(
            Exam::new(field(exam_col), module_code, field(student_col), assessor).with_style(style),
        );
    }

    if !bad_email_cols.is_empty() {
        errors.push(
            ValidationError::new(
                ValidationErrorKind::WrongEmailFormat,
                format!("Email columns must hold @{} addresses", config.email_domain),
            )
            .with_offending(bad_email_cols),
        );
    }

    if errors.is_empty() {
        Ok(roster)
    } else {
        Err(errors)
    }
}

/// Splits CSV text into records of unescaped fields.
fn parse_records(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err("Unterminated quoted field".to_string());
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
