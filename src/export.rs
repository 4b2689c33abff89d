//! Schedule CSV export.
//!
//! One row per exam, sorted by date, start time, room and exam code.
//! Fields containing a comma, quote or line break are quoted with inner
//! quotes doubled.

use serde::{Deserialize, Serialize};

use crate::models::{Schedule, Window, WindowInput};

/// Export columns, in order.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "exam_code",
    "module_code",
    "student_email",
    "date",
    "start_time",
    "end_time",
    "block_start",
    "room",
    "assessor_email",
    "helper_emails",
];

/// A rendered CSV document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

/// Exam details the schedule itself does not carry.
pub trait ExamLookup {
    /// `(module_code, student_email)` for an exam code.
    fn exam_details(&self, exam_code: &str) -> Option<(&str, &str)>;
}

impl ExamLookup for WindowInput {
    fn exam_details(&self, exam_code: &str) -> Option<(&str, &str)> {
        self.exams
            .iter()
            .find(|e| e.code == exam_code)
            .map(|e| (e.module.as_str(), e.student.as_str()))
    }
}

/// `schedule_<semester>_<year>_window_<position>.csv`
pub fn export_filename(window: &Window) -> String {
    format!(
        "schedule_{}_{}_window_{}.csv",
        window.semester.as_str(),
        window.year,
        window.position
    )
}

fn escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders `schedule` as CSV.
pub fn export_csv(window: &Window, schedule: &Schedule, exams: &impl ExamLookup) -> CsvExport {
    let mut rows: Vec<(_, String, String, Vec<String>)> = Vec::new();
    for sitting in &schedule.sittings {
        let room = sitting.room.clone().unwrap_or_default();
        let helpers = sitting.helpers.join(";");
        for placement in &sitting.exams {
            let (module, student) = exams.exam_details(&placement.exam).unwrap_or(("", ""));
            let fields = vec![
                placement.exam.clone(),
                module.to_string(),
                student.to_string(),
                placement.start.date().format("%Y-%m-%d").to_string(),
                placement.start.time().format("%H:%M").to_string(),
                placement.end.time().format("%H:%M").to_string(),
                sitting.block_start.format("%Y-%m-%d %H:%M").to_string(),
                room.clone(),
                sitting.assessor.clone(),
                helpers.clone(),
            ];
            rows.push((placement.start, room.clone(), placement.exam.clone(), fields));
        }
    }
    rows.sort();

    let mut content = EXPORT_COLUMNS.join(",");
    content.push('\n');
    for (_, _, _, fields) in rows {
        let line: Vec<String> = fields.iter().map(|f| escape(f)).collect();
        content.push_str(&line.join(","));
        content.push('\n');
    }

    CsvExport {
        filename: export_filename(window),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockId, Exam, ExamPlacement, Module, Semester, Sitting, WindowId};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn window() -> Window {
        Window::new(
            WindowId(4),
            Semester::Fall,
            2024,
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            60,
        )
        .with_position(2)
    }

    #[test]
    fn test_filename() {
        assert_eq!(export_filename(&window()), "schedule_fall_2024_window_2.csv");
    }

    #[test]
    fn test_rows_sorted_and_escaped() {
        let input = WindowInput::new(window())
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s2@code.berlin", "a@code.berlin"));
        let mut schedule = Schedule::new(WindowId(4));
        schedule.sittings.push(Sitting {
            block: BlockId(0),
            block_start: at(9, 0),
            room: Some("Hall, east".into()),
            assessor: "a@code.berlin".into(),
            helpers: vec!["h1@code.berlin".into(), "h2@code.berlin".into()],
            exam_length: 20,
            exams: vec![
                ExamPlacement {
                    exam: "E2".into(),
                    start: at(9, 20),
                    end: at(9, 40),
                },
                ExamPlacement {
                    exam: "E1".into(),
                    start: at(9, 0),
                    end: at(9, 20),
                },
            ],
        });

        let export = export_csv(&window(), &schedule, &input);
        let lines: Vec<&str> = export.content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], EXPORT_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            concat!(
                "E1,M,s1@code.berlin,2024-06-03,09:00,09:20,2024-06-03 09:00,",
                "\"Hall, east\",a@code.berlin,h1@code.berlin;h2@code.berlin"
            )
        );
        assert!(lines[2].starts_with("E2,M,s2@code.berlin,2024-06-03,09:20,09:40"));
    }
}
