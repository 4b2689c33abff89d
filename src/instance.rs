//! Compiled problem instance.
//!
//! Validated input lowered to dense indices: exams, students and staff
//! become integers, blocks come from the availability index, and the
//! workload is packed into sittings. The feasibility checker, the solver
//! and the evaluator all read the same `Instance`.

use rustc_hash::FxHashMap;

use crate::availability::{AvailabilityIndex, StaffId};
use crate::config::{EngineConfig, PenaltyConfig};
use crate::models::{BlockTemplate, Module, Room, Staff, Window, WindowInput};
use crate::validation::{validate_input, ValidationError};
use crate::workload::{plan_sittings, SittingSpec};

/// An exam lowered to indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamSpec {
    pub code: String,
    /// Index into `Instance::modules`.
    pub module: usize,
    /// Index into `Instance::students`.
    pub student: u32,
    pub assessor: StaffId,
    /// Length in minutes.
    pub length: u32,
    /// Helpers this exam needs.
    pub helpers: u32,
}

/// A validated, indexed scheduling problem for one window.
#[derive(Debug, Clone)]
pub struct Instance {
    pub window: Window,
    pub index: AvailabilityIndex,
    pub modules: Vec<Module>,
    pub exams: Vec<ExamSpec>,
    pub students: Vec<String>,
    pub rooms: Vec<Room>,
    /// Workload packed into sittings.
    pub sittings: Vec<SittingSpec>,
    /// Exams longer than any sitting can hold.
    pub oversized: Vec<usize>,
    /// Sittings one block can host.
    pub block_capacity: usize,
    pub csv_uploaded: bool,
    pub penalty: PenaltyConfig,
    templates: FxHashMap<u32, BlockTemplate>,
    exam_by_code: FxHashMap<String, usize>,
}

impl Instance {
    /// Validates `input` and compiles it.
    pub fn compile(
        input: &WindowInput,
        config: &EngineConfig,
    ) -> Result<Self, Vec<ValidationError>> {
        validate_input(input, &config.validation)?;

        let window = input.window.clone();

        // Roster assessors without a staff record still get an id.
        let mut staff = input.staff.clone();
        for exam in &input.exams {
            staff.push(Staff::assessor(exam.assessor.clone()));
        }
        let index = AvailabilityIndex::build(&window, &staff, &input.availability);

        let module_idx: FxHashMap<&str, usize> = input
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.code.as_str(), i))
            .collect();

        let mut student_ids: FxHashMap<&str, u32> = FxHashMap::default();
        let mut students = Vec::new();
        let mut exams = Vec::with_capacity(input.exams.len());
        let mut exam_by_code = FxHashMap::default();
        for exam in &input.exams {
            // validate_input guarantees the module exists
            let Some(&module) = module_idx.get(exam.module.as_str()) else {
                continue;
            };
            let Some(assessor) = index.staff().get(&exam.assessor) else {
                continue;
            };
            let student = *student_ids.entry(exam.student.as_str()).or_insert_with(|| {
                students.push(exam.student.clone());
                (students.len() - 1) as u32
            });
            let spec = &input.modules[module];
            exam_by_code.insert(exam.code.clone(), exams.len());
            exams.push(ExamSpec {
                code: exam.code.clone(),
                module,
                student,
                assessor,
                length: spec.length_for(exam.style),
                helpers: spec.helpers_required,
            });
        }

        let mut templates = FxHashMap::default();
        for exam in &exams {
            templates
                .entry(exam.length)
                .or_insert_with(|| window.template_for(exam.length));
        }

        let (sittings, oversized) = match plan_sittings(&exams, |len| {
            templates.get(&len).map_or(0, BlockTemplate::capacity)
        }) {
            Ok(sittings) => (sittings, Vec::new()),
            Err(oversized) => {
                // Place what fits so diagnostics still see the rest.
                let fitting: Vec<ExamSpec> = exams
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !oversized.contains(i))
                    .map(|(_, e)| e.clone())
                    .collect();
                let remap: Vec<usize> = (0..exams.len())
                    .filter(|i| !oversized.contains(i))
                    .collect();
                let mut sittings = plan_sittings(&fitting, |len| {
                    templates.get(&len).map_or(0, BlockTemplate::capacity)
                })
                .unwrap_or_default();
                for s in &mut sittings {
                    for e in &mut s.exams {
                        *e = remap[*e];
                    }
                }
                (sittings, oversized)
            }
        };

        let room_cap = if input.rooms.is_empty() {
            usize::MAX
        } else {
            input.rooms.len()
        };
        let block_capacity =
            room_cap.min(config.solver.max_concurrent_sittings.unwrap_or(usize::MAX));

        Ok(Self {
            window,
            index,
            modules: input.modules.clone(),
            exams,
            students,
            rooms: input.rooms.clone(),
            sittings,
            oversized,
            block_capacity,
            csv_uploaded: input.csv_uploaded,
            penalty: config.penalty.clone(),
            templates,
            exam_by_code,
        })
    }

    /// Exams one sitting of `exam_length` can hold.
    pub fn capacity_for(&self, exam_length: u32) -> usize {
        self.templates.get(&exam_length).map_or_else(
            || self.window.template_for(exam_length).capacity(),
            BlockTemplate::capacity,
        )
    }

    /// Start offset (minutes) of the exam at `position` in a sitting of
    /// `exam_length`; positions past the template continue back to back.
    pub fn offset_of(&self, exam_length: u32, position: usize) -> u32 {
        self.templates
            .get(&exam_length)
            .and_then(|t| t.offsets.get(position))
            .copied()
            .unwrap_or(position as u32 * exam_length)
    }

    /// Helper demand of a sitting holding `exams`.
    pub fn helpers_needed(&self, exams: &[usize]) -> u32 {
        exams.iter().map(|&e| self.exams[e].helpers).max().unwrap_or(0)
    }

    /// Distinct students of a sitting holding `exams`, sorted.
    pub fn students_of(&self, exams: &[usize]) -> Vec<u32> {
        let mut students: Vec<u32> = exams.iter().map(|&e| self.exams[e].student).collect();
        students.sort_unstable();
        students.dedup();
        students
    }

    /// Exam index by code.
    pub fn exam_index(&self, code: &str) -> Option<usize> {
        self.exam_by_code.get(code).copied()
    }

    /// Staff email by id.
    pub fn email(&self, staff: StaffId) -> &str {
        self.index.staff().resolve(staff)
    }

    /// Distinct assessors referenced by exams, sorted by id.
    pub fn assessors(&self) -> Vec<StaffId> {
        let mut ids: Vec<StaffId> = self.exams.iter().map(|e| e.assessor).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::models::{AvailableBlock, Exam, ExamStyle, Semester, StaffRole, WindowId};
    use chrono::{NaiveDate, NaiveTime};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn input() -> WindowInput {
        let window = Window::new(WindowId(1), Semester::Spring, 2024, d(3), d(3), 60)
            .with_slots(d(3), [t(9), t(13)]);
        WindowInput::new(window)
            .with_module(Module::new("M1", "One").with_lengths(20, 30).with_helpers(1))
            .with_exam(Exam::new("E1", "M1", "s1@code.berlin", "a@code.berlin"))
            .with_exam(
                Exam::new("E2", "M1", "s1@code.berlin", "a@code.berlin")
                    .with_style(ExamStyle::Alternative),
            )
            .with_exam(Exam::new("E3", "M1", "s2@code.berlin", "a@code.berlin"))
            .with_availability(AvailableBlock::new(
                WindowId(1),
                StaffRole::Assessor,
                "a@code.berlin",
                d(3),
                t(9),
            ))
    }

    #[test]
    fn test_compile_lowers_exams() {
        let instance = Instance::compile(&input(), &EngineConfig::default()).unwrap();
        assert_eq!(instance.exams.len(), 3);
        assert_eq!(instance.students.len(), 2);
        assert_eq!(instance.exams[1].length, 30);
        assert_eq!(instance.exams[0].helpers, 1);
        assert_eq!(instance.block_capacity, usize::MAX);
        // 20-min: cap 3 -> 1 sitting; 30-min: cap 2 -> 1 sitting
        assert_eq!(instance.sittings.len(), 2);
        assert_eq!(instance.exam_index("E3"), Some(2));
        assert_eq!(instance.assessors().len(), 1);
        assert!(instance.oversized.is_empty());
    }

    #[test]
    fn test_compile_rejects_invalid() {
        let bad = input().with_exam(Exam::new("E1", "M1", "s3@code.berlin", "a@code.berlin"));
        assert!(Instance::compile(&bad, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_oversized_exam_kept_aside() {
        let long = input()
            .with_module(Module::new("M2", "Two").with_lengths(90, 90))
            .with_exam(Exam::new("E4", "M2", "s3@code.berlin", "a@code.berlin"));
        let instance = Instance::compile(&long, &EngineConfig::default()).unwrap();
        assert_eq!(instance.oversized, vec![3]);
        assert_eq!(instance.sittings.len(), 2);
        assert!(instance.sittings.iter().all(|s| !s.exams.contains(&3)));
    }

    #[test]
    fn test_students_of_sitting() {
        let instance = Instance::compile(&input(), &EngineConfig::default()).unwrap();
        assert_eq!(instance.students_of(&[0, 1, 2]), vec![0, 1]);
        assert_eq!(instance.students_of(&[2]), vec![1]);
        assert!(instance.students_of(&[]).is_empty());
    }

    #[test]
    fn test_concurrency_cap_bounds_block_capacity() {
        let capped = EngineConfig::default()
            .with_solver(SolverConfig::default().with_max_concurrent_sittings(2));
        let instance = Instance::compile(&input(), &capped).unwrap();
        assert_eq!(instance.block_capacity, 2);

        let rooms = input()
            .with_room(Room::new("R1", "One"))
            .with_room(Room::new("R2", "Two"))
            .with_room(Room::new("R3", "Three"));
        assert_eq!(Instance::compile(&rooms, &capped).unwrap().block_capacity, 2);

        let one_room = input().with_room(Room::new("R1", "One"));
        assert_eq!(Instance::compile(&one_room, &capped).unwrap().block_capacity, 1);
    }
}
