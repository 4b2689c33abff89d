//! Property tests over small generated windows.

use chrono::{NaiveDate, NaiveTime};
use proptest::prelude::*;

use exam_schedule::config::{EngineConfig, SolverConfig};
use exam_schedule::evaluation::evaluate;
use exam_schedule::feasibility::check;
use exam_schedule::instance::Instance;
use exam_schedule::models::{
    AvailableBlock, Exam, Module, Room, Semester, StaffRole, Window, WindowId, WindowInput,
};
use exam_schedule::solver::{SolveOutcome, Solver};

const WINDOW: WindowId = WindowId(1);
const HOURS: [u32; 3] = [9, 11, 14];
/// Two days of three blocks.
const BLOCKS: usize = 6;

#[derive(Debug, Clone)]
struct Case {
    /// (assessor, student, needs helper)
    exams: Vec<(usize, usize, bool)>,
    /// Block bitmask per assessor.
    assessors: Vec<u8>,
    /// Block bitmask per helper.
    helpers: Vec<u8>,
    rooms: usize,
}

fn case() -> impl Strategy<Value = Case> {
    (
        prop::collection::vec((0..3usize, 0..4usize, any::<bool>()), 1..7),
        prop::collection::vec(1u8..64, 3),
        prop::collection::vec(0u8..64, 2),
        0usize..3,
    )
        .prop_map(|(exams, assessors, helpers, rooms)| Case {
            exams,
            assessors,
            helpers,
            rooms,
        })
}

fn slot(block: usize) -> (NaiveDate, NaiveTime) {
    let date = NaiveDate::from_ymd_opt(2024, 6, 3 + (block / 3) as u32).unwrap();
    let time = NaiveTime::from_hms_opt(HOURS[block % 3], 0, 0).unwrap();
    (date, time)
}

fn records(window: WindowId, role: StaffRole, email: &str, mask: u8) -> Vec<AvailableBlock> {
    (0..BLOCKS)
        .filter(|b| mask & (1 << b) != 0)
        .map(|b| {
            let (date, time) = slot(b);
            AvailableBlock::new(window, role, email, date, time)
        })
        .collect()
}

fn build(case: &Case) -> WindowInput {
    let mut window = Window::new(
        WINDOW,
        Semester::Spring,
        2024,
        slot(0).0,
        slot(BLOCKS - 1).0,
        60,
    );
    for b in 0..BLOCKS {
        let (date, time) = slot(b);
        window = window.with_slot(date, time);
    }

    let mut input = WindowInput::new(window)
        .with_module(Module::new("PLAIN", "Plain"))
        .with_module(Module::new("LAB", "Lab").with_helpers(1));
    for (i, &(assessor, student, lab)) in case.exams.iter().enumerate() {
        input = input.with_exam(Exam::new(
            format!("E{i}"),
            if lab { "LAB" } else { "PLAIN" },
            format!("s{student}@code.berlin"),
            format!("a{assessor}@code.berlin"),
        ));
    }
    for (a, &mask) in case.assessors.iter().enumerate() {
        for r in records(WINDOW, StaffRole::Assessor, &format!("a{a}@code.berlin"), mask) {
            input = input.with_availability(r);
        }
    }
    for (h, &mask) in case.helpers.iter().enumerate() {
        for r in records(WINDOW, StaffRole::Helper, &format!("h{h}@code.berlin"), mask) {
            input = input.with_availability(r);
        }
    }
    for r in 0..case.rooms {
        input = input.with_room(Room::new(format!("R{r}"), format!("Room {r}")));
    }
    input
}

fn config() -> EngineConfig {
    EngineConfig::default().with_solver(
        SolverConfig::default()
            .with_seed(11)
            .with_workers(2)
            .with_max_iterations(150)
            .with_time_limit_ms(60_000),
    )
}

fn solve(input: &WindowInput, cfg: &EngineConfig) -> (Instance, SolveOutcome) {
    let instance = Instance::compile(input, cfg).unwrap();
    let outcome = Solver::new(cfg.solver.clone()).solve(&instance);
    (instance, outcome)
}

fn same_outcome(a: &SolveOutcome, b: &SolveOutcome) -> bool {
    match (a, b) {
        (SolveOutcome::Feasible(x), SolveOutcome::Feasible(y)) => {
            x.plan == y.plan && x.penalty == y.penalty
        }
        (SolveOutcome::Infeasible(x), SolveOutcome::Infeasible(y)) => x == y,
        _ => false,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_solve_is_deterministic(c in case()) {
        let input = build(&c);
        let cfg = config();
        let (_, first) = solve(&input, &cfg);
        let (_, second) = solve(&input, &cfg);
        prop_assert!(same_outcome(&first, &second));
    }

    #[test]
    fn test_feasible_schedules_are_sound(c in case()) {
        let input = build(&c);
        let (instance, outcome) = solve(&input, &config());
        if let SolveOutcome::Feasible(solution) = outcome {
            prop_assert!(solution.plan.violations(&instance).is_empty());
            prop_assert!(solution.schedule.is_valid());
            prop_assert_eq!(solution.schedule.exam_count(), c.exams.len());
        }
    }

    #[test]
    fn test_evaluation_matches_solver(c in case()) {
        let input = build(&c);
        let cfg = config();
        let (_, outcome) = solve(&input, &cfg);
        if let SolveOutcome::Feasible(solution) = outcome {
            let evaluation = evaluate(&input, &solution.schedule, &cfg).unwrap();
            prop_assert_eq!(evaluation.penalty, solution.penalty);
            prop_assert_eq!(evaluation.breakdown, solution.breakdown);
        }
    }

    #[test]
    fn test_more_availability_stays_feasible(
        c in case(),
        extra_assessors in prop::collection::vec(0u8..64, 3),
        extra_helpers in prop::collection::vec(0u8..64, 2),
    ) {
        let cfg = config();
        let base = build(&c);
        let (instance, outcome) = solve(&base, &cfg);
        prop_assume!(check(&instance).is_ok());
        prop_assume!(matches!(outcome, SolveOutcome::Feasible(_)));

        let mut wider = c.clone();
        for (mask, extra) in wider.assessors.iter_mut().zip(&extra_assessors) {
            *mask |= extra;
        }
        for (mask, extra) in wider.helpers.iter_mut().zip(&extra_helpers) {
            *mask |= extra;
        }
        let (instance, outcome) = solve(&build(&wider), &cfg);
        prop_assert!(check(&instance).is_ok());
        prop_assert!(matches!(outcome, SolveOutcome::Feasible(_)));
    }

    #[test]
    fn test_other_window_availability_is_ignored(c in case()) {
        let cfg = config();
        let input = build(&c);
        let mut polluted = input.clone();
        for a in 0..c.assessors.len() {
            polluted.availability.extend(records(
                WindowId(2),
                StaffRole::Assessor,
                &format!("a{a}@code.berlin"),
                0b11_1111,
            ));
        }
        for h in 0..c.helpers.len() {
            polluted.availability.extend(records(
                WindowId(2),
                StaffRole::Helper,
                &format!("h{h}@code.berlin"),
                0b11_1111,
            ));
        }

        let (clean_instance, clean) = solve(&input, &cfg);
        let (polluted_instance, dirty) = solve(&polluted, &cfg);
        prop_assert_eq!(check(&clean_instance), check(&polluted_instance));
        prop_assert!(same_outcome(&clean, &dirty));
    }
}
