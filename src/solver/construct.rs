//! Backtracking construction of a first feasible plan.
//!
//! Sittings are the variables and blocks the values. Assessors with fewer
//! available blocks than sittings fail before any search. The search picks the
//! sitting with the fewest valid blocks (ties: least spare availability),
//! checks ahead that every unplaced sitting keeps a value, and breaks the
//! symmetry between interchangeable sittings of one assessor by forcing
//! them into increasing blocks. Two sittings sharing a student never take
//! the same block.
//!
//! Helper feasibility is tracked per block as a count: a block can take a
//! sitting while its free helpers (available helpers not assessing there)
//! cover the seats already promised plus the new ones. Concrete helpers are
//! seated after the search, block by block.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Reverse;
use std::time::Instant;

use super::seats::fill_helpers;
use super::Infeasibility;
use crate::availability::StaffId;
use crate::instance::Instance;
use crate::models::{BlockId, StaffRole};
use crate::plan::{Plan, PlannedSitting};
use crate::workload::sittings_per_assessor;

/// Nodes between two deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Outcome of the construction search.
#[derive(Debug)]
pub(super) struct Construction {
    pub result: Result<Plan, Infeasibility>,
    pub nodes: u64,
}

enum Step {
    Found,
    Exhausted,
    OutOfBudget,
}

struct Search<'a> {
    instance: &'a Instance,
    rng: &'a mut ChaCha8Rng,
    max_nodes: u64,
    deadline: Instant,
    nodes: u64,
    need: Vec<u32>,
    ease: Vec<i64>,
    twin_prev: Vec<Option<usize>>,
    twin_next: Vec<Option<usize>>,
    assigned: Vec<Option<BlockId>>,
    count: Vec<usize>,
    demand: Vec<u32>,
    assessors_in: Vec<Vec<StaffId>>,
    students: Vec<Vec<u32>>,
    students_in: Vec<Vec<u32>>,
}

impl<'a> Search<'a> {
    fn new(
        instance: &'a Instance,
        rng: &'a mut ChaCha8Rng,
        max_nodes: u64,
        deadline: Instant,
    ) -> Self {
        let sittings = &instance.sittings;
        let n_blocks = instance.index.blocks().len();
        let need: Vec<u32> = sittings
            .iter()
            .map(|s| instance.helpers_needed(&s.exams))
            .collect();

        let mut per_assessor = vec![0i64; instance.index.staff().len()];
        for s in sittings {
            per_assessor[s.assessor.index()] += 1;
        }
        let ease = sittings
            .iter()
            .map(|s| {
                let avail = instance.index.blocks_of(s.assessor, StaffRole::Assessor).len() as i64;
                avail - per_assessor[s.assessor.index()]
            })
            .collect();

        let students: Vec<Vec<u32>> = sittings
            .iter()
            .map(|s| instance.students_of(&s.exams))
            .collect();
        let mut sittings_of = vec![0usize; instance.students.len()];
        for st in students.iter().flatten() {
            sittings_of[*st as usize] += 1;
        }
        // students that constrain other sittings
        let shared: Vec<Vec<u32>> = students
            .iter()
            .map(|list| {
                list.iter()
                    .copied()
                    .filter(|&st| sittings_of[st as usize] > 1)
                    .collect()
            })
            .collect();

        // Sittings of one assessor with the same length, helper need and
        // shared students are interchangeable; chain them so they take
        // increasing blocks.
        let mut twin_prev = vec![None; sittings.len()];
        let mut twin_next = vec![None; sittings.len()];
        for i in 0..sittings.len() {
            let twin = (i + 1..sittings.len()).find(|&j| {
                sittings[j].assessor == sittings[i].assessor
                    && sittings[j].exam_length == sittings[i].exam_length
                    && need[j] == need[i]
                    && shared[j] == shared[i]
            });
            if let Some(j) = twin {
                if twin_prev[j].is_none() {
                    twin_next[i] = Some(j);
                    twin_prev[j] = Some(i);
                }
            }
        }

        Self {
            instance,
            rng,
            max_nodes,
            deadline,
            nodes: 0,
            need,
            ease,
            twin_prev,
            twin_next,
            assigned: vec![None; sittings.len()],
            count: vec![0; n_blocks],
            demand: vec![0; n_blocks],
            assessors_in: vec![Vec::new(); n_blocks],
            students,
            students_in: vec![Vec::new(); n_blocks],
        }
    }

    /// Helpers available in `block` who are not assessing there, counting
    /// `extra` as an assessor too.
    fn free_helpers(&self, block: BlockId, extra: StaffId) -> usize {
        let busy = &self.assessors_in[block.0];
        self.instance
            .index
            .helpers_at(block)
            .iter()
            .filter(|&&h| h != extra && !busy.contains(&h))
            .count()
    }

    fn can_place(&self, s: usize, block: BlockId) -> bool {
        let assessor = self.instance.sittings[s].assessor;
        if self.assessors_in[block.0].contains(&assessor) {
            return false;
        }
        if self.count[block.0] >= self.instance.block_capacity {
            return false;
        }
        let present = &self.students_in[block.0];
        if self.students[s].iter().any(|st| present.contains(st)) {
            return false;
        }
        if let Some(p) = self.twin_prev[s] {
            if matches!(self.assigned[p], Some(bp) if block <= bp) {
                return false;
            }
        }
        if let Some(n) = self.twin_next[s] {
            if matches!(self.assigned[n], Some(bn) if block >= bn) {
                return false;
            }
        }
        let seats = self.demand[block.0] + self.need[s];
        if seats == 0 {
            return true;
        }
        self.free_helpers(block, assessor) >= seats as usize
    }

    fn values(&self, s: usize) -> Vec<BlockId> {
        let assessor = self.instance.sittings[s].assessor;
        self.instance
            .index
            .blocks_of(assessor, StaffRole::Assessor)
            .iter()
            .copied()
            .filter(|&b| self.can_place(s, b))
            .collect()
    }

    fn place(&mut self, s: usize, block: BlockId) {
        self.assigned[s] = Some(block);
        self.count[block.0] += 1;
        self.demand[block.0] += self.need[s];
        self.assessors_in[block.0].push(self.instance.sittings[s].assessor);
        self.students_in[block.0].extend_from_slice(&self.students[s]);
    }

    fn unplace(&mut self, s: usize, block: BlockId) {
        self.assigned[s] = None;
        self.count[block.0] -= 1;
        self.demand[block.0] -= self.need[s];
        self.assessors_in[block.0].pop();
        let kept = self.students_in[block.0].len() - self.students[s].len();
        self.students_in[block.0].truncate(kept);
    }

    /// Picks the next sitting, or `Err` when some sitting has no value left.
    fn select(&self) -> Result<Option<(usize, Vec<BlockId>)>, ()> {
        let mut best: Option<(usize, Vec<BlockId>)> = None;
        for s in 0..self.assigned.len() {
            if self.assigned[s].is_some() {
                continue;
            }
            let values = self.values(s);
            if values.is_empty() {
                return Err(());
            }
            let better = match &best {
                None => true,
                Some((b, vals)) => {
                    (values.len(), self.ease[s]) < (vals.len(), self.ease[*b])
                }
            };
            if better {
                best = Some((s, values));
            }
        }
        Ok(best)
    }

    fn order(&mut self, s: usize, values: Vec<BlockId>) -> Vec<BlockId> {
        let assessor = self.instance.sittings[s].assessor;
        let need = self.need[s];
        let mut keyed = Vec::with_capacity(values.len());
        for b in values {
            let helper_slack = if need > 0 {
                self.free_helpers(b, assessor) as i64 - i64::from(self.demand[b.0] + need)
            } else {
                0
            };
            let rooms_left = self.instance.block_capacity.saturating_sub(self.count[b.0] + 1);
            keyed.push((
                Reverse(helper_slack),
                Reverse(rooms_left),
                self.rng.random::<u32>(),
                b,
            ));
        }
        keyed.sort_unstable();
        keyed.into_iter().map(|(_, _, _, b)| b).collect()
    }

    fn search(&mut self) -> Step {
        self.nodes += 1;
        if self.nodes > self.max_nodes {
            return Step::OutOfBudget;
        }
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            return Step::OutOfBudget;
        }

        let (s, values) = match self.select() {
            Err(()) => return Step::Exhausted,
            Ok(None) => return Step::Found,
            Ok(Some(pick)) => pick,
        };

        for block in self.order(s, values) {
            self.place(s, block);
            match self.search() {
                Step::Exhausted => self.unplace(s, block),
                done => return done,
            }
        }
        Step::Exhausted
    }
}

/// Builds a feasible plan or reports why none was found.
pub(super) fn construct(
    instance: &Instance,
    rng: &mut ChaCha8Rng,
    max_nodes: u64,
    deadline: Instant,
) -> Construction {
    if let Some(short) = short_assessor(instance) {
        log::debug!(
            "{} has fewer available blocks than sittings",
            instance.email(short)
        );
        return Construction {
            result: Err(Infeasibility::Proven),
            nodes: 0,
        };
    }

    let mut search = Search::new(instance, rng, max_nodes, deadline);
    let step = search.search();
    let nodes = search.nodes;
    let assigned = std::mem::take(&mut search.assigned);
    drop(search);

    let result = match step {
        Step::Exhausted => Err(Infeasibility::Proven),
        Step::OutOfBudget => Err(Infeasibility::BudgetExceeded),
        Step::Found => seat(instance, &assigned, rng),
    };
    Construction { result, nodes }
}

/// First assessor with more sittings than available blocks.
fn short_assessor(instance: &Instance) -> Option<StaffId> {
    let counts = sittings_per_assessor(&instance.sittings, instance.index.staff().len());
    counts.iter().enumerate().find_map(|(a, &n)| {
        let id = StaffId(a as u32);
        (n > instance.index.blocks_of(id, StaffRole::Assessor).len()).then_some(id)
    })
}

/// Turns block assignments into a plan with helpers and rooms.
fn seat(
    instance: &Instance,
    assigned: &[Option<BlockId>],
    rng: &mut ChaCha8Rng,
) -> Result<Plan, Infeasibility> {
    let mut plan = Plan::default();
    for (spec, block) in instance.sittings.iter().zip(assigned) {
        let Some(block) = *block else {
            return Err(Infeasibility::BudgetExceeded);
        };
        plan.sittings.push(PlannedSitting {
            assessor: spec.assessor,
            exam_length: spec.exam_length,
            exams: spec.exams.clone(),
            block,
            room: None,
            helpers: Vec::new(),
        });
    }

    let mut order: Vec<usize> = (0..plan.sittings.len()).collect();
    order.sort_by_key(|&i| (plan.sittings[i].block, i));
    for i in order {
        if !fill_helpers(instance, &mut plan, i, rng) {
            log::warn!(
                "window {}: helper seating failed after construction",
                instance.window.id
            );
            return Err(Infeasibility::BudgetExceeded);
        }
    }
    plan.assign_rooms(instance);
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{
        AvailableBlock, Exam, Module, Room, Semester, Window, WindowId, WindowInput,
    };
    use chrono::{NaiveDate, NaiveTime};
    use rand::SeedableRng;
    use std::time::Duration;

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn run(input: &WindowInput) -> (Instance, Construction) {
        let inst = Instance::compile(input, &EngineConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let deadline = Instant::now() + Duration::from_secs(10);
        let c = construct(&inst, &mut rng, 10_000, deadline);
        (inst, c)
    }

    fn window(hours: &[u32]) -> Window {
        Window::new(WindowId(1), Semester::Spring, 2024, d(), d(), 20)
            .with_slots(d(), hours.iter().map(|&h| t(h)))
    }

    fn av(role: StaffRole, email: &str, h: u32) -> AvailableBlock {
        AvailableBlock::new(WindowId(1), role, email, d(), t(h))
    }

    #[test]
    fn test_builds_valid_plan() {
        let input = WindowInput::new(window(&[9, 10, 11]))
            .with_module(Module::new("M", "M").with_helpers(1))
            .with_room(Room::new("R1", "Room 1"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s2@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E3", "M", "s3@code.berlin", "b@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 10))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 10))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 11))
            .with_availability(av(StaffRole::Helper, "h@code.berlin", 9))
            .with_availability(av(StaffRole::Helper, "h@code.berlin", 10))
            .with_availability(av(StaffRole::Helper, "h@code.berlin", 11));
        let (inst, c) = run(&input);
        let plan = c.result.unwrap();
        assert_eq!(plan.sittings.len(), 3);
        assert!(plan.violations(&inst).is_empty());
    }

    #[test]
    fn test_proves_infeasible() {
        // Two sittings, one room, one shared block.
        let input = WindowInput::new(window(&[9]))
            .with_module(Module::new("M", "M"))
            .with_room(Room::new("R1", "Room 1"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s2@code.berlin", "b@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 9));
        let (_, c) = run(&input);
        assert!(matches!(c.result, Err(Infeasibility::Proven)));
    }

    #[test]
    fn test_assessor_helping_elsewhere_blocks_pool() {
        // b is both an assessor and the only helper; a's sitting needs a
        // helper so it cannot share a block with b's own sitting.
        let input = WindowInput::new(window(&[9, 10]))
            .with_module(Module::new("M", "M").with_helpers(1))
            .with_module(Module::new("N", "N"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "N", "s2@code.berlin", "b@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 10))
            .with_availability(av(StaffRole::Helper, "b@code.berlin", 9));
        let (inst, c) = run(&input);
        let plan = c.result.unwrap();
        assert!(plan.violations(&inst).is_empty());
        let b = inst.index.staff().get("b@code.berlin").unwrap();
        let b_sitting = plan.sittings.iter().find(|s| s.assessor == b).unwrap();
        assert_eq!(b_sitting.block, inst.index.block_at(d(), t(10)).unwrap());
    }

    #[test]
    fn test_short_assessor_fails_without_search() {
        let input = WindowInput::new(window(&[9, 10]))
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s2@code.berlin", "a@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9));
        let (_, c) = run(&input);
        assert!(matches!(c.result, Err(Infeasibility::Proven)));
        assert_eq!(c.nodes, 0);
    }

    #[test]
    fn test_node_budget() {
        let input = WindowInput::new(window(&[9]))
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9));
        let inst = Instance::compile(&input, &EngineConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let c = construct(&inst, &mut rng, 0, Instant::now() + Duration::from_secs(1));
        assert!(matches!(c.result, Err(Infeasibility::BudgetExceeded)));
    }

    #[test]
    fn test_shared_student_in_single_block_is_proven_infeasible() {
        let input = WindowInput::new(window(&[9]))
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s1@code.berlin", "b@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 9));
        let (_, c) = run(&input);
        assert!(matches!(c.result, Err(Infeasibility::Proven)));
    }

    #[test]
    fn test_shared_student_takes_separate_blocks() {
        let input = WindowInput::new(window(&[9, 10]))
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s1@code.berlin", "b@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 10))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 10));
        let (inst, c) = run(&input);
        let plan = c.result.unwrap();
        assert!(plan.violations(&inst).is_empty());
        assert_ne!(plan.sittings[0].block, plan.sittings[1].block);
    }

    #[test]
    fn test_sittings_with_shared_students_are_not_interchangeable() {
        // E3 pins s1 to 9:00, so a must hold E1 at 10:00 and E2 at 9:00.
        let input = WindowInput::new(window(&[9, 10]))
            .with_module(Module::new("M", "M"))
            .with_exam(Exam::new("E1", "M", "s1@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E2", "M", "s2@code.berlin", "a@code.berlin"))
            .with_exam(Exam::new("E3", "M", "s1@code.berlin", "b@code.berlin"))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 9))
            .with_availability(av(StaffRole::Assessor, "a@code.berlin", 10))
            .with_availability(av(StaffRole::Assessor, "b@code.berlin", 9));
        let (inst, c) = run(&input);
        let plan = c.result.unwrap();
        assert!(plan.violations(&inst).is_empty());
        let e1 = inst.exam_index("E1").unwrap();
        let holder = plan.sittings.iter().find(|s| s.exams.contains(&e1)).unwrap();
        assert_eq!(holder.block, inst.index.block_at(d(), t(10)).unwrap());
    }
}
