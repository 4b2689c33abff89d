//! Availability index.
//!
//! Compiles a window's availability records into per-block lookups:
//! `block -> assessors`, `block -> helpers`, and the reverse
//! `staff -> blocks`. Availability is block-exact; a staff member is
//! available for a block only if that exact (date, time) pair was
//! declared for this window.
//!
//! Emails are interned to dense [`StaffId`]s so the solver works on
//! integers.
//!
//! # Complexity
//! Build is O(records); queries are O(1) amortized.

use chrono::{NaiveDate, NaiveTime};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::{AvailableBlock, Block, BlockId, Staff, StaffRole, Window};

/// Interned staff identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StaffId(pub u32);

impl StaffId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Maps staff emails to dense ids.
#[derive(Debug, Clone, Default)]
pub struct StaffInterner {
    to_id: FxHashMap<String, StaffId>,
    emails: Vec<String>,
}

impl StaffInterner {
    /// Interns an email, returning its id.
    pub fn intern(&mut self, email: &str) -> StaffId {
        if let Some(&id) = self.to_id.get(email) {
            return id;
        }
        let id = StaffId(self.emails.len() as u32);
        self.emails.push(email.to_string());
        self.to_id.insert(email.to_string(), id);
        id
    }

    #[inline]
    pub fn get(&self, email: &str) -> Option<StaffId> {
        self.to_id.get(email).copied()
    }

    #[inline]
    pub fn resolve(&self, id: StaffId) -> &str {
        &self.emails[id.index()]
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Per-block availability lookups for one window.
#[derive(Debug, Clone)]
pub struct AvailabilityIndex {
    blocks: Vec<Block>,
    slots: FxHashMap<(NaiveDate, NaiveTime), BlockId>,
    staff: StaffInterner,
    assessors_by_block: Vec<Vec<StaffId>>,
    helpers_by_block: Vec<Vec<StaffId>>,
    assessor_blocks: Vec<Vec<BlockId>>,
    helper_blocks: Vec<Vec<BlockId>>,
    assessor_pairs: FxHashSet<(StaffId, BlockId)>,
    helper_pairs: FxHashSet<(StaffId, BlockId)>,
    ignored: usize,
}

impl AvailabilityIndex {
    /// Builds the index for `window`.
    ///
    /// `staff` is interned first, in order, so ids are stable for a given
    /// input. Records of other windows and records naming a (date, time)
    /// that is not a block of this window are ignored.
    pub fn build(window: &Window, staff: &[Staff], records: &[AvailableBlock]) -> Self {
        let blocks = window.blocks();
        let slots: FxHashMap<_, _> = blocks
            .iter()
            .map(|b| ((b.date, b.start_time), b.id))
            .collect();

        let mut interner = StaffInterner::default();
        for s in staff {
            interner.intern(&s.email);
        }

        let mut assessor_pairs = FxHashSet::default();
        let mut helper_pairs = FxHashSet::default();
        let mut ignored = 0;
        for record in records {
            if record.window != window.id {
                ignored += 1;
                continue;
            }
            let Some(&block) = slots.get(&(record.date, record.time)) else {
                ignored += 1;
                continue;
            };
            let id = interner.intern(&record.email);
            match record.role {
                StaffRole::Assessor => assessor_pairs.insert((id, block)),
                StaffRole::Helper => helper_pairs.insert((id, block)),
            };
        }

        let n_staff = interner.len();
        let mut assessors_by_block = vec![Vec::new(); blocks.len()];
        let mut helpers_by_block = vec![Vec::new(); blocks.len()];
        let mut assessor_blocks = vec![Vec::new(); n_staff];
        let mut helper_blocks = vec![Vec::new(); n_staff];
        for &(staff, block) in &assessor_pairs {
            assessors_by_block[block.0].push(staff);
            assessor_blocks[staff.index()].push(block);
        }
        for &(staff, block) in &helper_pairs {
            helpers_by_block[block.0].push(staff);
            helper_blocks[staff.index()].push(block);
        }
        for list in assessors_by_block.iter_mut().chain(helpers_by_block.iter_mut()) {
            list.sort_unstable();
        }
        for list in assessor_blocks.iter_mut().chain(helper_blocks.iter_mut()) {
            list.sort_unstable();
        }

        if ignored > 0 {
            log::debug!(
                "window {}: ignored {} availability records outside its blocks",
                window.id,
                ignored
            );
        }

        Self {
            blocks,
            slots,
            staff: interner,
            assessors_by_block,
            helpers_by_block,
            assessor_blocks,
            helper_blocks,
            assessor_pairs,
            helper_pairs,
            ignored,
        }
    }

    /// The window's blocks in chronological order.
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Block starting at `(date, time)`, if the window defines one.
    pub fn block_at(&self, date: NaiveDate, time: NaiveTime) -> Option<BlockId> {
        self.slots.get(&(date, time)).copied()
    }

    #[inline]
    pub fn staff(&self) -> &StaffInterner {
        &self.staff
    }

    /// Assessors available in `block`, sorted by id.
    #[inline]
    pub fn assessors_at(&self, block: BlockId) -> &[StaffId] {
        &self.assessors_by_block[block.0]
    }

    /// Helpers available in `block`, sorted by id.
    #[inline]
    pub fn helpers_at(&self, block: BlockId) -> &[StaffId] {
        &self.helpers_by_block[block.0]
    }

    /// Blocks in which `staff` is available in `role`, sorted.
    pub fn blocks_of(&self, staff: StaffId, role: StaffRole) -> &[BlockId] {
        let lists = match role {
            StaffRole::Assessor => &self.assessor_blocks,
            StaffRole::Helper => &self.helper_blocks,
        };
        lists.get(staff.index()).map_or(&[], |v| v.as_slice())
    }

    /// Whether `staff` declared `block` in `role`.
    #[inline]
    pub fn is_available(&self, staff: StaffId, block: BlockId, role: StaffRole) -> bool {
        match role {
            StaffRole::Assessor => self.assessor_pairs.contains(&(staff, block)),
            StaffRole::Helper => self.helper_pairs.contains(&(staff, block)),
        }
    }

    /// Staff with at least one helper block, sorted.
    pub fn helpers(&self) -> Vec<StaffId> {
        (0..self.staff.len() as u32)
            .map(StaffId)
            .filter(|&s| !self.helper_blocks[s.index()].is_empty())
            .collect()
    }

    /// Number of records dropped while building.
    pub fn ignored_records(&self) -> usize {
        self.ignored
    }
}
