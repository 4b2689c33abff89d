//! Read-only input bundle for one scheduling run.

use serde::{Deserialize, Serialize};

use super::{AvailableBlock, Exam, Module, Room, Staff, StaffRole, Window};
use crate::roster::Roster;

/// Everything the engine reads for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowInput {
    pub window: Window,
    pub modules: Vec<Module>,
    pub exams: Vec<Exam>,
    pub staff: Vec<Staff>,
    /// Availability records; records of other windows are ignored.
    pub availability: Vec<AvailableBlock>,
    pub rooms: Vec<Room>,
    /// Whether a roster was uploaded for the window.
    pub csv_uploaded: bool,
}

impl WindowInput {
    /// Creates an input with no roster.
    pub fn new(window: Window) -> Self {
        Self {
            window,
            modules: Vec::new(),
            exams: Vec::new(),
            staff: Vec::new(),
            availability: Vec::new(),
            rooms: Vec::new(),
            csv_uploaded: false,
        }
    }

    /// Installs a parsed roster and marks it uploaded.
    ///
    /// Roster assessors not yet listed as staff are added.
    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.modules = roster.modules;
        self.exams = roster.exams;
        for email in roster.assessors {
            if !self
                .staff
                .iter()
                .any(|s| s.email == email && s.role == StaffRole::Assessor)
            {
                self.staff.push(Staff::assessor(email));
            }
        }
        self.csv_uploaded = true;
        self
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Adds an exam and marks the roster uploaded.
    pub fn with_exam(mut self, exam: Exam) -> Self {
        self.exams.push(exam);
        self.csv_uploaded = true;
        self
    }

    pub fn with_staff(mut self, staff: Staff) -> Self {
        self.staff.push(staff);
        self
    }

    pub fn with_availability(mut self, record: AvailableBlock) -> Self {
        self.availability.push(record);
        self
    }

    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.push(room);
        self
    }

    /// Sets the roster flag explicitly.
    pub fn with_csv_uploaded(mut self, uploaded: bool) -> Self {
        self.csv_uploaded = uploaded;
        self
    }

    /// Looks up a module by code.
    pub fn module(&self, code: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.code == code)
    }
}
