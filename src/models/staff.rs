//! Staff and per-window availability.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::WindowId;

/// Staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Assessor,
    Helper,
}

/// A staff member identified by institutional email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub email: String,
    pub role: StaffRole,
}

impl Staff {
    pub fn assessor(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: StaffRole::Assessor,
        }
    }

    pub fn helper(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: StaffRole::Helper,
        }
    }
}

/// A block a staff member declared available, scoped to one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableBlock {
    pub window: WindowId,
    pub role: StaffRole,
    pub email: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AvailableBlock {
    pub fn new(
        window: WindowId,
        role: StaffRole,
        email: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Self {
        Self {
            window,
            role,
            email: email.into(),
            date,
            time,
        }
    }
}
