//! Task identity used to key reminders
//!
//! The alarm engine never looks inside a [`TaskRef`]; it only hashes and
//! compares it. Whatever owns the real task (a list view, a file, a
//! database) hands out one of these per reminder-bearing item.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a reminder-bearing task: its name plus its due date.
///
/// Two refs with the same name and due date are the same task as far as
/// scheduling is concerned. Renaming or re-dating a task produces a new
/// identity, so callers should cancel under the old ref first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskRef {
    // Field order drives the derived Ord: due date first, then name.
    due: NaiveDate,
    name: String,
}

impl TaskRef {
    /// Create a new task ref
    pub fn new(name: impl Into<String>, due: NaiveDate) -> Self {
        Self {
            due,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn due(&self) -> NaiveDate {
        self.due
    }

    /// Case-insensitive name match, used when a user refers to a task by name
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (due {})", self.name, self.due.format("%d/%m/%Y"))
    }
}
