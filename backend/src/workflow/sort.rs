//! Column sorting of the job list.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::JobSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Name,
    Date,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
    /// Unsorted; also what inactive columns report
    Default,
}

/// Active sort column and direction. Defaults to newest date first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortInstructions {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortInstructions {
    fn default() -> Self {
        Self {
            column: SortColumn::Date,
            direction: SortDirection::Desc,
        }
    }
}

impl SortInstructions {
    /// Header click: flip the active column, or start another column ascending.
    pub fn toggle(self, column: SortColumn) -> Self {
        let direction = if column == self.column {
            match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc | SortDirection::Default => SortDirection::Asc,
            }
        } else {
            SortDirection::Asc
        };
        Self { column, direction }
    }

    /// Direction indicator for a column header.
    pub fn direction_for(&self, column: SortColumn) -> SortDirection {
        if column == self.column {
            self.direction
        } else {
            SortDirection::Default
        }
    }

    /// Stable sort; `Default` keeps the incoming order.
    pub fn apply(&self, jobs: &mut [JobSummary]) {
        let column = self.column;
        match self.direction {
            SortDirection::Asc => jobs.sort_by(|a, b| compare(column, a, b)),
            SortDirection::Desc => jobs.sort_by(|a, b| compare(column, b, a)),
            SortDirection::Default => {}
        }
    }
}

fn compare(column: SortColumn, a: &JobSummary, b: &JobSummary) -> Ordering {
    match column {
        SortColumn::Name => a.name.cmp(&b.name),
        SortColumn::Date => a.date.cmp(&b.date),
        SortColumn::Status => a.status.cmp(&b.status),
    }
}
