//! SOP checklist domain types and due-date computation.
//!
//! Recurring compliance items per property. Due/overdue is a pure
//! computation over (frequency, last completion, the date asked about);
//! nothing runs on a timer.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recurrence frequency for a checklist item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SopFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl SopFrequency {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Next due date after a completion on `completed_on`. Month arithmetic
    /// clamps to the last day of shorter months.
    pub fn next_due(&self, completed_on: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => completed_on + Duration::days(1),
            Self::Weekly => completed_on + Duration::days(7),
            Self::Monthly => completed_on
                .checked_add_months(Months::new(1))
                .unwrap_or(completed_on),
        }
    }
}

/// Where one item stands relative to its due date.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DueState {
    UpToDate,
    Due,
    Overdue,
}

/// Computed status for one item on one date.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ItemDueStatus {
    pub due_on: NaiveDate,
    pub state: DueState,
}

/// Pure due/overdue computation.
///
/// An item that was never completed is due from the day it was created.
pub fn item_due_status(
    frequency: SopFrequency,
    created_on: NaiveDate,
    last_completed: Option<NaiveDate>,
    on: NaiveDate,
) -> ItemDueStatus {
    let due_on = match last_completed {
        Some(completed) => frequency.next_due(completed),
        None => created_on,
    };

    let state = if on < due_on {
        DueState::UpToDate
    } else if on == due_on {
        DueState::Due
    } else {
        DueState::Overdue
    };

    ItemDueStatus { due_on, state }
}

/// Checklist entity
#[derive(Debug, Clone, Serialize)]
pub struct SopChecklist {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Checklist item entity
#[derive(Debug, Clone, Serialize)]
pub struct SopItem {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub name: String,
    pub frequency: SopFrequency,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a checklist with its items
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChecklistRequest {
    pub name: String,
    pub items: Vec<CreateSopItemRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSopItemRequest {
    pub name: String,
    pub frequency: SopFrequency,
    pub sort_order: i32,
}

/// Request DTO for completing an item. Defaults to today when omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteItemRequest {
    #[serde(default)]
    pub completed_on: Option<NaiveDate>,
}

/// Checklist with its items, as returned by list/create endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistResponse {
    #[serde(flatten)]
    pub checklist: SopChecklist,
    pub items: Vec<SopItem>,
}

/// One item with its computed due status
#[derive(Debug, Clone, Serialize)]
pub struct ItemStatusResponse {
    #[serde(flatten)]
    pub item: SopItem,
    pub last_completed: Option<NaiveDate>,
    pub due_on: NaiveDate,
    pub state: DueState,
}

/// Full checklist status for one date
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistStatusResponse {
    pub checklist_id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub items: Vec<ItemStatusResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_item_is_due_the_next_day() {
        let status = item_due_status(
            SopFrequency::Daily,
            date(2026, 3, 1),
            Some(date(2026, 3, 10)),
            date(2026, 3, 11),
        );
        assert_eq!(status.due_on, date(2026, 3, 11));
        assert_eq!(status.state, DueState::Due);
    }

    #[test]
    fn weekly_item_stays_up_to_date_within_the_week() {
        let status = item_due_status(
            SopFrequency::Weekly,
            date(2026, 3, 1),
            Some(date(2026, 3, 9)),
            date(2026, 3, 13),
        );
        assert_eq!(status.due_on, date(2026, 3, 16));
        assert_eq!(status.state, DueState::UpToDate);
    }

    #[test]
    fn monthly_item_clamps_to_shorter_months() {
        let status = item_due_status(
            SopFrequency::Monthly,
            date(2026, 1, 1),
            Some(date(2026, 1, 31)),
            date(2026, 3, 1),
        );
        assert_eq!(status.due_on, date(2026, 2, 28));
        assert_eq!(status.state, DueState::Overdue);
    }

    #[test]
    fn never_completed_item_is_due_from_creation() {
        let created = date(2026, 5, 4);

        let on_creation_day = item_due_status(SopFrequency::Daily, created, None, created);
        assert_eq!(on_creation_day.state, DueState::Due);

        let a_week_later =
            item_due_status(SopFrequency::Daily, created, None, date(2026, 5, 11));
        assert_eq!(a_week_later.state, DueState::Overdue);
        assert_eq!(a_week_later.due_on, created);
    }
}
