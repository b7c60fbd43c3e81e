//! Defect model normalized from Rally `Defect` records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::record::{as_record, date_portion, non_empty_text};
use super::test_case::RecordSkip;

/// Rally custom field holding the root-cause classification.
pub const ROOT_CAUSE_FIELD: &str = "c_RCARootCauseUS";

/// Root cause used when a defect has none recorded.
pub const UNSPECIFIED_ROOT_CAUSE: &str = "Unspecified";

/// Value used for a missing severity, priority or state.
pub const NONE_LABEL: &str = "None";

/// A defect as shown on the root-cause analysis dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Defect {
    /// FormattedID, or ObjectID when no FormattedID was fetched
    pub defect_id: Option<String>,
    pub name: String,
    pub root_cause: String,
    pub severity: String,
    pub priority: String,
    pub state: String,
    /// Calendar-date portion of the creation timestamp ("" when absent)
    pub creation_date: String,
}

impl Defect {
    /// Normalize a raw Rally defect record, applying the documented defaults.
    pub fn from_record(value: &Value) -> Result<Self, RecordSkip> {
        let record = as_record(value).ok_or(RecordSkip::NotAnObject)?;

        let creation_date = non_empty_text(record, "CreationDate")
            .map(|created| date_portion(&created).to_string())
            .unwrap_or_default();

        Ok(Defect {
            defect_id: non_empty_text(record, "FormattedID")
                .or_else(|| non_empty_text(record, "ObjectID")),
            name: non_empty_text(record, "Name").unwrap_or_else(|| "Unnamed Defect".to_string()),
            root_cause: non_empty_text(record, ROOT_CAUSE_FIELD)
                .unwrap_or_else(|| UNSPECIFIED_ROOT_CAUSE.to_string()),
            severity: non_empty_text(record, "Severity").unwrap_or_else(|| NONE_LABEL.to_string()),
            priority: non_empty_text(record, "Priority").unwrap_or_else(|| NONE_LABEL.to_string()),
            state: non_empty_text(record, "State").unwrap_or_else(|| NONE_LABEL.to_string()),
            creation_date,
        })
    }

    /// Year-month bucket: the `YYYY-MM` prefix of the creation date.
    ///
    /// The rest of the date is not validated. Absent creation dates, or ones
    /// that do not start with `YYYY-MM`, bucket under the empty string.
    pub fn month_key(&self) -> String {
        match self.creation_date.get(..7) {
            Some(prefix) if is_year_month(prefix) => prefix.to_string(),
            _ => String::new(),
        }
    }
}

fn is_year_month(prefix: &str) -> bool {
    prefix.bytes().enumerate().all(|(i, b)| match i {
        4 => b == b'-',
        _ => b.is_ascii_digit(),
    })
}
