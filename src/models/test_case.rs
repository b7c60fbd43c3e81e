//! Test case model normalized from Rally `TestCase` records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::record::{as_record, non_empty_text, ref_name, text};

/// Label used when a test case has never been run.
pub const NO_RUN: &str = "No Run";

/// Outcome of the most recent execution of a test case.
///
/// Rally verdicts are an open set ("Pass", "Fail", "Blocked", "Inconclusive",
/// ...). Only `Pass` and `Fail` are classified; everything else is kept
/// verbatim under `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verdict {
    Pass,
    Fail,
    Other(String),
}

impl Verdict {
    /// Classify a verdict label. A missing label means the test never ran.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Pass") => Self::Pass,
            Some("Fail") => Self::Fail,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(NO_RUN.to_string()),
        }
    }

    /// Display label, as Rally spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::Other(label) => label,
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl From<String> for Verdict {
    fn from(label: String) -> Self {
        Self::from_label(Some(&label))
    }
}

impl From<Verdict> for String {
    fn from(verdict: Verdict) -> Self {
        verdict.as_str().to_string()
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a raw record was left out of an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordSkip {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no {0}")]
    MissingId(&'static str),
}

/// A test case as shown on the failure-analysis dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestCase {
    /// Rally FormattedID (e.g. "TC1234")
    pub test_case_id: String,
    pub test_case_name: String,
    /// Rally ObjectID, or "N/A"
    pub tcr_id: String,
    /// Last run timestamp as reported by Rally
    pub date_time: Option<String>,
    /// Last verdict label
    #[schema(value_type = String)]
    pub verdict: Verdict,
    pub last_build: String,
    pub duration: String,
    pub owner: String,
}

impl TestCase {
    /// Normalize a raw Rally test case record.
    ///
    /// The verdict prefers `LastResult.Verdict`, then `LastVerdict`, then
    /// "No Run". Records without a `FormattedID` are rejected.
    pub fn from_record(value: &Value) -> Result<Self, RecordSkip> {
        let record = as_record(value).ok_or(RecordSkip::NotAnObject)?;
        let test_case_id =
            non_empty_text(record, "FormattedID").ok_or(RecordSkip::MissingId("FormattedID"))?;

        Ok(TestCase {
            test_case_id,
            test_case_name: non_empty_text(record, "Name")
                .unwrap_or_else(|| "Unnamed Test".to_string()),
            tcr_id: text(record, "ObjectID").unwrap_or_else(|| "N/A".to_string()),
            date_time: non_empty_text(record, "LastRun").filter(|d| d != "N/A"),
            verdict: resolve_verdict(record),
            last_build: non_empty_text(record, "LastBuild")
                .unwrap_or_else(|| "Unknown".to_string()),
            duration: text(record, "Duration").unwrap_or_else(|| "N/A".to_string()),
            owner: ref_name(record, "Owner").unwrap_or_else(|| "Unassigned".to_string()),
        })
    }
}

fn resolve_verdict(record: &Map<String, Value>) -> Verdict {
    let nested = record
        .get("LastResult")
        .and_then(Value::as_object)
        .and_then(|last_result| non_empty_text(last_result, "Verdict"));
    let label = nested.or_else(|| non_empty_text(record, "LastVerdict"));
    Verdict::from_label(label.as_deref())
}
