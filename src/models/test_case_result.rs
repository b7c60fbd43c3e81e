//! Individual test case execution results (Rally `TestCaseResult`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::record::{as_record, non_empty_text, ref_name};
use super::test_case::{NO_RUN, RecordSkip, Verdict};

/// One execution of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub test_case_name: String,
    pub build: String,
    /// Execution timestamp, or "N/A"
    pub date: String,
    #[schema(value_type = String)]
    pub verdict: Verdict,
    pub work_product: String,
    pub tester: String,
}

impl TestCaseResult {
    /// Normalize a raw Rally result record for the given test case.
    pub fn from_record(
        value: &Value,
        test_case_id: &str,
        test_case_name: &str,
    ) -> Result<Self, RecordSkip> {
        let record = as_record(value).ok_or(RecordSkip::NotAnObject)?;

        Ok(TestCaseResult {
            test_case_id: test_case_id.to_string(),
            test_case_name: test_case_name.to_string(),
            build: non_empty_text(record, "Build").unwrap_or_else(|| "N/A".to_string()),
            date: non_empty_text(record, "Date").unwrap_or_else(|| "N/A".to_string()),
            verdict: Verdict::from_label(Some(
                non_empty_text(record, "Verdict")
                    .as_deref()
                    .unwrap_or(NO_RUN),
            )),
            work_product: ref_name(record, "WorkProduct").unwrap_or_else(|| "N/A".to_string()),
            tester: ref_name(record, "Tester").unwrap_or_else(|| "N/A".to_string()),
        })
    }

    /// Whether the result carries a usable execution date.
    pub fn has_date(&self) -> bool {
        self.date != "N/A"
    }
}
