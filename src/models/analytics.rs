//! Derived analytics: test summaries, failure trends, root-cause breakdowns.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::defect::{Defect, NONE_LABEL};
use super::test_case::TestCase;

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

/// Pass/fail counts over a set of test cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestSummary {
    pub total_tests: u64,
    pub passed: u64,
    pub failed: u64,
    pub other: u64,
    pub pass_percentage: f64,
    pub fail_percentage: f64,
}

impl TestSummary {
    /// Build a summary from final counts; the total is their sum.
    pub fn from_counts(passed: u64, failed: u64, other: u64) -> Self {
        let total_tests = passed + failed + other;
        TestSummary {
            total_tests,
            passed,
            failed,
            other,
            pass_percentage: percentage(passed, total_tests),
            fail_percentage: percentage(failed, total_tests),
        }
    }
}

/// A failed test case as listed under a trend date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailureDetail {
    pub test_case_id: String,
    pub test_case_name: String,
    pub build: String,
    pub execution_time: String,
    pub owner: String,
}

impl From<&TestCase> for FailureDetail {
    fn from(tc: &TestCase) -> Self {
        FailureDetail {
            test_case_id: tc.test_case_id.clone(),
            test_case_name: tc.test_case_name.clone(),
            build: tc.last_build.clone(),
            execution_time: tc.duration.clone(),
            owner: tc.owner.clone(),
        }
    }
}

/// Test activity on a single calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FailureTrendEntry {
    pub total: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub failure_details: Vec<FailureDetail>,
}

/// Failure trend keyed by date; iteration is in ascending date order.
pub type FailureTrend = BTreeMap<NaiveDate, FailureTrendEntry>;

/// Root-cause analysis over a project's defects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RcaSummary {
    pub total_defects: u64,
    pub defects: Vec<Defect>,
    /// Root cause → defect count
    pub rca_summary: BTreeMap<String, u64>,
    /// `YYYY-MM` → root cause → defect count
    pub monthly_trend: BTreeMap<String, BTreeMap<String, u64>>,
    pub severity_distribution: BTreeMap<String, u64>,
    pub priority_distribution: BTreeMap<String, u64>,
    pub state_distribution: BTreeMap<String, u64>,
}

impl RcaSummary {
    /// Most frequent severity ("None" when there are no defects).
    pub fn top_severity(&self) -> &str {
        most_frequent(&self.severity_distribution)
    }

    /// Most frequent priority ("None" when there are no defects).
    pub fn top_priority(&self) -> &str {
        most_frequent(&self.priority_distribution)
    }
}

/// Label with the highest count; ties go to the label that sorts first.
pub fn most_frequent(distribution: &BTreeMap<String, u64>) -> &str {
    distribution
        .iter()
        .fold(None::<(&String, u64)>, |best, (label, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((label, count)),
        })
        .map(|(label, _)| label.as_str())
        .unwrap_or(NONE_LABEL)
}

/// Executions and failures on a single date across all results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyExecutionCount {
    pub total: u64,
    pub failed: u64,
}

/// Most recent known status of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LatestStatus {
    pub date: String,
    pub status: String,
    pub build: String,
}

/// Execution history over every stored result of a set of test cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionHistory {
    /// Date (`YYYY-MM-DD`) → executions that day
    pub by_date: BTreeMap<String, DailyExecutionCount>,
    /// Test case id → newest result
    pub latest_by_test_case: BTreeMap<String, LatestStatus>,
}

/// Outcome of the fetch that fed an analytics response.
///
/// Lets the dashboard tell "nothing to show" apart from "Rally failed" while
/// still receiving a zeroed payload in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    /// Records were fetched and aggregated
    Ok,
    /// The query succeeded but returned no usable records
    Empty,
    /// The query failed; data is zeroed
    Failed { reason: String },
}

/// Query parameters of the failure-analysis endpoint.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FailureAnalysisQuery {
    /// Trailing window in days (default: 10, max: 366)
    pub window_days: Option<u32>,
    /// Last day of the window, `YYYY-MM-DD` (default: today)
    #[param(value_type = Option<String>)]
    pub anchor: Option<NaiveDate>,
}

/// Failure-analysis payload for one user story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoryTestData {
    pub story_id: String,
    pub fetch: FetchStatus,
    #[serde(flatten)]
    pub summary: TestSummary,
    pub test_cases: Vec<TestCase>,
    /// Records dropped during normalization
    pub skipped_records: u64,
    #[schema(value_type = Object)]
    pub failure_trend: FailureTrend,
}

/// Root-cause payload for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectRcaData {
    pub project_id: String,
    pub fetch: FetchStatus,
    pub top_severity: String,
    pub top_priority: String,
    #[serde(flatten)]
    pub rca: RcaSummary,
}

/// Execution-history payload for one user story or test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultHistoryData {
    pub fetch: FetchStatus,
    pub results: Vec<super::TestCaseResult>,
    #[serde(flatten)]
    pub history: ExecutionHistory,
}
