//! Analytics orchestration: fetch from the issue tracker, then aggregate.
//!
//! These functions never fail. A fetch error is logged and reported through
//! [`FetchStatus::Failed`] next to a zeroed payload of the usual shape.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::models::{
    ExecutionHistory, FetchStatus, ProjectRcaData, RcaSummary, ResultHistoryData, StoryTestData,
    TestCaseResult,
};
use crate::services::aggregation::{
    compute_failure_trend, compute_rca_summary, compute_result_history, summarize_test_cases,
};
use crate::services::rally::{IssueTracker, RallyError};

/// `Empty` when nothing usable survived normalization.
fn fetch_status(no_usable_records: bool) -> FetchStatus {
    if no_usable_records {
        FetchStatus::Empty
    } else {
        FetchStatus::Ok
    }
}

fn failed(err: &RallyError) -> FetchStatus {
    FetchStatus::Failed {
        reason: err.to_string(),
    }
}

/// Test summary and failure trend for the test cases of a user story.
pub async fn story_failure_analysis(
    tracker: &dyn IssueTracker,
    workspace_id: &str,
    project_id: &str,
    story_id: &str,
    window_days: u32,
    anchor: NaiveDate,
) -> StoryTestData {
    let (records, fetch_error) = match tracker
        .fetch_test_cases(workspace_id, project_id, story_id)
        .await
    {
        Ok(records) => (records, None),
        Err(e) => {
            error!("Failed to fetch test cases for story {}: {}", story_id, e);
            (Vec::new(), Some(failed(&e)))
        }
    };

    let summarized = summarize_test_cases(&records);
    let fetch = fetch_error.unwrap_or_else(|| fetch_status(summarized.test_cases.is_empty()));
    if summarized.skipped > 0 {
        warn!(
            "Skipped {} malformed test case records for story {}",
            summarized.skipped, story_id
        );
    }
    let failure_trend = compute_failure_trend(&summarized.test_cases, window_days, anchor);

    info!(
        "Story {}: {} tests, {} passed, {} failed",
        story_id,
        summarized.summary.total_tests,
        summarized.summary.passed,
        summarized.summary.failed
    );

    StoryTestData {
        story_id: story_id.to_string(),
        fetch,
        summary: summarized.summary,
        test_cases: summarized.test_cases,
        skipped_records: summarized.skipped,
        failure_trend,
    }
}

/// Root-cause analysis over a project's defects.
pub async fn project_rca(
    tracker: &dyn IssueTracker,
    workspace_id: &str,
    project_id: &str,
) -> ProjectRcaData {
    let (rca, fetch) = match tracker.fetch_defects(workspace_id, project_id).await {
        Ok(records) => {
            let rca = compute_rca_summary(&records);
            let status = fetch_status(rca.total_defects == 0);
            (rca, status)
        }
        Err(e) => {
            error!("Failed to fetch defects for project {}: {}", project_id, e);
            (RcaSummary::default(), failed(&e))
        }
    };

    ProjectRcaData {
        project_id: project_id.to_string(),
        fetch,
        top_severity: rca.top_severity().to_string(),
        top_priority: rca.top_priority().to_string(),
        rca,
    }
}

/// Execution history over every result of every test case of a story.
///
/// A test case whose results cannot be fetched is left out; the rest of the
/// story is still reported. When every lookup fails the history is reported
/// as failed with the last error.
pub async fn story_result_history(
    tracker: &dyn IssueTracker,
    workspace_id: &str,
    project_id: &str,
    story_id: &str,
) -> ResultHistoryData {
    let records = match tracker
        .fetch_test_cases(workspace_id, project_id, story_id)
        .await
    {
        Ok(records) => records,
        Err(e) => {
            error!("Failed to fetch test cases for story {}: {}", story_id, e);
            return empty_history(failed(&e));
        }
    };

    let test_cases = summarize_test_cases(&records).test_cases;
    let mut results = Vec::new();
    let mut attempted = 0usize;
    let mut last_error: Option<RallyError> = None;
    let mut failures = 0usize;

    for test_case in &test_cases {
        if test_case.tcr_id == "N/A" {
            continue;
        }
        match tracker
            .fetch_test_case_results(workspace_id, &test_case.tcr_id)
            .await
        {
            Ok(raw) => results.extend(normalize_results(
                &raw,
                &test_case.test_case_id,
                &test_case.test_case_name,
            )),
            Err(e) => {
                warn!(
                    "Failed to fetch results for test case {}: {}",
                    test_case.test_case_id, e
                );
                failures += 1;
                last_error = Some(e);
            }
        }
        attempted += 1;
    }

    if let Some(e) = last_error.filter(|_| failures == attempted) {
        error!(
            "Failed to fetch results for all {} test cases of story {}",
            attempted, story_id
        );
        return empty_history(failed(&e));
    }

    history_from_results(results)
}

/// Execution history of a single test case, looked up by FormattedID.
pub async fn test_case_result_history(
    tracker: &dyn IssueTracker,
    workspace_id: &str,
    test_case_id: &str,
) -> ResultHistoryData {
    let test_case = match tracker.resolve_test_case(workspace_id, test_case_id).await {
        Ok(test_case) => test_case,
        Err(RallyError::NotFound(what)) => {
            warn!("{} not found", what);
            return empty_history(FetchStatus::Empty);
        }
        Err(e) => {
            error!("Failed to look up test case {}: {}", test_case_id, e);
            return empty_history(failed(&e));
        }
    };

    match tracker
        .fetch_test_case_results(workspace_id, &test_case.object_id)
        .await
    {
        Ok(raw) => history_from_results(normalize_results(
            &raw,
            &test_case.formatted_id,
            &test_case.name,
        )),
        Err(e) => {
            error!("Failed to fetch results for test case {}: {}", test_case_id, e);
            empty_history(failed(&e))
        }
    }
}

fn normalize_results(raw: &[Value], test_case_id: &str, name: &str) -> Vec<TestCaseResult> {
    raw.iter()
        .filter_map(|record| TestCaseResult::from_record(record, test_case_id, name).ok())
        .collect()
}

fn history_from_results(results: Vec<TestCaseResult>) -> ResultHistoryData {
    let fetch = if results.is_empty() {
        FetchStatus::Empty
    } else {
        FetchStatus::Ok
    };
    ResultHistoryData {
        fetch,
        history: compute_result_history(&results),
        results,
    }
}

fn empty_history(fetch: FetchStatus) -> ResultHistoryData {
    ResultHistoryData {
        fetch,
        results: Vec::new(),
        history: ExecutionHistory::default(),
    }
}
