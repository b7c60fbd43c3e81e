//! E2E tests: analytics endpoints backed by the mock Rally server.

use serde_json::json;
use std::sync::Arc;

use super::mock_rally::{MockRally, MockRallyState, sample_test_cases};
use super::test_helpers::*;

const STORY_URI: &str = "/api/v1/analytics/workspaces/111/projects/501/stories/US42";

/// (1) Failure analysis summarizes every page and fills the trend window.
#[actix_rt::test]
async fn test_failure_analysis() {
    let mock = MockRally::start(MockRallyState {
        test_cases: sample_test_cases(4, "2024-05-10T08:00:00.000Z"),
        ..Default::default()
    })
    .await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(
        &app,
        &format!("{}/failure-analysis?anchor=2024-05-10", STORY_URI),
    )
    .await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["story_id"], "US42");
    assert_eq!(body["fetch"]["status"], "ok");
    assert_eq!(body["total_tests"], 4);
    assert_eq!(body["passed"], 2);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["pass_percentage"], 50.0);
    assert_eq!(body["test_cases"].as_array().unwrap().len(), 4);

    let trend = body["failure_trend"].as_object().unwrap();
    assert_eq!(trend.len(), 10);
    assert!(trend.contains_key("2024-05-01"));
    assert_eq!(trend["2024-05-10"]["total"], 4);
    assert_eq!(trend["2024-05-10"]["failed"], 2);
    assert_eq!(trend["2024-05-10"]["failure_rate"], 50.0);
    assert_eq!(
        trend["2024-05-10"]["failure_details"][0]["owner"],
        "QA Bot"
    );
    assert_eq!(trend["2024-05-09"]["total"], 0);
}

/// (2) A custom window and runs outside it.
#[actix_rt::test]
async fn test_failure_analysis_window() {
    let mock = MockRally::start(MockRallyState {
        test_cases: sample_test_cases(2, "2024-04-01T08:00:00.000Z"),
        ..Default::default()
    })
    .await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(
        &app,
        &format!("{}/failure-analysis?anchor=2024-05-10&window_days=3", STORY_URI),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["total_tests"], 2);
    let trend = body["failure_trend"].as_object().unwrap();
    assert_eq!(trend.len(), 3);
    assert!(trend.values().all(|day| day["total"] == 0));

    let (status, body) =
        get_json(&app, &format!("{}/failure-analysis?window_days=0", STORY_URI)).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "INVALID_INPUT");
}

/// (3) A failed fetch still answers 200 with a zeroed, fully shaped payload.
#[actix_rt::test]
async fn test_failed_fetch_is_reported_not_raised() {
    let mock = MockRally::start(MockRallyState {
        test_cases: sample_test_cases(2, "2024-05-10"),
        fail_at_start: Some(1),
        ..Default::default()
    })
    .await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(
        &app,
        &format!("{}/failure-analysis?anchor=2024-05-10", STORY_URI),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["fetch"]["status"], "failed");
    assert!(body["fetch"]["reason"].as_str().unwrap().contains("500"));
    assert_eq!(body["total_tests"], 0);
    assert_eq!(body["pass_percentage"], 0.0);
    assert_eq!(body["failure_trend"].as_object().unwrap().len(), 10);
}

/// (4) Empty results are distinguished from failures.
#[actix_rt::test]
async fn test_empty_story() {
    let mock = MockRally::start(MockRallyState::default()).await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(&app, &format!("{}/failure-analysis", STORY_URI)).await;

    assert_eq!(status, 200);
    assert_eq!(body["fetch"]["status"], "empty");
    assert_eq!(body["total_tests"], 0);
}

/// (5) Root-cause analysis over paged defects.
#[actix_rt::test]
async fn test_project_rca() {
    let mock = MockRally::start(MockRallyState {
        defects: vec![
            json!({"Name": "a", "c_RCARootCauseUS": "Config Error", "Severity": "High", "CreationDate": "2024-03-02T10:00:00Z"}),
            json!({"Name": "b", "Severity": "Low", "CreationDate": "2024-03-09T10:00:00Z"}),
            json!({"Name": "c", "c_RCARootCauseUS": "Config Error", "Severity": "High", "Priority": "P1"}),
        ],
        ..Default::default()
    })
    .await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(&app, "/api/v1/analytics/workspaces/111/projects/501/rca").await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["project_id"], "501");
    assert_eq!(body["total_defects"], 3);
    assert_eq!(body["rca_summary"]["Config Error"], 2);
    assert_eq!(body["rca_summary"]["Unspecified"], 1);
    assert_eq!(body["monthly_trend"]["2024-03"]["Config Error"], 1);
    assert_eq!(body["monthly_trend"]["2024-03"]["Unspecified"], 1);
    assert_eq!(body["monthly_trend"][""]["Config Error"], 1);
    assert_eq!(body["severity_distribution"]["High"], 2);
    assert_eq!(body["priority_distribution"]["None"], 2);
    assert_eq!(body["top_severity"], "High");
    assert_eq!(body["top_priority"], "None");
}

/// (6) Execution history for a story and for a single test case.
#[actix_rt::test]
async fn test_result_history() {
    let mock = MockRally::start(MockRallyState {
        test_cases: sample_test_cases(2, "2024-05-10"),
        results: vec![
            json!({"Date": "2024-05-09T10:00:00Z", "Verdict": "Pass", "Build": "b2", "Tester": {"_refObjectName": "Ada"}}),
            json!({"Date": "2024-05-08T10:00:00Z", "Verdict": "Fail", "Build": "b1"}),
        ],
        ..Default::default()
    })
    .await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(&app, &format!("{}/history", STORY_URI)).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["fetch"]["status"], "ok");
    // Both test cases share the mock's result list
    assert_eq!(body["results"].as_array().unwrap().len(), 4);
    assert_eq!(body["by_date"]["2024-05-08"]["failed"], 2);
    assert_eq!(body["latest_by_test_case"]["TC1"]["build"], "b2");

    let (status, body) =
        get_json(&app, "/api/v1/analytics/workspaces/111/test-cases/TC2/results").await;
    assert_eq!(status, 200);
    assert_eq!(body["results"][0]["test_case_id"], "TC2");
    assert_eq!(body["results"][0]["tester"], "Ada");
    assert_eq!(body["latest_by_test_case"]["TC2"]["status"], "Pass");

    let (status, body) =
        get_json(&app, "/api/v1/analytics/workspaces/111/test-cases/TC77/results").await;
    assert_eq!(status, 200);
    assert_eq!(body["fetch"]["status"], "empty");
}
