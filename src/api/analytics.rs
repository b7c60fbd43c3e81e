//! Test analytics endpoints.
//!
//! Every endpoint answers 200 with a fully shaped payload; the `fetch` field
//! tells whether Rally returned data, returned nothing, or failed.

use actix_web::{HttpResponse, get, web};
use chrono::Local;

use crate::error::{AppError, AppResult};
use crate::models::{FailureAnalysisQuery, ProjectRcaData, ResultHistoryData, StoryTestData};
use crate::services::IssueTracker;
use crate::services::aggregation::DEFAULT_TREND_WINDOW_DAYS;
use crate::services::analytics;

/// Longest failure-trend window accepted.
pub const MAX_TREND_WINDOW_DAYS: u32 = 366;

/// Configure analytics routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(failure_analysis)
        .service(story_history)
        .service(project_rca)
        .service(test_case_results);
}

/// Test summary and daily failure trend for a user story.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/workspaces/{workspace_id}/projects/{project_id}/stories/{story_id}/failure-analysis",
    tag = "Analytics",
    params(
        ("workspace_id" = String, Path, description = "Workspace ObjectID"),
        ("project_id" = String, Path, description = "Project ObjectID"),
        ("story_id" = String, Path, description = "User story FormattedID"),
        FailureAnalysisQuery
    ),
    responses(
        (status = 200, description = "Failure analysis", body = StoryTestData),
        (status = 400, description = "Invalid window", body = crate::error::ErrorResponse)
    )
)]
#[get("/analytics/workspaces/{workspace_id}/projects/{project_id}/stories/{story_id}/failure-analysis")]
pub async fn failure_analysis(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<(String, String, String)>,
    query: web::Query<FailureAnalysisQuery>,
) -> AppResult<HttpResponse> {
    let (workspace_id, project_id, story_id) = path.into_inner();
    let window_days = query.window_days.unwrap_or(DEFAULT_TREND_WINDOW_DAYS);
    if window_days == 0 || window_days > MAX_TREND_WINDOW_DAYS {
        return Err(AppError::InvalidInput(format!(
            "window_days must be between 1 and {}",
            MAX_TREND_WINDOW_DAYS
        )));
    }
    let anchor = query.anchor.unwrap_or_else(|| Local::now().date_naive());

    let data = analytics::story_failure_analysis(
        tracker.get_ref(),
        &workspace_id,
        &project_id,
        &story_id,
        window_days,
        anchor,
    )
    .await;

    Ok(HttpResponse::Ok().json(data))
}

/// Execution history over every result of a story's test cases.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/workspaces/{workspace_id}/projects/{project_id}/stories/{story_id}/history",
    tag = "Analytics",
    params(
        ("workspace_id" = String, Path, description = "Workspace ObjectID"),
        ("project_id" = String, Path, description = "Project ObjectID"),
        ("story_id" = String, Path, description = "User story FormattedID")
    ),
    responses(
        (status = 200, description = "Execution history", body = ResultHistoryData)
    )
)]
#[get("/analytics/workspaces/{workspace_id}/projects/{project_id}/stories/{story_id}/history")]
pub async fn story_history(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<(String, String, String)>,
) -> HttpResponse {
    let (workspace_id, project_id, story_id) = path.into_inner();
    let data =
        analytics::story_result_history(tracker.get_ref(), &workspace_id, &project_id, &story_id)
            .await;
    HttpResponse::Ok().json(data)
}

/// Root-cause analysis over a project's defects.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/workspaces/{workspace_id}/projects/{project_id}/rca",
    tag = "Analytics",
    params(
        ("workspace_id" = String, Path, description = "Workspace ObjectID"),
        ("project_id" = String, Path, description = "Project ObjectID")
    ),
    responses(
        (status = 200, description = "Root-cause analysis", body = ProjectRcaData)
    )
)]
#[get("/analytics/workspaces/{workspace_id}/projects/{project_id}/rca")]
pub async fn project_rca(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (workspace_id, project_id) = path.into_inner();
    let data = analytics::project_rca(tracker.get_ref(), &workspace_id, &project_id).await;
    HttpResponse::Ok().json(data)
}

/// Every stored result of one test case.
#[utoipa::path(
    get,
    path = "/api/v1/analytics/workspaces/{workspace_id}/test-cases/{test_case_id}/results",
    tag = "Analytics",
    params(
        ("workspace_id" = String, Path, description = "Workspace ObjectID"),
        ("test_case_id" = String, Path, description = "Test case FormattedID")
    ),
    responses(
        (status = 200, description = "Execution history", body = ResultHistoryData)
    )
)]
#[get("/analytics/workspaces/{workspace_id}/test-cases/{test_case_id}/results")]
pub async fn test_case_results(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (workspace_id, test_case_id) = path.into_inner();
    let data =
        analytics::test_case_result_history(tracker.get_ref(), &workspace_id, &test_case_id).await;
    HttpResponse::Ok().json(data)
}
