//! Rally browsing and story upload endpoints.

use actix_web::{HttpResponse, get, post, web};
use tracing::info;

use crate::config::{Config, RallySettings};
use crate::error::{AppError, AppResult};
use crate::models::rally::story_name_from_text;
use crate::models::{
    ConnectionTestRequest, ConnectionTestResult, CreateStoryRequest, CreatedStory, Project,
    UserStory, Workspace,
};
use crate::services::{IssueTracker, RallyClient};

/// Configure Rally routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(connection_test)
        .service(list_workspaces)
        .service(list_projects)
        .service(list_stories)
        .service(create_story);
}

/// Test an endpoint and API key pair.
///
/// Upstream failures are reported in the body with `success: false`.
#[utoipa::path(
    post,
    path = "/api/v1/rally/connection-test",
    tag = "Rally",
    request_body = ConnectionTestRequest,
    responses(
        (status = 200, description = "Connection test outcome", body = ConnectionTestResult),
        (status = 400, description = "Endpoint or API key missing", body = crate::error::ErrorResponse)
    )
)]
#[post("/rally/connection-test")]
pub async fn connection_test(
    config: web::Data<Config>,
    body: web::Json<ConnectionTestRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let settings = RallySettings {
        verify_tls: config.rally.verify_tls,
        timeout_secs: config.rally.timeout_secs,
        ..RallySettings::new(&request.endpoint, &request.api_key)
    };
    if !settings.is_configured() {
        return Err(AppError::InvalidInput(
            "endpoint and api_key are required".to_string(),
        ));
    }

    let client = RallyClient::new(&settings)?;
    let result = client.test_connection().await;
    info!(
        "Rally connection test against {}: success={}",
        settings.endpoint, result.success
    );

    Ok(HttpResponse::Ok().json(result))
}

/// List workspaces visible to the configured API key.
#[utoipa::path(
    get,
    path = "/api/v1/rally/workspaces",
    tag = "Rally",
    responses(
        (status = 200, description = "Workspaces", body = Vec<Workspace>),
        (status = 502, description = "Rally request failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Rally not configured", body = crate::error::ErrorResponse)
    )
)]
#[get("/rally/workspaces")]
pub async fn list_workspaces(tracker: web::Data<dyn IssueTracker>) -> AppResult<HttpResponse> {
    let workspaces = tracker.workspaces().await?;
    Ok(HttpResponse::Ok().json(workspaces))
}

/// List projects of a workspace.
#[utoipa::path(
    get,
    path = "/api/v1/rally/workspaces/{workspace_id}/projects",
    tag = "Rally",
    params(
        ("workspace_id" = String, Path, description = "Workspace ObjectID")
    ),
    responses(
        (status = 200, description = "Projects", body = Vec<Project>),
        (status = 404, description = "Workspace not found", body = crate::error::ErrorResponse),
        (status = 502, description = "Rally request failed", body = crate::error::ErrorResponse)
    )
)]
#[get("/rally/workspaces/{workspace_id}/projects")]
pub async fn list_projects(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let projects = tracker.projects(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// List user stories of a project, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/rally/workspaces/{workspace_id}/projects/{project_id}/stories",
    tag = "Rally",
    params(
        ("workspace_id" = String, Path, description = "Workspace ObjectID"),
        ("project_id" = String, Path, description = "Project ObjectID")
    ),
    responses(
        (status = 200, description = "User stories", body = Vec<UserStory>),
        (status = 502, description = "Rally request failed", body = crate::error::ErrorResponse)
    )
)]
#[get("/rally/workspaces/{workspace_id}/projects/{project_id}/stories")]
pub async fn list_stories(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (workspace_id, project_id) = path.into_inner();
    let stories = tracker.user_stories(&workspace_id, &project_id).await?;
    Ok(HttpResponse::Ok().json(stories))
}

/// Upload a generated user story to a project.
///
/// The first line of the story (cut to 60 characters) becomes its name.
#[utoipa::path(
    post,
    path = "/api/v1/rally/projects/{project_id}/stories",
    tag = "Rally",
    params(
        ("project_id" = String, Path, description = "Project ObjectID")
    ),
    request_body = CreateStoryRequest,
    responses(
        (status = 201, description = "Story created", body = CreatedStory),
        (status = 400, description = "Empty story", body = crate::error::ErrorResponse),
        (status = 502, description = "Rally request failed", body = crate::error::ErrorResponse)
    )
)]
#[post("/rally/projects/{project_id}/stories")]
pub async fn create_story(
    tracker: web::Data<dyn IssueTracker>,
    path: web::Path<String>,
    body: web::Json<CreateStoryRequest>,
) -> AppResult<HttpResponse> {
    let project_id = path.into_inner();
    let story = body.into_inner().story;
    let name = story_name_from_text(&story);
    if name.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "story must start with a non-empty line".to_string(),
        ));
    }

    let formatted_id = tracker.create_story(&project_id, &name, &story).await?;

    Ok(HttpResponse::Created().json(CreatedStory {
        message: format!("User story {} created successfully", formatted_id),
        formatted_id,
        name,
    }))
}
