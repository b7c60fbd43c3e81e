//! Health check endpoints.

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;
use crate::services::{IssueTracker, LlmClient};

/// Health check response.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

/// Readiness check response.
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// "ready" when both collaborators are configured, otherwise "degraded"
    status: &'static str,
    rally: &'static str,
    llm: &'static str,
}

/// Server information response.
#[derive(Serialize, ToSchema)]
pub struct ServerInfoResponse {
    version: &'static str,
    environment: String,
    llm_provider: String,
    default_model: String,
}

fn configured_label(configured: bool) -> &'static str {
    if configured {
        "configured"
    } else {
        "not_configured"
    }
}

/// Health check endpoint.
///
/// Returns 200 if the service is running.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check endpoint.
///
/// Always 200; reports which collaborators still need credentials. The
/// dashboard can connect to Rally at runtime, so missing configuration is
/// not fatal.
#[utoipa::path(
    get,
    path = "/api/v1/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Collaborator configuration status", body = ReadyResponse)
    )
)]
#[get("/ready")]
pub async fn ready(
    tracker: web::Data<dyn IssueTracker>,
    llm: web::Data<dyn LlmClient>,
) -> HttpResponse {
    let rally_ok = tracker.is_configured();
    let llm_ok = llm.is_configured();

    HttpResponse::Ok().json(ReadyResponse {
        status: if rally_ok && llm_ok { "ready" } else { "degraded" },
        rally: configured_label(rally_ok),
        llm: configured_label(llm_ok),
    })
}

/// Server information endpoint.
#[utoipa::path(
    get,
    path = "/api/v1/info",
    tag = "Health",
    responses(
        (status = 200, description = "Server version and LLM defaults", body = ServerInfoResponse)
    )
)]
#[get("/info")]
pub async fn info(config: web::Data<Config>) -> HttpResponse {
    HttpResponse::Ok().json(ServerInfoResponse {
        version: env!("CARGO_PKG_VERSION"),
        environment: config.environment.to_string(),
        llm_provider: config.llm.provider.to_string(),
        default_model: config.llm.default_model.clone(),
    })
}

/// Configure health routes.
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready).service(info);
}
