//! Generation agent endpoints.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, post, web};
use futures_util::StreamExt;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{
    ConnectionTestResult, GenerateCodeRequest, GenerateTestCasesRequest, GenerationResponse,
};
use crate::services::LlmClient;
use crate::services::agents::{self, MAX_DOCUMENT_BYTES};

/// Configure agent routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(generate_user_story)
        .service(generate_code)
        .service(generate_test_cases)
        .service(connection_test);
}

/// Read one multipart field, refusing more than `limit` bytes.
async fn read_field(field: &mut actix_multipart::Field, limit: usize) -> AppResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
        if data.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Field exceeds {} bytes",
                limit
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Product owner agent: turn a requirements document into a user story.
///
/// Multipart form with a `file` field (UTF-8 text or PDF) and an optional
/// `model`.
#[utoipa::path(
    post,
    path = "/api/v1/agents/user-story",
    tag = "Agents",
    request_body(content_type = "multipart/form-data", description = "`file`: text or PDF document, `model`: optional model name"),
    responses(
        (status = 200, description = "Generated user story", body = GenerationResponse),
        (status = 400, description = "Missing, unreadable or empty document", body = crate::error::ErrorResponse),
        (status = 413, description = "Document too large", body = crate::error::ErrorResponse),
        (status = 502, description = "Completion failed", body = crate::error::ErrorResponse),
        (status = 503, description = "LLM not configured", body = crate::error::ErrorResponse)
    )
)]
#[post("/agents/user-story")]
pub async fn generate_user_story(
    llm: web::Data<dyn LlmClient>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut document: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut model: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::InvalidInput("Missing content disposition".to_string()))?;
        let field_name = content_disposition.get_name().map(str::to_string);
        let field_file_name = content_disposition.get_filename().map(str::to_string);

        match field_name.as_deref() {
            Some("file") => {
                content_type = field.content_type().map(|mime| mime.essence_str().to_string());
                document = Some(read_field(&mut field, MAX_DOCUMENT_BYTES).await?);
                file_name = field_file_name;
            }
            Some("model") => {
                let value = String::from_utf8(read_field(&mut field, 256).await?)
                    .map_err(|_| AppError::InvalidInput("model must be UTF-8".to_string()))?;
                let value = value.trim().to_string();
                if !value.is_empty() {
                    model = Some(value);
                }
            }
            _ => {
                // Drain unknown fields
                read_field(&mut field, MAX_DOCUMENT_BYTES).await?;
            }
        }
    }

    let bytes =
        document.ok_or_else(|| AppError::InvalidInput("Missing 'file' field".to_string()))?;
    let declared_type = content_type.clone();
    let text = web::block(move || agents::decode_document(bytes, declared_type.as_deref()))
        .await
        .map_err(|e| AppError::Internal(format!("Document decoding did not complete: {}", e)))??;
    info!(
        "Generating user story from document {} ({}, {} chars)",
        file_name.as_deref().unwrap_or("<unnamed>"),
        content_type.as_deref().unwrap_or("unknown type"),
        text.len()
    );

    let response = agents::generate_user_story(llm.get_ref(), &text, model.as_deref()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Developer agent: generate code for a user story.
#[utoipa::path(
    post,
    path = "/api/v1/agents/code",
    tag = "Agents",
    request_body = GenerateCodeRequest,
    responses(
        (status = 200, description = "Generated code", body = GenerationResponse),
        (status = 400, description = "Empty story", body = crate::error::ErrorResponse),
        (status = 502, description = "Completion failed", body = crate::error::ErrorResponse)
    )
)]
#[post("/agents/code")]
pub async fn generate_code(
    llm: web::Data<dyn LlmClient>,
    body: web::Json<GenerateCodeRequest>,
) -> AppResult<HttpResponse> {
    let response = agents::generate_code(llm.get_ref(), &body).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Test manager agent: generate test cases for a user story.
#[utoipa::path(
    post,
    path = "/api/v1/agents/test-cases",
    tag = "Agents",
    request_body = GenerateTestCasesRequest,
    responses(
        (status = 200, description = "Generated test cases", body = GenerationResponse),
        (status = 400, description = "Empty story", body = crate::error::ErrorResponse),
        (status = 502, description = "Completion failed", body = crate::error::ErrorResponse)
    )
)]
#[post("/agents/test-cases")]
pub async fn generate_test_cases(
    llm: web::Data<dyn LlmClient>,
    body: web::Json<GenerateTestCasesRequest>,
) -> AppResult<HttpResponse> {
    let response = agents::generate_test_cases(llm.get_ref(), &body).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Check that the configured completion service answers.
///
/// Sends one short prompt with the default model. Failures are reported in
/// the body, never as 5xx.
#[utoipa::path(
    post,
    path = "/api/v1/agents/connection-test",
    tag = "Agents",
    responses(
        (status = 200, description = "Connection test outcome", body = ConnectionTestResult)
    )
)]
#[post("/agents/connection-test")]
pub async fn connection_test(llm: web::Data<dyn LlmClient>) -> HttpResponse {
    let result = agents::test_llm_connection(llm.get_ref()).await;
    info!("LLM connection test: success={}", result.success);
    HttpResponse::Ok().json(result)
}
