//! Generation agents: document → user story, story → code, story → test cases.
//!
//! Each agent renders a prompt template and makes a single completion call.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    AgentKind, ConnectionTestResult, GenerateCodeRequest, GenerateTestCasesRequest,
    GenerationResponse,
};
use crate::services::llm::LlmClient;

/// Language used when a code request names none.
pub const DEFAULT_CODE_LANGUAGE: &str = "Python";

/// Largest document accepted for story generation (5 MB).
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

const PDF_MIME: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Prompt sent by the LLM connection test.
pub const CONNECTION_TEST_PROMPT: &str = "Hello, can you confirm this is working?";

pub fn user_story_prompt(document: &str) -> String {
    format!(
        "Generate a user story based on the following document:\n\n{}",
        document
    )
}

pub fn code_prompt(language: &str, story: &str, additional: &str) -> String {
    format!(
        "Generate {} code for the following user story:\n\n{}\n\nAdditional context:\n{}",
        language, story, additional
    )
}

pub fn test_cases_prompt(story: &str, additional: &str) -> String {
    format!(
        "Generate test cases for the following user story:\n\n{}\n\nAdditional context:\n{}",
        story, additional
    )
}

/// Whether an upload is a PDF, by declared content type or magic bytes.
pub fn is_pdf(content_type: Option<&str>, bytes: &[u8]) -> bool {
    content_type.is_some_and(|ct| ct.eq_ignore_ascii_case(PDF_MIME)) || bytes.starts_with(PDF_MAGIC)
}

/// Turn an uploaded document into prompt text.
///
/// PDFs have the text of every page extracted, one page per line block.
/// Anything else must be UTF-8 text; a leading byte-order mark is dropped.
/// This is CPU-bound for PDFs; handlers run it on the blocking pool.
pub fn decode_document(bytes: Vec<u8>, content_type: Option<&str>) -> AppResult<String> {
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "Document exceeds {} bytes",
            MAX_DOCUMENT_BYTES
        )));
    }

    let text = if is_pdf(content_type, &bytes) {
        extract_pdf_text(&bytes)?
    } else {
        let text = String::from_utf8(bytes).map_err(|_| {
            AppError::InvalidInput("Document must be UTF-8 text or a PDF".to_string())
        })?;
        text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text)
    };

    if text.trim().is_empty() {
        return Err(AppError::InvalidInput("Document is empty".to_string()));
    }
    Ok(text)
}

fn extract_pdf_text(bytes: &[u8]) -> AppResult<String> {
    // pdf-extract panics on some malformed documents instead of erroring
    let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| AppError::InvalidInput("Failed to extract PDF text: malformed document".to_string()))?
        .map_err(|e| AppError::InvalidInput(format!("Failed to extract PDF text: {}", e)))?;

    // Pages are separated by form feeds
    let pages: Vec<&str> = extracted
        .split('\x0c')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect();
    info!("Extracted text from {} PDF pages", pages.len());
    Ok(pages.join("\n"))
}

fn require_story(story: &str) -> AppResult<()> {
    if story.trim().is_empty() {
        return Err(AppError::InvalidInput("story must not be empty".to_string()));
    }
    Ok(())
}

fn resolved_model(llm: &dyn LlmClient, requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| llm.default_model())
        .to_string()
}

/// Product owner agent: draft a user story from document text.
pub async fn generate_user_story(
    llm: &dyn LlmClient,
    document: &str,
    model: Option<&str>,
) -> AppResult<GenerationResponse> {
    let model = resolved_model(llm, model);
    let content = llm
        .complete(&user_story_prompt(document), Some(&model))
        .await?;

    info!("Generated user story ({} chars, model={})", content.len(), model);
    Ok(GenerationResponse {
        agent: AgentKind::ProductOwner,
        model,
        format: "markdown".to_string(),
        content,
    })
}

/// Developer agent: generate code for a user story.
pub async fn generate_code(
    llm: &dyn LlmClient,
    request: &GenerateCodeRequest,
) -> AppResult<GenerationResponse> {
    require_story(&request.story)?;
    let language = request
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_CODE_LANGUAGE);
    let model = resolved_model(llm, request.model.as_deref());

    let content = llm
        .complete(
            &code_prompt(language, &request.story, &request.prompt),
            Some(&model),
        )
        .await?;

    info!("Generated {} code (model={})", language, model);
    Ok(GenerationResponse {
        agent: AgentKind::Developer,
        model,
        format: language.to_lowercase(),
        content,
    })
}

/// Test manager agent: generate test cases for a user story.
pub async fn generate_test_cases(
    llm: &dyn LlmClient,
    request: &GenerateTestCasesRequest,
) -> AppResult<GenerationResponse> {
    require_story(&request.story)?;
    let model = resolved_model(llm, request.model.as_deref());

    let content = llm
        .complete(
            &test_cases_prompt(&request.story, &request.prompt),
            Some(&model),
        )
        .await?;

    info!("Generated test cases (model={})", model);
    Ok(GenerationResponse {
        agent: AgentKind::TestManager,
        model,
        format: "markdown".to_string(),
        content,
    })
}

/// Check that the completion service answers a short prompt.
///
/// Never fails: configuration, transport and upstream errors become an
/// unsuccessful result.
pub async fn test_llm_connection(llm: &dyn LlmClient) -> ConnectionTestResult {
    let model = llm.default_model().to_string();
    match llm.complete(CONNECTION_TEST_PROMPT, Some(&model)).await {
        Ok(reply) => ConnectionTestResult {
            success: true,
            message: format!(
                "Successfully connected to the LLM service (model {}). Response: {}",
                model,
                reply.trim()
            ),
        },
        Err(e) => {
            warn!("LLM connection test failed (model {}): {}", model, e);
            ConnectionTestResult {
                success: false,
                message: format!("Failed to connect to the LLM service: {}", e),
            }
        }
    }
}
