//! Shared test helpers for API E2E tests.

use actix_web::{App, dev::ServiceResponse, test, web};
use async_trait::async_trait;
use rally_insights_lib::config::{
    Config, Environment, LlmProviderKind, LlmSettings, RallySettings, defaults,
};
use rally_insights_lib::services::{IssueTracker, LlmClient, LlmError, RallyClient};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use super::mock_rally::VALID_API_KEY;

/// Page size used against the mock so small fixtures span several pages.
pub const TEST_PAGE_SIZE: u32 = 2;

/// Rally settings pointing at `base_url`.
pub fn rally_settings(base_url: &str, api_key: &str) -> RallySettings {
    RallySettings {
        page_size: TEST_PAGE_SIZE,
        timeout_secs: 5,
        ..RallySettings::new(base_url, api_key)
    }
}

/// Rally client for the mock, authenticated with the valid key.
pub fn rally_client(base_url: &str) -> RallyClient {
    RallyClient::new(&rally_settings(base_url, VALID_API_KEY)).expect("failed to build client")
}

/// LLM settings without credentials.
pub fn unconfigured_llm_settings() -> LlmSettings {
    LlmSettings {
        provider: LlmProviderKind::OpenAi,
        api_key: SecretString::from(String::new()),
        base_url: defaults::DEV_OPENAI_BASE_URL.to_string(),
        default_model: defaults::DEV_LLM_MODEL.to_string(),
        azure_endpoint: None,
        azure_deployment: None,
        azure_api_version: defaults::DEV_AZURE_API_VERSION.to_string(),
        timeout_secs: 5,
    }
}

/// Development config pointing Rally at `base_url`.
pub fn test_config(base_url: &str) -> Config {
    Config {
        environment: Environment::Development,
        host: defaults::DEV_HOST.to_string(),
        port: defaults::DEV_PORT,
        static_dir: None,
        rally: rally_settings(base_url, VALID_API_KEY),
        llm: unconfigured_llm_settings(),
    }
}

/// LLM fake that records prompts and answers with a canned completion.
pub struct FakeLlm {
    pub prompts: Mutex<Vec<(String, Option<String>)>>,
    pub reply: String,
}

impl FakeLlm {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        })
    }

    pub fn last_prompt(&self) -> Option<(String, Option<String>)> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), model.map(str::to_string)));
        Ok(self.reply.clone())
    }

    fn default_model(&self) -> &str {
        "gpt-4"
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Create the API app with the given collaborators.
pub async fn create_test_app(
    config: Config,
    tracker: Arc<dyn IssueTracker>,
    llm: Arc<dyn LlmClient>,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let tracker: web::Data<dyn IssueTracker> = web::Data::from(tracker);
    let llm: web::Data<dyn LlmClient> = web::Data::from(llm);

    test::init_service(
        App::new()
            .app_data(web::Data::new(config))
            .app_data(tracker)
            .app_data(llm)
            .service(
                web::scope("/api/v1").configure(rally_insights_lib::api::configure_api_routes),
            ),
    )
    .await
}

/// GET `uri` and return status and JSON body.
pub async fn get_json<S>(app: &S, uri: &str) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::get().uri(uri).to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// POST a JSON body to `uri` and return status and JSON body.
pub async fn post_json<S>(app: &S, uri: &str, body: Value) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri(uri)
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// Build a multipart/form-data body. Each part is (name, filename, bytes).
/// Files named `*.pdf` are sent as `application/pdf`, others as text.
pub fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: {}\r\n\r\n",
                    name,
                    filename,
                    if filename.ends_with(".pdf") {
                        "application/pdf"
                    } else {
                        "text/plain"
                    }
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

/// POST a multipart body to `uri` and return status and JSON body.
pub async fn post_multipart<S>(app: &S, uri: &str, body: Vec<u8>, boundary: &str) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri(uri)
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// Build a one-page PDF showing `text` in Helvetica.
///
/// `text` must not contain parentheses or backslashes.
pub fn single_page_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}
