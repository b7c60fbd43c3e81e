//! Rally Web Services API (WSAPI v2.0) client.
//!
//! Rally answers every query with a `QueryResult` envelope carrying a page of
//! `Results`, the `TotalResultCount` and any query `Errors`. Large queries are
//! paged with 1-based `start` indexes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::RallySettings;
use crate::models::record::{as_record, non_empty_text, text};
use crate::models::{ConnectionTestResult, Project, UserStory, Workspace};

/// Header carrying the Rally API key.
pub const API_KEY_HEADER: &str = "zsessionid";

/// HTTP connect timeout for Rally requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for the workspace, project and story listings.
const LISTING_PAGE_SIZE: u32 = 100;

const TEST_CASE_FETCH: &str = "FormattedID,Name,LastVerdict,LastRun,ObjectID,Type,Duration,\
    Method,Priority,Owner,TestCaseStatus,LastBuild,LastResult,LastResultDate,LastUpdateDate";
const DEFECT_FETCH: &str = "ObjectID,FormattedID,Name,State,Priority,Severity,c_RCARootCauseUS,CreationDate";
const RESULT_FETCH: &str = "Build,Date,Verdict,TestCase,WorkProduct,Tester";
const STORY_FETCH: &str = "Name,Description,FormattedID,ObjectID,PlanEstimate,Owner,Tags";

/// Errors talking to Rally.
#[derive(Debug, thiserror::Error)]
pub enum RallyError {
    #[error("Rally endpoint and API key are not configured")]
    NotConfigured,

    #[error("Rally request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rally returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected Rally response: {0}")]
    Decode(String),

    #[error("Rally rejected the query: {}", .0.join("; "))]
    Api(Vec<String>),

    #[error("Invalid Rally URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    NotFound(String),
}

/// A test case resolved from its FormattedID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseRef {
    pub formatted_id: String,
    pub object_id: String,
    pub name: String,
}

/// Read access to Rally plus story creation.
///
/// Record-returning methods hand back raw JSON records; normalization happens
/// in the aggregation pipeline.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Whether an endpoint and API key are configured.
    fn is_configured(&self) -> bool;

    async fn workspaces(&self) -> Result<Vec<Workspace>, RallyError>;

    async fn projects(&self, workspace_id: &str) -> Result<Vec<Project>, RallyError>;

    async fn user_stories(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Vec<UserStory>, RallyError>;

    /// Create a user story and return its FormattedID.
    async fn create_story(
        &self,
        project_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String, RallyError>;

    /// Every test case attached to a user story, across all pages.
    async fn fetch_test_cases(
        &self,
        workspace_id: &str,
        project_id: &str,
        story_id: &str,
    ) -> Result<Vec<Value>, RallyError>;

    /// Every defect of a project, newest first, across all pages.
    async fn fetch_defects(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Vec<Value>, RallyError>;

    /// Look up a test case by FormattedID.
    async fn resolve_test_case(
        &self,
        workspace_id: &str,
        test_case_id: &str,
    ) -> Result<TestCaseRef, RallyError>;

    /// Every stored execution result of a test case, newest first.
    async fn fetch_test_case_results(
        &self,
        workspace_id: &str,
        test_case_object_id: &str,
    ) -> Result<Vec<Value>, RallyError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryEnvelope {
    query_result: QueryResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryResult {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    total_result_count: u64,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl QueryResult {
    fn into_results(self) -> Result<Vec<Value>, RallyError> {
        if !self.errors.is_empty() {
            return Err(RallyError::Api(self.errors));
        }
        for warning in &self.warnings {
            debug!("Rally query warning: {}", warning);
        }
        Ok(self.results)
    }
}

/// Rally WSAPI client backed by reqwest.
#[derive(Clone)]
pub struct RallyClient {
    base_url: String,
    api_key: SecretString,
    page_size: u32,
    configured: bool,
    http_client: reqwest::Client,
}

impl RallyClient {
    /// Create a client from settings. An unconfigured client is valid; every
    /// call on it fails with [`RallyError::NotConfigured`].
    pub fn new(settings: &RallySettings) -> Result<Self, RallyError> {
        if !settings.verify_tls {
            warn!("TLS certificate verification is disabled for Rally requests");
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;

        Ok(Self {
            base_url: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            page_size: settings.page_size.max(1),
            configured: settings.is_configured(),
            http_client,
        })
    }

    /// Check that the endpoint and key are accepted by Rally.
    ///
    /// Never fails: transport and HTTP errors become an unsuccessful result.
    pub async fn test_connection(&self) -> ConnectionTestResult {
        let outcome = async {
            let url = self.url("subscription", &[])?;
            Ok::<_, RallyError>(self.authorized(self.http_client.get(url)).send().await?)
        }
        .await;

        match outcome {
            Ok(response) if response.status().is_success() => ConnectionTestResult {
                success: true,
                message: "Successfully connected to Rally".to_string(),
            },
            Ok(response) => ConnectionTestResult {
                success: false,
                message: format!(
                    "Failed to connect. Status code: {}",
                    response.status().as_u16()
                ),
            },
            Err(e) => ConnectionTestResult {
                success: false,
                message: format!("Connection error: {}", e),
            },
        }
    }

    fn ensure_configured(&self) -> Result<(), RallyError> {
        if self.configured {
            Ok(())
        } else {
            Err(RallyError::NotConfigured)
        }
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, RallyError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|e| RallyError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, RallyError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RallyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RallyError::Decode(e.to_string()))
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, RallyError> {
        let url = self.url(path, params)?;
        debug!("Rally GET {}", url);
        self.send_json(self.http_client.get(url)).await
    }

    async fn query_page(
        &self,
        object_type: &str,
        params: &[(&str, String)],
    ) -> Result<QueryResult, RallyError> {
        let body = self.get_json(object_type, params).await?;
        let envelope: QueryEnvelope =
            serde_json::from_value(body).map_err(|e| RallyError::Decode(e.to_string()))?;
        Ok(envelope.query_result)
    }

    /// Single-page query returning the results.
    async fn query(
        &self,
        object_type: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Value>, RallyError> {
        self.query_page(object_type, params).await?.into_results()
    }

    /// Fetch every page of a query.
    ///
    /// Stops once `TotalResultCount` records are accumulated or a page comes
    /// back empty. A failure after the first page keeps what was fetched.
    async fn query_all(
        &self,
        object_type: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Value>, RallyError> {
        let mut records: Vec<Value> = Vec::new();
        let mut start: u64 = 1;
        let page_size = self.page_size;

        loop {
            let mut page_params = params.to_vec();
            page_params.push(("pagesize", page_size.to_string()));
            page_params.push(("start", start.to_string()));

            let page = self
                .query_page(object_type, &page_params)
                .await
                .and_then(|result| {
                    let total = result.total_result_count;
                    result.into_results().map(|results| (results, total))
                });

            let (results, total) = match page {
                Ok(page) => page,
                Err(e) if start == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        "Rally {} query failed at start={}, keeping {} records: {}",
                        object_type,
                        start,
                        records.len(),
                        e
                    );
                    break;
                }
            };

            debug!(
                "Rally {} page start={} returned {} of {} records",
                object_type,
                start,
                results.len(),
                total
            );

            if results.is_empty() {
                break;
            }
            records.extend(results);
            if records.len() as u64 >= total {
                break;
            }
            start += u64::from(page_size);
        }

        Ok(records)
    }
}

fn workspace_ref(workspace_id: &str) -> String {
    format!("/workspace/{}", workspace_id)
}

fn project_ref(project_id: &str) -> String {
    format!("/project/{}", project_id)
}

#[async_trait]
impl IssueTracker for RallyClient {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn workspaces(&self) -> Result<Vec<Workspace>, RallyError> {
        self.ensure_configured()?;
        let records = self
            .query(
                "workspace",
                &[
                    ("fetch", "Name,ObjectID,Description".to_string()),
                    ("pagesize", LISTING_PAGE_SIZE.to_string()),
                ],
            )
            .await?;

        let workspaces: Vec<Workspace> = records.iter().filter_map(Workspace::from_record).collect();
        info!("Loaded {} Rally workspaces", workspaces.len());
        Ok(workspaces)
    }

    async fn projects(&self, workspace_id: &str) -> Result<Vec<Project>, RallyError> {
        self.ensure_configured()?;

        let body = self
            .get_json(&format!("workspace/{}", workspace_id), &[])
            .await?;
        let reference = body
            .get("Workspace")
            .and_then(as_record)
            .and_then(|workspace| text(workspace, "_ref"))
            .ok_or_else(|| RallyError::NotFound(format!("Workspace {}", workspace_id)))?;

        let records = self
            .query(
                "project",
                &[
                    ("workspace", reference),
                    ("fetch", "Name,ObjectID,Description".to_string()),
                    ("pagesize", LISTING_PAGE_SIZE.to_string()),
                ],
            )
            .await?;

        let projects: Vec<Project> = records.iter().filter_map(Project::from_record).collect();
        info!(
            "Loaded {} Rally projects for workspace {}",
            projects.len(),
            workspace_id
        );
        Ok(projects)
    }

    async fn user_stories(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Vec<UserStory>, RallyError> {
        self.ensure_configured()?;
        let records = self
            .query(
                "hierarchicalrequirement",
                &[
                    ("workspace", workspace_ref(workspace_id)),
                    ("project", project_ref(project_id)),
                    ("fetch", STORY_FETCH.to_string()),
                    ("pagesize", LISTING_PAGE_SIZE.to_string()),
                    ("order", "CreationDate DESC".to_string()),
                ],
            )
            .await?;

        Ok(records.iter().filter_map(UserStory::from_record).collect())
    }

    async fn create_story(
        &self,
        project_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String, RallyError> {
        self.ensure_configured()?;
        let url = self.url("hierarchicalrequirement/create", &[])?;
        let payload = json!({
            "HierarchicalRequirement": {
                "Name": name,
                "Description": description,
                "Project": project_ref(project_id),
            }
        });

        let body = self
            .send_json(self.http_client.post(url).json(&payload))
            .await?;
        let result = body
            .get("CreateResult")
            .and_then(as_record)
            .ok_or_else(|| RallyError::Decode("missing CreateResult".to_string()))?;

        let errors: Vec<String> = result
            .get("Errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if !errors.is_empty() {
            return Err(RallyError::Api(errors));
        }

        let formatted_id = result
            .get("Object")
            .and_then(as_record)
            .and_then(|object| non_empty_text(object, "FormattedID"))
            .unwrap_or_else(|| "Unknown".to_string());

        info!("Created Rally story {} in project {}", formatted_id, project_id);
        Ok(formatted_id)
    }

    async fn fetch_test_cases(
        &self,
        workspace_id: &str,
        project_id: &str,
        story_id: &str,
    ) -> Result<Vec<Value>, RallyError> {
        self.ensure_configured()?;
        let records = self
            .query_all(
                "testcase",
                &[
                    ("workspace", workspace_ref(workspace_id)),
                    ("project", project_ref(project_id)),
                    ("query", format!("(WorkProduct.FormattedID = \"{}\")", story_id)),
                    ("fetch", TEST_CASE_FETCH.to_string()),
                    ("order", "FormattedID ASC".to_string()),
                ],
            )
            .await?;

        info!("Fetched {} test cases for story {}", records.len(), story_id);
        Ok(records)
    }

    async fn fetch_defects(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Vec<Value>, RallyError> {
        self.ensure_configured()?;
        let records = self
            .query_all(
                "defect",
                &[
                    ("workspace", workspace_ref(workspace_id)),
                    ("query", format!("(Project.ObjectID = {})", project_id)),
                    ("fetch", DEFECT_FETCH.to_string()),
                    ("order", "CreationDate DESC".to_string()),
                ],
            )
            .await?;

        info!("Fetched {} defects for project {}", records.len(), project_id);
        Ok(records)
    }

    async fn resolve_test_case(
        &self,
        workspace_id: &str,
        test_case_id: &str,
    ) -> Result<TestCaseRef, RallyError> {
        self.ensure_configured()?;
        let records = self
            .query(
                "testcase",
                &[
                    ("workspace", workspace_ref(workspace_id)),
                    ("query", format!("(FormattedID = {})", test_case_id)),
                    ("fetch", "ObjectID,FormattedID,Name".to_string()),
                ],
            )
            .await?;

        records
            .iter()
            .filter_map(as_record)
            .find_map(|record| {
                Some(TestCaseRef {
                    formatted_id: non_empty_text(record, "FormattedID")
                        .unwrap_or_else(|| test_case_id.to_string()),
                    object_id: non_empty_text(record, "ObjectID")?,
                    name: non_empty_text(record, "Name").unwrap_or_else(|| "N/A".to_string()),
                })
            })
            .ok_or_else(|| RallyError::NotFound(format!("Test case {}", test_case_id)))
    }

    async fn fetch_test_case_results(
        &self,
        workspace_id: &str,
        test_case_object_id: &str,
    ) -> Result<Vec<Value>, RallyError> {
        self.ensure_configured()?;
        self.query_all(
            "testcaseresult",
            &[
                ("workspace", workspace_ref(workspace_id)),
                ("query", format!("(TestCase.ObjectID = {})", test_case_object_id)),
                ("fetch", RESULT_FETCH.to_string()),
                ("order", "Date DESC".to_string()),
            ],
        )
        .await
    }
}
