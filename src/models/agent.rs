//! Request and response bodies for the generation agents.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to generate code for a user story.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateCodeRequest {
    /// User story description
    pub story: String,
    /// Target language (default: Python)
    pub language: Option<String>,
    /// Additional requirements
    #[serde(default)]
    pub prompt: String,
    /// Model override
    pub model: Option<String>,
}

/// Request to generate test cases for a user story.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateTestCasesRequest {
    /// User story description
    pub story: String,
    /// Additional test requirements
    #[serde(default)]
    pub prompt: String,
    /// Model override
    pub model: Option<String>,
}

/// Which agent produced a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    ProductOwner,
    Developer,
    TestManager,
}

/// Text produced by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationResponse {
    pub agent: AgentKind,
    pub model: String,
    /// Language hint for rendering (e.g. "markdown", "python")
    pub format: String,
    pub content: String,
}
