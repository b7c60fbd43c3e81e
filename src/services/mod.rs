//! Business logic services.

pub mod agents;
pub mod aggregation;
pub mod analytics;
pub mod llm;
pub mod rally;

pub use llm::{LlmClient, LlmError, OpenAiClient};
pub use rally::{IssueTracker, RallyClient, RallyError};
