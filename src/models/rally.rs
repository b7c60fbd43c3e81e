//! Rally workspace, project and user story models.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::record::{as_record, non_empty_text, text};

/// Maximum length of a story name derived from generated text.
pub const STORY_NAME_MAX_CHARS: usize = 60;

/// A Rally workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

impl Workspace {
    /// Workspaces without both an ObjectID and a Name are not selectable.
    pub fn from_record(value: &Value) -> Option<Self> {
        let record = as_record(value)?;
        Some(Workspace {
            id: non_empty_text(record, "ObjectID")?,
            name: non_empty_text(record, "Name")?,
        })
    }
}

/// A Rally project inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: String,
    pub name: String,
}

impl Project {
    /// The id falls back to the last path segment of `_ref`.
    pub fn from_record(value: &Value) -> Option<Self> {
        let record = as_record(value)?;
        let id = non_empty_text(record, "ObjectID").or_else(|| {
            text(record, "_ref").and_then(|r| {
                r.rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
        })?;
        Some(Project {
            id,
            name: non_empty_text(record, "Name").unwrap_or_else(|| "Unknown Project".to_string()),
        })
    }
}

/// A Rally user story (HierarchicalRequirement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserStory {
    /// FormattedID (e.g. "US1234"); used as the story key everywhere
    pub id: String,
    pub name: String,
    pub description: String,
    /// "<id>: <name>" for selection lists
    pub display_name: String,
}

impl UserStory {
    pub fn from_record(value: &Value) -> Option<Self> {
        let record = as_record(value)?;
        let id = text(record, "FormattedID").unwrap_or_default();
        let name = non_empty_text(record, "Name").unwrap_or_else(|| "Untitled Story".to_string());
        Some(UserStory {
            display_name: format!("{}: {}", id, name),
            id,
            name,
            description: text(record, "Description").unwrap_or_default(),
        })
    }
}

/// Derive a story name from generated story text: the first line, cut to
/// 60 characters, with "..." appended when the cut length is reached.
pub fn story_name_from_text(story: &str) -> String {
    let first_line = story.lines().next().unwrap_or_default();
    let mut name: String = first_line.chars().take(STORY_NAME_MAX_CHARS).collect();
    if name.chars().count() == STORY_NAME_MAX_CHARS {
        name.push_str("...");
    }
    name
}

/// Request body for uploading a generated story.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateStoryRequest {
    /// Full story text; the first line becomes the story name
    pub story: String,
}

/// A story created in Rally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreatedStory {
    pub formatted_id: String,
    pub name: String,
    pub message: String,
}

/// Request body for testing a Rally endpoint/key pair.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConnectionTestRequest {
    pub endpoint: String,
    pub api_key: String,
}

/// Result of a Rally connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
}
