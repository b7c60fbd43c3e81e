//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rally Insights Server",
        version = "0.1.0",
        description = "Rally test analytics (failure trends, root-cause analysis, execution history) and LLM agents for user stories, code and test cases"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        api::health::info,
        // Rally endpoints
        api::rally::connection_test,
        api::rally::list_workspaces,
        api::rally::list_projects,
        api::rally::list_stories,
        api::rally::create_story,
        // Analytics endpoints
        api::analytics::failure_analysis,
        api::analytics::story_history,
        api::analytics::project_rca,
        api::analytics::test_case_results,
        // Agent endpoints
        api::agents::generate_user_story,
        api::agents::generate_code,
        api::agents::generate_test_cases,
        api::agents::connection_test,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            api::health::ServerInfoResponse,
            // Rally
            models::Workspace,
            models::Project,
            models::UserStory,
            models::CreateStoryRequest,
            models::CreatedStory,
            models::ConnectionTestRequest,
            models::ConnectionTestResult,
            // Analytics
            models::TestCase,
            models::Defect,
            models::TestCaseResult,
            models::TestSummary,
            models::FailureDetail,
            models::FailureTrendEntry,
            models::RcaSummary,
            models::DailyExecutionCount,
            models::LatestStatus,
            models::ExecutionHistory,
            models::FetchStatus,
            models::StoryTestData,
            models::ProjectRcaData,
            models::ResultHistoryData,
            // Agents
            models::AgentKind,
            models::GenerateCodeRequest,
            models::GenerateTestCasesRequest,
            models::GenerationResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Rally", description = "Workspace, project and story browsing and story upload"),
        (name = "Analytics", description = "Test failure trends, root-cause analysis and execution history"),
        (name = "Agents", description = "LLM generation of user stories, code and test cases")
    )
)]
pub struct ApiDoc;
