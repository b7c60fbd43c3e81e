//! Domain models for the Rally insights server.

pub mod agent;
pub mod analytics;
pub mod defect;
pub mod rally;
pub mod record;
pub mod test_case;
pub mod test_case_result;

// Re-export commonly used types
pub use agent::{AgentKind, GenerateCodeRequest, GenerateTestCasesRequest, GenerationResponse};
pub use analytics::{
    DailyExecutionCount, ExecutionHistory, FailureAnalysisQuery, FailureDetail, FailureTrend,
    FailureTrendEntry, FetchStatus, LatestStatus, ProjectRcaData, RcaSummary, ResultHistoryData,
    StoryTestData, TestSummary,
};
pub use defect::Defect;
pub use rally::{
    ConnectionTestRequest, ConnectionTestResult, CreateStoryRequest, CreatedStory, Project,
    UserStory, Workspace,
};
pub use test_case::{RecordSkip, TestCase, Verdict};
pub use test_case_result::TestCaseResult;
