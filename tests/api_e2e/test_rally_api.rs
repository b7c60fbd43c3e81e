//! E2E tests: Rally browsing, story upload and health endpoints.

use rally_insights_lib::services::RallyClient;
use serde_json::json;
use std::sync::Arc;

use super::mock_rally::{MockRally, MockRallyState, VALID_API_KEY};
use super::test_helpers::*;

/// (1) Browse workspaces, projects and stories.
#[actix_rt::test]
async fn test_browse() {
    let mock = MockRally::start(MockRallyState {
        stories: vec![
            json!({"FormattedID": "US2", "Name": "Newest", "Description": "<p>b</p>"}),
            json!({"FormattedID": "US1"}),
        ],
        ..Default::default()
    })
    .await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(&app, "/api/v1/rally/workspaces").await;
    assert_eq!(status, 200);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["id"], "111");

    let (status, body) = get_json(&app, "/api/v1/rally/workspaces/111/projects").await;
    assert_eq!(status, 200);
    assert_eq!(body[0]["name"], "Checkout");

    let (status, body) = get_json(&app, "/api/v1/rally/workspaces/999/projects").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, body) =
        get_json(&app, "/api/v1/rally/workspaces/111/projects/501/stories").await;
    assert_eq!(status, 200);
    assert_eq!(body[0]["display_name"], "US2: Newest");
    assert_eq!(body[1]["name"], "Untitled Story");

    let requests = mock.requests_for("hierarchicalrequirement");
    assert_eq!(requests[0].params["order"], "CreationDate DESC");
}

/// (2) Uploading a story names it after its first line.
#[actix_rt::test]
async fn test_create_story() {
    let mock = MockRally::start(MockRallyState::default()).await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;
    let first_line = "As a returning customer I want to pay with a saved card so checkout is fast";
    let story = format!("{}\n\nAcceptance criteria:\n- card is masked", first_line);

    let (status, body) = post_json(
        &app,
        "/api/v1/rally/projects/501/stories",
        json!({"story": story}),
    )
    .await;

    assert_eq!(status, 201, "{}", body);
    assert_eq!(body["formatted_id"], "US900");
    let name = body["name"].as_str().unwrap();
    assert_eq!(name, format!("{}...", &first_line[..60]));
    assert_eq!(body["message"], "User story US900 created successfully");

    let requests = mock.requests_for("create");
    let sent = requests[0].body.as_ref().unwrap();
    assert_eq!(sent["HierarchicalRequirement"]["Description"], story);

    let (status, _) = post_json(
        &app,
        "/api/v1/rally/projects/501/stories",
        json!({"story": "\nsecond line only"}),
    )
    .await;
    assert_eq!(status, 400);
}

/// (3) Connection test endpoint reports outcomes in the body.
#[actix_rt::test]
async fn test_connection_test_endpoint() {
    let mock = MockRally::start(MockRallyState::default()).await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = post_json(
        &app,
        "/api/v1/rally/connection-test",
        json!({"endpoint": format!("{}/#/dashboard", mock.base_url), "api_key": VALID_API_KEY}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let (status, body) = post_json(
        &app,
        "/api/v1/rally/connection-test",
        json!({"endpoint": mock.base_url, "api_key": "nope"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Failed to connect. Status code: 401");

    let (status, _) = post_json(
        &app,
        "/api/v1/rally/connection-test",
        json!({"endpoint": "", "api_key": ""}),
    )
    .await;
    assert_eq!(status, 400);
}

/// (4) An unconfigured client answers 503 on browse endpoints.
#[actix_rt::test]
async fn test_unconfigured_rally() {
    let client = RallyClient::new(&rally_settings("", "")).unwrap();
    let app = create_test_app(test_config(""), Arc::new(client), FakeLlm::new("")).await;

    let (status, body) = get_json(&app, "/api/v1/rally/workspaces").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "NOT_CONFIGURED");

    let (status, body) = get_json(&app, "/api/v1/ready").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["rally"], "not_configured");
    assert_eq!(body["llm"], "configured");
}

/// (5) Health and info.
#[actix_rt::test]
async fn test_health_and_info() {
    let mock = MockRally::start(MockRallyState::default()).await;
    let app = create_test_app(
        test_config(&mock.base_url),
        Arc::new(rally_client(&mock.base_url)),
        FakeLlm::new(""),
    )
    .await;

    let (status, body) = get_json(&app, "/api/v1/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");

    let (status, body) = get_json(&app, "/api/v1/ready").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ready");

    let (status, body) = get_json(&app, "/api/v1/info").await;
    assert_eq!(status, 200);
    assert_eq!(body["llm_provider"], "openai");
    assert_eq!(body["default_model"], "gpt-4");
}
