//! Mock Rally WSAPI server for E2E tests.
//!
//! Starts an in-process HTTP server under `/slm/webservice/v2.0` that serves
//! canned records with Rally's `QueryResult` envelope and 1-based paging, and
//! records every request it receives.

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, get, post, web};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

/// API key the mock accepts.
pub const VALID_API_KEY: &str = "mock-rally-key";

/// Workspace the mock knows about.
pub const WORKSPACE_ID: &str = "111";

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub params: HashMap<String, String>,
    pub api_key: Option<String>,
    pub body: Option<Value>,
}

/// Canned data and fault injection.
#[derive(Default)]
pub struct MockRallyState {
    pub test_cases: Vec<Value>,
    pub defects: Vec<Value>,
    pub results: Vec<Value>,
    pub stories: Vec<Value>,
    /// Respond 500 to paged queries starting at this index
    pub fail_at_start: Option<u64>,
    /// Reported `TotalResultCount` instead of the real count
    pub total_override: Option<u64>,
    pub requests: Vec<RecordedRequest>,
}

type SharedState = web::Data<Arc<Mutex<MockRallyState>>>;
type Params = web::Query<HashMap<String, String>>;

fn record(state: &SharedState, req: &HttpRequest, params: &Params, body: Option<Value>) {
    let api_key = req
        .headers()
        .get("zsessionid")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().unwrap().requests.push(RecordedRequest {
        path: req.path().to_string(),
        params: params.0.clone(),
        api_key,
        body,
    });
}

fn authorized(req: &HttpRequest) -> bool {
    req.headers()
        .get("zsessionid")
        .and_then(|v| v.to_str().ok())
        == Some(VALID_API_KEY)
}

fn query_result(results: Vec<Value>, total: u64) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "QueryResult": {
            "Errors": [],
            "Warnings": [],
            "TotalResultCount": total,
            "StartIndex": 1,
            "PageSize": results.len(),
            "Results": results,
        }
    }))
}

/// Serve one page of `records` the way Rally pages queries.
fn paged(state: &MockRallyState, records: &[Value], params: &Params) -> HttpResponse {
    let start: u64 = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(1);
    let page_size: usize = params
        .get("pagesize")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    if state.fail_at_start == Some(start) {
        return HttpResponse::InternalServerError().body("mock failure");
    }

    let page: Vec<Value> = records
        .iter()
        .skip((start - 1) as usize)
        .take(page_size)
        .cloned()
        .collect();
    let total = state.total_override.unwrap_or(records.len() as u64);
    query_result(page, total)
}

#[get("/subscription")]
async fn subscription(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    if authorized(&req) {
        HttpResponse::Ok().json(json!({"Subscription": {"Name": "Mock"}}))
    } else {
        HttpResponse::Unauthorized().finish()
    }
}

#[get("/workspace")]
async fn workspaces(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    query_result(
        vec![
            json!({"ObjectID": 111, "Name": "Main Workspace"}),
            json!({"ObjectID": 222}),
            json!({"ObjectID": 333, "Name": "Sandbox"}),
        ],
        3,
    )
}

#[get("/workspace/{id}")]
async fn workspace(
    req: HttpRequest,
    params: Params,
    path: web::Path<String>,
    state: SharedState,
) -> HttpResponse {
    record(&state, &req, &params, None);
    let id = path.into_inner();
    if id == WORKSPACE_ID {
        let host = req.connection_info().host().to_string();
        HttpResponse::Ok().json(json!({
            "Workspace": {
                "_ref": format!("http://{}/slm/webservice/v2.0/workspace/{}", host, id),
                "Name": "Main Workspace",
                "ObjectID": 111
            }
        }))
    } else {
        HttpResponse::Ok().json(json!({
            "OperationResult": {"Errors": ["Cannot find object to read"]}
        }))
    }
}

#[get("/project")]
async fn projects(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    query_result(
        vec![
            json!({"ObjectID": 501, "Name": "Checkout"}),
            json!({"_ref": "http://mock/slm/webservice/v2.0/project/502"}),
        ],
        2,
    )
}

#[get("/hierarchicalrequirement")]
async fn stories(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    let stories = state.lock().unwrap().stories.clone();
    let total = stories.len() as u64;
    query_result(stories, total)
}

#[post("/hierarchicalrequirement/create")]
async fn create_story(
    req: HttpRequest,
    params: Params,
    body: web::Json<Value>,
    state: SharedState,
) -> HttpResponse {
    record(&state, &req, &params, Some(body.0.clone()));
    HttpResponse::Ok().json(json!({
        "CreateResult": {
            "Errors": [],
            "Warnings": [],
            "Object": {
                "FormattedID": "US900",
                "Name": body.0["HierarchicalRequirement"]["Name"].clone()
            }
        }
    }))
}

#[get("/testcase")]
async fn test_cases(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    let state = state.lock().unwrap();
    let query = params.get("query").cloned().unwrap_or_default();

    if query.starts_with("(WorkProduct.FormattedID") {
        return paged(&state, &state.test_cases, &params);
    }

    // (FormattedID = TCx) lookup
    let matches: Vec<Value> = state
        .test_cases
        .iter()
        .filter(|tc| {
            tc["FormattedID"]
                .as_str()
                .is_some_and(|id| query == format!("(FormattedID = {})", id))
        })
        .cloned()
        .collect();
    let total = matches.len() as u64;
    query_result(matches, total)
}

#[get("/defect")]
async fn defects(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    let state = state.lock().unwrap();
    paged(&state, &state.defects, &params)
}

#[get("/testcaseresult")]
async fn test_case_results(req: HttpRequest, params: Params, state: SharedState) -> HttpResponse {
    record(&state, &req, &params, None);
    let state = state.lock().unwrap();
    paged(&state, &state.results, &params)
}

/// Mock Rally server.
pub struct MockRally {
    /// Base URL without the WSAPI suffix, as a user would type it
    pub base_url: String,
    pub state: Arc<Mutex<MockRallyState>>,
}

impl MockRally {
    /// Start the mock on an ephemeral port.
    pub async fn start(initial: MockRallyState) -> Self {
        let state = Arc::new(Mutex::new(initial));

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let state_data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state_data.clone()))
                .service(
                    web::scope("/slm/webservice/v2.0")
                        .service(subscription)
                        .service(workspaces)
                        .service(workspace)
                        .service(projects)
                        .service(stories)
                        .service(create_story)
                        .service(test_cases)
                        .service(defects)
                        .service(test_case_results),
                )
        })
        .workers(1)
        .listen(listener)
        .expect("failed to listen")
        .disable_signals()
        .run();

        // Fire and forget: the server lives as long as the test runtime
        tokio::spawn(server);

        MockRally { base_url, state }
    }

    /// Requests received for `object_type` (e.g. "testcase").
    pub fn requests_for(&self, object_type: &str) -> Vec<RecordedRequest> {
        let suffix = format!("/{}", object_type);
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.path.ends_with(&suffix))
            .cloned()
            .collect()
    }

    pub fn set_fail_at_start(&self, start: Option<u64>) {
        self.state.lock().unwrap().fail_at_start = start;
    }
}

/// `count` test cases TC1..TCn linked to `story_id`, alternating Pass/Fail.
pub fn sample_test_cases(count: usize, last_run: &str) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "FormattedID": format!("TC{}", i),
                "Name": format!("Test case {}", i),
                "ObjectID": 1000 + i,
                "LastVerdict": if i % 2 == 0 { "Fail" } else { "Pass" },
                "LastRun": last_run,
                "LastBuild": "build-7",
                "Duration": 1.5,
                "Owner": {"_refObjectName": "QA Bot"}
            })
        })
        .collect()
}
