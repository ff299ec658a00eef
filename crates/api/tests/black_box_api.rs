//! Black-box HTTP tests: real server on an ephemeral port, driven with a
//! plain HTTP client, in-memory adapters underneath.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::json;

use slated_api::app::services::AppServices;
use slated_core::OwnerId;
use slated_engine::{
    CancelPolicy, EngineSettings, InMemoryJobStore, InMemoryStateLedger, JobEngine, RetryPolicy,
    SimulatedJobBody, CANCELLED_BY_USER,
};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, but in-memory adapters, tight timings, and an
        // ephemeral port.
        let settings = EngineSettings {
            grace: Duration::from_millis(10),
            retry: RetryPolicy::fixed(3, Duration::from_millis(10)),
            ledger_ttl: Duration::from_secs(60),
            cancel_policy: CancelPolicy::PendingOnly,
        };
        let (engine, _scheduler) = JobEngine::spawn(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(InMemoryStateLedger::new()),
            Arc::new(SimulatedJobBody {
                delay: Duration::from_millis(10),
            }),
            settings,
        );
        let app = slated_api::app::router_with(Arc::new(AppServices { engine }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn client_for(owner: OwnerId) -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-user-id", owner.to_string().parse().unwrap());
    headers.insert("x-email-verified", "true".parse().unwrap());
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .unwrap()
}

fn create_body(name: &str, seconds_out: i64) -> serde_json::Value {
    json!({
        "name": name,
        "description": "",
        "scheduled_time": (Utc::now() + ChronoDuration::seconds(seconds_out)).to_rfc3339(),
    })
}

async fn get_job_until_terminal(
    client: &reqwest::Client,
    server: &TestServer,
    id: &str,
) -> serde_json::Value {
    // The dispatcher and executor run on their own tasks; poll briefly.
    for _ in 0..100 {
        let body: serde_json::Value = client
            .get(server.url(&format!("/jobs/{}", id)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let status = body["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job never reached a terminal status");
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_unauthenticated_and_unverified_callers() {
    let server = TestServer::spawn().await;
    let bare = reqwest::Client::new();

    // No identity header at all.
    let res = bare.get(server.url("/jobs")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Identified but unverified.
    let res = bare
        .get(server.url("/jobs"))
        .header("x-user-id", OwnerId::new().to_string())
        .header("x-email-verified", "false")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Health stays open.
    let res = bare.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn create_then_fetch_roundtrip() {
    let server = TestServer::spawn().await;
    let client = client_for(OwnerId::new());

    let res = client
        .post(server.url("/jobs"))
        .json(&create_body("nightly-report", 3600))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "pending");
    assert!(created.get("result").is_none());

    let id = created["id"].as_str().unwrap();
    let fetched: serde_json::Value = client
        .get(server.url(&format!("/jobs/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], "nightly-report");
    assert_eq!(fetched["status"], "pending");
}

#[tokio::test(flavor = "multi_thread")]
async fn past_schedule_and_blank_name_are_rejected() {
    let server = TestServer::spawn().await;
    let client = client_for(OwnerId::new());

    let res = client
        .post(server.url("/jobs"))
        .json(&create_body("too-late", -30))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_schedule");

    let res = client
        .post(server.url("/jobs"))
        .json(&create_body("   ", 3600))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn jobs_are_scoped_to_their_owner() {
    let server = TestServer::spawn().await;
    let alice = client_for(OwnerId::new());
    let mallory = client_for(OwnerId::new());

    let created: serde_json::Value = alice
        .post(server.url("/jobs"))
        .json(&create_body("private", 3600))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    // Another owner sees neither the job nor its existence.
    let res = mallory
        .get(server.url(&format!("/jobs/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let listing: serde_json::Value = mallory
        .get(server.url("/jobs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["items"].as_array().unwrap().len(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn result_is_conflict_until_terminal_then_embedded() {
    let server = TestServer::spawn().await;
    let client = client_for(OwnerId::new());

    let res = client
        .post(server.url("/jobs"))
        .json(&create_body("run-soon", 1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let terminal = get_job_until_terminal(&client, &server, &id).await;
    assert_eq!(terminal["status"], "completed");
    let output = terminal["result"]["output"].as_str().unwrap();
    assert!(output.contains("Job name: run-soon"));
    assert!(output.ends_with("Job completed successfully."));

    let res = client
        .get(server.url(&format!("/jobs/{}/result", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_result_and_bad_ids_map_to_errors() {
    let server = TestServer::spawn().await;
    let client = client_for(OwnerId::new());

    let created: serde_json::Value = client
        .post(server.url("/jobs"))
        .json(&create_body("far-future", 3600))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .get(server.url(&format!("/jobs/{}/result", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_ready");

    let res = client
        .get(server.url("/jobs/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(server.url(&format!("/jobs/{}", uuid::Uuid::now_v7())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_a_pending_job_records_the_reason() {
    let server = TestServer::spawn().await;
    let client = client_for(OwnerId::new());

    let created: serde_json::Value = client
        .post(server.url("/jobs"))
        .json(&create_body("doomed", 3600))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .post(server.url(&format!("/jobs/{}/cancel", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled: serde_json::Value = res.json().await.unwrap();
    assert_eq!(cancelled["status"], "failed");

    let result: serde_json::Value = client
        .get(server.url(&format!("/jobs/{}/result", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["error_message"], CANCELLED_BY_USER);

    // A second cancel is a conflict, not idempotent success.
    let res = client
        .post(server.url(&format!("/jobs/{}/cancel", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread")]
async fn summary_buckets_every_status() {
    let server = TestServer::spawn().await;
    let client = client_for(OwnerId::new());

    for name in ["one", "two"] {
        let res = client
            .post(server.url("/jobs"))
            .json(&create_body(name, 3600))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let summary: serde_json::Value = client
        .get(server.url("/jobs/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["pending"], 2);
    assert_eq!(summary["in-progress"], 0);
    assert_eq!(summary["completed"], 0);
    assert_eq!(summary["failed"], 0);
}
