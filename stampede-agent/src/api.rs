//! Control surface endpoints
//!
//! The orchestrator drives the agent through four endpoints: start a test,
//! stop whatever is running, ping for liveness, and read cumulative totals.
//! Start is accepted into the background; the run outlives the request.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use stampede_core::TestPlanRequest;
use stampede_engine::{EngineError, EngineStats, LoadEngine};

/// Acknowledgement for control operations
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct Pong {
    pub alive: bool,
}

/// Build the control surface router around an engine handle.
pub fn router(engine: LoadEngine) -> Router {
    Router::new()
        .route("/api/v1/ping", get(ping))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/tests", post(start_test))
        .route("/api/v1/tests/stop", post(stop_test))
        .with_state(engine)
}

async fn ping() -> Json<Pong> {
    Json(Pong { alive: true })
}

async fn stats(State(engine): State<LoadEngine>) -> Json<EngineStats> {
    Json(engine.stats().await)
}

async fn start_test(
    State(engine): State<LoadEngine>,
    Json(request): Json<TestPlanRequest>,
) -> (StatusCode, Json<Ack>) {
    info!(
        test_id = %request.test_id,
        test_type = %request.test_type,
        url = %request.target_url,
        "test start requested"
    );

    let plan = match request.into_plan() {
        Ok(plan) => plan,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(Ack {
                    success: false,
                    message: e.to_string(),
                }),
            );
        }
    };

    match engine.start(plan).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(Ack {
                success: true,
                message: "test start accepted, load test is running in background".to_string(),
            }),
        ),
        Err(EngineError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(Ack {
                success: false,
                message: EngineError::AlreadyRunning.to_string(),
            }),
        ),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(Ack {
                success: false,
                message: e.to_string(),
            }),
        ),
    }
}

async fn stop_test(State(engine): State<LoadEngine>) -> Json<Ack> {
    info!("test stop requested");
    let stopped = engine.stop().await;
    Json(Ack {
        success: true,
        message: if stopped {
            "test stopped".to_string()
        } else {
            "no test was running".to_string()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stampede_engine::NoopPublisher;
    use stampede_http::RequestExecutor;

    async fn serve() -> String {
        let engine = LoadEngine::new(
            RequestExecutor::new().unwrap(),
            Arc::new(NoopPublisher),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(engine)).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    fn start_body(test_id: &str) -> serde_json::Value {
        serde_json::json!({
            "test_id": test_id,
            "test_type": "LOAD",
            "target_url": "http://127.0.0.1:9/",
            "http_method": "GET",
            "virtual_users": 1,
            "duration_seconds": 60,
        })
    }

    #[tokio::test]
    async fn ping_reports_alive() {
        let base = serve().await;
        let response = reqwest::get(format!("{base}/ping")).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["alive"], true);
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/tests"))
            .json(&start_body("t-api"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);

        // A second start collides with the running test
        let response = client
            .post(format!("{base}/tests"))
            .json(&start_body("t-api-2"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 409);

        let stats: serde_json::Value = client
            .get(format!("{base}/stats"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["running"], true);

        let response = client
            .post(format!("{base}/tests/stop"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let ack: serde_json::Value = response.json().await.unwrap();
        assert_eq!(ack["success"], true);

        // Redundant stop is still acknowledged
        let ack: serde_json::Value = client
            .post(format!("{base}/tests/stop"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ack["success"], true);
        assert_eq!(ack["message"], "no test was running");
    }

    #[tokio::test]
    async fn invalid_plans_are_rejected_with_detail() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let mut body = start_body("t-bad");
        body["test_type"] = "CHAOS".into();
        let response = client
            .post(format!("{base}/tests"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
        let ack: serde_json::Value = response.json().await.unwrap();
        assert_eq!(ack["success"], false);
        assert!(ack["message"].as_str().unwrap().contains("CHAOS"));

        let mut body = start_body("t-bad");
        body["virtual_users"] = serde_json::Value::Null;
        let response = client
            .post(format!("{base}/tests"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
    }
}
