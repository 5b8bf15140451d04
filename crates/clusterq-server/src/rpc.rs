//! HTTP RPC surface for a queue backend.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

use clusterq_core::rpc::{
    BackendResponse, CancelRequest, CancelResponse, MetricsResponse, PingResponse, QueueQuery,
    QueueResponse, SelfTestResponse, SubmitRequest, SubmitResponse, LIVENESS_TOKEN,
};
use clusterq_core::{Error, QueueBackend};

/// Shared state for the RPC handlers.
#[derive(Clone)]
pub struct RpcState {
    pub backend: Arc<dyn QueueBackend>,
    pub shutdown: Arc<Notify>,
}

impl RpcState {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self {
            backend,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// RPC error response.
#[derive(Debug)]
pub struct RpcError(Error);

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        RpcError(err)
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Usage(_) | Error::UnknownBackend(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Build the RPC router for a backend.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/submit", post(submit))
        .route("/cancel", post(cancel))
        .route("/queue", get(queue))
        .route("/metrics", get(metrics))
        .route("/selftest", get(self_test))
        .route("/ping", get(ping))
        .route("/backend", get(backend_name))
        .route("/shutdown", post(shutdown))
        .with_state(state)
}

async fn submit(
    State(state): State<RpcState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, RpcError> {
    let job_id = state.backend.submit(&req.script_path).await?;
    Ok(Json(SubmitResponse { job_id }))
}

async fn cancel(
    State(state): State<RpcState>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, RpcError> {
    let ok = state.backend.cancel(&req.job_ids).await?;
    Ok(Json(CancelResponse { ok }))
}

async fn queue(
    State(state): State<RpcState>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueResponse>, RpcError> {
    let entries = state.backend.queue(query.job_id.as_deref()).await?;
    Ok(Json(QueueResponse { entries }))
}

async fn metrics(
    State(state): State<RpcState>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<MetricsResponse>, RpcError> {
    let rows = state.backend.metrics(query.job_id.as_deref()).await?;
    Ok(Json(MetricsResponse { rows }))
}

async fn self_test(State(state): State<RpcState>) -> Json<SelfTestResponse> {
    Json(SelfTestResponse {
        ok: state.backend.self_test().await,
    })
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        token: LIVENESS_TOKEN.to_string(),
    })
}

async fn backend_name(State(state): State<RpcState>) -> Json<BackendResponse> {
    Json(BackendResponse {
        name: state.backend.name().to_string(),
    })
}

async fn shutdown(State(state): State<RpcState>) -> Json<serde_json::Value> {
    info!("Shutdown requested");
    state.shutdown.notify_waiters();
    Json(json!({ "status": "stopping" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use clusterq_core::backend::{MetricsRow, QueueEntry};
    use clusterq_core::options::SubmitOptions;
    use clusterq_core::script::ScriptPaths;
    use clusterq_core::work::WorkItem;
    use std::path::Path;
    use tower::ServiceExt;

    struct EchoBackend;

    #[async_trait]
    impl QueueBackend for EchoBackend {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn submit(&self, _script: &Path) -> clusterq_core::Result<Option<String>> {
            Ok(Some("31".to_string()))
        }

        async fn cancel(&self, _ids: &[String]) -> clusterq_core::Result<bool> {
            Ok(true)
        }

        async fn queue(&self, job_id: Option<&str>) -> clusterq_core::Result<Vec<QueueEntry>> {
            Ok(vec![QueueEntry::new(
                job_id.unwrap_or("31"),
                "running",
            )])
        }

        async fn metrics(&self, _job_id: Option<&str>) -> clusterq_core::Result<Vec<MetricsRow>> {
            Ok(vec![])
        }

        async fn self_test(&self) -> bool {
            true
        }

        fn generate_artifacts(
            &self,
            _script: &ScriptPaths,
            _options: &SubmitOptions,
            _work: &WorkItem,
        ) -> clusterq_core::Result<bool> {
            Ok(true)
        }
    }

    fn app() -> Router {
        router(RpcState::new(Arc::new(EchoBackend)))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_returns_the_liveness_token() {
        let response = app()
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["token"], LIVENESS_TOKEN);
    }

    #[tokio::test]
    async fn backend_name_is_exposed() {
        let response = app()
            .oneshot(Request::get("/backend").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["name"], "echo");
    }

    #[tokio::test]
    async fn submit_round_trips_json() {
        let request = Request::post("/submit")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"script_path":"/tmp/j.sbatch"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["job_id"], "31");
    }

    #[tokio::test]
    async fn queue_filters_by_job_id() {
        let response = app()
            .oneshot(Request::get("/queue?job_id=8").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["entries"][0]["id"], "8");
        assert_eq!(body["entries"][0]["status"], "running");
    }

    #[tokio::test]
    async fn shutdown_notifies_waiters() {
        let state = RpcState::new(Arc::new(EchoBackend));
        let notify = state.shutdown.clone();
        let app = router(state);

        let waiter = tokio::spawn(async move { notify.notified().await });
        // Give the waiter a chance to register before the notification.
        tokio::task::yield_now().await;

        let response = app
            .oneshot(Request::post("/shutdown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        waiter.await.unwrap();
    }
}
