use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::ready::ReadinessGate;
use crate::setup::{Orchestrator, SetupReport};
use crate::status::StoreStatus;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<ReadinessGate>,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    #[serde(flatten)]
    pub status: StoreStatus,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
}

#[derive(Serialize)]
pub struct SetupResponse {
    pub success: bool,
    pub report: SetupReport,
}

/// setup / 诊断端点
pub struct SetupServer {
    state: AppState,
}

impl SetupServer {
    pub fn new(gate: Arc<ReadinessGate>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            state: AppState { gate, orchestrator },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/setup/status", get(status_handler))
            .route("/api/ready", get(ready_handler))
            .route("/api/setup", post(setup_handler))
            .with_state(self.state.clone())
    }

    pub async fn run(self, listen: &str) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(listen).await?;
        tracing::info!("Setup server listening on {}", listen);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// 给业务路由加就绪门控：未就绪时返回 503 和说明
pub fn gated(router: Router, gate: Arc<ReadinessGate>) -> Router {
    router.layer(middleware::from_fn_with_state(gate, require_ready))
}

pub async fn require_ready(
    State(gate): State<Arc<ReadinessGate>>,
    req: Request,
    next: Next,
) -> Response {
    match gate.is_ready().await {
        Ok(true) => next.run(req).await,
        Ok(false) => unavailable(
            "content store setup is incomplete; run the setup action (POST /api/setup)".to_string(),
        ),
        Err(e) => unavailable(format!("content store unreachable: {}", e)),
    }
}

fn unavailable(message: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": message })),
    )
        .into_response()
}

async fn status_handler(State(state): State<AppState>) -> Response {
    match state.gate.status().await {
        Ok(status) => Json(StatusResponse {
            ready: status.is_ready(),
            status,
        })
        .into_response(),
        Err(e) => unavailable(e.to_string()),
    }
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    match state.gate.is_ready().await {
        Ok(ready) => Json(ReadyResponse { ready }).into_response(),
        Err(e) => unavailable(e.to_string()),
    }
}

async fn setup_handler(State(state): State<AppState>) -> Json<SetupResponse> {
    let report = state.orchestrator.run().await;
    Json(SetupResponse {
        success: report.success(),
        report,
    })
}
