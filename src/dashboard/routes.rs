//! HTTP API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::EquityEngine;
use crate::types::{BotStats, CycleReport};

/// How many cycle reports `/api/cycles` keeps.
const CYCLE_LOG_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine: EquityEngine,
    pub stats: RwLock<BotStats>,
    pub cycle_log: RwLock<Vec<CycleReport>>,
}

impl DashboardState {
    pub fn new(engine: EquityEngine) -> Self {
        Self {
            engine,
            stats: RwLock::new(BotStats::new()),
            cycle_log: RwLock::new(Vec::new()),
        }
    }

    /// Fold a finished cycle into the stats and the cycle log.
    pub async fn record_cycle(&self, report: CycleReport) {
        self.stats.write().await.record_cycle(&report);
        let mut log = self.cycle_log.write().await;
        log.push(report);
        if log.len() > CYCLE_LOG_LIMIT {
            let excess = log.len() - CYCLE_LOG_LIMIT;
            log.drain(..excess);
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub cycle_count: u64,
    pub items_fetched: u64,
    pub replies_posted: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
    pub last_cycle: Option<String>,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub reply: String,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.stats.read().await;
    Json(StatusResponse {
        cycle_count: stats.cycle_count,
        items_fetched: stats.items_fetched,
        replies_posted: stats.replies_posted,
        items_skipped: stats.items_skipped,
        items_failed: stats.items_failed,
        last_cycle: stats.last_cycle.map(|t| t.to_rfc3339()),
        uptime_secs: stats.uptime().num_seconds(),
    })
}

/// GET /api/cycles
pub async fn get_cycles(State(state): State<AppState>) -> Json<Vec<CycleReport>> {
    let log = state.cycle_log.read().await;
    Json(log.clone())
}

/// POST /api/evaluate: run the engine on an arbitrary message body.
pub async fn post_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    let reply = state.engine.handle(&req.body).await;
    Json(EvaluateResponse { reply })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
