//! Thin HTTP surface over the pipeline.
//!
//! One route executes a swap, one replays a markout check, one reports
//! liveness. Everything interesting happens in the core; this file only
//! translates JSON to intents and errors to status codes.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use alloy_primitives::U256;
use serde::Deserialize;
use std::sync::Arc;
use tierswap_core::SwapPipeline;
use tierswap_types::{Address, SwapIntent};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
struct AppState {
	pipeline: Arc<SwapPipeline>,
}

pub async fn start_http_server(pipeline: Arc<SwapPipeline>, port: u16) -> anyhow::Result<()> {
	let state = AppState { pipeline };

	let app = Router::new()
		.route("/health", get(health))
		.route("/swaps", post(execute_swap))
		.route("/markout/{swap_id}", get(markout_status))
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive());

	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
	info!("API server listening on port {}", port);
	axum::serve(listener, app).await?;

	Ok(())
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Request body for POST /swaps. Amounts and ids are decimal strings.
#[derive(Debug, Deserialize)]
struct SwapRequest {
	amount_in: String,
	token_in: String,
	token_out: String,
	#[serde(default)]
	agent_id: Option<String>,
	/// Hex-encoded proof, optional.
	#[serde(default)]
	proof: Option<String>,
	#[serde(default)]
	slippage_bps: Option<u16>,
	#[serde(default)]
	deadline_secs: Option<u64>,
}

async fn execute_swap(
	State(state): State<AppState>,
	Json(request): Json<SwapRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
	let intent = parse_request(&request).map_err(|msg| {
		(
			StatusCode::BAD_REQUEST,
			Json(serde_json::json!({ "error": msg })),
		)
	})?;

	match state.pipeline.execute(intent).await {
		Ok(report) => Ok(Json(serde_json::to_value(report).unwrap_or_default())),
		Err(e) => {
			let status = if e.is_transient() {
				StatusCode::SERVICE_UNAVAILABLE
			} else {
				StatusCode::UNPROCESSABLE_ENTITY
			};
			Err((
				status,
				Json(serde_json::json!({
					"error": e.to_string(),
					"transient": e.is_transient(),
				})),
			))
		}
	}
}

async fn markout_status(
	State(state): State<AppState>,
	Path(swap_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
	let bytes = hex::decode(swap_id.trim_start_matches("0x")).map_err(|_| {
		(
			StatusCode::BAD_REQUEST,
			Json(serde_json::json!({ "error": "swap id must be hex" })),
		)
	})?;
	let swap_id: [u8; 32] = bytes.try_into().map_err(|_| {
		(
			StatusCode::BAD_REQUEST,
			Json(serde_json::json!({ "error": "swap id must be 32 bytes" })),
		)
	})?;

	match state.pipeline.markout_status(swap_id).await {
		Ok(verification) => Ok(Json(serde_json::to_value(verification).unwrap_or_default())),
		Err(e) => Err((
			StatusCode::NOT_FOUND,
			Json(serde_json::json!({ "error": e.to_string() })),
		)),
	}
}

fn parse_request(request: &SwapRequest) -> Result<SwapIntent, String> {
	let amount_in = U256::from_str_radix(request.amount_in.trim(), 10)
		.map_err(|e| format!("amount_in: {}", e))?;
	let token_in = Address::from_hex(&request.token_in).map_err(|e| format!("token_in: {}", e))?;
	let token_out =
		Address::from_hex(&request.token_out).map_err(|e| format!("token_out: {}", e))?;

	let agent_id = match &request.agent_id {
		Some(s) => U256::from_str_radix(s.trim(), 10).map_err(|e| format!("agent_id: {}", e))?,
		None => U256::ZERO,
	};

	let proof = match &request.proof {
		Some(s) if !s.is_empty() => {
			hex::decode(s.trim_start_matches("0x")).map_err(|_| "proof must be hex".to_string())?
		}
		_ => Vec::new(),
	};

	Ok(SwapIntent {
		amount_in,
		token_in,
		token_out,
		agent_id,
		proof,
		slippage_bps: request.slippage_bps.unwrap_or(50),
		deadline_secs: request.deadline_secs.unwrap_or(0),
	})
}
