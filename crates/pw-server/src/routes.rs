//! HTTP routes.
//!
//! | Method | Path          | Purpose                                         |
//! |--------|---------------|-------------------------------------------------|
//! | GET    | `/`           | Board page file, or a page rendered from the store |
//! | GET    | `/live_price` | Current `{Symbol, price, user}` snapshot        |
//! | POST   | `/websocket`  | Set user price, subscribe to the symbol's trades |
//! | GET    | `/health`     | Liveness                                        |

use std::io::ErrorKind;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pw_board::page::host_page;
use pw_board::render::render_table;
use pw_board::snapshot::PriceSnapshot;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/live_price", get(live_price_handler).fallback(get_only))
        .route("/websocket", post(subscribe_handler).fallback(post_only))
        .with_state(state)
}

fn status_message(code: StatusCode, message: impl Into<String>) -> Response {
    (code, Json(json!({ "status": false, "message": message.into() }))).into_response()
}

async fn get_only() -> Response {
    status_message(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed! ['GET'] Only")
}

async fn post_only() -> Response {
    status_message(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed! ['POST'] Only")
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn live_price_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.live_price() {
        Some(body) => Json(body).into_response(),
        None => status_message(StatusCode::SERVICE_UNAVAILABLE, "no market price received yet"),
    }
}

/// `{"symbol": "btcusdt", "price": "42000"}`; price may also be a number.
#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    symbol: String,
    price: serde_json::Value,
}

async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return status_message(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let price = match req.price {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        other => return status_message(StatusCode::BAD_REQUEST, format!("price must be a string or number, got {other}")),
    };

    match state.subscribe(&req.symbol, price.clone()).await {
        Ok(market_price) => {
            info!("user price {price} set for {}", req.symbol);
            Json(json!({ "results": market_price })).into_response()
        }
        Err(e) => {
            warn!("subscribe '{}' rejected: {e}", req.symbol);
            status_message(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

/// The board poller's page when one is configured and already written,
/// otherwise a host page rendered from the store.
async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    if let Some(path) = state.board_page() {
        match tokio::fs::read_to_string(path).await {
            Ok(page) => return Html(page),
            Err(e) if e.kind() == ErrorKind::NotFound => debug!("{} not written yet", path.display()),
            Err(e) => warn!("reading {}: {e}", path.display()),
        }
    }

    let inner = state
        .store
        .live_price()
        .and_then(|lp| {
            let user = lp.user?;
            PriceSnapshot::new(lp.symbol, &lp.price, &user)
                .map_err(|e| debug!("board not rendered: {e}"))
                .ok()
        })
        .map(|snapshot| render_table(&snapshot))
        .unwrap_or_default();
    Html(host_page(&state.page_title, &state.target_id, &inner))
}
