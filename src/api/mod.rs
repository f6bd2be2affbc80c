//! Host HTTP API over the accessory
//!
//! Exposes accessory information, per-key light characteristics, identify
//! and a WebSocket feed of switch notifications.
//! Default port: 8126

use crate::accessory::{Accessory, CharacteristicValue, LightField, SwitchNotifications};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Default API port
pub const DEFAULT_API_PORT: u16 = 8126;

/// Shared state for API handlers
pub struct ApiState {
    pub accessory: Arc<Accessory>,
}

/// Request body for writing a characteristic
#[derive(Debug, Deserialize)]
pub struct SetCharacteristicRequest {
    pub value: CharacteristicValue,
}

/// API error response
#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn bad_request(error: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.to_string(),
        }
    }

    fn unknown_key(label: usize) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: format!("Unknown key {} (keys are 1-12)", label),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/accessory", get(get_accessory))
        .route("/api/keys", get(list_lights))
        .route("/api/keys/:label/light", get(get_light))
        .route("/api/keys/:label/light/:field", put(set_light))
        .route("/api/identify", post(identify))
        .route("/api/ws/events", get(events_ws))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/accessory - Information and service list
async fn get_accessory(State(state): State<Arc<ApiState>>) -> Response {
    Json(state.accessory.describe()).into_response()
}

/// GET /api/keys - Every key's light
async fn list_lights(State(state): State<Arc<ApiState>>) -> Response {
    Json(state.accessory.lights().await).into_response()
}

/// GET /api/keys/:label/light - One key's light
async fn get_light(
    Path(label): Path<usize>,
    State(state): State<Arc<ApiState>>,
) -> Result<Response, ApiError> {
    let light = state
        .accessory
        .light(label)
        .await
        .ok_or_else(|| ApiError::unknown_key(label))?;

    Ok(Json(light).into_response())
}

/// PUT /api/keys/:label/light/:field - Write one characteristic
async fn set_light(
    Path((label, field)): Path<(usize, String)>,
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SetCharacteristicRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let field: LightField = field.parse().map_err(ApiError::bad_request)?;

    let accepted = state
        .accessory
        .set_light(label, field, req.value)
        .map_err(ApiError::bad_request)?;

    if !accepted {
        return Err(ApiError::unknown_key(label));
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "label_index": label,
        "field": field,
        "value": req.value,
    })))
}

/// POST /api/identify - Flash every key
async fn identify(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    state.accessory.identify();
    Json(serde_json::json!({ "ok": true }))
}

/// GET /api/ws/events - WebSocket for switch notifications
async fn events_ws(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    // Subscribe before the upgrade so no press is missed
    let notifications = state.accessory.notifications();
    ws.on_upgrade(move |socket| handle_websocket(socket, notifications))
}

async fn handle_websocket(mut socket: WebSocket, mut notifications: SwitchNotifications) {
    debug!("WebSocket client connected for switch events");

    loop {
        tokio::select! {
            notification = notifications.next() => {
                let Some(notification) = notification else {
                    debug!("Engine stopped, closing switch event stream");
                    break;
                };
                let msg = match serde_json::to_string(&notification) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Failed to encode switch notification: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(msg)).await.is_err() {
                    debug!("WebSocket client disconnected");
                    break;
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// GET /api/health - Health check endpoint
async fn health_check(State(state): State<Arc<ApiState>>) -> Response {
    if state.accessory.engine().is_alive() {
        "ok".into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "engine stopped").into_response()
    }
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, bind: &str, port: u16) -> Result<()> {
    let router = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid API bind address '{}:{}'", bind, port))?;
    info!("Starting accessory API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessoryConfig;
    use crate::device::ConsoleKeypad;
    use crate::engine::{EngineSettings, SyncEngine};
    use crate::keys::KEY_COUNT;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn setup() -> (Arc<ConsoleKeypad>, Router) {
        let keypad = Arc::new(ConsoleKeypad::quiet("api-test"));
        let engine = SyncEngine::spawn(keypad.clone(), EngineSettings::default())
            .await
            .unwrap();
        keypad.wait_for_commands(KEY_COUNT).await;

        let accessory = Arc::new(Accessory::new(AccessoryConfig::default(), engine));
        (keypad, build_router(Arc::new(ApiState { accessory })))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn put_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_keypad, router) = setup().await;
        let response = router.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_accessory_description() {
        let (_keypad, router) = setup().await;

        let response = router.oneshot(get("/api/accessory")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["model"], "Macropad RP2040");
        assert_eq!(body["services"].as_array().unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_set_and_get_light() {
        let (keypad, router) = setup().await;

        let response = router
            .clone()
            .oneshot(put_json("/api/keys/3/light/hue", r#"{"value": 200}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(put_json("/api/keys/3/light/on", r#"{"value": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.oneshot(get("/api/keys/3/light")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["label_index"], 3);
        assert_eq!(body["on"], true);
        assert_eq!(body["hue"], 200.0);

        assert_eq!(keypad.take_commands().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let (keypad, router) = setup().await;

        let response = router
            .clone()
            .oneshot(get("/api/keys/13/light"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .clone()
            .oneshot(put_json("/api/keys/0/light/on", r#"{"value": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Unknown label wins over a badly typed value
        let response = router
            .oneshot(put_json("/api/keys/13/light/hue", r#"{"value": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(keypad.commands().is_empty());
    }

    #[tokio::test]
    async fn test_bad_field_and_value() {
        let (_keypad, router) = setup().await;

        let response = router
            .clone()
            .oneshot(put_json("/api/keys/1/light/color", r#"{"value": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(put_json("/api/keys/1/light/hue", r#"{"value": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_identify() {
        let (keypad, router) = setup().await;

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/identify")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let overlay = keypad.wait_for_commands(KEY_COUNT).await;
        assert_eq!(overlay.len(), KEY_COUNT);
    }
}
