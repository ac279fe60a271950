//! HTTP surface of the daemon
//!
//! - `POST /send_message` - `{phone_number, message}`, 201 on acceptance
//! - `POST /delivery_status` - `{message_id, status}`, 200 on a valid transition
//! - `GET /list_messages` - stored messages, optional `?phone_number=` filter
//! - `GET /healthz` - liveness probe
//! - `GET /` - redirects to `/list_messages`
//!
//! Handlers only check that required fields are present. Everything else is
//! decided by the dispatch engine and reported with its status code.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sms_core::{DispatchEngine, Error, Message};
use std::sync::Arc;
use tracing::error;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DispatchEngine>,
}

/// Create the application router
pub fn router(engine: Arc<DispatchEngine>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/send_message", post(send_message))
        .route("/delivery_status", post(delivery_status))
        .route("/list_messages", get(list_messages))
        .route("/healthz", get(healthz))
        .with_state(AppState { engine })
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub phone_number: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryStatusRequest {
    pub message_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub phone_number: Option<String>,
}

/// Body of a successful request
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Body of a rejected request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_message: String,
}

/// One row of the message listing
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub message_id: Option<String>,
    pub phone_number: String,
    pub provider_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.id().map(|id| id.to_string()),
            phone_number: message.phone_number().to_string(),
            provider_url: message.provider().map(|p| p.url.clone()),
            status: message.status().to_string(),
            created_at: message.created_at(),
            updated_at: message.updated_at(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub providers: usize,
}

/// A failed request, rendered with the engine's status code
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::invalid_input(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_message = if self.0.is_rejection() {
            self.0.to_string()
        } else {
            error!("Request failed: {}", self.0);
            "Internal server error".to_string()
        };

        (status, Json(ErrorResponse { error_message })).into_response()
    }
}

/// A field that must be present and non-empty
fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::invalid_input(message).into()),
    }
}

async fn root() -> Redirect {
    Redirect::to("/list_messages")
}

async fn send_message(
    State(state): State<AppState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let Json(request) = body?;
    let phone_number = required(request.phone_number, "Phone number is required")?;
    let text = required(request.message, "Message is required")?;

    state.engine.create_message(&phone_number, &text).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            message: "Message successfully created".to_string(),
        }),
    ))
}

async fn delivery_status(
    State(state): State<AppState>,
    body: Result<Json<DeliveryStatusRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = body?;
    let message_id = required(request.message_id, "Message id is required")?;
    let status = required(request.status, "Status is required")?;

    state.engine.update_status(&message_id, &status).await?;

    Ok(Json(SuccessResponse {
        message: "Message successfully updated".to_string(),
    }))
}

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let filter = query.phone_number.filter(|n| !n.is_empty());
    let messages = state.engine.list_messages(filter.as_deref()).await?;
    Ok(Json(messages.iter().map(MessageView::from).collect()))
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        providers: state.engine.registry().len(),
    })
}
