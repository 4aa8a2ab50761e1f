//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ErrorResponse, StatusResponse, SuccessResponse};
use super::AppState;
use crate::contact::ContactForm;
use crate::runtime::{DispatchError, SessionView};
use crate::state_machine::{Event, TransitionError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/end", post(end_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // Chat widget
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/open", post(open_widget))
        .route("/api/sessions/:id/close", post(close_widget))
        .route("/api/sessions/:id/toggle", post(toggle_widget))
        // Page stages
        .route("/api/sessions/:id/advance", post(advance_stage))
        // Contact form
        .route("/api/contact", post(send_contact))
        // Status
        .route("/api/status", get(get_status))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.sessions.create().await)
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    state
        .sessions
        .view(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.end(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (view, broadcast_rx) = state
        .sessions
        .subscribe(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))?;

    Ok(sse_stream(view, broadcast_rx))
}

// ============================================================
// Chat Widget
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    state
        .sessions
        .dispatch(&id, Event::Submit { text: req.text })
        .await?;

    Ok(Json(ChatResponse { queued: true }))
}

async fn open_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    dispatch_view(&state, &id, Event::Open).await
}

async fn close_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    dispatch_view(&state, &id, Event::Close).await
}

async fn toggle_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    dispatch_view(&state, &id, Event::Toggle).await
}

async fn advance_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    dispatch_view(&state, &id, Event::AdvanceStage).await
}

async fn dispatch_view(state: &AppState, id: &str, event: Event) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.dispatch(id, event).await?))
}

// ============================================================
// Contact Form
// ============================================================

async fn send_contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> Result<Json<SuccessResponse>, AppError> {
    let relay = state
        .contact
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Contact form is not configured".to_string()))?;

    relay.submit(&form).await.map_err(|e| {
        if e.is_validation() {
            AppError::BadRequest(e.to_string())
        } else {
            AppError::BadGateway(e.to_string())
        }
    })?;

    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Status
// ============================================================

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        assistant_configured: state.sessions.engine().is_configured(),
        contact_configured: state.contact.is_some(),
        active_sessions: state.sessions.session_count().await,
    })
}

async fn get_version() -> &'static str {
    concat!("folio-assistant ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Unavailable(String),
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::NotFound(_) => AppError::NotFound(e.to_string()),
            DispatchError::Rejected(TransitionError::EmptyInput) => {
                AppError::BadRequest(e.to_string())
            }
            DispatchError::Rejected(_) => AppError::Conflict(e.to_string()),
            DispatchError::Stopped => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
