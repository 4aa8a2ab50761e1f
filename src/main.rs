//! Folio Assistant - portfolio chat widget backend
//!
//! Serves the chat widget's session API: a visitor's question is answered
//! by a remote model grounded in the portfolio owner's knowledge document,
//! with bounded retries and fixed fallback messages.

mod api;
mod config;
mod contact;
mod delivery;
mod knowledge;
mod llm;
mod runtime;
mod stage;
mod state_machine;
mod transcript;

use api::{create_router, AppState};
use config::AppConfig;
use contact::ContactRelay;
use delivery::{DeliveryEngine, RetryPolicy};
use knowledge::SystemContext;
use llm::{GeminiService, LlmService, LoggingService};
use runtime::{SessionManager, CLEANUP_INTERVAL};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;

    let context = SystemContext::load(&config.owner_name, config.knowledge_path.as_deref())?;
    tracing::info!(
        owner = %context.owner_name(),
        knowledge_bytes = context.text().len(),
        "Knowledge document loaded"
    );

    // Initialize the model client
    let service: Option<Arc<dyn LlmService>> = match config.api_key.clone() {
        Some(key) => {
            let gemini = GeminiService::new(key, &config.model, &config.base_url)?;
            tracing::info!(model = %config.model, "Assistant configured");
            Some(Arc::new(LoggingService::new(Arc::new(gemini))))
        }
        None => {
            tracing::warn!(
                "No API key configured. Set FOLIO_GEMINI_API_KEY; every question will be answered with a configuration error."
            );
            None
        }
    };

    let policy = RetryPolicy::default();
    tracing::info!(
        max_attempts = policy.max_attempts,
        worst_case_wait_ms = %policy.worst_case_wait().as_millis(),
        "Chat retry policy"
    );

    let engine = DeliveryEngine::new(service, Arc::new(context)).with_policy(policy);
    let sessions = Arc::new(SessionManager::new(Arc::new(engine)));
    sessions.start_cleanup_task(config.session_idle_timeout, CLEANUP_INTERVAL);
    tracing::info!(
        idle_timeout_secs = config.session_idle_timeout.as_secs(),
        "Idle session sweep started"
    );

    let contact = match config.contact_relay_url.as_deref() {
        Some(url) => Some(ContactRelay::new(url)?),
        None => {
            tracing::warn!("No contact relay configured. Set FOLIO_CONTACT_RELAY_URL.");
            None
        }
    };

    // Create application state
    let state = AppState::new(sessions, contact);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Folio assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
