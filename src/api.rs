//! HTTP API for the portfolio assistant

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::contact::ContactRelay;
use crate::runtime::ProductionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ProductionManager>,
    /// `None` when no form-relay URL is configured
    pub contact: Option<Arc<ContactRelay>>,
}

impl AppState {
    pub fn new(sessions: Arc<ProductionManager>, contact: Option<ContactRelay>) -> Self {
        Self {
            sessions,
            contact: contact.map(Arc::new),
        }
    }
}
