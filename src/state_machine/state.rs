//! Session state types

use crate::stage::Stage;
use serde::{Deserialize, Serialize};

/// Widget and page state for one visitor session
///
/// `open` is presentation only; `loading` gates submissions and is true
/// exactly while a delivery is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub stage: Stage,
    pub open: bool,
    pub loading: bool,
}

impl SessionState {
    pub fn can_submit(&self) -> bool {
        !self.loading
    }

    /// Short label for logs and client notifications
    pub fn label(&self) -> &'static str {
        if self.loading {
            "loading"
        } else {
            "idle"
        }
    }
}
