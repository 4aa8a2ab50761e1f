//! Page stage sequencer
//!
//! The site walks through three mutually exclusive stages, forward only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Landing,
    Intro,
    Portfolio,
}

impl Stage {
    /// Next stage; the portfolio stage is terminal
    pub fn advance(self) -> Self {
        match self {
            Stage::Landing => Stage::Intro,
            Stage::Intro | Stage::Portfolio => Stage::Portfolio,
        }
    }
}
