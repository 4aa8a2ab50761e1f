//! Chat widget state machine
//!
//! Pure transitions in the Elm style: the current [`SessionState`] and an
//! [`Event`] produce the next state plus a list of [`Effect`]s for the
//! session runtime to execute. No I/O happens here.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::SessionState;
pub use transition::{transition, TransitionError};
