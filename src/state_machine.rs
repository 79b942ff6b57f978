//! Per-conversation synchronization state machine
//!
//! Pure transitions in the Elm style: `transition` maps a state and an event
//! to a new state plus effects, and the conversation session executes them.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{FailureKind, SyncState};
pub use transition::{transition, TransitionError, TransitionResult};
