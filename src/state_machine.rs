//! Core conversation state machine
//!
//! Pure state, routing and edge-graph logic. Nothing in here performs I/O;
//! the runtime executes steps and feeds their updates back through these
//! functions.

pub mod intent;
pub mod router;
pub mod state;
pub mod step;
pub(crate) mod transition;


pub use intent::{IntentAction, IntentDecision, IntentRejection, RawIntent};
pub use router::route_entry;
pub use state::{ConversationState, Language, Phase, Preferences, Recipe, StateUpdate};
pub use step::StepId;
pub use transition::{next_step, Edge, TransitionError};
