//! The turn engine: the heart of Codewright.
//!
//! One turn follows a small state machine:
//!
//! 1. **Record** the user message in the conversation store
//! 2. **Model**: send history and tool descriptors to the model gateway
//! 3. **If tool calls**: dispatch them through the tool registry, record each
//!    result, and go back to step 2
//! 4. **If text only**: the turn is over
//!
//! Every message is persisted as soon as it is produced. The loop stops early
//! with a notice once the configured tool round limit is reached.

pub mod engine;

pub use engine::{TurnEngine, TurnPhase};
