//! Short-term conversation history
//!
//! Provides the bounded per-session history window and the registry that
//! owns stateful windows across sessions.

pub mod registry;
pub mod window;

pub use registry::{EvictionPolicy, SessionRegistry};
pub use window::HistoryWindow;
