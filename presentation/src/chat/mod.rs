//! Interactive chat module
//!
//! Provides a readline-based interactive chat interface over the peer
//! controller, with live rendering of controller events.

mod input;
mod renderer;
mod repl;

pub use input::ReplInput;
pub use renderer::EventRenderer;
pub use repl::ChatRepl;
