//! User command interpretation.
//!
//! - [`classifier::Command`]: classified user input
//! - [`mode::SessionMode`]: mode requested by a start command

pub mod classifier;
pub mod mode;
