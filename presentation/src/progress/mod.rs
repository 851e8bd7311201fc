//! Live progress display for streaming peers

pub mod stream_progress;

pub use stream_progress::StreamProgress;
