//! Application-level configuration.
//!
//! - [`ControllerConfig`]: session root, publish throttling and cancellation
//!   notices for the peer controller

pub mod controller_config;

pub use controller_config::ControllerConfig;
