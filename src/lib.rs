//! AI FAQ assistant backend - Library exports for testing
//!
//! Knowledge base storage, category ordering and FAQ-grounded chat.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod infrastructure;
