//! Shared utilities: errors and logging

pub mod error;
pub mod logging;

pub use error::{AppError, ErrorResponse};
pub use logging::init_tracing;
