/// Logging setup
pub mod logging;

/// Application error type and exit status mapping
pub mod error;

// Re-export commonly used types
pub use error::{AppError, AppResult, ErrorCode, ErrorContext};
