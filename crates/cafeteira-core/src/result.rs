//! Convenience result type alias for the Cafeteira console.

use crate::error::AppError;

/// A specialized `Result` type for Cafeteira operations.
pub type AppResult<T> = Result<T, AppError>;
