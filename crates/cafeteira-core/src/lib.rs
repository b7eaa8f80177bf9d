//! # cafeteira-core
//!
//! Core crate for the Cafeteira console. Contains configuration schemas,
//! the device's wire types (users, logs, status), the shared session store,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Cafeteira crates.

pub mod config;
pub mod error;
pub mod result;
pub mod session;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
pub use session::{Role, Session, SessionStore};
