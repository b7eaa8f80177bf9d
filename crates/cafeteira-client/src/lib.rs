//! # cafeteira-client
//!
//! Typed access to the coffee device's REST surface:
//!
//! - session endpoints (`/auth/login`, `/auth/check`, `/auth/logout`)
//! - status, users, logs, and the admin commands (serve, refill, reset,
//!   clear, backup, restore)
//! - the two firmware route dialects (English and legacy Portuguese)
//! - locally generated backup files

pub mod backup;
pub mod client;
pub mod endpoints;

pub use backup::{BackupArtifact, BackupFormat};
pub use client::DeviceClient;
pub use endpoints::Endpoints;
