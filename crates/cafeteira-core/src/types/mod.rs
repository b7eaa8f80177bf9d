//! Wire and view-independent types shared by every Cafeteira crate.

pub mod log;
pub mod response;
pub mod status;
pub mod user;

pub use log::{LogEntry, LogLevel, StructuredLog};
pub use response::{ApiResponse, AuthCheck, LogListResponse, LoginResponse, UserListResponse, UserLookup};
pub use status::StatusSummary;
pub use user::{NewUser, User};
