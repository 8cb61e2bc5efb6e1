//! # Tidewire Domain
//!
//! Data types shared by every Tidewire crate.
//!
//! This crate contains:
//! - Workspace error type and Result alias
//! - Client configuration
//! - Protocol state (`AuthToken`, `UploadSession`, `PageCursor`,
//!   `SyncCheckpoint`) and the JSON shapes exchanged with the backend
//! - Protocol constants
//!
//! ## Architecture
//! - No dependencies on other Tidewire crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
