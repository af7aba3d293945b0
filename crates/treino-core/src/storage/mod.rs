//! Storage layer
//!
//! Durable state for both device roles.
//!
//! ## Layout
//!
//! - **SQLite key-value table**: the authoritative collection, one blob
//! - **Asset files**: one file per image in the device's documents directory
//!
//! File writes go through an atomic temp-file-and-rename helper.

pub mod error;
pub mod files;
pub mod persistence;
pub mod schema;

pub use error::{StorageError, StorageResult};
pub use persistence::{LocalStore, WORKOUT_GROUPS_KEY};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
