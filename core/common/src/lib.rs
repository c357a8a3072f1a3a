//! Common utilities and types shared across tablegate modules.
//!
//! This module provides the error taxonomy and the validated table name
//! used by the storage and gateway crates.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::TableName;
