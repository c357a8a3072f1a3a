//! Table storage on top of a remote folder tree.
//!
//! A table is a folder under a fixed root folder holding two Parquet files:
//! the data itself and a one-cell metadata file with a structural summary.
//!
//! ```text
//! <root>/
//!   <table>/
//!     data.parquet
//!     meta.parquet
//! ```

pub mod codec;
pub mod config;
pub mod confirm;
pub mod gateway;
pub mod summary;

pub use config::GatewayConfig;
pub use confirm::{Confirm, Force, StdinPrompt};
pub use gateway::{DataGateway, DeleteOutcome, DATA_FILE_NAME, META_FILE_NAME};

pub use tablegate_common::{Error, Result, TableName};
