//! Remote file store abstraction for tablegate.
//!
//! This module provides a trait-based interface over a folder/file store
//! addressed by opaque identifiers, with a Google Drive backend and an
//! in-memory backend for tests.
//!
//! # Design Principles
//! - Provider isolation: no Drive-specific logic in the gateway
//! - Async operations: all I/O operations are async
//! - Unified error semantics: consistent error types across providers

pub mod gdrive;
pub mod memory;
pub mod provider;

pub use memory::MemoryDrive;
pub use provider::{DriveApi, EntryKind, Metadata};
