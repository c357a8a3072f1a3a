//! Drive provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tablegate_common::Result;

/// Kind of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Unique identifier for the object (provider-specific).
    pub id: String,
    /// Name of the object.
    pub name: String,
    /// Folder or file.
    pub kind: EntryKind,
    /// Size in bytes (None for folders).
    pub size: Option<u64>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

impl Metadata {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Remote folder/file store addressed by identifiers.
///
/// Names are not unique within a folder; lookups by name return every
/// match and leave the choice to the caller. Implementations must handle
/// their own authentication.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Get the provider name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// Get metadata for an object by id.
    ///
    /// # Errors
    /// - Object not found
    async fn stat(&self, id: &str) -> Result<Metadata>;

    /// Find children of `parent_id` with exactly this name and kind.
    ///
    /// # Returns
    /// All matches, oldest first. Empty if none.
    async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Vec<Metadata>>;

    /// List children of `parent_id` of the given kind, in provider order.
    async fn list_children(&self, parent_id: &str, kind: EntryKind) -> Result<Vec<Metadata>>;

    /// Create a folder under `parent_id`.
    ///
    /// Does not check for an existing folder with the same name.
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Metadata>;

    /// Create a file under `parent_id` with the given content.
    async fn create_file(&self, parent_id: &str, name: &str, data: Vec<u8>) -> Result<Metadata>;

    /// Replace the content of an existing file.
    ///
    /// # Errors
    /// - File not found
    async fn update_file(&self, file_id: &str, data: Vec<u8>) -> Result<Metadata>;

    /// Download file content.
    ///
    /// # Errors
    /// - File not found
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Permanently delete an object. Deleting a folder deletes its contents.
    ///
    /// # Errors
    /// - Object not found
    async fn delete(&self, id: &str) -> Result<()>;
}
