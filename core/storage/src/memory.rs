//! In-memory drive for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::provider::{DriveApi, EntryKind, Metadata};
use tablegate_common::{Error, Result};

/// Default identifier of the root folder.
const DEFAULT_ROOT_ID: &str = "root";

/// In-memory storage entry.
#[derive(Debug, Clone)]
struct Entry {
    metadata: Metadata,
    parent: Option<String>,
    data: Vec<u8>,
}

/// In-memory drive.
///
/// Behaves like a Drive folder tree: entries are addressed by generated
/// ids, names may repeat within a folder, and listings keep insertion
/// order. All data is lost on drop.
pub struct MemoryDrive {
    root_id: String,
    entries: RwLock<Vec<Entry>>,
    offline: AtomicBool,
}

impl MemoryDrive {
    /// Create a drive containing only a root folder with id "root".
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT_ID)
    }

    /// Create a drive whose root folder has the given id.
    pub fn with_root(root_id: impl Into<String>) -> Self {
        let root_id = root_id.into();
        let now = Utc::now();
        let root = Entry {
            metadata: Metadata {
                id: root_id.clone(),
                name: "/".to_string(),
                kind: EntryKind::Folder,
                size: None,
                created: now,
                modified: now,
            },
            parent: None,
            data: Vec::new(),
        };

        Self {
            root_id,
            entries: RwLock::new(vec![root]),
            offline: AtomicBool::new(false),
        }
    }

    /// Id of the root folder.
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Simulate a transport outage. While offline every call fails
    /// with `Error::Network`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of entries below the root folder.
    pub fn entry_count(&self) -> usize {
        self.read().len() - 1
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("memory drive is offline".to_string()));
        }
        Ok(())
    }

    fn check_folder(entries: &[Entry], id: &str) -> Result<()> {
        match entries.iter().find(|e| e.metadata.id == id) {
            Some(e) if e.metadata.is_folder() => Ok(()),
            Some(_) => Err(Error::InvalidInput(format!("Not a folder: {}", id))),
            None => Err(Error::NotFound(format!("Folder not found: {}", id))),
        }
    }

    fn insert(&self, parent_id: &str, name: &str, kind: EntryKind, data: Vec<u8>) -> Result<Metadata> {
        let mut entries = self.write();
        Self::check_folder(&entries, parent_id)?;

        let now = Utc::now();
        let metadata = Metadata {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            kind,
            size: match kind {
                EntryKind::File => Some(data.len() as u64),
                EntryKind::Folder => None,
            },
            created: now,
            modified: now,
        };

        entries.push(Entry {
            metadata: metadata.clone(),
            parent: Some(parent_id.to_string()),
            data,
        });

        Ok(metadata)
    }
}

impl Default for MemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    fn name(&self) -> &str {
        "memory"
    }

    async fn stat(&self, id: &str) -> Result<Metadata> {
        self.check_online()?;
        self.read()
            .iter()
            .find(|e| e.metadata.id == id)
            .map(|e| e.metadata.clone())
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", id)))
    }

    async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Vec<Metadata>> {
        self.check_online()?;
        Ok(self
            .read()
            .iter()
            .filter(|e| {
                e.parent.as_deref() == Some(parent_id)
                    && e.metadata.name == name
                    && e.metadata.kind == kind
            })
            .map(|e| e.metadata.clone())
            .collect())
    }

    async fn list_children(&self, parent_id: &str, kind: EntryKind) -> Result<Vec<Metadata>> {
        self.check_online()?;
        Ok(self
            .read()
            .iter()
            .filter(|e| e.parent.as_deref() == Some(parent_id) && e.metadata.kind == kind)
            .map(|e| e.metadata.clone())
            .collect())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Metadata> {
        self.check_online()?;
        self.insert(parent_id, name, EntryKind::Folder, Vec::new())
    }

    async fn create_file(&self, parent_id: &str, name: &str, data: Vec<u8>) -> Result<Metadata> {
        self.check_online()?;
        self.insert(parent_id, name, EntryKind::File, data)
    }

    async fn update_file(&self, file_id: &str, data: Vec<u8>) -> Result<Metadata> {
        self.check_online()?;
        let mut entries = self.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.metadata.id == file_id)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file_id)))?;

        if entry.metadata.is_folder() {
            return Err(Error::InvalidInput("Cannot write to a folder".to_string()));
        }

        entry.metadata.size = Some(data.len() as u64);
        entry.metadata.modified = Utc::now();
        entry.data = data;

        Ok(entry.metadata.clone())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.check_online()?;
        let entries = self.read();
        match entries.iter().find(|e| e.metadata.id == file_id) {
            Some(e) if e.metadata.is_folder() => {
                Err(Error::InvalidInput("Cannot download a folder".to_string()))
            }
            Some(e) => Ok(e.data.clone()),
            None => Err(Error::NotFound(format!("File not found: {}", file_id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_online()?;
        if id == self.root_id {
            return Err(Error::InvalidInput("Cannot delete the root folder".to_string()));
        }

        let mut entries = self.write();
        if !entries.iter().any(|e| e.metadata.id == id) {
            return Err(Error::NotFound(format!("Object not found: {}", id)));
        }

        // Collect the subtree; children always follow their parent in the list.
        let mut doomed = HashSet::from([id.to_string()]);
        for entry in entries.iter() {
            if let Some(parent) = &entry.parent {
                if doomed.contains(parent) {
                    doomed.insert(entry.metadata.id.clone());
                }
            }
        }

        entries.retain(|e| !doomed.contains(&e.metadata.id));
        Ok(())
    }
}
