//! Table-level operations over a remote folder tree.

use arrow_array::{Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tablegate_common::{Error, Result, TableName};
use tablegate_storage::gdrive::{ClientSecrets, DriveClient, LoopbackConsent, Session, TokenStore};
use tablegate_storage::{DriveApi, EntryKind, Metadata};

use crate::codec;
use crate::config::GatewayConfig;
use crate::confirm::Confirm;
use crate::summary;

/// Name of the file holding table contents.
pub const DATA_FILE_NAME: &str = "data.parquet";
/// Name of the file holding the structural summary.
pub const META_FILE_NAME: &str = "meta.parquet";
/// Column of the metadata file holding the summary string.
const META_COLUMN: &str = "info";

/// Result of [`DataGateway::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The table folder and its files were removed.
    Deleted,
    /// No table with that name exists; nothing was done.
    Missing,
    /// The confirmation hook refused; nothing was done.
    Declined,
}

/// Stores tables as folders below a fixed root folder.
///
/// Every operation resolves the table folder by name. When several
/// folders share a name the oldest one is used.
pub struct DataGateway {
    drive: Arc<dyn DriveApi>,
    root_folder_id: String,
    /// Table name to folder id, when caching is enabled.
    folder_cache: Option<RwLock<HashMap<String, String>>>,
}

impl DataGateway {
    /// Create a gateway over an existing drive connection.
    pub fn new(drive: Arc<dyn DriveApi>, root_folder_id: impl Into<String>) -> Self {
        Self {
            drive,
            root_folder_id: root_folder_id.into(),
            folder_cache: None,
        }
    }

    /// Enable or disable the table folder id cache.
    pub fn with_folder_cache(mut self, enabled: bool) -> Self {
        self.folder_cache = enabled.then(|| RwLock::new(HashMap::new()));
        self
    }

    /// Authenticate against Google Drive and open the root folder.
    ///
    /// Runs the interactive consent flow when no usable token is stored.
    ///
    /// # Errors
    /// - `Authentication` if credentials are missing/invalid or consent is denied
    /// - `NotFound` if the root folder does not exist
    /// - `InvalidInput` if the configuration is invalid or the root is not a folder
    pub async fn connect(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let secrets = ClientSecrets::from_file(&config.client_config_file).await?;
        let consent = LoopbackConsent::new(config.auth_port).open_browser(config.open_browser);
        let session =
            Session::acquire(&secrets, TokenStore::new(&config.token_file), &consent).await?;

        let client = DriveClient::new(Arc::new(session))?;
        let gateway = Self::new(Arc::new(client), config.folder_id.clone())
            .with_folder_cache(config.cache_folder_ids);

        gateway.verify_root().await?;
        info!("Connected to root folder {}", gateway.root_folder_id);

        Ok(gateway)
    }

    /// Check that the root folder exists and is a folder.
    pub async fn verify_root(&self) -> Result<()> {
        let root = self.drive.stat(&self.root_folder_id).await?;
        if !root.is_folder() {
            return Err(Error::InvalidInput(format!(
                "Root {} is not a folder",
                self.root_folder_id
            )));
        }
        Ok(())
    }

    pub fn root_folder_id(&self) -> &str {
        &self.root_folder_id
    }

    /// Store a dataset under `table_name`.
    ///
    /// # Postconditions
    /// - The table folder holds the encoded dataset and its summary
    ///
    /// # Errors
    /// - `InvalidInput` if the name is invalid
    /// - `AlreadyExists` if the table exists and `overwrite` is false;
    ///   nothing is written in that case
    /// - `Codec` if the dataset cannot be encoded
    /// - transport errors from the drive, without cleanup of partial writes
    pub async fn put(&self, table_name: &str, dataset: &RecordBatch, overwrite: bool) -> Result<()> {
        let table = TableName::new(table_name)?;

        let data = codec::encode(dataset)?;
        let meta = codec::encode(&summary_batch(&summary::describe(dataset))?)?;

        let folder_id = match self.find_table_folder(&table).await? {
            Some(_) if !overwrite => {
                return Err(Error::AlreadyExists(format!(
                    "Table '{}' already exists",
                    table
                )));
            }
            Some(id) => {
                info!("Overwriting table '{}'", table);
                id
            }
            None => {
                let folder = self
                    .drive
                    .create_folder(&self.root_folder_id, table.as_str())
                    .await?;
                debug!("Created folder {} for table '{}'", folder.id, table);
                self.remember(&table, &folder.id).await;
                folder.id
            }
        };

        self.write_file(&folder_id, DATA_FILE_NAME, data).await?;
        self.write_file(&folder_id, META_FILE_NAME, meta).await?;

        info!(
            "Stored table '{}' ({} rows, {} columns)",
            table,
            dataset.num_rows(),
            dataset.num_columns()
        );
        Ok(())
    }

    /// Fetch the dataset stored under `table_name`.
    ///
    /// # Errors
    /// - `NotFound` if the table or its data file is missing
    pub async fn get(&self, table_name: &str) -> Result<RecordBatch> {
        let table = TableName::new(table_name)?;
        let data = self.read_file(&table, DATA_FILE_NAME).await?;
        codec::decode(data)
    }

    /// Fetch the structural summary stored with `table_name`.
    ///
    /// # Errors
    /// - `NotFound` if the table or its metadata file is missing
    /// - `Serialization` if the metadata file has an unexpected shape
    pub async fn meta(&self, table_name: &str) -> Result<String> {
        let table = TableName::new(table_name)?;
        let data = self.read_file(&table, META_FILE_NAME).await?;
        summary_from_batch(&codec::decode(data)?)
    }

    /// Names of all table folders, in the drive's listing order.
    pub async fn list(&self) -> Result<Vec<String>> {
        let folders = self
            .drive
            .list_children(&self.root_folder_id, EntryKind::Folder)
            .await?;
        Ok(folders.into_iter().map(|f| f.name).collect())
    }

    /// Delete a table after asking `confirm`.
    ///
    /// A missing table is not an error: a warning is logged and
    /// `DeleteOutcome::Missing` returned without asking.
    pub async fn delete(&self, table_name: &str, confirm: &dyn Confirm) -> Result<DeleteOutcome> {
        let table = TableName::new(table_name)?;

        let Some(folder_id) = self.find_table_folder(&table).await? else {
            warn!("Table '{}' not found, nothing to delete", table);
            return Ok(DeleteOutcome::Missing);
        };

        if !confirm.confirm(&table)? {
            info!("Deletion of table '{}' cancelled", table);
            return Ok(DeleteOutcome::Declined);
        }

        self.drive.delete(&folder_id).await?;
        self.forget(&table).await;

        info!("Deleted table '{}'", table);
        Ok(DeleteOutcome::Deleted)
    }

    async fn find_table_folder(&self, table: &TableName) -> Result<Option<String>> {
        if let Some(cache) = &self.folder_cache {
            if let Some(id) = cache.read().await.get(table.as_str()) {
                return Ok(Some(id.clone()));
            }
        }

        let matches = self
            .drive
            .find_children(&self.root_folder_id, table.as_str(), EntryKind::Folder)
            .await?;
        if matches.len() > 1 {
            warn!(
                "{} folders named '{}', using the oldest ({})",
                matches.len(),
                table,
                matches[0].id
            );
        }

        let id = matches.into_iter().next().map(|folder| folder.id);
        if let Some(id) = &id {
            self.remember(table, id).await;
        }
        Ok(id)
    }

    async fn find_file(&self, folder_id: &str, name: &str) -> Result<Option<Metadata>> {
        let matches = self
            .drive
            .find_children(folder_id, name, EntryKind::File)
            .await?;
        Ok(matches.into_iter().next())
    }

    async fn write_file(&self, folder_id: &str, name: &str, data: Vec<u8>) -> Result<()> {
        let size = data.len();
        match self.find_file(folder_id, name).await? {
            Some(existing) => {
                self.drive.update_file(&existing.id, data).await?;
            }
            None => {
                self.drive.create_file(folder_id, name, data).await?;
            }
        }
        debug!("Uploaded {} ({} bytes) to folder {}", name, size, folder_id);
        Ok(())
    }

    async fn read_file(&self, table: &TableName, name: &str) -> Result<Vec<u8>> {
        let folder_id = self
            .find_table_folder(table)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Table '{}' not found", table)))?;

        let file = self.find_file(&folder_id, name).await?.ok_or_else(|| {
            Error::NotFound(format!("{} of table '{}' not found", name, table))
        })?;

        debug!("Downloading {} of table '{}'", name, table);
        self.drive.download(&file.id).await
    }

    async fn remember(&self, table: &TableName, folder_id: &str) {
        if let Some(cache) = &self.folder_cache {
            cache
                .write()
                .await
                .insert(table.as_str().to_string(), folder_id.to_string());
        }
    }

    async fn forget(&self, table: &TableName) {
        if let Some(cache) = &self.folder_cache {
            cache.write().await.remove(table.as_str());
        }
    }
}

/// Wrap a summary as a one-row, one-column batch.
fn summary_batch(info: &str) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![Field::new(
        META_COLUMN,
        DataType::Utf8,
        false,
    )]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec![info]))])
        .map_err(|e| Error::Codec(format!("Failed to build metadata batch: {}", e)))
}

fn summary_from_batch(batch: &RecordBatch) -> Result<String> {
    let column = batch.column_by_name(META_COLUMN).ok_or_else(|| {
        Error::Serialization(format!("Metadata file has no '{}' column", META_COLUMN))
    })?;
    let values = column
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            Error::Serialization(format!(
                "Metadata column '{}' is {}, expected Utf8",
                META_COLUMN,
                column.data_type()
            ))
        })?;

    if values.is_empty() || values.is_null(0) {
        return Err(Error::Serialization("Metadata file is empty".to_string()));
    }
    Ok(values.value(0).to_string())
}
