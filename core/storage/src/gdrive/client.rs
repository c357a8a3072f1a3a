//! Google Drive API client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use tablegate_common::{Error, Result};

use super::session::Session;
use crate::provider::{DriveApi, EntryKind, Metadata};

/// Root of Google's API endpoints.
const GOOGLE_API_ROOT: &str = "https://www.googleapis.com";

/// MIME type Drive uses for folders.
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for single files.
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,parents";
/// Fields requested for listings.
const LIST_FIELDS: &str =
    "files(id,name,mimeType,size,createdTime,modifiedTime,parents),nextPageToken";

const PAGE_SIZE: &str = "1000";

/// File resource as returned by the `files` endpoints.
///
/// Drive reports `size` as a decimal string and omits it for folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }

    fn into_metadata(self) -> Metadata {
        let kind = if self.is_folder() {
            EntryKind::Folder
        } else {
            EntryKind::File
        };
        let size = self.size_bytes();
        let created = self.created_time.unwrap_or_else(Utc::now);

        Metadata {
            id: self.id,
            name: self.name,
            kind,
            size,
            created,
            modified: self.modified_time.unwrap_or(created),
        }
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Body of a `multipart/related` upload: JSON metadata, then raw content.
fn multipart_related(boundary: &str, metadata_json: &str, data: &[u8]) -> Vec<u8> {
    let parts: [(&str, &[u8]); 2] = [
        ("application/json; charset=UTF-8", metadata_json.as_bytes()),
        ("application/octet-stream", data),
    ];

    let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);
    for (content_type, content) in parts {
        body.extend_from_slice(
            format!("--{}\r\nContent-Type: {}\r\n\r\n", boundary, content_type).as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--", boundary).as_bytes());
    body
}

/// Quote a value for use inside a Drive search query.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn kind_clause(kind: EntryKind) -> String {
    match kind {
        EntryKind::Folder => format!("mimeType = {}", quote(FOLDER_MIME_TYPE)),
        EntryKind::File => format!("mimeType != {}", quote(FOLDER_MIME_TYPE)),
    }
}

fn children_query(parent_id: &str, kind: EntryKind) -> String {
    format!(
        "{} in parents and trashed = false and {}",
        quote(parent_id),
        kind_clause(kind)
    )
}

fn named_children_query(parent_id: &str, name: &str, kind: EntryKind) -> String {
    format!(
        "name = {} and {}",
        quote(name),
        children_query(parent_id, kind)
    )
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    session: Arc<Session>,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(session: Arc<Session>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("tablegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            session,
            api_base: String::new(),
            upload_base: String::new(),
        }
        .with_endpoint(GOOGLE_API_ROOT))
    }

    /// Send requests to another API root, such as a local test server.
    pub fn with_endpoint(mut self, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        self.api_base = format!("{}/drive/v3", root);
        self.upload_base = format!("{}/upload/drive/v3", root);
        self
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.session.access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Run a search query, following pagination.
    async fn search(&self, query: &str, order_by: Option<&str>) -> Result<Vec<DriveFile>> {
        let url = format!("{}/files", self.api_base);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let auth = self.auth_header().await?;

            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, auth)
                .query(&[
                    ("q", query),
                    ("fields", LIST_FIELDS),
                    ("pageSize", PAGE_SIZE),
                ]);

            if let Some(order_by) = order_by {
                request = request.query(&[("orderBy", order_by)]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to search files: {}", e)))?;

            let list_response: FileListResponse = handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Query [{}] matched {} entries", query, all_files.len());
        Ok(all_files)
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn stat(&self, id: &str) -> Result<Metadata> {
        let url = format!("{}/files/{}", self.api_base, id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get file: {}", e)))?;

        let file: DriveFile = handle_response(response).await?;
        Ok(file.into_metadata())
    }

    async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Vec<Metadata>> {
        let query = named_children_query(parent_id, name, kind);
        let files = self.search(&query, Some("createdTime")).await?;
        Ok(files.into_iter().map(DriveFile::into_metadata).collect())
    }

    async fn list_children(&self, parent_id: &str, kind: EntryKind) -> Result<Vec<Metadata>> {
        let query = children_query(parent_id, kind);
        let files = self.search(&query, None).await?;
        Ok(files.into_iter().map(DriveFile::into_metadata).collect())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<Metadata> {
        let url = format!("{}/files", self.api_base);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create folder: {}", e)))?;

        let folder: DriveFile = handle_response(response).await?;
        Ok(folder.into_metadata())
    }

    async fn create_file(&self, parent_id: &str, name: &str, data: Vec<u8>) -> Result<Metadata> {
        let url = format!("{}/files", self.upload_base);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });
        let metadata_json = serde_json::to_string(&metadata)?;

        let boundary = format!("tablegate-{}", Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata_json, &data);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        let file: DriveFile = handle_response(response).await?;
        Ok(file.into_metadata())
    }

    async fn update_file(&self, file_id: &str, data: Vec<u8>) -> Result<Metadata> {
        let url = format!("{}/files/{}", self.upload_base, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .patch(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to update file: {}", e)))?;

        let file: DriveFile = handle_response(response).await?;
        Ok(file.into_metadata())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        let response = check_status(response).await?;

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.api_base, id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        check_status(response).await?;
        Ok(())
    }
}

/// Map an unsuccessful response to an error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(format!("Resource not found: {}", body)),
        StatusCode::UNAUTHORIZED => {
            Error::Authentication("Invalid or expired token".to_string())
        }
        StatusCode::FORBIDDEN => Error::PermissionDenied(format!("Access denied: {}", body)),
        _ => Error::Network(format!("API error: {} - {}", status, body)),
    })
}

/// Handle API response with error checking.
async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
}
