//! Drive client requests and error mapping against a local Drive stand-in.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use tablegate_common::Error;
use tablegate_storage::gdrive::{AuthManager, ClientSecrets, DriveClient, Session, Tokens};
use tablegate_storage::{DriveApi, EntryKind};

const ACCESS_TOKEN: &str = "test-access-token";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// A request as the stand-in saw it.
#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    content_type: Option<String>,
    body: Bytes,
}

#[derive(Default)]
struct FakeDrive {
    seen: Mutex<Vec<Seen>>,
}

impl FakeDrive {
    fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

fn file_json(id: &str, name: &str, mime_type: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "mimeType": mime_type,
        "createdTime": "2024-05-01T10:00:00Z",
        "parents": ["root"]
    })
}

async fn drive_api(
    State(drive): State<Arc<FakeDrive>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let expected = format!("Bearer {}", ACCESS_TOKEN);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }

    let path = uri.path().to_string();
    drive.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    match (method, path.as_str()) {
        (Method::GET, "/drive/v3/files") => match query.get("pageToken").map(String::as_str) {
            None => Json(json!({
                "files": [file_json("1", "alpha", FOLDER_MIME)],
                "nextPageToken": "page-2"
            }))
            .into_response(),
            Some("page-2") => Json(json!({
                "files": [file_json("2", "beta", FOLDER_MIME)]
            }))
            .into_response(),
            Some(_) => (StatusCode::BAD_REQUEST, "bad page token").into_response(),
        },
        (Method::GET, "/drive/v3/files/missing") => {
            (StatusCode::NOT_FOUND, "File not found: missing").into_response()
        }
        (Method::GET, "/drive/v3/files/broken") => {
            (StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response()
        }
        (Method::GET, "/drive/v3/files/stored") => {
            (StatusCode::OK, Bytes::from_static(b"stored bytes")).into_response()
        }
        (Method::POST, "/drive/v3/files") => {
            (StatusCode::FORBIDDEN, "insufficient permissions").into_response()
        }
        (Method::POST, "/upload/drive/v3/files") => {
            Json(file_json("new-file", "data.parquet", "application/octet-stream"))
                .into_response()
        }
        (Method::PATCH, "/upload/drive/v3/files/existing") => {
            Json(file_json("existing", "data.parquet", "application/octet-stream"))
                .into_response()
        }
        (Method::DELETE, "/drive/v3/files/existing") => StatusCode::NO_CONTENT.into_response(),
        _ => (StatusCode::NOT_FOUND, "no such route").into_response(),
    }
}

/// Serve the stand-in on an ephemeral port; returns its base URL.
async fn serve() -> (Arc<FakeDrive>, String) {
    let drive = Arc::new(FakeDrive::default());
    let router = Router::new()
        .fallback(drive_api)
        .with_state(drive.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    (drive, format!("http://{}", addr))
}

async fn start() -> (Arc<FakeDrive>, DriveClient) {
    let (drive, base) = serve().await;
    (drive, client(ACCESS_TOKEN).with_endpoint(&base))
}

fn client(access_token: &str) -> DriveClient {
    let secrets = ClientSecrets::parse(
        r#"{"installed": {"client_id": "test_id", "client_secret": "test_secret"}}"#,
    )
    .unwrap();
    let auth = AuthManager::new(&secrets, "http://localhost:8080/").unwrap();
    let tokens = Tokens {
        access_token: access_token.to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
    };

    DriveClient::new(Arc::new(Session::new(auth, tokens, None))).unwrap()
}

#[tokio::test]
async fn test_listing_follows_pages() {
    let (drive, client) = start().await;

    let folders = client
        .list_children("root", EntryKind::Folder)
        .await
        .unwrap();

    let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(folders[1].id, "2");
    assert!(folders.iter().all(|f| f.is_folder()));

    let requests = drive.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.path == "/drive/v3/files"));
    assert!(!requests[0].query.contains_key("pageToken"));
    assert_eq!(requests[1].query["pageToken"], "page-2");
    assert!(requests[0].query["q"].starts_with("'root' in parents and trashed = false"));
    assert!(!requests[0].query.contains_key("orderBy"));
}

#[tokio::test]
async fn test_find_children_orders_by_creation() {
    let (drive, client) = start().await;

    client
        .find_children("root", "bob's", EntryKind::Folder)
        .await
        .unwrap();

    let request = &drive.requests()[0];
    assert_eq!(request.query["orderBy"], "createdTime");
    assert!(request.query["q"].starts_with(r"name = 'bob\'s' and 'root' in parents"));
}

#[tokio::test]
async fn test_download() {
    let (drive, client) = start().await;

    assert_eq!(client.download("stored").await.unwrap(), b"stored bytes");
    assert_eq!(drive.requests()[0].query["alt"], "media");
}

#[tokio::test]
async fn test_download_missing_is_not_found() {
    let (_drive, client) = start().await;

    assert!(matches!(
        client.download("missing").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_folder_forbidden() {
    let (drive, client) = start().await;

    let result = client.create_folder("root", "sales").await;
    assert!(matches!(result, Err(Error::PermissionDenied(_))));

    let request = &drive.requests()[0];
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["mimeType"], FOLDER_MIME);
    assert_eq!(body["parents"][0], "root");
}

#[tokio::test]
async fn test_server_error_is_network() {
    let (_drive, client) = start().await;

    assert!(matches!(client.stat("broken").await, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_rejected_token_is_authentication() {
    let (drive, base) = serve().await;
    let client = client("revoked-token").with_endpoint(&base);

    assert!(matches!(
        client.list_children("root", EntryKind::File).await,
        Err(Error::Authentication(_))
    ));
    assert!(matches!(
        client.delete("existing").await,
        Err(Error::Authentication(_))
    ));
    assert!(drive.requests().is_empty());
}

#[tokio::test]
async fn test_create_file_uses_multipart_upload() {
    let (drive, client) = start().await;

    let file = client
        .create_file("folder-1", "data.parquet", b"PAR1-bytes".to_vec())
        .await
        .unwrap();
    assert_eq!(file.id, "new-file");
    assert_eq!(file.kind, EntryKind::File);

    let request = &drive.requests()[0];
    assert_eq!(request.path, "/upload/drive/v3/files");
    assert_eq!(request.query["uploadType"], "multipart");
    let content_type = request.content_type.as_deref().unwrap();
    let boundary = content_type
        .strip_prefix("multipart/related; boundary=")
        .unwrap();

    let body = String::from_utf8_lossy(&request.body);
    assert!(body.starts_with(&format!("--{}\r\n", boundary)));
    assert!(body.contains(r#""name":"data.parquet""#));
    assert!(body.contains(r#""parents":["folder-1"]"#));
    assert!(body.contains("PAR1-bytes"));
    assert!(body.ends_with(&format!("--{}--", boundary)));
}

#[tokio::test]
async fn test_update_file_uses_media_upload() {
    let (drive, client) = start().await;

    client
        .update_file("existing", b"new contents".to_vec())
        .await
        .unwrap();

    let request = &drive.requests()[0];
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.query["uploadType"], "media");
    assert_eq!(request.content_type.as_deref(), Some("application/octet-stream"));
    assert_eq!(&request.body[..], b"new contents");
}

#[tokio::test]
async fn test_delete() {
    let (drive, client) = start().await;

    client.delete("existing").await.unwrap();
    assert_eq!(drive.requests()[0].method, Method::DELETE);

    assert!(matches!(
        client.delete("unknown").await,
        Err(Error::NotFound(_))
    ));
}
