use async_trait::async_trait;
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::client::{children_query, escape_query_value, related_body};
use super::types::{provider_message, PermissionRequest};
use super::*;
use crate::error::{AppError, Result};

// ============================================================================
// In-memory drive
// ============================================================================

#[derive(Default)]
struct FakeDrive {
    files: Mutex<HashMap<String, (DriveFile, Bytes)>>,
    /// Ids that answer like a folder the user can no longer see
    missing: HashSet<String>,
    revoked: bool,
    next_id: Mutex<u64>,
}

impl FakeDrive {
    fn with_folder(self, id: &str, name: &str) -> Self {
        let folder = DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            ..Default::default()
        };
        self.files
            .lock()
            .insert(id.to_string(), (folder, Bytes::new()));
        self
    }

    fn check(&self) -> Result<()> {
        if self.revoked {
            return Err(AppError::AuthRequired("Token has been revoked".to_string()));
        }
        Ok(())
    }

    fn insert(&self, name: &str, mime_type: &str, parent: Option<&str>, data: Bytes) -> DriveFile {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let file = DriveFile {
            id: format!("file-{}", next_id),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: Some(data.len().to_string()),
            parents: parent.map(str::to_owned).into_iter().collect(),
            ..Default::default()
        };
        self.files
            .lock()
            .insert(file.id.clone(), (file.clone(), data));
        file
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn get(&self, file_id: &str) -> Result<DriveFile> {
        self.check()?;
        if self.missing.contains(file_id) {
            return Err(AppError::ExternalService {
                status: Some(404),
                message: format!("File not found: {}", file_id),
            });
        }
        self.files
            .lock()
            .get(file_id)
            .map(|(file, _)| file.clone())
            .ok_or_else(|| AppError::ExternalService {
                status: Some(404),
                message: format!("File not found: {}", file_id),
            })
    }

    async fn list(&self, parent_id: Option<&str>) -> Result<Vec<DriveFile>> {
        self.check()?;
        Ok(self
            .files
            .lock()
            .values()
            .filter(|(file, _)| match parent_id {
                Some(parent) => file.parents.iter().any(|p| p == parent),
                None => true,
            })
            .map(|(file, _)| file.clone())
            .collect())
    }

    async fn find_folder(&self, name: &str) -> Result<Option<DriveFile>> {
        self.check()?;
        Ok(self
            .files
            .lock()
            .values()
            .find(|(file, _)| file.is_folder() && file.name == name)
            .map(|(file, _)| file.clone()))
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile> {
        self.check()?;
        Ok(self.insert(name, FOLDER_MIME_TYPE, parent_id, Bytes::new()))
    }

    async fn upload(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile> {
        self.check()?;
        Ok(self.insert(name, mime_type, parent_id, data))
    }

    async fn move_file(&self, file_id: &str, new_parent_id: &str) -> Result<DriveFile> {
        self.check()?;
        let mut files = self.files.lock();
        let (file, _) = files.get_mut(file_id).ok_or_else(|| AppError::ExternalService {
            status: Some(404),
            message: "File not found".to_string(),
        })?;
        file.parents = vec![new_parent_id.to_string()];
        Ok(file.clone())
    }

    async fn copy(&self, file_id: &str, new_parent_id: Option<&str>) -> Result<DriveFile> {
        let (file, data) = {
            let files = self.files.lock();
            files.get(file_id).cloned().ok_or_else(|| AppError::ExternalService {
                status: Some(404),
                message: "File not found".to_string(),
            })?
        };
        Ok(self.insert(&file.name, &file.mime_type, new_parent_id, data))
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<DriveFile> {
        self.check()?;
        let mut files = self.files.lock();
        let (file, _) = files.get_mut(file_id).ok_or_else(|| AppError::ExternalService {
            status: Some(404),
            message: "File not found".to_string(),
        })?;
        file.name = new_name.to_string();
        Ok(file.clone())
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        self.check()?;
        self.files.lock().remove(file_id);
        Ok(())
    }

    async fn grant_permission(&self, file_id: &str, _grantee: &Grantee, _role: Role) -> Result<()> {
        self.check()?;
        let mut files = self.files.lock();
        if let Some((file, _)) = files.get_mut(file_id) {
            file.web_view_link = Some(format!("https://drive.google.com/file/d/{}/view", file_id));
            file.web_content_link = Some(format!("https://drive.google.com/uc?id={}", file_id));
        }
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Bytes> {
        self.check()?;
        self.files
            .lock()
            .get(file_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| AppError::ExternalService {
                status: Some(404),
                message: "File not found".to_string(),
            })
    }

    fn refreshed_credentials(&self) -> Option<DriveCredentials> {
        None
    }
}

fn gateway(drive: FakeDrive) -> DriveGateway {
    DriveGateway::new(Arc::new(drive), Some("root".to_string()))
}

// ============================================================================
// Gateway
// ============================================================================

#[tokio::test]
async fn test_upload_into_requested_folder() {
    let gw = gateway(
        FakeDrive::default()
            .with_folder("root", "CTS")
            .with_folder("docs", "Docs"),
    );

    let placed = gw
        .upload(Bytes::from_static(b"hello"), "a.txt", "text/plain", Some("docs"))
        .await
        .unwrap();
    assert_eq!(placed.parent_id.as_deref(), Some("docs"));
    assert_eq!(placed.file.parents, vec!["docs"]);
    assert_eq!(placed.file.size_bytes(), Some(5));
}

#[tokio::test]
async fn test_inaccessible_parent_falls_back_to_root() {
    let mut drive = FakeDrive::default().with_folder("root", "CTS");
    drive.missing.insert("gone".to_string());
    let gw = gateway(drive);

    let placed = gw
        .upload(Bytes::from_static(b"hello"), "a.txt", "text/plain", Some("gone"))
        .await
        .unwrap();
    assert_eq!(placed.parent_id.as_deref(), Some("root"));

    let listing = gw.list(Some("gone")).await.unwrap();
    assert_eq!(listing.current_folder_id.as_deref(), Some("root"));
    assert_eq!(listing.files.len(), 1);
}

#[tokio::test]
async fn test_auth_failure_is_not_masked_by_fallback() {
    let drive = FakeDrive {
        revoked: true,
        ..Default::default()
    };
    let gw = gateway(drive);

    let err = gw
        .upload(Bytes::from_static(b"hello"), "a.txt", "text/plain", Some("docs"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);

    let err = gw.list(None).await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)));
}

#[tokio::test]
async fn test_missing_parent_without_root() {
    let gw = DriveGateway::new(Arc::new(FakeDrive::default()), None);
    let placed = gw.create_folder("Docs", None).await.unwrap();
    assert!(placed.parent_id.is_none());
    assert!(placed.file.is_folder());
}

#[tokio::test]
async fn test_validation_errors() {
    let gw = gateway(FakeDrive::default().with_folder("root", "CTS"));

    let err = gw.create_folder("  ", None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = gw.rename("root", "").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = gw.move_or_copy("", "root", TransferOp::Move).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let grantee = Grantee::User {
        email: " ".to_string(),
    };
    let err = gw.make_shareable("root", &grantee, Role::Reader).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_move_and_copy() {
    let gw = gateway(
        FakeDrive::default()
            .with_folder("root", "CTS")
            .with_folder("docs", "Docs"),
    );
    let placed = gw
        .upload(Bytes::from_static(b"hello"), "a.txt", "text/plain", None)
        .await
        .unwrap();
    let file_id = placed.file.id;

    let copied = gw.move_or_copy(&file_id, "docs", TransferOp::Copy).await.unwrap();
    assert_ne!(copied.file.id, file_id);
    assert_eq!(copied.file.parents, vec!["docs"]);

    let moved = gw.move_or_copy(&file_id, "docs", TransferOp::Move).await.unwrap();
    assert_eq!(moved.file.id, file_id);
    assert_eq!(moved.parent_id.as_deref(), Some("docs"));
}

#[tokio::test]
async fn test_make_shareable_returns_links() {
    let gw = gateway(FakeDrive::default().with_folder("root", "CTS"));
    let placed = gw
        .upload(Bytes::from_static(b"hello"), "a.txt", "text/plain", None)
        .await
        .unwrap();

    let links = gw
        .make_shareable(&placed.file.id, &Grantee::Anyone, Role::Reader)
        .await
        .unwrap();
    assert!(links.view_link.unwrap().contains(&placed.file.id));
    assert!(links.download_link.is_some());

    let (file, data) = gw.download(&placed.file.id).await.unwrap();
    assert_eq!(file.name, "a.txt");
    assert_eq!(&data[..], b"hello");
}

#[tokio::test]
async fn test_ensure_root_folder_is_idempotent() {
    let gw = DriveGateway::new(Arc::new(FakeDrive::default()), None);
    let first = gw.ensure_root_folder("CTS").await.unwrap();
    let second = gw.ensure_root_folder("CTS").await.unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Wire helpers
// ============================================================================

#[test]
fn test_related_body_layout() {
    let body = related_body("b", r#"{"name":"a.txt"}"#, "text/plain", b"hello");
    let expected = "--b\r\n\
                    Content-Type: application/json; charset=UTF-8\r\n\r\n\
                    {\"name\":\"a.txt\"}\r\n\
                    --b\r\n\
                    Content-Type: text/plain\r\n\r\n\
                    hello\r\n\
                    --b--";
    assert_eq!(std::str::from_utf8(&body).unwrap(), expected);
}

#[test]
fn test_children_query() {
    assert_eq!(children_query(None), "trashed = false");
    assert_eq!(
        children_query(Some("abc")),
        "trashed = false and 'abc' in parents"
    );
    assert_eq!(escape_query_value(r"it's a\b"), r"it\'s a\\b");
}

#[test]
fn test_provider_message() {
    let drive = r#"{"error": {"code": 404, "message": "File not found: x."}}"#;
    assert_eq!(provider_message(drive).as_deref(), Some("File not found: x."));

    let oauth = r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;
    assert_eq!(
        provider_message(oauth).as_deref(),
        Some("invalid_grant: Token has been expired or revoked.")
    );

    assert_eq!(provider_message("<html>").as_deref(), None);
}

#[test]
fn test_permission_request_json() {
    let anyone =
        serde_json::to_value(PermissionRequest::new(&Grantee::Anyone, Role::Reader)).unwrap();
    assert_eq!(anyone, serde_json::json!({"type": "anyone", "role": "reader"}));

    let user = Grantee::User {
        email: "bob@example.com".to_string(),
    };
    let user = serde_json::to_value(PermissionRequest::new(&user, Role::Writer)).unwrap();
    assert_eq!(
        user,
        serde_json::json!({"type": "user", "role": "writer", "emailAddress": "bob@example.com"})
    );
}

#[test]
fn test_drive_file_parsing() {
    let json = r#"{
        "id": "1abc",
        "name": "Docs",
        "mimeType": "application/vnd.google-apps.folder",
        "parents": ["root"]
    }"#;
    let file: DriveFile = serde_json::from_str(json).unwrap();
    assert!(file.is_folder());
    assert_eq!(file.size_bytes(), None);

    let json = r#"{"id": "2", "name": "a.txt", "mimeType": "text/plain", "size": "1234"}"#;
    let file: DriveFile = serde_json::from_str(json).unwrap();
    assert!(!file.is_folder());
    assert_eq!(file.size_bytes(), Some(1234));
}

// ============================================================================
// Credentials
// ============================================================================

fn oauth_app(token_uri: &str) -> Arc<OAuthApp> {
    Arc::new(OAuthApp {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "http://127.0.0.1:8000/users/google/callback".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
        token_uri: token_uri.to_string(),
    })
}

fn expired_credentials() -> DriveCredentials {
    DriveCredentials {
        token: "stale".to_string(),
        refresh_token: Some("refresh".to_string()),
        scopes: vec![],
        expiry: Some(Utc::now() - Duration::minutes(1)),
    }
}

/// Serve a fixed token endpoint answer on a random local port.
async fn token_server(status: StatusCode, body: serde_json::Value) -> String {
    let app = Router::new().route(
        "/token",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/token", addr)
}

#[test]
fn test_credentials_expiry() {
    let mut credentials = DriveCredentials {
        token: "t".to_string(),
        ..Default::default()
    };
    assert!(!credentials.is_expired());

    credentials.expiry = Some(Utc::now() + Duration::minutes(2));
    assert!(credentials.is_expired());

    credentials.expiry = Some(Utc::now() + Duration::hours(1));
    assert!(!credentials.is_expired());

    assert!(DriveCredentials::default().is_empty());
    assert!(!credentials.is_empty());
}

#[test]
fn test_authorization_url() {
    let url = oauth_app(auth::TOKEN_URI).authorization_url("xyz").unwrap();
    assert!(url.starts_with(auth::AUTH_URI));
    assert!(url.contains("access_type=offline"));
    assert!(url.contains("prompt=consent"));
    assert!(url.contains("state=xyz"));
}

#[tokio::test]
async fn test_unlinked_requires_auth() {
    let tokens = TokenManager::new(
        oauth_app(auth::TOKEN_URI),
        reqwest::Client::new(),
        DriveCredentials::default(),
    );
    assert_eq!(tokens.state(), CredentialState::Unlinked);

    let err = tokens.get_token().await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)));
}

#[tokio::test]
async fn test_revoked_requires_auth() {
    let credentials = DriveCredentials {
        token: "valid".to_string(),
        ..Default::default()
    };
    let tokens = TokenManager::new(oauth_app(auth::TOKEN_URI), reqwest::Client::new(), credentials);
    assert_eq!(tokens.state(), CredentialState::Linked);
    assert_eq!(tokens.get_token().await.unwrap(), "valid");

    tokens.mark_revoked("401 from provider");
    assert_eq!(tokens.state(), CredentialState::Revoked);
    let err = tokens.get_token().await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)));
    assert!(tokens.refreshed_credentials().is_none());
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let token_uri = token_server(
        StatusCode::OK,
        serde_json::json!({"access_token": "fresh", "expires_in": 3599, "token_type": "Bearer"}),
    )
    .await;
    let tokens = TokenManager::new(
        oauth_app(&token_uri),
        reqwest::Client::new(),
        expired_credentials(),
    );

    assert_eq!(tokens.get_token().await.unwrap(), "fresh");
    assert_eq!(tokens.state(), CredentialState::Refreshed);

    let refreshed = tokens.refreshed_credentials().unwrap();
    assert_eq!(refreshed.token, "fresh");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh"));
    assert!(!refreshed.is_expired());
}

#[tokio::test]
async fn test_rejected_refresh_revokes() {
    let token_uri = token_server(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."}),
    )
    .await;
    let tokens = TokenManager::new(
        oauth_app(&token_uri),
        reqwest::Client::new(),
        expired_credentials(),
    );

    let err = tokens.get_token().await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);
    assert_eq!(tokens.state(), CredentialState::Revoked);
}

// ============================================================================
// Client status mapping
// ============================================================================

/// Serve `/files/:id`, answering with the status code named by the id.
async fn drive_server() -> String {
    let app = Router::new().route(
        "/files/:id",
        get(|Path(id): Path<String>| async move {
            let status = id
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::NOT_FOUND);
            let body = serde_json::json!({
                "error": {"code": status.as_u16(), "message": format!("Answer for {}", id)}
            });
            (status, Json(body))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn linked_client() -> GoogleDrive {
    let base = drive_server().await;
    let credentials = DriveCredentials {
        token: "valid".to_string(),
        ..Default::default()
    };
    let tokens = TokenManager::new(oauth_app(auth::TOKEN_URI), reqwest::Client::new(), credentials);
    GoogleDrive::with_base_urls(tokens, &base, &base)
}

#[tokio::test]
async fn test_client_unauthorized_revokes_credentials() {
    for code in ["401", "403"] {
        let client = linked_client().await;
        let err = client.get(code).await.unwrap_err();
        assert!(
            matches!(&err, AppError::AuthRequired(msg) if msg == &format!("Answer for {}", code)),
            "got {:?}",
            err
        );
        assert_eq!(client.token_manager().state(), CredentialState::Revoked);

        let err = client.get("200").await.unwrap_err();
        assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);
    }
}

#[tokio::test]
async fn test_client_not_found_keeps_credentials() {
    let client = linked_client().await;

    let err = client.get("404").await.unwrap_err();
    match err {
        AppError::ExternalService { status, message } => {
            assert_eq!(status, Some(404));
            assert_eq!(message, "Answer for 404");
        }
        other => panic!("expected ExternalService, got {:?}", other),
    }
    assert_eq!(client.token_manager().state(), CredentialState::Linked);
}
