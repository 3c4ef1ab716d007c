use std::fmt;
use std::io;
use std::path::Path;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_PAGE_SIZE: u32 = 100;
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,md5Checksum)";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const UPLOAD_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
    page_size: u32,
}

impl fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn about(&self) -> Result<About, DriveError> {
        let mut url = self.endpoint("/drive/v3/about")?;
        url.query_pairs_mut().append_pair("fields", "user");
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::handle_response(response).await
    }

    /// Lists one page of the non-trashed children of `parent_id`.
    pub async fn list_children(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError> {
        let query = format!("'{}' in parents and trashed=false", escape_query_value(parent_id));
        self.list_files(&query, page_token).await
    }

    pub async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<DriveFile>, DriveError> {
        let query = format!(
            "name='{}' and '{}' in parents and mimeType='{}' and trashed=false",
            escape_query_value(name),
            escape_query_value(parent_id),
            FOLDER_MIME_TYPE
        );
        let page = self.list_files(&query, None).await?;
        Ok(page.files.into_iter().next())
    }

    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError> {
        self.create_metadata(parent_id, name, FOLDER_MIME_TYPE).await
    }

    /// Creates a file object under `parent_id` and uploads the contents of `source` into it.
    ///
    /// `source` is opened before the object is created, so an unreadable
    /// source never leaves an empty object behind.
    pub async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content_type: &str,
        source: &Path,
    ) -> Result<DriveFile, DriveError> {
        let file = tokio::fs::File::open(source).await?;
        let created = self.create_metadata(parent_id, name, content_type).await?;
        self.upload_stream(&created.id, file).await
    }

    /// Replaces the content of an existing file; the id is preserved.
    pub async fn upload_content(&self, file_id: &str, source: &Path) -> Result<DriveFile, DriveError> {
        let file = tokio::fs::File::open(source).await?;
        self.upload_stream(file_id, file).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        let url = self.file_endpoint("/drive/v3/files", file_id)?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::api_error(response).await)
    }

    async fn upload_stream(
        &self,
        file_id: &str,
        file: tokio::fs::File,
    ) -> Result<DriveFile, DriveError> {
        let mut url = self.file_endpoint("/upload/drive/v3/files", file_id)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("fields", "id,name,mimeType,md5Checksum");
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .authorized(self.http.patch(url))
            .header("Content-Type", UPLOAD_MIME_TYPE)
            .body(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn list_files(&self, query: &str, page_token: Option<&str>) -> Result<FilePage, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("fields", LIST_FIELDS)
                .append_pair("pageSize", &self.page_size.to_string());
            if let Some(token) = page_token.filter(|t| !t.is_empty()) {
                pairs.append_pair("pageToken", token);
            }
        }
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::handle_response(response).await
    }

    async fn create_metadata(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
    ) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("fields", "id,name,mimeType,md5Checksum");
        let metadata = NewFile {
            name,
            mime_type,
            parents: [parent_id],
        };
        let response = self
            .authorized(self.http.post(url))
            .json(&metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    // Ids are opaque, so they are pushed as one percent-encoded segment.
    fn file_endpoint(&self, collection: &str, file_id: &str) -> Result<Url, DriveError> {
        let mut url = self.endpoint(collection)?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(file_id);
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> DriveError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        DriveError::Api { status, body }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.classification() == Some(ApiErrorClass::Auth)
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

// Values are embedded in single-quoted query literals.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    name: &'a str,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct About {
    #[serde(default)]
    pub user: Option<AboutUser>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}
