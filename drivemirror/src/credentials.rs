use std::io;
use std::path::{Path, PathBuf};

use drivemirror_core::{DriveClient, DriveError};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::MirrorConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read credentials {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse credentials {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("credentials {0:?} do not contain an \"access_token\" field")]
    MissingToken(PathBuf),
    #[error("failed to establish remote session: {0}")]
    Session(#[from] DriveError),
}

#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    access_token: Option<String>,
}

pub fn load_access_token(path: &Path) -> Result<String, AuthError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: CredentialFile = serde_json::from_str(&raw).map_err(|source| AuthError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    file.access_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::MissingToken(path.to_path_buf()))
}

/// Builds a client from the configured credentials and checks that the
/// remote store accepts them.
pub async fn connect(config: &MirrorConfig) -> Result<DriveClient, AuthError> {
    let token = load_access_token(&config.credentials_path)?;
    let client = match &config.api_base {
        Some(base) => DriveClient::with_base_url(base.as_str(), token)?,
        None => DriveClient::new(token)?,
    }
    .with_page_size(config.page_size);
    let about = client.about().await?;
    let account = about
        .user
        .and_then(|user| user.email_address.or(user.display_name))
        .unwrap_or_else(|| "unknown".to_string());
    info!(account = %account, "remote session established");
    Ok(client)
}
