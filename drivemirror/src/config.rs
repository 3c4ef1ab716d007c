use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

const DEFAULT_MAP_PATH: &str = "dir_map.json";
const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read mapping document {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse mapping document {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("mapping document {0:?} contains an empty local path or remote id")]
    EmptyMapping(PathBuf),
    #[error("invalid API base url {value}: {source}")]
    ApiBase {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// One local directory mirrored into one remote root folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub local_root: PathBuf,
    pub remote_root_id: String,
}

#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub map_path: PathBuf,
    pub credentials_path: PathBuf,
    pub api_base: Option<Url>,
    pub page_size: u32,
}

impl MirrorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let map_path = lookup("DRIVEMIRROR_MAP")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAP_PATH.to_string());
        let credentials_path = lookup("DRIVEMIRROR_CREDENTIALS")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string());
        let api_base = lookup("DRIVEMIRROR_API_BASE")
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                Url::parse(&value).map_err(|source| ConfigError::ApiBase { value, source })
            })
            .transpose()?;
        let page_size = lookup("DRIVEMIRROR_PAGE_SIZE")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        Ok(Self {
            map_path: PathBuf::from(map_path),
            credentials_path: PathBuf::from(credentials_path),
            api_base,
            page_size,
        })
    }
}

/// Reads a JSON object of local directory -> remote root id.
///
/// Mappings come back sorted by local path.
pub fn load_mappings(path: &Path) -> Result<Vec<Mapping>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: BTreeMap<String, String> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    document
        .into_iter()
        .map(|(local, remote)| {
            if local.trim().is_empty() || remote.trim().is_empty() {
                return Err(ConfigError::EmptyMapping(path.to_path_buf()));
            }
            Ok(Mapping {
                local_root: PathBuf::from(local),
                remote_root_id: remote.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = MirrorConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.map_path, PathBuf::from("dir_map.json"));
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert!(config.api_base.is_none());
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn reads_overrides_and_clamps_page_size() {
        let config = MirrorConfig::from_lookup(lookup_from(&[
            ("DRIVEMIRROR_MAP", "/etc/mirror/map.json"),
            ("DRIVEMIRROR_API_BASE", "http://127.0.0.1:8080"),
            ("DRIVEMIRROR_PAGE_SIZE", "50000"),
        ]))
        .unwrap();
        assert_eq!(config.map_path, PathBuf::from("/etc/mirror/map.json"));
        assert_eq!(config.api_base.unwrap().as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.page_size, 1000);
    }

    #[test]
    fn rejects_malformed_api_base() {
        let err = MirrorConfig::from_lookup(lookup_from(&[("DRIVEMIRROR_API_BASE", "not a url")]))
            .expect_err("expected invalid url");
        assert!(matches!(err, ConfigError::ApiBase { .. }));
    }

    #[test]
    fn loads_mapping_document_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dir_map.json");
        std::fs::write(
            &path,
            r#"{"/srv/photos": "folder-b", "/srv/docs": "folder-a"}"#,
        )
        .unwrap();

        let mappings = load_mappings(&path).unwrap();

        assert_eq!(
            mappings,
            vec![
                Mapping {
                    local_root: PathBuf::from("/srv/docs"),
                    remote_root_id: "folder-a".into(),
                },
                Mapping {
                    local_root: PathBuf::from("/srv/photos"),
                    remote_root_id: "folder-b".into(),
                },
            ]
        );
    }

    #[test]
    fn missing_document_is_a_read_error() {
        let dir = tempdir().unwrap();
        let err = load_mappings(&dir.path().join("nope.json")).expect_err("expected read error");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dir_map.json");
        std::fs::write(&path, r#"["/srv/docs"]"#).unwrap();
        assert!(matches!(
            load_mappings(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn empty_remote_id_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dir_map.json");
        std::fs::write(&path, r#"{"/srv/docs": " "}"#).unwrap();
        assert!(matches!(
            load_mappings(&path),
            Err(ConfigError::EmptyMapping(_))
        ));
    }
}
