use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path {0:?} is not under the mapping root")]
    OutsideRoot(PathBuf),
    #[error("path {0:?} contains an unsupported component")]
    UnsupportedComponent(PathBuf),
    #[error("path {0:?} is not valid UTF-8")]
    NonUnicode(PathBuf),
}

/// Builds the index key for `path` relative to `root`.
///
/// Keys are `/`-separated with no leading or trailing separator, so local
/// keys line up with the keys built from remote names regardless of the
/// platform separator.
pub fn relative_key(root: &Path, path: &Path) -> Result<String, PathError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot(path.to_path_buf()))?;
    let mut key = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUnicode(path.to_path_buf()))?;
                key = join_key(&key, part);
            }
            Component::CurDir => continue,
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent(path.to_path_buf()));
            }
        }
    }
    Ok(key)
}

pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Splits a key into its parent directory key and final name.
pub fn split_parent(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", key),
    }
}

pub fn segments(dir_key: &str) -> impl Iterator<Item = &str> {
    dir_key.split('/').filter(|segment| !segment.is_empty())
}
