use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::fingerprint::fingerprint_file;
use super::paths::{join_key, relative_key};
use super::reconcile::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub content_hash: String,
}

/// Relative path to fingerprint for every regular file under one root.
pub type LocalIndex = BTreeMap<String, String>;

#[derive(Debug)]
pub enum WalkStep {
    File(LocalEntry),
    /// The file was discovered but could not be read.
    Unreadable {
        relative_path: String,
        absolute_path: PathBuf,
        error: io::Error,
    },
}

/// Depth-first walk of a local tree that yields one file at a time.
///
/// Directory entries are visited in name order. Symlinks and other
/// non-regular entries are skipped.
pub struct LocalTreeWalker {
    root: PathBuf,
    dirs: Vec<PathBuf>,
    files: VecDeque<(String, PathBuf)>,
}

impl LocalTreeWalker {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dirs: vec![root.to_path_buf()],
            files: VecDeque::new(),
        }
    }

    pub async fn next_entry(&mut self) -> Result<Option<WalkStep>, SyncError> {
        loop {
            if let Some((relative_path, absolute_path)) = self.files.pop_front() {
                return Ok(Some(match fingerprint_file(&absolute_path).await {
                    Ok(content_hash) => WalkStep::File(LocalEntry {
                        relative_path,
                        absolute_path,
                        content_hash,
                    }),
                    Err(error) => WalkStep::Unreadable {
                        relative_path,
                        absolute_path,
                        error,
                    },
                }));
            }
            let Some(dir) = self.dirs.pop() else {
                return Ok(None);
            };
            self.list_dir(&dir).await?;
        }
    }

    async fn list_dir(&mut self, dir: &Path) -> Result<(), SyncError> {
        let fs_error = |source: io::Error| SyncError::Filesystem {
            path: dir.to_path_buf(),
            source,
        };
        let prefix = relative_key(&self.root, dir)?;
        let mut read_dir = tokio::fs::read_dir(dir).await.map_err(fs_error)?;
        let mut children = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(fs_error)? {
            let file_type = entry.file_type().await.map_err(fs_error)?;
            children.push((entry.file_name(), entry.path(), file_type));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        let mut subdirs = Vec::new();
        for (name, path, file_type) in children {
            if !file_type.is_dir() && !file_type.is_file() {
                debug!(path = %path.display(), "skipping non-regular entry");
                continue;
            }
            let Some(name) = name.to_str() else {
                warn!(path = %path.display(), "skipping entry with non UTF-8 name");
                continue;
            };
            if file_type.is_dir() {
                subdirs.push(path);
            } else {
                self.files.push_back((join_key(&prefix, name), path));
            }
        }
        self.dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

/// Walks `root` to completion, failing on the first unreadable file.
pub async fn walk(root: &Path) -> Result<LocalIndex, SyncError> {
    let mut walker = LocalTreeWalker::new(root);
    let mut index = LocalIndex::new();
    while let Some(step) = walker.next_entry().await? {
        match step {
            WalkStep::File(entry) => {
                index.insert(entry.relative_path, entry.content_hash);
            }
            WalkStep::Unreadable {
                absolute_path,
                error,
                ..
            } => {
                return Err(SyncError::Filesystem {
                    path: absolute_path,
                    source: error,
                });
            }
        }
    }
    Ok(index)
}
