use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use drivemirror_core::{DriveError, RemoteStore};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Mapping;

use super::fingerprint::same_fingerprint;
use super::folders::FolderResolver;
use super::local_walk::{LocalEntry, LocalTreeWalker, WalkStep};
use super::paths::{PathError, split_parent};
use super::remote_scan::{RemoteIndex, scan};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("remote api error: {0}")]
    Remote(#[from] DriveError),
    #[error("reconciliation cancelled")]
    Cancelled,
    #[error("reconciliation task aborted: {0}")]
    Aborted(String),
}

/// Counts of the decisions taken during one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub conflicts: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Makes one remote root mirror one local tree.
///
/// All run state (remote index, seen paths, folder cache) lives inside
/// [`Reconciler::reconcile`] and is dropped when it returns.
pub struct Reconciler<'a, S: ?Sized> {
    store: &'a S,
    mapping: &'a Mapping,
    cancel: CancellationToken,
}

impl<'a, S> Reconciler<'a, S>
where
    S: RemoteStore + ?Sized,
{
    pub fn new(store: &'a S, mapping: &'a Mapping) -> Self {
        Self {
            store,
            mapping,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn reconcile(&self) -> Result<SyncReport, SyncError> {
        let remote = scan(self.store, &self.mapping.remote_root_id).await?;
        let mut folders = FolderResolver::new(self.store, self.mapping.remote_root_id.as_str());
        let mut seen = HashSet::new();
        let mut report = SyncReport::default();

        let mut walker = LocalTreeWalker::new(&self.mapping.local_root);
        while let Some(step) = walker.next_entry().await? {
            self.check_cancelled()?;
            match step {
                WalkStep::File(entry) => {
                    seen.insert(entry.relative_path.clone());
                    self.apply(&entry, &remote, &mut folders, &mut report)
                        .await?;
                }
                WalkStep::Unreadable {
                    relative_path,
                    absolute_path,
                    error,
                } => {
                    // Still counts as present so the remote copy survives.
                    warn!(path = %absolute_path.display(), "skipping unreadable file: {error}");
                    seen.insert(relative_path);
                    report.failed += 1;
                }
            }
        }

        for (path, entry) in &remote {
            if entry.is_folder || seen.contains(path) {
                continue;
            }
            self.check_cancelled()?;
            self.store.delete(&entry.id).await?;
            info!(path = %path, id = %entry.id, "deleted orphaned remote file");
            report.deleted += 1;
        }

        Ok(report)
    }

    async fn apply(
        &self,
        entry: &LocalEntry,
        remote: &RemoteIndex,
        folders: &mut FolderResolver<'a, S>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let path = entry.relative_path.as_str();
        let result = match remote.get(path) {
            Some(existing) if existing.is_folder => {
                warn!(path = %path, id = %existing.id, "local file collides with remote folder, skipping");
                report.conflicts += 1;
                return Ok(());
            }
            Some(existing)
                if same_fingerprint(&entry.content_hash, existing.content_hash.as_deref()) =>
            {
                debug!(path = %path, "unchanged");
                report.unchanged += 1;
                return Ok(());
            }
            Some(existing) => {
                let result = self
                    .store
                    .update_file(&existing.id, &entry.absolute_path)
                    .await;
                if result.is_ok() {
                    info!(path = %path, id = %existing.id, "updated remote file");
                    report.updated += 1;
                }
                result
            }
            None => {
                let (dir, name) = split_parent(path);
                let parent = folders.resolve(dir).await?;
                let result = self
                    .store
                    .create_file(&parent, name, &entry.absolute_path)
                    .await;
                if let Ok(id) = &result {
                    info!(path = %path, id = %id, "uploaded new file");
                    report.created += 1;
                }
                result.map(|_| ())
            }
        };

        match result {
            Ok(()) => Ok(()),
            // The local file went away or became unreadable after hashing.
            Err(DriveError::Io(error)) => {
                warn!(path = %entry.absolute_path.display(), "failed to read file for upload: {error}");
                report.failed += 1;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
