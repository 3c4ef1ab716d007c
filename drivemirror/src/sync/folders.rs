use std::collections::HashMap;

use drivemirror_core::{DriveError, RemoteStore};
use tracing::{debug, info};

use super::paths::{join_key, segments};

/// Directory key to remote folder id, owned by a single reconciliation run.
pub type FolderCache = HashMap<String, String>;

/// Maps local directory keys to remote folder ids, creating missing folders.
///
/// Each distinct prefix is looked up or created at most once for the lifetime
/// of the resolver. The lookup-then-create sequence is not atomic, so one
/// resolver must only be driven from one task.
pub struct FolderResolver<'a, S: ?Sized> {
    store: &'a S,
    root_id: String,
    cache: FolderCache,
}

impl<'a, S> FolderResolver<'a, S>
where
    S: RemoteStore + ?Sized,
{
    pub fn new(store: &'a S, root_id: impl Into<String>) -> Self {
        Self {
            store,
            root_id: root_id.into(),
            cache: FolderCache::new(),
        }
    }

    pub async fn resolve(&mut self, dir_key: &str) -> Result<String, DriveError> {
        let mut parent = self.root_id.clone();
        let mut prefix = String::new();
        for segment in segments(dir_key) {
            prefix = join_key(&prefix, segment);
            if let Some(id) = self.cache.get(&prefix) {
                parent = id.clone();
                continue;
            }
            let id = match self.store.find_child_folder(&parent, segment).await? {
                Some(id) => {
                    debug!(path = %prefix, id = %id, "found remote folder");
                    id
                }
                None => {
                    let id = self.store.create_folder(&parent, segment).await?;
                    info!(path = %prefix, id = %id, "created remote folder");
                    id
                }
            };
            self.cache.insert(prefix.clone(), id.clone());
            parent = id;
        }
        Ok(parent)
    }

    pub fn cache(&self) -> &FolderCache {
        &self.cache
    }
}
