use std::collections::BTreeMap;

use drivemirror_core::{DriveError, RemoteStore};
use tracing::{debug, warn};

use super::paths::join_key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub relative_path: String,
    pub content_hash: Option<String>,
    pub is_folder: bool,
}

/// Every object under one remote root, keyed by path relative to that root.
pub type RemoteIndex = BTreeMap<String, RemoteEntry>;

/// Recursively lists `root_id`.
///
/// A folder's listing is drained page by page before any of its subfolders
/// is visited. When the store holds two objects under the same path the
/// first one listed is kept, but every folder is descended into so files
/// below a duplicate folder are indexed as well.
pub async fn scan<S>(store: &S, root_id: &str) -> Result<RemoteIndex, DriveError>
where
    S: RemoteStore + ?Sized,
{
    let mut index = RemoteIndex::new();
    let mut stack = vec![(root_id.to_string(), String::new())];
    while let Some((folder_id, prefix)) = stack.pop() {
        let mut subfolders = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = store.list(&folder_id, page_token.as_deref()).await?;
            for file in page.files {
                let relative_path = join_key(&prefix, &file.name);
                let is_folder = file.is_folder();
                if is_folder {
                    // Duplicate folders are still listed so their files are indexed.
                    subfolders.push((file.id.clone(), relative_path.clone()));
                }
                if index.contains_key(&relative_path) {
                    warn!(path = %relative_path, id = %file.id, "duplicate remote entry ignored");
                    continue;
                }
                index.insert(
                    relative_path.clone(),
                    RemoteEntry {
                        id: file.id,
                        name: file.name,
                        relative_path,
                        content_hash: if is_folder { None } else { file.md5_checksum },
                        is_folder,
                    },
                );
            }
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        stack.extend(subfolders.into_iter().rev());
    }
    debug!(root = %root_id, entries = index.len(), "remote tree scanned");
    Ok(index)
}
