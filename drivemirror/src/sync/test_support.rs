use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use drivemirror_core::{
    DriveError, DriveFile, FOLDER_MIME_TYPE, FilePage, RemoteStore, StatusCode, UPLOAD_MIME_TYPE,
};

use super::fingerprint::fingerprint_bytes;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub list: usize,
    pub find_folder: usize,
    pub create_folder: usize,
    pub create_file: usize,
    pub update: usize,
    pub delete: usize,
}

impl Calls {
    pub fn writes(&self) -> usize {
        self.create_folder + self.create_file + self.update + self.delete
    }

    pub fn total(&self) -> usize {
        self.list + self.find_folder + self.writes()
    }
}

#[derive(Debug, Clone)]
struct Object {
    id: String,
    parent: String,
    name: String,
    is_folder: bool,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    objects: Vec<Object>,
    next_id: usize,
    calls: Calls,
    failing_lists: HashSet<String>,
    failing_folder_names: HashSet<String>,
    unreadable_sources: HashSet<PathBuf>,
    remove_after_write: Option<PathBuf>,
}

/// In-memory remote store that records every call it receives.
pub struct MemoryStore {
    root_id: String,
    page_size: usize,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(root_id: &str) -> Self {
        Self {
            root_id: root_id.to_string(),
            page_size: 100,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        self.insert(parent, name, true, Vec::new())
    }

    pub fn add_file(&self, parent: &str, name: &str, content: &[u8]) -> String {
        self.insert(parent, name, false, content.to_vec())
    }

    pub fn fail_listing(&self, parent: &str) {
        self.lock().failing_lists.insert(parent.to_string());
    }

    pub fn fail_create_folder_named(&self, name: &str) {
        self.lock().failing_folder_names.insert(name.to_string());
    }

    /// Uploads from `source` fail as if the file vanished after hashing.
    pub fn fail_reads_of(&self, source: &Path) {
        self.lock().unreadable_sources.insert(source.to_path_buf());
    }

    /// Removes `local` from disk right after the next successful write.
    pub fn remove_local_after_next_write(&self, local: &Path) {
        self.lock().remove_after_write = Some(local.to_path_buf());
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    pub fn reset_calls(&self) {
        self.lock().calls = Calls::default();
    }

    /// Finds the object at a `/`-separated path below the root.
    pub fn lookup(&self, path: &str) -> Option<(String, bool, Vec<u8>)> {
        let state = self.lock();
        let mut parent = self.root_id.clone();
        let mut found = None;
        for segment in path.split('/') {
            let object = state
                .objects
                .iter()
                .find(|o| o.parent == parent && o.name == segment)?;
            parent = object.id.clone();
            found = Some(object.clone());
        }
        found.map(|o| (o.id, o.is_folder, o.content))
    }

    pub fn path_of(&self, id: &str) -> Option<String> {
        let state = self.lock();
        let mut parts = Vec::new();
        let mut current = id.to_string();
        while current != self.root_id {
            let object = state.objects.iter().find(|o| o.id == current)?;
            parts.push(object.name.clone());
            current = object.parent.clone();
        }
        parts.reverse();
        Some(parts.join("/"))
    }

    pub fn file_count(&self) -> usize {
        self.lock().objects.iter().filter(|o| !o.is_folder).count()
    }

    pub fn folders_named(&self, name: &str) -> usize {
        self.lock()
            .objects
            .iter()
            .filter(|o| o.is_folder && o.name == name)
            .count()
    }

    fn insert(&self, parent: &str, name: &str, is_folder: bool, content: Vec<u8>) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("id-{}", state.next_id);
        state.objects.push(Object {
            id: id.clone(),
            parent: parent.to_string(),
            name: name.to_string(),
            is_folder,
            content,
        });
        id
    }

    fn read_source(&self, source: &Path) -> Result<Vec<u8>, DriveError> {
        if self.lock().unreadable_sources.contains(source) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "injected read failure").into());
        }
        Ok(std::fs::read(source)?)
    }

    fn after_write(&self) {
        if let Some(path) = self.lock().remove_after_write.take() {
            std::fs::remove_file(path).unwrap();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

fn api_error(status: StatusCode) -> DriveError {
    DriveError::Api {
        status,
        body: "injected failure".into(),
    }
}

fn to_drive_file(object: &Object) -> DriveFile {
    DriveFile {
        id: object.id.clone(),
        name: object.name.clone(),
        mime_type: if object.is_folder {
            FOLDER_MIME_TYPE.to_string()
        } else {
            UPLOAD_MIME_TYPE.to_string()
        },
        md5_checksum: (!object.is_folder).then(|| fingerprint_bytes(&object.content)),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError> {
        let mut state = self.lock();
        state.calls.list += 1;
        if state.failing_lists.contains(parent_id) {
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR));
        }
        let offset = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let children: Vec<_> = state
            .objects
            .iter()
            .filter(|o| o.parent == parent_id)
            .collect();
        let end = (offset + self.page_size).min(children.len());
        let files = children[offset.min(end)..end]
            .iter()
            .map(|o| to_drive_file(o))
            .collect();
        Ok(FilePage {
            files,
            next_page_token: (end < children.len()).then(|| end.to_string()),
        })
    }

    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, DriveError> {
        let mut state = self.lock();
        state.calls.find_folder += 1;
        Ok(state
            .objects
            .iter()
            .find(|o| o.is_folder && o.parent == parent_id && o.name == name)
            .map(|o| o.id.clone()))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, DriveError> {
        {
            let mut state = self.lock();
            state.calls.create_folder += 1;
            if state.failing_folder_names.contains(name) {
                return Err(api_error(StatusCode::FORBIDDEN));
            }
        }
        Ok(self.insert(parent_id, name, true, Vec::new()))
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<String, DriveError> {
        self.lock().calls.create_file += 1;
        let content = self.read_source(source)?;
        let id = self.insert(parent_id, name, false, content);
        self.after_write();
        Ok(id)
    }

    async fn update_file(&self, id: &str, source: &Path) -> Result<(), DriveError> {
        self.lock().calls.update += 1;
        let content = self.read_source(source)?;
        {
            let mut state = self.lock();
            let object = state
                .objects
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| api_error(StatusCode::NOT_FOUND))?;
            object.content = content;
        }
        self.after_write();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DriveError> {
        let mut state = self.lock();
        state.calls.delete += 1;
        let before = state.objects.len();
        state.objects.retain(|o| o.id != id);
        if state.objects.len() == before {
            return Err(api_error(StatusCode::NOT_FOUND));
        }
        Ok(())
    }
}
