use std::path::Path;

use async_trait::async_trait;

use crate::client::{DriveClient, DriveError, FilePage, UPLOAD_MIME_TYPE};

/// Operations the reconciliation engine needs from a remote file store.
///
/// Objects are addressed by opaque ids; folders and files share one
/// namespace of children under a parent id.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError>;

    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, DriveError>;

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, DriveError>;

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<String, DriveError>;

    async fn update_file(&self, id: &str, source: &Path) -> Result<(), DriveError>;

    async fn delete(&self, id: &str) -> Result<(), DriveError>;
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError> {
        self.list_children(parent_id, page_token).await
    }

    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, DriveError> {
        Ok(DriveClient::find_child_folder(self, parent_id, name)
            .await?
            .map(|folder| folder.id))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, DriveError> {
        Ok(DriveClient::create_folder(self, parent_id, name).await?.id)
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<String, DriveError> {
        Ok(DriveClient::create_file(self, parent_id, name, UPLOAD_MIME_TYPE, source)
            .await?
            .id)
    }

    async fn update_file(&self, id: &str, source: &Path) -> Result<(), DriveError> {
        self.upload_content(id, source).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DriveError> {
        self.delete_file(id).await
    }
}
