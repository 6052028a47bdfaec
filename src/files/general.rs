//! Adapter for general-purpose stored files.

use crate::client::{ClientError, DataplaneApi, StorageEntry, StorageKind};
use crate::files::{storage_ops, AuxFile, FileAdapter, FileContent};
use async_trait::async_trait;

pub struct GeneralFileAdapter<'a> {
    api: &'a dyn DataplaneApi,
}

impl std::fmt::Debug for GeneralFileAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralFileAdapter").finish_non_exhaustive()
    }
}

impl<'a> GeneralFileAdapter<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataplaneApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl FileAdapter for GeneralFileAdapter<'_> {
    fn kind(&self) -> StorageKind {
        StorageKind::General
    }

    async fn list(&self) -> Result<Vec<StorageEntry>, ClientError> {
        self.api.list_storage(StorageKind::General).await
    }

    async fn content(&self, entry: &StorageEntry) -> Result<FileContent, ClientError> {
        let bytes = self
            .api
            .fetch_storage(StorageKind::General, &entry.name)
            .await?;
        Ok(FileContent::Bytes(bytes))
    }

    fn desired_content(&self, file: &AuxFile) -> FileContent {
        FileContent::Bytes(file.content.clone())
    }

    async fn create(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        storage_ops::create_with_fallback(self.api, StorageKind::General, name, file).await
    }

    async fn update(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        self.api
            .update_storage(StorageKind::General, name, &file.content)
            .await
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.api.delete_storage(StorageKind::General, name).await
    }
}
