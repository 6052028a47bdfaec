//! Adapter for HAProxy map files.

use crate::client::{ClientError, DataplaneApi, StorageEntry, StorageKind};
use crate::files::{storage_ops, AuxFile, FileAdapter, FileContent};
use async_trait::async_trait;

pub struct MapFileAdapter<'a> {
    api: &'a dyn DataplaneApi,
}

impl std::fmt::Debug for MapFileAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapFileAdapter").finish_non_exhaustive()
    }
}

impl<'a> MapFileAdapter<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataplaneApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl FileAdapter for MapFileAdapter<'_> {
    fn kind(&self) -> StorageKind {
        StorageKind::Map
    }

    async fn list(&self) -> Result<Vec<StorageEntry>, ClientError> {
        self.api.list_storage(StorageKind::Map).await
    }

    async fn content(&self, entry: &StorageEntry) -> Result<FileContent, ClientError> {
        let bytes = self.api.fetch_storage(StorageKind::Map, &entry.name).await?;
        Ok(FileContent::Bytes(bytes))
    }

    fn desired_content(&self, file: &AuxFile) -> FileContent {
        FileContent::Bytes(file.content.clone())
    }

    async fn create(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        storage_ops::create_with_fallback(self.api, StorageKind::Map, name, file).await
    }

    async fn update(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        self.api
            .update_storage(StorageKind::Map, name, &file.content)
            .await
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.api.delete_storage(StorageKind::Map, name).await
    }
}
