//! Adapter for CRT-list files.
//!
//! Servers before 3.2 have no dedicated CRT-list storage; when the
//! capability is absent this adapter transparently rewrites every call onto
//! the general-file namespace so upstream callers keep a uniform CRT-list
//! contract either way.

use crate::client::{ClientError, DataplaneApi, StorageEntry, StorageKind};
use crate::files::{storage_ops, AuxFile, FileAdapter, FileContent};
use crate::version::Capabilities;
use async_trait::async_trait;

pub struct CrtListAdapter<'a> {
    api: &'a dyn DataplaneApi,
    storage: StorageKind,
}

impl std::fmt::Debug for CrtListAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrtListAdapter")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl<'a> CrtListAdapter<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataplaneApi, capabilities: Capabilities) -> Self {
        let storage = if capabilities.crt_list_storage {
            StorageKind::CrtList
        } else {
            StorageKind::General
        };
        Self { api, storage }
    }

    /// The storage family calls are actually routed to
    #[must_use]
    pub fn storage(&self) -> StorageKind {
        self.storage
    }
}

#[async_trait]
impl FileAdapter for CrtListAdapter<'_> {
    fn kind(&self) -> StorageKind {
        StorageKind::CrtList
    }

    async fn list(&self) -> Result<Vec<StorageEntry>, ClientError> {
        self.api.list_storage(self.storage).await
    }

    async fn content(&self, entry: &StorageEntry) -> Result<FileContent, ClientError> {
        let bytes = self.api.fetch_storage(self.storage, &entry.name).await?;
        Ok(FileContent::Bytes(bytes))
    }

    fn desired_content(&self, file: &AuxFile) -> FileContent {
        FileContent::Bytes(file.content.clone())
    }

    async fn create(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        storage_ops::create_with_fallback(self.api, self.storage, name, file).await
    }

    async fn update(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        self.api
            .update_storage(self.storage, name, &file.content)
            .await
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.api.delete_storage(self.storage, name).await
    }
}
