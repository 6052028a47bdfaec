//! Adapter for SSL certificates.
//!
//! Content equality is proven by comparing a local SHA-256 of the desired
//! PEM against the digest the server reports in its listing; certificate
//! bytes are never downloaded for a comparison. The PEM is digested exactly
//! as supplied — if a server ever canonicalizes before digesting, the
//! mismatch shows up as a warning on every sync instead of silent churn.

use crate::client::{ClientError, DataplaneApi, StorageEntry, StorageKind};
use crate::files::{storage_ops, AuxFile, FileAdapter, FileContent};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

pub struct SslCertAdapter<'a> {
    api: &'a dyn DataplaneApi,
}

impl std::fmt::Debug for SslCertAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SslCertAdapter").finish_non_exhaustive()
    }
}

impl<'a> SslCertAdapter<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataplaneApi) -> Self {
        Self { api }
    }

    /// Hex SHA-256 of a PEM as supplied
    #[must_use]
    pub fn fingerprint(content: &[u8]) -> String {
        let digest = Sha256::digest(content);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }
}

#[async_trait]
impl FileAdapter for SslCertAdapter<'_> {
    fn kind(&self) -> StorageKind {
        StorageKind::SslCertificate
    }

    async fn list(&self) -> Result<Vec<StorageEntry>, ClientError> {
        self.api.list_storage(StorageKind::SslCertificate).await
    }

    async fn content(&self, entry: &StorageEntry) -> Result<FileContent, ClientError> {
        match &entry.digest {
            Some(digest) => Ok(FileContent::Digest(digest.to_ascii_lowercase())),
            None => {
                // Without a reported digest the comparison cannot prove
                // equality, so the certificate is treated as changed and
                // converges once the server starts reporting one.
                warn!(
                    "server reported no digest for certificate '{}', forcing update",
                    entry.name
                );
                Ok(FileContent::Digest(String::new()))
            }
        }
    }

    fn desired_content(&self, file: &AuxFile) -> FileContent {
        FileContent::Digest(Self::fingerprint(&file.content))
    }

    async fn create(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        storage_ops::create_with_fallback(self.api, StorageKind::SslCertificate, name, file).await
    }

    async fn update(&self, name: &str, file: &AuxFile) -> Result<(), ClientError> {
        self.api
            .update_storage(StorageKind::SslCertificate, name, &file.content)
            .await
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.api
            .delete_storage(StorageKind::SslCertificate, name)
            .await
    }
}
