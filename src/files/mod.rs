//! # Auxiliary File Reconciliation
//!
//! A parametric CRUD-diff/apply engine for auxiliary files (general files,
//! maps, SSL certificates, CRT-lists), driven through per-kind adapters.
//!
//! `compare` is a pure function of (current, desired); `apply` drives the
//! server to the desired state with independent REST calls, creates first,
//! then updates, then deletes.

use crate::client::{ClientError, StorageEntry, StorageKind};
use crate::constants;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

pub mod crt_list;
pub mod general;
pub mod maps;
pub mod ssl;

pub use crt_list::CrtListAdapter;
pub use general::GeneralFileAdapter;
pub use maps::MapFileAdapter;
pub use ssl::SslCertAdapter;

/// One desired auxiliary file: an identifier plus content
///
/// Callers may pass absolute paths; the REST layer only accepts basenames,
/// so identifiers are normalized on the wire while the original name is
/// preserved in diffs and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl AuxFile {
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Identifier the server uses
    #[must_use]
    pub fn basename(&self) -> &str {
        basename(&self.name)
    }
}

/// Strip any leading directories from an identifier
#[must_use]
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// The full desired auxiliary-file bundle of a sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxFiles {
    pub general: Vec<AuxFile>,
    pub maps: Vec<AuxFile>,
    pub ssl_certificates: Vec<AuxFile>,
    pub crt_lists: Vec<AuxFile>,
}

impl AuxFiles {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.general.is_empty()
            && self.maps.is_empty()
            && self.ssl_certificates.is_empty()
            && self.crt_lists.is_empty()
    }
}

/// Comparable content of a stored file
///
/// SSL certificates compare by digest so their bytes never travel for a
/// comparison; everything else compares by bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    Digest(String),
}

/// Per-kind adapter the generic reconciler drives
#[async_trait]
pub trait FileAdapter: Send + Sync {
    /// Storage family, for logs and errors
    fn kind(&self) -> StorageKind;

    /// List the identifiers currently on the server
    async fn list(&self) -> Result<Vec<StorageEntry>, ClientError>;

    /// Comparable content of one current entry
    async fn content(&self, entry: &StorageEntry) -> Result<FileContent, ClientError>;

    /// Comparable content of a desired file
    fn desired_content(&self, file: &AuxFile) -> FileContent;

    /// Create a file; adapters fall through to update when the file raced
    /// into existence
    async fn create(&self, name: &str, file: &AuxFile) -> Result<(), ClientError>;

    /// Replace a file's content
    async fn update(&self, name: &str, file: &AuxFile) -> Result<(), ClientError>;

    /// Delete a file by server identifier
    async fn delete(&self, name: &str) -> Result<(), ClientError>;
}

/// Diff of one auxiliary file kind
///
/// The three lists are pairwise disjoint by identifier. Create/update
/// entries keep the caller's original names; deletes carry server
/// identifiers (basenames).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    pub to_create: Vec<AuxFile>,
    pub to_update: Vec<AuxFile>,
    pub to_delete: Vec<String>,
}

impl FileDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    #[must_use]
    pub fn change_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Which part of a diff an apply call executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Creates and updates only (pre-config phase)
    CreateUpdate,
    /// Deletes only (post-config phase)
    Delete,
}

/// A failed file operation with its context
#[derive(Debug, Error)]
#[error("{verb} of {kind} '{name}' failed")]
pub struct FileOpError {
    pub verb: &'static str,
    pub kind: StorageKind,
    pub name: String,
    #[source]
    pub cause: ClientError,
}

/// What an apply call did
#[derive(Debug, Default)]
pub struct AppliedFiles {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Failures collected under `continue_on_error`
    pub errors: Vec<FileOpError>,
}

impl AppliedFiles {
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Generic reconciler over one adapter
pub struct FileReconciler<'a> {
    adapter: &'a dyn FileAdapter,
    concurrency: usize,
    continue_on_error: bool,
}

impl std::fmt::Debug for FileReconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReconciler")
            .field("kind", &self.adapter.kind())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl<'a> FileReconciler<'a> {
    #[must_use]
    pub fn new(adapter: &'a dyn FileAdapter, continue_on_error: bool) -> Self {
        Self {
            adapter,
            concurrency: constants::DEFAULT_FETCH_CONCURRENCY,
            continue_on_error,
        }
    }

    /// Compare the server state against the desired set
    ///
    /// Current contents are fetched with bounded fan-out; the first fetch
    /// error cancels the remaining fetches.
    ///
    /// # Errors
    /// Propagates listing and content-fetch failures.
    pub async fn compare(&self, desired: &[AuxFile]) -> Result<FileDiff, ClientError> {
        let adapter = self.adapter;
        let entries = adapter.list().await?;
        debug!(
            "{}: {} current, {} desired",
            adapter.kind(),
            entries.len(),
            desired.len()
        );

        let current: BTreeMap<String, FileContent> = stream::iter(entries.into_iter().map(
            |entry| async move {
                let content = adapter.content(&entry).await?;
                Ok::<_, ClientError>((entry.name, content))
            },
        ))
        .buffer_unordered(self.concurrency)
        .try_collect()
        .await?;

        let mut diff = FileDiff::default();
        let mut desired_ids = BTreeSet::new();
        for file in desired {
            let id = file.basename();
            desired_ids.insert(id.to_string());
            match current.get(id) {
                None => diff.to_create.push(file.clone()),
                Some(content) if *content != adapter.desired_content(file) => {
                    diff.to_update.push(file.clone());
                }
                Some(_) => {}
            }
        }
        for id in current.keys() {
            if !desired_ids.contains(id) {
                diff.to_delete.push(id.clone());
            }
        }
        Ok(diff)
    }

    /// Execute one side of a diff
    ///
    /// Creates run before updates; deletes only run in [`ApplyMode::Delete`].
    /// Stops on the first error unless constructed with `continue_on_error`.
    ///
    /// # Errors
    /// The first failed operation, with its verb and identifier.
    pub async fn apply(&self, diff: &FileDiff, mode: ApplyMode) -> Result<AppliedFiles, FileOpError> {
        let mut applied = AppliedFiles::default();
        match mode {
            ApplyMode::CreateUpdate => {
                for file in &diff.to_create {
                    match self.adapter.create(file.basename(), file).await {
                        Ok(()) => applied.created += 1,
                        Err(cause) => {
                            self.record("create", file.basename(), cause, &mut applied)?;
                        }
                    }
                }
                for file in &diff.to_update {
                    match self.adapter.update(file.basename(), file).await {
                        Ok(()) => applied.updated += 1,
                        Err(cause) => {
                            self.record("update", file.basename(), cause, &mut applied)?;
                        }
                    }
                }
            }
            ApplyMode::Delete => {
                for name in &diff.to_delete {
                    match self.adapter.delete(name).await {
                        Ok(()) => applied.deleted += 1,
                        // Someone already removed it; the goal state holds
                        Err(cause) if cause.is_not_found() => {
                            debug!("{} '{}' already absent", self.adapter.kind(), name);
                        }
                        Err(cause) => self.record("delete", name, cause, &mut applied)?,
                    }
                }
            }
        }
        Ok(applied)
    }

    fn record(
        &self,
        verb: &'static str,
        name: &str,
        cause: ClientError,
        applied: &mut AppliedFiles,
    ) -> Result<(), FileOpError> {
        let error = FileOpError {
            verb,
            kind: self.adapter.kind(),
            name: name.to_string(),
            cause,
        };
        if self.continue_on_error {
            warn!("{error}, continuing");
            applied.errors.push(error);
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// Shared storage helpers for byte-content adapters
pub(crate) mod storage_ops {
    use super::{AuxFile, ClientError, StorageKind};
    use crate::client::DataplaneApi;
    use tracing::debug;

    /// Create with fall-through to update when the file already exists
    pub(crate) async fn create_with_fallback(
        api: &dyn DataplaneApi,
        kind: StorageKind,
        name: &str,
        file: &AuxFile,
    ) -> Result<(), ClientError> {
        match api.create_storage(kind, name, &file.content).await {
            Err(err) if err.is_already_exists() => {
                debug!("{kind} '{name}' already exists, updating instead");
                api.update_storage(kind, name, &file.content).await
            }
            other => other,
        }
    }
}
