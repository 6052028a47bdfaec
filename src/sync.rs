//! # Sync Orchestrator
//!
//! The three-phase sync: auxiliary creates/updates first, then the
//! transactional (or runtime) configuration sync, then deferred auxiliary
//! deletes. A fine-grained failure that is not a version conflict can fall
//! back to pushing the raw configuration in one call.

use crate::client::{ClientError, CommitOutcome, DataplaneApi, DataplaneClient, Endpoint};
use crate::diff::{ConfigDiff, DiffRegistry, DiffSummary, Operation};
use crate::error::{ConflictError, FallbackError, ParseError, ParseSide, SyncError, SyncStage};
use crate::executor::{ExecutorError, TransactionExecutor};
use crate::files::{
    ApplyMode, AuxFiles, CrtListAdapter, FileAdapter, FileDiff, FileReconciler, GeneralFileAdapter,
    MapFileAdapter, SslCertAdapter,
};
use crate::model::ConfigParser;
use crate::validate::{ValidationPaths, Validator};
use crate::version::{capabilities_from_version, Capabilities, Version};
use crate::constants;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Options for one sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Retries for version-conflicted commits
    pub max_retries: u32,
    /// Deadline for the whole run
    pub timeout: Duration,
    /// Keep applying after individual operation failures
    pub continue_on_error: bool,
    /// Push the raw configuration when the fine-grained path fails
    pub fallback_to_raw: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(constants::DEFAULT_SYNC_TIMEOUT_SECS),
            continue_on_error: false,
            fallback_to_raw: true,
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_fallback_to_raw(mut self, fallback_to_raw: bool) -> Self {
        self.fallback_to_raw = fallback_to_raw;
        self
    }
}

/// Outcome of a sync run
#[derive(Debug)]
pub struct SyncResult {
    pub success: bool,
    /// The operations that brought the target to the desired state; the
    /// raw-push fallback preserves this list so observers see the same
    /// changes either way
    pub applied_operations: Vec<Operation>,
    pub reload_triggered: bool,
    pub reload_id: Option<String>,
    pub fallback_used: bool,
    pub duration: Duration,
    /// Conflict retries that were needed
    pub retries: u32,
    /// Named adds/mods/dels per section
    pub details: DiffSummary,
    pub message: String,
}

/// A connected sync client for one endpoint
pub struct Client {
    api: Arc<dyn DataplaneApi>,
    parser: Arc<dyn ConfigParser>,
    registry: DiffRegistry,
    version: Version,
    capabilities: Capabilities,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("version", &self.version)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connect to an endpoint, discovering its version once
    ///
    /// # Errors
    /// A connect-stage [`SyncError`] when the endpoint is unreachable or
    /// runs an unsupported revision.
    pub async fn connect(
        endpoint: &Endpoint,
        parser: Arc<dyn ConfigParser>,
    ) -> Result<Self, SyncError> {
        let client = DataplaneClient::connect(endpoint)
            .await
            .map_err(|cause| SyncError::connect(&endpoint.url, cause))?;
        let version = client.version().clone();
        Self::with_api(Arc::new(client), parser, version)
    }

    /// Build a client over any [`DataplaneApi`] implementation
    ///
    /// Used by embedders with custom transports and by tests.
    ///
    /// # Errors
    /// A compare-stage [`SyncError`] when the differ registry is incomplete
    /// (a construction bug, surfaced at startup).
    pub fn with_api(
        api: Arc<dyn DataplaneApi>,
        parser: Arc<dyn ConfigParser>,
        version: Version,
    ) -> Result<Self, SyncError> {
        let registry = DiffRegistry::standard().map_err(|cause| {
            SyncError::new(SyncStage::Compare, "section differ registry is incomplete")
                .with_cause(cause)
        })?;
        let capabilities = capabilities_from_version(Some(&version));
        Ok(Self {
            api,
            parser,
            registry,
            version,
            capabilities,
        })
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Drop the cached version and probe the server again
    ///
    /// # Errors
    /// A connect-stage [`SyncError`] when the probe fails.
    pub async fn invalidate_version(&mut self) -> Result<(), SyncError> {
        let version = self
            .api
            .info()
            .await
            .map_err(|cause| SyncError::connect("endpoint", cause))?;
        self.capabilities = capabilities_from_version(Some(&version));
        self.version = version;
        Ok(())
    }

    /// Validate a configuration against this endpoint's version and paths
    ///
    /// # Errors
    /// The validation error of the failing phase.
    pub async fn validate(
        &self,
        config_text: &str,
        aux: &AuxFiles,
        paths: &ValidationPaths,
    ) -> Result<(), crate::error::ValidationError> {
        Validator::new(Arc::clone(&self.parser))
            .validate(config_text, aux, paths, Some(&self.version))
            .await
    }

    /// Compute the operations a sync would execute, without applying them
    ///
    /// # Errors
    /// Fetch/parse/compare stage errors, as for [`sync`](Self::sync).
    pub async fn dry_run(&self, desired_text: &str) -> Result<ConfigDiff, SyncError> {
        let current_text = self.fetch_current().await?;
        let (current, desired) = self.parse_both(&current_text, desired_text)?;
        self.registry
            .diff(&current, &desired)
            .map_err(|cause| SyncError::new(SyncStage::Compare, "differ failed").with_cause(cause))
    }

    /// Reconcile the desired configuration and auxiliary files onto the
    /// endpoint
    ///
    /// # Errors
    /// A stage-tagged [`SyncError`]; post-config cleanup failures are
    /// logged, never surfaced.
    pub async fn sync(
        &self,
        desired_text: &str,
        aux: &AuxFiles,
        options: &SyncOptions,
    ) -> Result<SyncResult, SyncError> {
        let span = info_span!("sync", version = %self.version);
        let run = self.sync_inner(desired_text, aux, options);
        match tokio::time::timeout(options.timeout, run.instrument(span)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::new(
                SyncStage::Apply,
                format!("sync timed out after {:?}", options.timeout),
            )
            .with_hint("raise the timeout option or check endpoint latency")),
        }
    }

    async fn fetch_current(&self) -> Result<String, SyncError> {
        self.api.raw_configuration().await.map_err(|cause| {
            if cause.is_connection() {
                SyncError::connect("endpoint", cause)
            } else {
                SyncError::new(SyncStage::Fetch, "could not fetch current configuration")
                    .with_cause(cause)
            }
        })
    }

    fn parse_both(
        &self,
        current_text: &str,
        desired_text: &str,
    ) -> Result<(crate::model::Configuration, crate::model::Configuration), SyncError> {
        let current = self.parser.parse(current_text).map_err(|cause| {
            let parse = ParseError::new(ParseSide::Current, current_text, cause);
            SyncError::new(SyncStage::ParseCurrent, parse.to_string()).with_cause(parse)
        })?;
        let desired = self.parser.parse(desired_text).map_err(|cause| {
            let parse = ParseError::new(ParseSide::Desired, desired_text, cause);
            SyncError::new(SyncStage::ParseDesired, parse.to_string()).with_cause(parse)
        })?;
        Ok((current, desired))
    }

    #[allow(
        clippy::too_many_lines,
        reason = "the three-phase control flow reads better in one place"
    )]
    async fn sync_inner(
        &self,
        desired_text: &str,
        aux: &AuxFiles,
        options: &SyncOptions,
    ) -> Result<SyncResult, SyncError> {
        let start = Instant::now();
        let api = self.api.as_ref();

        // Phase 0: fetch, parse, compare
        let current_text = self.fetch_current().await?;
        let (current, desired) = self.parse_both(&current_text, desired_text)?;
        let diff = self
            .registry
            .diff(&current, &desired)
            .map_err(|cause| SyncError::new(SyncStage::Compare, "differ failed").with_cause(cause))?;

        let general = GeneralFileAdapter::new(api);
        let maps = MapFileAdapter::new(api);
        let ssl = SslCertAdapter::new(api);
        let crt_lists = CrtListAdapter::new(api, self.capabilities);
        let adapters: [&dyn FileAdapter; 4] = [&general, &maps, &ssl, &crt_lists];
        let reconcilers: Vec<FileReconciler<'_>> = adapters
            .iter()
            .map(|adapter| FileReconciler::new(*adapter, options.continue_on_error))
            .collect();
        let desired_files = [&aux.general, &aux.maps, &aux.ssl_certificates, &aux.crt_lists];

        let file_diffs = Self::compare_files(&reconcilers, desired_files).await?;

        // No-op gate
        if diff.is_empty() && file_diffs.iter().all(FileDiff::is_empty) {
            info!("target already matches the desired state");
            return Ok(SyncResult {
                success: true,
                applied_operations: Vec::new(),
                reload_triggered: false,
                reload_id: None,
                fallback_used: false,
                duration: start.elapsed(),
                retries: 0,
                details: diff.summary,
                message: "no changes needed".to_string(),
            });
        }
        info!(
            "{} configuration operation(s), {} auxiliary change(s)",
            diff.operations.len(),
            file_diffs.iter().map(FileDiff::change_count).sum::<usize>()
        );

        // Phase 1: auxiliary creates and updates
        Self::apply_files(&reconcilers, &file_diffs, ApplyMode::CreateUpdate).await?;

        // Phase 2: configuration
        let executor = TransactionExecutor::new(api, options.max_retries, options.continue_on_error);
        let mut reload_triggered = false;
        let mut reload_id = None;
        let mut fallback_used = false;
        let mut retries = 0;

        if !diff.is_empty() {
            let execution = if diff.all_runtime_eligible() {
                debug!("all operations are runtime-eligible, skipping transaction");
                executor.apply_runtime(&diff.operations).await
            } else {
                executor.apply_operations(&diff.operations).await
            };
            match execution {
                Ok(report) => {
                    retries = report.retries;
                    reload_triggered = report.outcome.reload_triggered();
                    reload_id = report.outcome.reload_id().map(str::to_string);
                    for op_error in &report.operation_errors {
                        warn!("operation failed but sync continued: {op_error}");
                    }
                }
                Err(err) if err.is_fallback_candidate() && options.fallback_to_raw => {
                    warn!("fine-grained apply failed ({err}), falling back to raw push");
                    let outcome = self
                        .raw_fallback(&reconcilers, &file_diffs, desired_text, err)
                        .await?;
                    fallback_used = true;
                    // A raw push replaces the whole configuration and
                    // always restarts workers
                    reload_triggered = true;
                    reload_id = outcome.reload_id().map(str::to_string);
                }
                Err(err) => return Err(Self::executor_error(err)),
            }
        }

        // Phase 3: deferred auxiliary deletes; the target already runs the
        // desired configuration, so failures here are cleanup debt for the
        // next run, not sync failures
        for (reconciler, file_diff) in reconcilers.iter().zip(file_diffs.iter()) {
            if let Err(err) = reconciler.apply(file_diff, ApplyMode::Delete).await {
                warn!("post-config cleanup failed: {err}");
            }
        }

        let applied = diff.operations.clone();
        let message = if fallback_used {
            format!(
                "synced via raw configuration push ({} operation(s) in diff)",
                applied.len()
            )
        } else if reload_triggered {
            format!("synced: {} operation(s), reload triggered", applied.len())
        } else {
            format!("synced: {} operation(s), no reload", applied.len())
        };
        info!("{message}");

        Ok(SyncResult {
            success: true,
            applied_operations: applied,
            reload_triggered,
            reload_id,
            fallback_used,
            duration: start.elapsed(),
            retries,
            details: diff.summary,
            message,
        })
    }

    async fn compare_files(
        reconcilers: &[FileReconciler<'_>],
        desired: [&Vec<crate::files::AuxFile>; 4],
    ) -> Result<Vec<FileDiff>, SyncError> {
        let (general, maps, ssl, crt_lists) = tokio::try_join!(
            reconcilers[0].compare(desired[0]),
            reconcilers[1].compare(desired[1]),
            reconcilers[2].compare(desired[2]),
            reconcilers[3].compare(desired[3]),
        )
        .map_err(|cause: ClientError| {
            if cause.is_connection() {
                SyncError::connect("endpoint", cause)
            } else {
                SyncError::new(SyncStage::Fetch, "could not compare auxiliary files")
                    .with_cause(cause)
            }
        })?;
        Ok(vec![general, maps, ssl, crt_lists])
    }

    async fn apply_files(
        reconcilers: &[FileReconciler<'_>],
        diffs: &[FileDiff],
        mode: ApplyMode,
    ) -> Result<(), SyncError> {
        let results = futures::future::join_all(
            reconcilers
                .iter()
                .zip(diffs.iter())
                .map(|(reconciler, diff)| reconciler.apply(diff, mode)),
        )
        .await;
        for result in results {
            let applied = result.map_err(|cause| {
                SyncError::new(SyncStage::Apply, cause.to_string()).with_cause(cause)
            })?;
            for error in &applied.errors {
                warn!("auxiliary file operation failed but sync continued: {error}");
            }
        }
        Ok(())
    }

    /// Phase 2': ensure auxiliary files exist, then push the whole text
    async fn raw_fallback(
        &self,
        reconcilers: &[FileReconciler<'_>],
        diffs: &[FileDiff],
        desired_text: &str,
        original: ExecutorError,
    ) -> Result<CommitOutcome, SyncError> {
        Self::apply_files(reconcilers, diffs, ApplyMode::CreateUpdate).await?;
        match self.api.push_raw_configuration(desired_text).await {
            Ok(outcome) => Ok(outcome),
            Err(cause) => {
                let fallback = FallbackError {
                    original: original.into(),
                    cause: cause.into(),
                };
                Err(
                    SyncError::new(SyncStage::Fallback, "raw configuration push failed")
                        .with_cause(fallback)
                        .with_hint("the fine-grained error above is preserved in the cause chain"),
                )
            }
        }
    }

    fn executor_error(err: ExecutorError) -> SyncError {
        match err {
            ExecutorError::Conflict(conflict) => Self::conflict_error(conflict),
            ExecutorError::Apply { .. } => {
                SyncError::new(SyncStage::Apply, "an operation failed inside the transaction")
                    .with_cause(err)
            }
            ExecutorError::Commit { .. } => {
                SyncError::new(SyncStage::Commit, "server rejected the staged configuration")
                    .with_cause(err)
            }
            ExecutorError::Transport { .. } => {
                SyncError::new(SyncStage::Apply, "transport failure during transaction")
                    .with_cause(err)
            }
        }
    }

    fn conflict_error(conflict: ConflictError) -> SyncError {
        SyncError::new(SyncStage::Commit, conflict.to_string())
            .with_cause(conflict)
            .with_hint("another writer is changing this endpoint; retry later or raise max_retries")
    }
}
