//! # Transactional Executor
//!
//! Owns the transaction lifecycle against the Dataplane API: read the
//! version token, open a transaction bound to it, apply operations, commit,
//! and retry the whole cycle on version conflicts. Version-conflict handling
//! lives here and nowhere else; callers only ever see a conflict after
//! retries are exhausted.
//!
//! When every operation is runtime-eligible the executor skips transactions
//! entirely and drives the runtime API, producing no reload.

use crate::client::{ClientError, CommitOutcome, DataplaneApi, TransactionInfo};
use crate::diff::Operation;
use crate::error::{ConflictError, OperationError};
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

/// State machine of a transaction handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
    /// A version conflict was detected; the server-side transaction is gone
    Lost,
}

/// A server-side transaction bound to a configuration version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    pub id: String,
    pub version: u64,
    pub state: TxState,
}

impl TransactionHandle {
    fn open(info: &TransactionInfo) -> Self {
        Self {
            id: info.id.clone(),
            version: info.version,
            state: TxState::Open,
        }
    }
}

/// What a successful execution did
#[derive(Debug)]
pub struct ExecutionReport {
    pub outcome: CommitOutcome,
    /// Number of conflict retries that were needed
    pub retries: u32,
    /// Per-operation failures collected under `continue_on_error`
    pub operation_errors: Vec<OperationError>,
    pub final_state: TxState,
}

/// Errors the executor surfaces to the orchestrator
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Conflict retries exhausted
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The operation callback failed; the transaction was rolled back
    #[error("apply failed inside transaction")]
    Apply {
        #[source]
        source: anyhow::Error,
    },

    /// The server rejected the staged configuration at commit
    #[error("commit rejected by server")]
    Commit {
        #[source]
        source: ClientError,
    },

    /// Transport-level failure talking to the server
    #[error("transport failure during transaction")]
    Transport {
        #[source]
        source: ClientError,
    },
}

impl ExecutorError {
    /// True when the raw-push fallback may be attempted
    #[must_use]
    pub fn is_fallback_candidate(&self) -> bool {
        !matches!(self, ExecutorError::Conflict(_))
    }
}

pub struct TransactionExecutor<'a> {
    api: &'a dyn DataplaneApi,
    max_retries: u32,
    continue_on_error: bool,
}

impl std::fmt::Debug for TransactionExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("max_retries", &self.max_retries)
            .field("continue_on_error", &self.continue_on_error)
            .finish_non_exhaustive()
    }
}

impl<'a> TransactionExecutor<'a> {
    #[must_use]
    pub fn new(api: &'a dyn DataplaneApi, max_retries: u32, continue_on_error: bool) -> Self {
        Self {
            api,
            max_retries,
            continue_on_error,
        }
    }

    /// Run a callback inside a transaction with conflict retries
    ///
    /// The callback may run several times, once per attempt; it must be
    /// idempotent with respect to the staged transaction it receives.
    ///
    /// # Errors
    /// `Conflict` after `max_retries` exhausted conflicts, `Apply` when the
    /// callback fails, `Commit`/`Transport` for server and transport
    /// failures. Rollback is attempted on every error path and its own
    /// failures are logged, never masked.
    pub async fn execute<F, Fut>(&self, callback: F) -> Result<ExecutionReport, ExecutorError>
    where
        F: Fn(TransactionHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut conflicts: u32 = 0;
        let mut first_version: Option<u64> = None;

        loop {
            let version = self
                .api
                .configuration_version()
                .await
                .map_err(|source| ExecutorError::Transport { source })?;
            first_version.get_or_insert(version);

            let txn = match self.api.start_transaction(version).await {
                Ok(txn) => txn,
                Err(err) if err.is_conflict() => {
                    conflicts += 1;
                    if conflicts > self.max_retries {
                        return Err(Self::exhausted(conflicts, first_version, version).into());
                    }
                    debug!("transaction start conflicted at version {}, retrying", version);
                    continue;
                }
                Err(source) => return Err(ExecutorError::Transport { source }),
            };
            let mut handle = TransactionHandle::open(&txn);
            debug!(
                "opened transaction {} at version {}",
                handle.id, handle.version
            );

            if let Err(source) = callback(handle.clone()).await {
                self.rollback(&mut handle).await;
                return Err(ExecutorError::Apply { source });
            }

            match self.api.commit_transaction(&txn.id).await {
                Ok(outcome) => {
                    handle.state = TxState::Committed;
                    if let CommitOutcome::AppliedWithReload { reload_id } = &outcome {
                        info!(
                            "transaction {} committed, reload started (marker: {:?})",
                            txn.id, reload_id
                        );
                    } else {
                        info!("transaction {} committed without reload", txn.id);
                    }
                    return Ok(ExecutionReport {
                        outcome,
                        retries: conflicts,
                        operation_errors: Vec::new(),
                        final_state: TxState::Committed,
                    });
                }
                Err(err) if err.is_conflict() => {
                    handle.state = TxState::Lost;
                    self.rollback(&mut handle).await;
                    conflicts += 1;
                    if conflicts > self.max_retries {
                        let last = self
                            .api
                            .configuration_version()
                            .await
                            .unwrap_or(handle.version);
                        return Err(Self::exhausted(conflicts, first_version, last).into());
                    }
                    warn!(
                        "commit of transaction {} hit a version conflict (retry {}/{})",
                        txn.id, conflicts, self.max_retries
                    );
                }
                Err(source @ ClientError::SemanticRejected { .. }) => {
                    self.rollback(&mut handle).await;
                    return Err(ExecutorError::Commit { source });
                }
                Err(source) => {
                    self.rollback(&mut handle).await;
                    return Err(ExecutorError::Transport { source });
                }
            }
        }
    }

    fn exhausted(attempts: u32, first: Option<u64>, last: u64) -> ConflictError {
        ConflictError {
            attempts: attempts - 1,
            first_version: first.unwrap_or(last),
            last_version: last,
        }
    }

    /// Best-effort rollback; failures are logged and never surfaced
    async fn rollback(&self, handle: &mut TransactionHandle) {
        match self.api.rollback_transaction(&handle.id).await {
            Ok(()) => {
                if handle.state != TxState::Lost {
                    handle.state = TxState::RolledBack;
                }
                debug!("rolled back transaction {}", handle.id);
            }
            Err(err) => {
                warn!("rollback of transaction {} failed: {}", handle.id, err);
            }
        }
    }

    /// Apply operations inside a transaction, in their given order
    ///
    /// # Errors
    /// As for [`execute`](Self::execute). With `continue_on_error`, failed
    /// operations are collected into the report and the transaction still
    /// commits.
    pub async fn apply_operations(
        &self,
        operations: &[Operation],
    ) -> Result<ExecutionReport, ExecutorError> {
        let collected: Mutex<Vec<OperationError>> = Mutex::new(Vec::new());
        let api = self.api;
        let continue_on_error = self.continue_on_error;
        let collected_ref = &collected;

        let report = self
            .execute(move |handle| async move {
                // Retried attempts start a fresh transaction, so stale
                // errors from a conflicted attempt must not leak through.
                collected_ref
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clear();
                for op in operations {
                    debug!("applying {} in transaction {}", op.describe(), handle.id);
                    if let Err(err) = api.apply_operation(&handle.id, op).await {
                        let op_error = OperationError {
                            kind: op.kind.as_str(),
                            section: op.section.to_string(),
                            resource_id: op.resource_id.clone(),
                            cause: err.into(),
                        };
                        if continue_on_error {
                            warn!("{} failed, continuing: {}", op.describe(), op_error);
                            collected_ref
                                .lock()
                                .unwrap_or_else(std::sync::PoisonError::into_inner)
                                .push(op_error);
                        } else {
                            return Err(op_error.into());
                        }
                    }
                }
                Ok(())
            })
            .await?;

        let operation_errors = collected
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(ExecutionReport {
            operation_errors,
            ..report
        })
    }

    /// Runtime-only fast path: no transaction, no reload
    ///
    /// # Errors
    /// `Apply` on the first failed operation (or collected under
    /// `continue_on_error`), `Transport` never — runtime failures carry the
    /// failing operation.
    pub async fn apply_runtime(
        &self,
        operations: &[Operation],
    ) -> Result<ExecutionReport, ExecutorError> {
        let mut operation_errors = Vec::new();
        for op in operations {
            debug!("applying {} through the runtime API", op.describe());
            if let Err(err) = self.api.runtime_apply(op).await {
                let op_error = OperationError {
                    kind: op.kind.as_str(),
                    section: op.section.to_string(),
                    resource_id: op.resource_id.clone(),
                    cause: err.into(),
                };
                if self.continue_on_error {
                    warn!("{} failed, continuing: {}", op.describe(), op_error);
                    operation_errors.push(op_error);
                } else {
                    return Err(ExecutorError::Apply {
                        source: op_error.into(),
                    });
                }
            }
        }
        info!(
            "applied {} operation(s) through the runtime API",
            operations.len()
        );
        Ok(ExecutionReport {
            outcome: CommitOutcome::Applied,
            retries: 0,
            operation_errors,
            final_state: TxState::Committed,
        })
    }
}
