//! # Error Model
//!
//! Stage-tagged errors for the user-facing sync path.
//!
//! Specialized errors ([`ParseError`], [`ValidationError`], [`ConflictError`],
//! [`OperationError`], [`FallbackError`], and the client layer's
//! [`ClientError`](crate::client::ClientError) for connection failures) wrap
//! their original cause and are composed into a [`SyncError`] at the
//! orchestrator boundary, so callers can match on kinds while still walking
//! the cause chain.

use std::fmt;
use thiserror::Error;

/// Stage of the sync pipeline an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Connect,
    Fetch,
    ParseCurrent,
    ParseDesired,
    Compare,
    Apply,
    Commit,
    Fallback,
}

impl SyncStage {
    /// Human-readable stage name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Connect => "connect",
            SyncStage::Fetch => "fetch",
            SyncStage::ParseCurrent => "parse-current",
            SyncStage::ParseDesired => "parse-desired",
            SyncStage::Compare => "compare",
            SyncStage::Apply => "apply",
            SyncStage::Commit => "commit",
            SyncStage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error type returned by the sync entry points
#[derive(Debug)]
pub struct SyncError {
    pub stage: SyncStage,
    pub message: String,
    pub cause: Option<anyhow::Error>,
    /// Actionable hints for the operator (URL reachable? credentials valid?)
    pub hints: Vec<String>,
}

impl SyncError {
    /// Build an error for a stage with a plain message
    #[must_use]
    pub fn new(stage: SyncStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            cause: None,
            hints: Vec::new(),
        }
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attach an operator hint
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Connection-stage error with the standard reachability hints
    #[must_use]
    pub fn connect(url: &str, cause: impl Into<anyhow::Error>) -> Self {
        Self::new(
            SyncStage::Connect,
            format!("could not reach Dataplane API at {url}"),
        )
        .with_cause(cause)
        .with_hint("check that the URL is correct and the endpoint is reachable")
        .with_hint("check that the configured credentials are valid")
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync failed at stage '{}': {}", self.stage, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Which side of the comparison failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSide {
    Current,
    Desired,
}

impl ParseSide {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseSide::Current => "current",
            ParseSide::Desired => "desired",
        }
    }
}

impl fmt::Display for ParseSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration could not be parsed into the structured model
#[derive(Debug, Error)]
#[error("failed to parse {side} configuration (starts with: {snippet:?})")]
pub struct ParseError {
    pub side: ParseSide,
    /// Leading bytes of the offending text, for context in logs
    pub snippet: String,
    #[source]
    pub cause: anyhow::Error,
}

impl ParseError {
    /// Wrap a parser failure, capturing a leading snippet of the text
    #[must_use]
    pub fn new(side: ParseSide, text: &str, cause: anyhow::Error) -> Self {
        let mut end = text.len().min(crate::constants::PARSE_ERROR_SNIPPET_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            side,
            snippet: text[..end].to_string(),
            cause,
        }
    }
}

/// Version conflict retries were exhausted
#[derive(Debug, Error)]
#[error(
    "configuration version conflict persisted after {attempts} attempts \
     (first seen version {first_version}, last seen {last_version})"
)]
pub struct ConflictError {
    pub attempts: u32,
    pub first_version: u64,
    pub last_version: u64,
}

/// A single operation failed while being applied
#[derive(Debug, Error)]
#[error("operation {kind} {section} '{resource_id}' failed")]
pub struct OperationError {
    pub kind: &'static str,
    pub section: String,
    pub resource_id: String,
    #[source]
    pub cause: anyhow::Error,
}

/// The raw-configuration fallback itself failed
///
/// Carries both the error that triggered the fallback and the error the
/// fallback produced.
#[derive(Debug, Error)]
#[error("raw configuration fallback failed: {cause} (fine-grained apply had failed with: {original})")]
pub struct FallbackError {
    pub original: anyhow::Error,
    pub cause: anyhow::Error,
}

/// Phase of validation that rejected the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Syntax,
    Schema,
    Semantic,
}

impl ValidationPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPhase::Syntax => "syntax",
            ValidationPhase::Schema => "schema",
            ValidationPhase::Semantic => "semantic",
        }
    }
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configuration failed validation
#[derive(Debug, Error)]
#[error("{phase} validation failed: {message}")]
pub struct ValidationError {
    pub phase: ValidationPhase,
    pub message: String,
    pub cause: Option<anyhow::Error>,
}

impl ValidationError {
    #[must_use]
    pub fn new(phase: ValidationPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}
