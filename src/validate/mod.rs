//! # Two-Phase Validator
//!
//! Validates a configuration before it ever reaches a live instance:
//! a structural parse (syntax), traversal of the parsed model against the
//! version's API schema (schema), and a check by the real `haproxy` binary
//! over materialized files (semantic).
//!
//! The semantic phase shells out and is serialized through a process-wide
//! lock; the other phases are reentrant.

use crate::error::{ValidationError, ValidationPhase};
use crate::files::AuxFiles;
use crate::model::ConfigParser;
use crate::version::{Capabilities, ResolvedPaths, Version};
use std::path::Path;
use std::sync::Arc;

pub mod schema;
pub mod semantic;

/// Filesystem layout the validator materializes into
///
/// Wraps [`ResolvedPaths`] and, for scratch layouts, owns the temporary
/// directory backing them so it lives as long as the validation run.
#[derive(Debug)]
pub struct ValidationPaths {
    pub resolved: ResolvedPaths,
    _scratch: Option<tempfile::TempDir>,
}

impl ValidationPaths {
    /// Use the production layout for a capability set
    #[must_use]
    pub fn production(capabilities: &Capabilities) -> Self {
        Self {
            resolved: ResolvedPaths::for_capabilities(capabilities),
            _scratch: None,
        }
    }

    /// Use a caller-resolved layout
    #[must_use]
    pub fn from_resolved(resolved: ResolvedPaths) -> Self {
        Self {
            resolved,
            _scratch: None,
        }
    }

    /// Create a tempdir-backed layout for validating outside production
    /// paths
    ///
    /// # Errors
    /// Returns an error when the temporary directory cannot be created.
    pub fn scratch(capabilities: &Capabilities) -> anyhow::Result<Self> {
        let scratch = tempfile::TempDir::with_prefix("haproxy-validate-")?;
        let root = scratch.path();
        let resolved = ResolvedPaths::with_base_dirs(
            capabilities,
            &root.join("maps"),
            &root.join("ssl"),
            &root.join("general"),
            &root.join("haproxy.cfg"),
        );
        Ok(Self {
            resolved,
            _scratch: Some(scratch),
        })
    }

    #[must_use]
    pub fn config_file(&self) -> &Path {
        &self.resolved.config_file
    }
}

/// The validator entry point
pub struct Validator {
    parser: Arc<dyn ConfigParser>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    #[must_use]
    pub fn new(parser: Arc<dyn ConfigParser>) -> Self {
        Self { parser }
    }

    /// Run the syntax and schema phases only
    ///
    /// Reentrant; safe to call from concurrent workers.
    ///
    /// # Errors
    /// A [`ValidationError`] tagged with the failing phase.
    pub fn validate_structural(
        &self,
        config_text: &str,
        version: Option<&Version>,
    ) -> Result<(), ValidationError> {
        let parsed = self.parser.parse(config_text).map_err(|cause| {
            ValidationError::new(ValidationPhase::Syntax, cause.to_string()).with_cause(cause)
        })?;
        schema::validate_model(&parsed, version)
    }

    /// Run all three phases
    ///
    /// The semantic phase materializes the configuration and every
    /// auxiliary file into `paths` and invokes the `haproxy` binary, which
    /// must be discoverable on the search path.
    ///
    /// # Errors
    /// A [`ValidationError`] tagged with the failing phase.
    pub async fn validate(
        &self,
        config_text: &str,
        aux: &AuxFiles,
        paths: &ValidationPaths,
        version: Option<&Version>,
    ) -> Result<(), ValidationError> {
        self.validate_structural(config_text, version)?;
        semantic::check(config_text, aux, &paths.resolved).await
    }
}
