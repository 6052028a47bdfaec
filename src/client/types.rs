//! Wire types and the client error taxonomy.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Errors produced by the API client layer
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (refused, reset, DNS, timeout)
    #[error("connection to {url} failed")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status that maps to no more specific kind
    #[error("HTTP {status} from {path}: {body}")]
    Http {
        status: u16,
        path: String,
        body: String,
    },

    /// The transaction commit raced another writer
    #[error("configuration version conflict (server now at {server_version:?})")]
    VersionConflict { server_version: Option<u64> },

    /// The server refused the staged configuration on semantic grounds
    #[error("configuration rejected: {message}")]
    SemanticRejected { message: String },

    /// Create raced an existing resource of the same name
    #[error("'{name}' already exists")]
    AlreadyExists { name: String },

    /// The named resource does not exist on the server
    #[error("'{name}' not found")]
    NotFound { name: String },

    /// The requested feature only exists on HAProxy Enterprise
    #[error("feature '{feature}' requires HAProxy Enterprise")]
    EnterpriseRequired { feature: String },

    /// No binding for the active server version supports the feature
    #[error("feature '{feature}' is not supported by Dataplane API {version}")]
    FeatureUnsupported { feature: String, version: String },

    /// The response body could not be decoded
    #[error("failed to decode response from {path}")]
    Decode {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The client itself could not be constructed
    #[error("client setup failed")]
    Setup {
        #[source]
        source: anyhow::Error,
    },

    /// An operation names a section/kind combination with no API route
    #[error("no API route for {kind} on section '{section}'")]
    Unroutable { section: String, kind: String },
}

impl ClientError {
    /// True for transport-class failures that idempotent calls may retry
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::VersionConflict { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// `GET /info` response, reduced to what the engine needs
#[derive(Debug, Deserialize)]
pub struct InfoResponse {
    pub api: ApiInfo,
}

/// API block of the info response
#[derive(Debug, Deserialize)]
pub struct ApiInfo {
    pub version: String,
}

/// A server-side transaction handle as returned by the start call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionInfo {
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
}

/// Result of committing a transaction or pushing raw configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The change landed without restarting workers
    Applied,
    /// The change landed and HAProxy is reloading; the marker identifies
    /// the reload for status polling
    AppliedWithReload { reload_id: Option<String> },
}

impl CommitOutcome {
    #[must_use]
    pub fn reload_triggered(&self) -> bool {
        matches!(self, CommitOutcome::AppliedWithReload { .. })
    }

    #[must_use]
    pub fn reload_id(&self) -> Option<&str> {
        match self {
            CommitOutcome::Applied => None,
            CommitOutcome::AppliedWithReload { reload_id } => reload_id.as_deref(),
        }
    }
}

/// Kinds of auxiliary file storage the Dataplane API exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    General,
    Map,
    SslCertificate,
    CrtList,
}

impl StorageKind {
    /// URL path segment of the storage family
    #[must_use]
    pub fn path_segment(&self) -> &'static str {
        match self {
            StorageKind::General => "general",
            StorageKind::Map => "maps",
            StorageKind::SslCertificate => "ssl_certificates",
            StorageKind::CrtList => "crt_lists",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::General => "general file",
            StorageKind::Map => "map file",
            StorageKind::SslCertificate => "ssl certificate",
            StorageKind::CrtList => "crt-list",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a storage listing
///
/// The SSL family reports a digest of the stored certificate; other families
/// report content only on fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageEntry {
    #[serde(alias = "storage_name", alias = "file")]
    pub name: String,
    #[serde(default, alias = "sha256_checksum", alias = "fingerprint")]
    pub digest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_outcome_reload() {
        assert!(!CommitOutcome::Applied.reload_triggered());
        let reload = CommitOutcome::AppliedWithReload {
            reload_id: Some("42".to_string()),
        };
        assert!(reload.reload_triggered());
        assert_eq!(reload.reload_id(), Some("42"));
    }

    #[test]
    fn test_storage_entry_aliases() {
        let entry: StorageEntry =
            serde_json::from_str(r#"{"storage_name": "certs.pem", "sha256_checksum": "ab12"}"#)
                .unwrap();
        assert_eq!(entry.name, "certs.pem");
        assert_eq!(entry.digest.as_deref(), Some("ab12"));
    }

    #[test]
    fn test_transaction_info_decodes_version_field() {
        let txn: TransactionInfo =
            serde_json::from_str(r#"{"id": "t-1", "_version": 7, "status": "in_progress"}"#)
                .unwrap();
        assert_eq!(txn.id, "t-1");
        assert_eq!(txn.version, 7);
    }

    #[test]
    fn test_error_classification() {
        let conflict = ClientError::VersionConflict {
            server_version: Some(9),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_connection());

        let exists = ClientError::AlreadyExists {
            name: "x.map".to_string(),
        };
        assert!(exists.is_already_exists());
    }
}
