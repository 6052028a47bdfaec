//! # API Client Multiplexer
//!
//! A single logical Dataplane API client that holds one binding per
//! supported server revision and routes every call through the binding
//! matching the discovered version.
//!
//! The engine consumes the client through the [`DataplaneApi`] trait so the
//! executor, reconciler and orchestrator never depend on the HTTP layer;
//! tests implement the trait in memory.

use crate::diff::{OpKind, Operation};
use crate::version::{capabilities_from_version, Capabilities, Version};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{debug, info};

pub mod bindings;
pub mod endpoint;
pub mod transport;
pub mod types;

pub use bindings::{dispatch, ApiVersion, Binding, DispatchEntry, Edition};
pub use endpoint::Endpoint;
pub use types::{ClientError, CommitOutcome, InfoResponse, StorageEntry, StorageKind, TransactionInfo};

use transport::Transport;

/// Response header carrying the reload marker on 202 commits
const RELOAD_ID_HEADER: &str = "Reload-ID";

/// Uniform verbs the sync engine needs from a Dataplane API server
#[async_trait]
pub trait DataplaneApi: Send + Sync {
    /// Probe the server version
    async fn info(&self) -> Result<Version, ClientError>;

    /// Read the current configuration version token
    async fn configuration_version(&self) -> Result<u64, ClientError>;

    /// Fetch the full configuration text
    async fn raw_configuration(&self) -> Result<String, ClientError>;

    /// Push the full configuration text, bypassing fine-grained operations
    async fn push_raw_configuration(&self, text: &str) -> Result<CommitOutcome, ClientError>;

    /// Open a transaction bound to a configuration version
    async fn start_transaction(&self, version: u64) -> Result<TransactionInfo, ClientError>;

    /// Commit a transaction
    async fn commit_transaction(&self, id: &str) -> Result<CommitOutcome, ClientError>;

    /// Roll back a transaction
    async fn rollback_transaction(&self, id: &str) -> Result<(), ClientError>;

    /// Apply one configuration operation inside a transaction
    async fn apply_operation(&self, transaction_id: &str, op: &Operation)
        -> Result<(), ClientError>;

    /// Apply a runtime-eligible operation against the live process
    async fn runtime_apply(&self, op: &Operation) -> Result<(), ClientError>;

    /// List the entries of a storage family
    async fn list_storage(&self, kind: StorageKind) -> Result<Vec<StorageEntry>, ClientError>;

    /// Fetch the content of one stored file
    async fn fetch_storage(&self, kind: StorageKind, name: &str) -> Result<Vec<u8>, ClientError>;

    /// Create a stored file
    async fn create_storage(
        &self,
        kind: StorageKind,
        name: &str,
        content: &[u8],
    ) -> Result<(), ClientError>;

    /// Replace a stored file
    async fn update_storage(
        &self,
        kind: StorageKind,
        name: &str,
        content: &[u8],
    ) -> Result<(), ClientError>;

    /// Delete a stored file
    async fn delete_storage(&self, kind: StorageKind, name: &str) -> Result<(), ClientError>;
}

/// Storage families per revision; community 3.0 onward
const GENERAL_STORAGE: &[DispatchEntry<&str>] = &[
    DispatchEntry::community(ApiVersion::new(3, 0), "general"),
    DispatchEntry::community(ApiVersion::new(3, 1), "general"),
    DispatchEntry::community(ApiVersion::new(3, 2), "general"),
];
const MAP_STORAGE: &[DispatchEntry<&str>] = &[
    DispatchEntry::community(ApiVersion::new(3, 0), "maps"),
    DispatchEntry::community(ApiVersion::new(3, 1), "maps"),
    DispatchEntry::community(ApiVersion::new(3, 2), "maps"),
];
const SSL_STORAGE: &[DispatchEntry<&str>] = &[
    DispatchEntry::community(ApiVersion::new(3, 0), "ssl_certificates"),
    DispatchEntry::community(ApiVersion::new(3, 1), "ssl_certificates"),
    DispatchEntry::community(ApiVersion::new(3, 2), "ssl_certificates"),
];
/// Dedicated CRT-list storage only exists from 3.2
const CRT_LIST_STORAGE: &[DispatchEntry<&str>] =
    &[DispatchEntry::community(ApiVersion::new(3, 2), "crt_lists")];

/// The concrete HTTP-backed client
#[derive(Debug)]
pub struct DataplaneClient {
    transport: Transport,
    binding: &'static Binding,
    edition: Edition,
    version: Version,
    capabilities: Capabilities,
}

impl DataplaneClient {
    /// Connect to an endpoint, probing the server version at most once
    ///
    /// A cached version on the endpoint skips the probe entirely.
    ///
    /// # Errors
    /// `Connection` when the endpoint is unreachable, `FeatureUnsupported`
    /// when the server revision is older than every supported binding.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, ClientError> {
        let transport = Transport::new(endpoint).map_err(|source| ClientError::Setup { source })?;

        let version = match &endpoint.cached_version {
            Some(version) => {
                debug!("using cached server version {}", version);
                version.clone()
            }
            None => Self::probe_version(&transport).await?,
        };

        let binding =
            bindings::binding_for(&version).ok_or_else(|| ClientError::FeatureUnsupported {
                feature: "dataplane api".to_string(),
                version: version.to_string(),
            })?;
        let edition = if version.full.to_ascii_lowercase().contains("enterprise") {
            Edition::Enterprise
        } else {
            Edition::Community
        };
        let capabilities = capabilities_from_version(Some(&version));
        info!(
            "connected to Dataplane API {} ({:?}) at {}",
            version,
            edition,
            transport.base_url()
        );
        Ok(Self {
            transport,
            binding,
            edition,
            version,
            capabilities,
        })
    }

    async fn probe_version(transport: &Transport) -> Result<Version, ClientError> {
        // All supported revisions serve /info under the same base path, so
        // the newest binding is safe for the bootstrap probe.
        let base =
            bindings::SUPPORTED_BINDINGS[bindings::SUPPORTED_BINDINGS.len() - 1].base_path;
        let info: InfoResponse = transport.get_json(&format!("{base}/info")).await?;
        Version::parse(&info.api.version).map_err(|source| ClientError::Decode {
            path: format!("{base}/info"),
            source,
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

    #[must_use]
    pub fn active_version(&self) -> ApiVersion {
        self.binding.version
    }

    fn cfg(&self, suffix: &str) -> String {
        format!(
            "{}/services/haproxy/configuration/{suffix}",
            self.binding.base_path
        )
    }

    fn storage_segment(&self, kind: StorageKind) -> Result<&'static str, ClientError> {
        let table = match kind {
            StorageKind::General => GENERAL_STORAGE,
            StorageKind::Map => MAP_STORAGE,
            StorageKind::SslCertificate => SSL_STORAGE,
            StorageKind::CrtList => CRT_LIST_STORAGE,
        };
        dispatch(self.binding.version, self.edition, kind.as_str(), table).map(|segment| *segment)
    }

    fn storage_path(&self, kind: StorageKind, name: Option<&str>) -> Result<String, ClientError> {
        let segment = self.storage_segment(kind)?;
        let base = format!(
            "{}/services/haproxy/storage/{segment}",
            self.binding.base_path
        );
        Ok(match name {
            Some(name) => format!("{base}/{name}"),
            None => base,
        })
    }

    fn unroutable(op: &Operation) -> ClientError {
        ClientError::Unroutable {
            section: op.section.to_string(),
            kind: op.kind.as_str().to_string(),
        }
    }

    /// Map an operation to its REST route
    ///
    /// `resource_id` carries parent components separated by `/` as produced
    /// by the differ. Creates address the parent collection, updates and
    /// deletes the item.
    fn operation_route(&self, op: &Operation) -> Result<(Method, String), ClientError> {
        let parts: Vec<&str> = op.resource_id.split('/').collect();
        let method = match op.kind {
            OpKind::Create => Method::POST,
            OpKind::Update => Method::PUT,
            OpKind::Delete => Method::DELETE,
        };

        let path = match (op.section, op.kind) {
            ("global", OpKind::Update) => return Ok((Method::PUT, self.cfg("global"))),
            ("defaults", OpKind::Update) => return Ok((Method::PUT, self.cfg("defaults"))),
            ("frontend", OpKind::Create) => self.cfg("frontends"),
            ("frontend", _) => self.cfg(&format!("frontends/{}", parts[0])),
            ("backend", OpKind::Create) => self.cfg("backends"),
            ("backend", _) => self.cfg(&format!("backends/{}", parts[0])),
            ("server", kind) if parts.len() == 2 => {
                let collection = format!("backends/{}/servers", parts[0]);
                match kind {
                    OpKind::Create => self.cfg(&collection),
                    _ => self.cfg(&format!("{collection}/{}", parts[1])),
                }
            }
            ("bind", kind) if parts.len() == 2 => {
                let collection = format!("frontends/{}/binds", parts[0]);
                match kind {
                    OpKind::Create => self.cfg(&collection),
                    _ => self.cfg(&format!("{collection}/{}", parts[1])),
                }
            }
            ("acl" | "http_request_rule", kind) if parts.len() == 3 => {
                let family = if op.section == "acl" {
                    "acls"
                } else {
                    "http_request_rules"
                };
                let collection = format!("{}s/{}/{family}", parts[0], parts[1]);
                match kind {
                    OpKind::Create => self.cfg(&collection),
                    _ => self.cfg(&format!("{collection}/{}", parts[2])),
                }
            }
            ("backend_switching_rule", kind) if parts.len() == 2 => {
                let collection = format!("frontends/{}/backend_switching_rules", parts[0]);
                match kind {
                    OpKind::Create => self.cfg(&collection),
                    _ => self.cfg(&format!("{collection}/{}", parts[1])),
                }
            }
            _ => return Err(Self::unroutable(op)),
        };
        Ok((method, path))
    }

    async fn decode_commit(
        path: &str,
        response: reqwest::Response,
    ) -> Result<CommitOutcome, ClientError> {
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(CommitOutcome::Applied);
        }
        if status == StatusCode::ACCEPTED {
            let reload_id = response
                .headers()
                .get(RELOAD_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            return Ok(CommitOutcome::AppliedWithReload { reload_id });
        }
        // The API has reported conflicts as both 406 and 409 across releases
        if status == StatusCode::NOT_ACCEPTABLE || status == StatusCode::CONFLICT {
            return Err(ClientError::VersionConflict {
                server_version: None,
            });
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            return Err(ClientError::SemanticRejected { message: body });
        }
        Err(ClientError::Http {
            status: status.as_u16(),
            path: path.to_string(),
            body,
        })
    }
}

#[async_trait]
impl DataplaneApi for DataplaneClient {
    async fn info(&self) -> Result<Version, ClientError> {
        let path = format!("{}/info", self.binding.base_path);
        let info: InfoResponse = self.transport.get_json(&path).await?;
        Version::parse(&info.api.version).map_err(|source| ClientError::Decode { path, source })
    }

    async fn configuration_version(&self) -> Result<u64, ClientError> {
        self.transport.get_json(&self.cfg("version")).await
    }

    async fn raw_configuration(&self) -> Result<String, ClientError> {
        self.transport.get_text(&self.cfg("raw")).await
    }

    async fn push_raw_configuration(&self, text: &str) -> Result<CommitOutcome, ClientError> {
        let path = self.cfg("raw?skip_version=true");
        let response = self
            .transport
            .send_bytes(Method::POST, &path, text.as_bytes().to_vec())
            .await?;
        Self::decode_commit(&path, response).await
    }

    async fn start_transaction(&self, version: u64) -> Result<TransactionInfo, ClientError> {
        let path = format!(
            "{}/services/haproxy/transactions?version={version}",
            self.binding.base_path
        );
        let response = self.transport.send_empty(Method::POST, &path).await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(ClientError::VersionConflict {
                server_version: None,
            });
        }
        let response = Transport::ensure_success(&path, "transaction", response).await?;
        response.json().await.map_err(|e| ClientError::Decode {
            path,
            source: e.into(),
        })
    }

    async fn commit_transaction(&self, id: &str) -> Result<CommitOutcome, ClientError> {
        let path = format!(
            "{}/services/haproxy/transactions/{id}",
            self.binding.base_path
        );
        let response = self.transport.send_empty(Method::PUT, &path).await?;
        Self::decode_commit(&path, response).await
    }

    async fn rollback_transaction(&self, id: &str) -> Result<(), ClientError> {
        let path = format!(
            "{}/services/haproxy/transactions/{id}",
            self.binding.base_path
        );
        let response = self.transport.send_empty(Method::DELETE, &path).await?;
        Transport::ensure_success(&path, id, response).await?;
        Ok(())
    }

    async fn apply_operation(
        &self,
        transaction_id: &str,
        op: &Operation,
    ) -> Result<(), ClientError> {
        let (method, path) = self.operation_route(op)?;
        let path = format!("{path}?transaction_id={transaction_id}");
        let response = match op.kind {
            OpKind::Delete => self.transport.send_empty(method, &path).await?,
            _ => self.transport.send_json(method, &path, &op.payload).await?,
        };
        Transport::ensure_success(&path, &op.resource_id, response).await?;
        Ok(())
    }

    async fn runtime_apply(&self, op: &Operation) -> Result<(), ClientError> {
        if op.section != "server" || op.kind != OpKind::Update {
            return Err(Self::unroutable(op));
        }
        let parts: Vec<&str> = op.resource_id.split('/').collect();
        if parts.len() != 2 {
            return Err(Self::unroutable(op));
        }
        let path = format!(
            "{}/services/haproxy/runtime/backends/{}/servers/{}",
            self.binding.base_path, parts[0], parts[1]
        );
        let response = self
            .transport
            .send_json(Method::PUT, &path, &op.payload)
            .await?;
        Transport::ensure_success(&path, &op.resource_id, response).await?;
        Ok(())
    }

    async fn list_storage(&self, kind: StorageKind) -> Result<Vec<StorageEntry>, ClientError> {
        let path = self.storage_path(kind, None)?;
        self.transport.get_json(&path).await
    }

    async fn fetch_storage(&self, kind: StorageKind, name: &str) -> Result<Vec<u8>, ClientError> {
        let path = self.storage_path(kind, Some(name))?;
        let text = self.transport.get_text(&path).await.map_err(|err| {
            if err.is_not_found() {
                ClientError::NotFound {
                    name: name.to_string(),
                }
            } else {
                err
            }
        })?;
        Ok(text.into_bytes())
    }

    async fn create_storage(
        &self,
        kind: StorageKind,
        name: &str,
        content: &[u8],
    ) -> Result<(), ClientError> {
        let path = self.storage_path(kind, Some(name))?;
        let response = self
            .transport
            .send_bytes(Method::POST, &path, content.to_vec())
            .await?;
        match Transport::ensure_success(&path, name, response).await {
            // A 409 on create means the file raced us into existence
            Err(ClientError::Http { status: 409, .. }) => Err(ClientError::AlreadyExists {
                name: name.to_string(),
            }),
            other => other.map(|_| ()),
        }
    }

    async fn update_storage(
        &self,
        kind: StorageKind,
        name: &str,
        content: &[u8],
    ) -> Result<(), ClientError> {
        let path = self.storage_path(kind, Some(name))?;
        let response = self
            .transport
            .send_bytes(Method::PUT, &path, content.to_vec())
            .await?;
        Transport::ensure_success(&path, name, response).await?;
        Ok(())
    }

    async fn delete_storage(&self, kind: StorageKind, name: &str) -> Result<(), ClientError> {
        let path = self.storage_path(kind, Some(name))?;
        let response = self.transport.send_empty(Method::DELETE, &path).await?;
        Transport::ensure_success(&path, name, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{OpKind, Operation, PRIO_CREATE_CHILD, PRIO_UPDATE};
    use serde_json::json;

    fn client_at(version: &str) -> DataplaneClient {
        let endpoint = Endpoint::new("http://localhost:5555", "admin", "pw");
        let version = Version::parse(version).unwrap();
        DataplaneClient {
            transport: Transport::new(&endpoint).unwrap(),
            binding: bindings::binding_for(&version).unwrap(),
            edition: Edition::Community,
            capabilities: capabilities_from_version(Some(&version)),
            version,
        }
    }

    fn op(kind: OpKind, section: &'static str, resource_id: &str) -> Operation {
        Operation {
            kind,
            section,
            resource_id: resource_id.to_string(),
            payload: json!({}),
            priority: PRIO_CREATE_CHILD,
            runtime_eligible: false,
        }
    }

    #[test]
    fn test_server_create_routes_to_collection() {
        let client = client_at("3.1.0");
        let (method, path) = client
            .operation_route(&op(OpKind::Create, "server", "api/s2"))
            .unwrap();
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/v3/services/haproxy/configuration/backends/api/servers");
    }

    #[test]
    fn test_server_delete_routes_to_item() {
        let client = client_at("3.1.0");
        let (method, path) = client
            .operation_route(&op(OpKind::Delete, "server", "api/s1"))
            .unwrap();
        assert_eq!(method, Method::DELETE);
        assert_eq!(
            path,
            "/v3/services/haproxy/configuration/backends/api/servers/s1"
        );
    }

    #[test]
    fn test_global_always_put() {
        let client = client_at("3.1.0");
        let mut update = op(OpKind::Update, "global", "global");
        update.priority = PRIO_UPDATE;
        let (method, path) = client.operation_route(&update).unwrap();
        assert_eq!(method, Method::PUT);
        assert_eq!(path, "/v3/services/haproxy/configuration/global");
    }

    #[test]
    fn test_acl_route_includes_parent_and_index() {
        let client = client_at("3.1.0");
        let (_, path) = client
            .operation_route(&op(OpKind::Update, "acl", "frontend/web/2"))
            .unwrap();
        assert_eq!(
            path,
            "/v3/services/haproxy/configuration/frontends/web/acls/2"
        );
    }

    #[test]
    fn test_unroutable_section_rejected() {
        let client = client_at("3.1.0");
        let err = client
            .operation_route(&op(OpKind::Create, "mailers", "m1"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Unroutable { .. }));
    }

    #[test]
    fn test_crt_list_storage_gated_below_32() {
        let client = client_at("3.1.0");
        let err = client.storage_segment(StorageKind::CrtList).unwrap_err();
        assert!(matches!(err, ClientError::FeatureUnsupported { .. }));

        let client = client_at("3.2.0");
        assert_eq!(
            client.storage_segment(StorageKind::CrtList).unwrap(),
            "crt_lists"
        );
    }

    #[test]
    fn test_map_storage_available_all_versions() {
        for version in ["3.0.0", "3.1.0", "3.2.0"] {
            let client = client_at(version);
            assert_eq!(client.storage_segment(StorageKind::Map).unwrap(), "maps");
        }
    }
}
