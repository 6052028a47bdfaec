//! # Configuration Model
//!
//! Structured representation of a parsed HAProxy configuration.
//!
//! Parsing configuration text into this model is delegated to an external
//! collaborator behind the [`ConfigParser`] trait; the sync engine only
//! iterates the named sections defined here. Section attribute structs
//! serialize to the field names the Dataplane API uses, so serializing one
//! yields the API-shaped payload the differ compares and ships.
//!
//! Child collections (servers, binds, ACLs, rules) are marked `serde(skip)`
//! on their parents: each child is its own resource at the REST layer and is
//! diffed and shipped separately.

use serde::Serialize;
use std::collections::BTreeMap;

/// Parser collaborator seam
///
/// Implementations must be deterministic: the same text always yields the
/// same [`Configuration`].
pub trait ConfigParser: Send + Sync {
    /// Parse HAProxy configuration text into the structured model
    ///
    /// # Errors
    /// Returns an error when the text is not a structurally valid HAProxy
    /// configuration.
    fn parse(&self, text: &str) -> anyhow::Result<Configuration>;
}

/// A fully parsed HAProxy configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub global: Option<Global>,
    pub defaults: Option<Defaults>,
    pub frontends: BTreeMap<String, Frontend>,
    pub backends: BTreeMap<String, Backend>,
}

impl Configuration {
    /// Names of the top-level sections present in this configuration
    #[must_use]
    pub fn section_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.global.is_some() {
            names.push("global");
        }
        if self.defaults.is_some() {
            names.push("defaults");
        }
        if !self.frontends.is_empty() {
            names.push("frontend");
        }
        if !self.backends.is_empty() {
            names.push("backend");
        }
        names
    }
}

/// Proxy mode shared by defaults, frontends and backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Http,
    Tcp,
}

/// Tri-state switch the API encodes as "enabled"/"disabled"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Switch {
    Enabled,
    Disabled,
}

/// The `global` section
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Global {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbthread: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_ciphers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_default_bind_options: Option<String>,
}

/// The (unnamed) `defaults` section
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Defaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_client: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_server: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_connect: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
}

/// A `frontend` section
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frontend {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(skip)]
    pub binds: BTreeMap<String, Bind>,
    #[serde(skip)]
    pub acls: Vec<Acl>,
    #[serde(skip)]
    pub http_request_rules: Vec<HttpRequestRule>,
    #[serde(skip)]
    pub backend_switching_rules: Vec<BackendSwitchingRule>,
}

/// A `backend` section
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Backend {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adv_check: Option<String>,
    #[serde(skip)]
    pub servers: BTreeMap<String, Server>,
    #[serde(skip)]
    pub acls: Vec<Acl>,
    #[serde(skip)]
    pub http_request_rules: Vec<HttpRequestRule>,
}

/// Load-balancing configuration of a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Balance {
    pub algorithm: String,
}

/// A `server` line within a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Server {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<Switch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<Switch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<Switch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<String>,
}

/// A `bind` line within a frontend
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bind {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpn: Option<String>,
}

/// An `acl` line, identified positionally within its parent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Acl {
    pub acl_name: String,
    pub criterion: String,
    pub value: String,
}

/// An `http-request` rule, identified positionally within its parent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpRequestRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cond_test: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdr_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdr_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redir_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redir_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_status: Option<i64>,
}

/// A `use_backend` rule, identified positionally within its frontend
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendSwitchingRule {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cond_test: Option<String>,
}
