//! Per-version API bindings and the dispatch table.
//!
//! Each supported `(major, minor)` has one binding describing how that
//! revision shapes its URLs. Version gating is structural: a call either
//! finds a matching table entry or fails before any request is made.

use crate::client::types::ClientError;
use crate::version::Version;
use std::fmt;

/// A `(major, minor)` pair identifying an API revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl From<&Version> for ApiVersion {
    fn from(version: &Version) -> Self {
        Self {
            major: version.major,
            minor: version.minor,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Server edition a binding or dispatch entry applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Community,
    Enterprise,
}

/// One concrete API binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub version: ApiVersion,
    pub base_path: &'static str,
}

/// Bindings for every supported revision, oldest first
pub const SUPPORTED_BINDINGS: &[Binding] = &[
    Binding {
        version: ApiVersion::new(3, 0),
        base_path: "/v3",
    },
    Binding {
        version: ApiVersion::new(3, 1),
        base_path: "/v3",
    },
    Binding {
        version: ApiVersion::new(3, 2),
        base_path: "/v3",
    },
];

/// Select the binding for a discovered server version
///
/// An exact `(major, minor)` match wins; a newer server clamps down to the
/// highest supported binding so that a fresh HAProxy release keeps working
/// with known calls.
#[must_use]
pub fn binding_for(version: &Version) -> Option<&'static Binding> {
    let wanted = ApiVersion::from(version);
    if let Some(binding) = SUPPORTED_BINDINGS.iter().find(|b| b.version == wanted) {
        return Some(binding);
    }
    SUPPORTED_BINDINGS
        .iter()
        .rev()
        .find(|b| b.version < wanted)
}

/// One entry of a version-keyed dispatch table
#[derive(Debug, Clone, Copy)]
pub struct DispatchEntry<T> {
    pub version: ApiVersion,
    pub edition: Edition,
    pub value: T,
}

impl<T> DispatchEntry<T> {
    #[must_use]
    pub const fn community(version: ApiVersion, value: T) -> Self {
        Self {
            version,
            edition: Edition::Community,
            value,
        }
    }

    #[must_use]
    pub const fn enterprise(version: ApiVersion, value: T) -> Self {
        Self {
            version,
            edition: Edition::Enterprise,
            value,
        }
    }
}

/// Pick the table entry matching the active version and edition
///
/// Community entries also match enterprise endpoints. An entry that exists
/// only for the enterprise edition yields `EnterpriseRequired` on community
/// servers; a version with no entry at all yields `FeatureUnsupported`,
/// in both cases without touching the network.
///
/// # Errors
/// `EnterpriseRequired` or `FeatureUnsupported` as described above.
pub fn dispatch<'t, T>(
    active: ApiVersion,
    edition: Edition,
    feature: &str,
    table: &'t [DispatchEntry<T>],
) -> Result<&'t T, ClientError> {
    let matched = table.iter().find(|entry| {
        entry.version == active
            && (entry.edition == Edition::Community || edition == Edition::Enterprise)
    });
    if let Some(entry) = matched {
        return Ok(&entry.value);
    }
    if table
        .iter()
        .any(|entry| entry.version == active && entry.edition == Edition::Enterprise)
    {
        return Err(ClientError::EnterpriseRequired {
            feature: feature.to_string(),
        });
    }
    Err(ClientError::FeatureUnsupported {
        feature: feature.to_string(),
        version: active.to_string(),
    })
}
