//! # Version & Capabilities
//!
//! Parses Dataplane API server versions and derives the capability set that
//! drives API dispatch and storage layout.
//!
//! Capability derivation is a pure function of `(major, minor)`. An unknown
//! or absent version yields the all-false set so that callers degrade to the
//! most conservative behavior instead of guessing.

use crate::constants;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A parsed Dataplane API server version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    /// Full version string as reported by the server (e.g. "3.1.4 abcdef")
    pub full: String,
}

impl Version {
    /// Parse a server-reported version string
    ///
    /// Accepts forms like `3.1.4`, `v3.2.0 1e83f3`, `3.0`. Anything without
    /// a leading `major.minor` pair is rejected.
    ///
    /// # Errors
    /// Returns an error when no `major.minor` prefix can be extracted.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim().trim_start_matches('v');
        let numeric: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = numeric.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| anyhow::anyhow!("invalid version string: '{raw}'"))?;
        let minor = parts
            .next()
            .filter(|p| !p.is_empty())
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| anyhow::anyhow!("version '{raw}' is missing a minor component"))?;
        Ok(Self {
            major,
            minor,
            full: raw.trim().to_string(),
        })
    }

    /// True when this version is at least `major.minor`
    #[must_use]
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Capability flags derived from a server version
///
/// Selects API variants and storage layout. Every flag defaults to false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// CRT-lists have their own storage endpoint (3.2+)
    pub crt_list_storage: bool,
    /// Map files have a storage endpoint (3.0+)
    pub map_storage: bool,
    /// General files have a storage endpoint (3.0+)
    pub general_storage: bool,
    /// Map entries can be mutated through the runtime API (3.0+)
    pub runtime_maps: bool,
    /// Server parameters can be mutated through the runtime API (3.0+)
    pub runtime_servers: bool,
    /// HTTP/2 bind options are accepted (3.0+)
    pub http2: bool,
    /// QUIC bind options are accepted (3.0+)
    pub quic: bool,
    /// Advanced ACL expressions are accepted (3.0+)
    pub advanced_acls: bool,
}

/// Derive the capability set for an optionally-known server version
///
/// `None` yields the zero set: with no version information every gated
/// behavior is treated as unavailable.
#[must_use]
pub fn capabilities_from_version(version: Option<&Version>) -> Capabilities {
    let Some(v) = version else {
        return Capabilities::default();
    };
    Capabilities {
        crt_list_storage: v.at_least(3, 2),
        map_storage: v.at_least(3, 0),
        general_storage: v.at_least(3, 0),
        runtime_maps: v.at_least(3, 0),
        runtime_servers: v.at_least(3, 0),
        http2: v.at_least(3, 0),
        quic: v.at_least(3, 0),
        advanced_acls: v.at_least(3, 0),
    }
}

/// Filesystem layout for configuration and auxiliary files on the target
///
/// The single source of truth for where the validator materializes files.
/// `crt_list_dir` follows the SSL directory when the server stores CRT-lists
/// natively, otherwise the general directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub maps_dir: PathBuf,
    pub ssl_dir: PathBuf,
    pub crt_list_dir: PathBuf,
    pub general_dir: PathBuf,
    pub config_file: PathBuf,
}

impl ResolvedPaths {
    /// Resolve the production layout for a capability set
    #[must_use]
    pub fn for_capabilities(caps: &Capabilities) -> Self {
        Self::with_base_dirs(
            caps,
            Path::new(constants::DEFAULT_MAPS_DIR),
            Path::new(constants::DEFAULT_SSL_DIR),
            Path::new(constants::DEFAULT_GENERAL_DIR),
            Path::new(constants::DEFAULT_CONFIG_FILE),
        )
    }

    /// Resolve a layout rooted at caller-supplied directories
    #[must_use]
    pub fn with_base_dirs(
        caps: &Capabilities,
        maps_dir: &Path,
        ssl_dir: &Path,
        general_dir: &Path,
        config_file: &Path,
    ) -> Self {
        let crt_list_dir = if caps.crt_list_storage {
            ssl_dir.to_path_buf()
        } else {
            general_dir.to_path_buf()
        };
        Self {
            maps_dir: maps_dir.to_path_buf(),
            ssl_dir: ssl_dir.to_path_buf(),
            crt_list_dir,
            general_dir: general_dir.to_path_buf(),
            config_file: config_file.to_path_buf(),
        }
    }
}
