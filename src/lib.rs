//! HAProxy Dataplane Sync
//!
//! Reconciles a desired HAProxy configuration, plus its auxiliary files
//! (maps, SSL certificates, CRT-lists, general files), onto live instances
//! through the Dataplane API. The engine computes the minimum set of REST
//! operations, executes them under transactional and version-conflict
//! discipline, and reports what changed.
//!
//! Entry points:
//! - [`Client::connect`] discovers the server version and capabilities
//! - [`Client::sync`] runs the three-phase sync
//! - [`Client::dry_run`] computes the diff without applying it
//! - [`Validator`] checks a configuration structurally and via the
//!   `haproxy` binary before it ever reaches an instance
//!
//! Parsing configuration text into the structured model is delegated to a
//! collaborator behind the [`ConfigParser`] trait.

pub mod client;
pub mod constants;
pub mod diff;
pub mod error;
pub mod executor;
pub mod files;
pub mod model;
pub mod simplify;
pub mod sync;
pub mod validate;
pub mod version;

pub use client::{ClientError, DataplaneApi, DataplaneClient, Endpoint};
pub use diff::{ConfigDiff, DiffSummary, OpKind, Operation};
pub use error::{SyncError, SyncStage, ValidationError, ValidationPhase};
pub use files::{AuxFile, AuxFiles};
pub use model::{ConfigParser, Configuration};
pub use simplify::{simplify_rendering_error, simplify_validation_error};
pub use sync::{Client, SyncOptions, SyncResult};
pub use validate::{ValidationPaths, Validator};
pub use version::{capabilities_from_version, Capabilities, ResolvedPaths, Version};
