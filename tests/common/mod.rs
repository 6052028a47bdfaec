//! Shared test doubles: an in-memory Dataplane API and a line-based parser
//! covering the configuration subset the tests exercise.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use async_trait::async_trait;
use haproxy_dataplane_sync::client::{
    ClientError, CommitOutcome, StorageEntry, StorageKind, TransactionInfo,
};
use haproxy_dataplane_sync::diff::Operation;
use haproxy_dataplane_sync::files::SslCertAdapter;
use haproxy_dataplane_sync::model::{
    Acl, Backend, BackendSwitchingRule, Balance, Bind, Configuration, ConfigParser, Defaults,
    Frontend, Global, Mode, Server, Switch,
};
use haproxy_dataplane_sync::version::Version;
use haproxy_dataplane_sync::DataplaneApi;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Install a test subscriber once so `RUST_LOG` works under `cargo test`
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory Dataplane API with injectable failures
#[derive(Debug, Default)]
pub struct MockApi {
    pub state: Mutex<MockState>,
}

#[derive(Debug)]
pub struct MockState {
    pub server_version: Version,
    /// Configuration version token
    pub version: u64,
    pub raw_config: String,
    pub storage: HashMap<StorageKind, BTreeMap<String, Vec<u8>>>,
    /// Operations applied through committed transactions
    pub applied: Vec<Operation>,
    /// Operations applied through the runtime API
    pub runtime_applied: Vec<Operation>,
    pub raw_pushes: Vec<String>,
    pub rollbacks: Vec<String>,
    pending: HashMap<String, Vec<Operation>>,
    next_txn: u64,
    /// Commits answering with a version conflict before succeeding
    pub conflicts_to_inject: u32,
    /// Artificial latency for configuration fetches (milliseconds)
    pub fetch_delay_ms: u64,
    /// Sections whose in-transaction apply fails with a semantic rejection
    pub failing_sections: Vec<&'static str>,
    pub commit_reloads: bool,
    next_reload: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            server_version: Version::parse("3.1.4").unwrap(),
            version: 1,
            raw_config: String::new(),
            storage: HashMap::new(),
            applied: Vec::new(),
            runtime_applied: Vec::new(),
            raw_pushes: Vec::new(),
            rollbacks: Vec::new(),
            pending: HashMap::new(),
            next_txn: 1,
            conflicts_to_inject: 0,
            fetch_delay_ms: 0,
            failing_sections: Vec::new(),
            commit_reloads: true,
            next_reload: 1,
        }
    }
}

impl MockApi {
    pub fn new(raw_config: &str) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().raw_config = raw_config.to_string();
        api
    }

    pub fn with_server_version(self, version: &str) -> Self {
        self.state.lock().unwrap().server_version = Version::parse(version).unwrap();
        self
    }

    pub fn seed_storage(&self, kind: StorageKind, name: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .storage
            .entry(kind)
            .or_default()
            .insert(name.to_string(), content.to_vec());
    }

    pub fn storage_names(&self, kind: StorageKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .storage
            .get(&kind)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataplaneApi for MockApi {
    async fn info(&self) -> Result<Version, ClientError> {
        Ok(self.state.lock().unwrap().server_version.clone())
    }

    async fn configuration_version(&self) -> Result<u64, ClientError> {
        Ok(self.state.lock().unwrap().version)
    }

    async fn raw_configuration(&self) -> Result<String, ClientError> {
        let (delay, config) = {
            let state = self.state.lock().unwrap();
            (state.fetch_delay_ms, state.raw_config.clone())
        };
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        Ok(config)
    }

    async fn push_raw_configuration(&self, text: &str) -> Result<CommitOutcome, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.raw_pushes.push(text.to_string());
        state.raw_config = text.to_string();
        state.version += 1;
        let reload_id = format!("reload-{}", state.next_reload);
        state.next_reload += 1;
        Ok(CommitOutcome::AppliedWithReload {
            reload_id: Some(reload_id),
        })
    }

    async fn start_transaction(&self, version: u64) -> Result<TransactionInfo, ClientError> {
        let mut state = self.state.lock().unwrap();
        if version != state.version {
            return Err(ClientError::VersionConflict {
                server_version: Some(state.version),
            });
        }
        let id = format!("txn-{}", state.next_txn);
        state.next_txn += 1;
        state.pending.insert(id.clone(), Vec::new());
        Ok(TransactionInfo { id, version })
    }

    async fn commit_transaction(&self, id: &str) -> Result<CommitOutcome, ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.conflicts_to_inject > 0 {
            state.conflicts_to_inject -= 1;
            state.pending.remove(id);
            // A conflicted commit means another writer moved the version
            state.version += 1;
            return Err(ClientError::VersionConflict {
                server_version: Some(state.version),
            });
        }
        let ops = state
            .pending
            .remove(id)
            .ok_or_else(|| ClientError::NotFound {
                name: id.to_string(),
            })?;
        state.applied.extend(ops);
        state.version += 1;
        if state.commit_reloads {
            let reload_id = format!("reload-{}", state.next_reload);
            state.next_reload += 1;
            Ok(CommitOutcome::AppliedWithReload {
                reload_id: Some(reload_id),
            })
        } else {
            Ok(CommitOutcome::Applied)
        }
    }

    async fn rollback_transaction(&self, id: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.pending.remove(id);
        state.rollbacks.push(id.to_string());
        Ok(())
    }

    async fn apply_operation(
        &self,
        transaction_id: &str,
        op: &Operation,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_sections.contains(&op.section) {
            return Err(ClientError::SemanticRejected {
                message: format!("section '{}' rejected", op.section),
            });
        }
        state
            .pending
            .get_mut(transaction_id)
            .ok_or_else(|| ClientError::NotFound {
                name: transaction_id.to_string(),
            })?
            .push(op.clone());
        Ok(())
    }

    async fn runtime_apply(&self, op: &Operation) -> Result<(), ClientError> {
        self.state.lock().unwrap().runtime_applied.push(op.clone());
        Ok(())
    }

    async fn list_storage(&self, kind: StorageKind) -> Result<Vec<StorageEntry>, ClientError> {
        let state = self.state.lock().unwrap();
        let entries = state
            .storage
            .get(&kind)
            .map(|files| {
                files
                    .iter()
                    .map(|(name, content)| StorageEntry {
                        name: name.clone(),
                        digest: (kind == StorageKind::SslCertificate)
                            .then(|| SslCertAdapter::fingerprint(content)),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    async fn fetch_storage(&self, kind: StorageKind, name: &str) -> Result<Vec<u8>, ClientError> {
        self.state
            .lock()
            .unwrap()
            .storage
            .get(&kind)
            .and_then(|files| files.get(name))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                name: name.to_string(),
            })
    }

    async fn create_storage(
        &self,
        kind: StorageKind,
        name: &str,
        content: &[u8],
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let files = state.storage.entry(kind).or_default();
        if files.contains_key(name) {
            return Err(ClientError::AlreadyExists {
                name: name.to_string(),
            });
        }
        files.insert(name.to_string(), content.to_vec());
        Ok(())
    }

    async fn update_storage(
        &self,
        kind: StorageKind,
        name: &str,
        content: &[u8],
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let files = state.storage.entry(kind).or_default();
        if !files.contains_key(name) {
            return Err(ClientError::NotFound {
                name: name.to_string(),
            });
        }
        files.insert(name.to_string(), content.to_vec());
        Ok(())
    }

    async fn delete_storage(&self, kind: StorageKind, name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let removed = state
            .storage
            .get_mut(&kind)
            .and_then(|files| files.remove(name));
        if removed.is_none() {
            return Err(ClientError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Line-based parser for the configuration subset used in tests
#[derive(Debug, Default)]
pub struct TestParser;

enum Scope {
    Global,
    Defaults,
    Frontend(String),
    Backend(String),
}

impl ConfigParser for TestParser {
    fn parse(&self, text: &str) -> anyhow::Result<Configuration> {
        let mut config = Configuration::default();
        let mut scope: Option<Scope> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            match words[0] {
                "global" => {
                    config.global = Some(Global::default());
                    scope = Some(Scope::Global);
                }
                "defaults" => {
                    config.defaults = Some(Defaults::default());
                    scope = Some(Scope::Defaults);
                }
                "frontend" => {
                    let name = words
                        .get(1)
                        .ok_or_else(|| anyhow::anyhow!("frontend without a name"))?
                        .to_string();
                    config.frontends.insert(
                        name.clone(),
                        Frontend {
                            name: name.clone(),
                            ..Frontend::default()
                        },
                    );
                    scope = Some(Scope::Frontend(name));
                }
                "backend" => {
                    let name = words
                        .get(1)
                        .ok_or_else(|| anyhow::anyhow!("backend without a name"))?
                        .to_string();
                    config.backends.insert(
                        name.clone(),
                        Backend {
                            name: name.clone(),
                            ..Backend::default()
                        },
                    );
                    scope = Some(Scope::Backend(name));
                }
                directive => {
                    parse_directive(&mut config, scope.as_ref(), directive, &words)?;
                }
            }
        }
        Ok(config)
    }
}

fn parse_directive(
    config: &mut Configuration,
    scope: Option<&Scope>,
    directive: &str,
    words: &[&str],
) -> anyhow::Result<()> {
    let scope = scope.ok_or_else(|| anyhow::anyhow!("directive '{directive}' outside a section"))?;
    match (scope, directive) {
        (Scope::Global, "maxconn") => {
            if let Some(global) = &mut config.global {
                global.maxconn = Some(words[1].parse()?);
            }
        }
        (Scope::Defaults, "mode") => {
            if let Some(defaults) = &mut config.defaults {
                defaults.mode = Some(parse_mode(words[1])?);
            }
        }
        (Scope::Frontend(name), "mode") => {
            let frontend = config.frontends.get_mut(name).unwrap();
            frontend.mode = Some(parse_mode(words[1])?);
        }
        (Scope::Frontend(name), "bind") => {
            let frontend = config.frontends.get_mut(name).unwrap();
            let (address, port) = parse_address(words[1])?;
            let bind_name = words
                .iter()
                .position(|w| *w == "name")
                .and_then(|i| words.get(i + 1))
                .map_or_else(|| format!("bind-{}", frontend.binds.len() + 1), |n| (*n).to_string());
            frontend.binds.insert(
                bind_name.clone(),
                Bind {
                    name: bind_name,
                    address,
                    port,
                    ssl: words.contains(&"ssl").then_some(true),
                    ..Bind::default()
                },
            );
        }
        (Scope::Frontend(name), "default_backend") => {
            let frontend = config.frontends.get_mut(name).unwrap();
            frontend.default_backend = Some(words[1].to_string());
        }
        (Scope::Frontend(name), "acl") => {
            let frontend = config.frontends.get_mut(name).unwrap();
            frontend.acls.push(Acl {
                acl_name: words[1].to_string(),
                criterion: words[2].to_string(),
                value: words[3..].join(" "),
            });
        }
        (Scope::Frontend(name), "use_backend") => {
            let frontend = config.frontends.get_mut(name).unwrap();
            frontend.backend_switching_rules.push(BackendSwitchingRule {
                name: words[1].to_string(),
                cond: words.get(2).map(|w| (*w).to_string()),
                cond_test: (words.len() > 3).then(|| words[3..].join(" ")),
            });
        }
        (Scope::Backend(name), "mode") => {
            let backend = config.backends.get_mut(name).unwrap();
            backend.mode = Some(parse_mode(words[1])?);
        }
        (Scope::Backend(name), "balance") => {
            let backend = config.backends.get_mut(name).unwrap();
            backend.balance = Some(Balance {
                algorithm: words[1].to_string(),
            });
        }
        (Scope::Backend(name), "server") => {
            let backend = config.backends.get_mut(name).unwrap();
            let (address, port) = parse_address(words[2])?;
            let mut server = Server {
                name: words[1].to_string(),
                address,
                port,
                ..Server::default()
            };
            let mut rest = words[3..].iter();
            while let Some(word) = rest.next() {
                match *word {
                    "weight" => {
                        server.weight = rest.next().map(|w| w.parse::<i64>()).transpose()?;
                    }
                    "check" => server.check = Some(Switch::Enabled),
                    "backup" => server.backup = Some(Switch::Enabled),
                    "ssl" => server.ssl = Some(Switch::Enabled),
                    _ => {}
                }
            }
            backend.servers.insert(server.name.clone(), server);
        }
        _ => anyhow::bail!("unsupported directive '{directive}'"),
    }
    Ok(())
}

fn parse_mode(word: &str) -> anyhow::Result<Mode> {
    match word {
        "http" => Ok(Mode::Http),
        "tcp" => Ok(Mode::Tcp),
        other => anyhow::bail!("unknown mode '{other}'"),
    }
}

fn parse_address(word: &str) -> anyhow::Result<(String, Option<u16>)> {
    match word.rsplit_once(':') {
        Some((address, port)) => {
            let address = if address.is_empty() { "*" } else { address };
            Ok((address.to_string(), Some(port.parse()?)))
        }
        None => Ok((word.to_string(), None)),
    }
}
