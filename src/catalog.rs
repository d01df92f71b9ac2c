//! Slash-command catalog and its idempotent publication.
//!
//! Discord rate-limits command registration, so the catalog is only pushed
//! when its content changed. The fingerprint is a SHA-256 over a canonical
//! JSON rendering, truncated to 64 bits and kept as 8 raw bytes on disk.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    SubCommand,
    String,
    Integer,
    Boolean,
}

/// One parameter, or one subcommand when `kind` is [`OptionKind::SubCommand`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub choices: Vec<String>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub options: Vec<OptionSpec>,
}

impl OptionSpec {
    pub fn new(kind: OptionKind, name: &str, description: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: description.to_string(),
            required: false,
            choices: Vec::new(),
            min_value: None,
            max_value: None,
            options: Vec::new(),
        }
    }

    pub fn subcommand(name: &str, description: &str) -> Self {
        Self::new(OptionKind::SubCommand, name, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn choice(mut self, value: &str) -> Self {
        self.choices.push(value.to_string());
        self
    }

    pub fn min(mut self, value: i64) -> Self {
        self.min_value = Some(value);
        self
    }

    pub fn max(mut self, value: i64) -> Self {
        self.max_value = Some(value);
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }
}

/// Full published schema of one top-level command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub guild_only: bool,
    pub options: Vec<OptionSpec>,
}

impl CommandSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            guild_only: true,
            options: Vec::new(),
        }
    }

    /// Usable in direct messages too.
    pub fn anywhere(mut self) -> Self {
        self.guild_only = false;
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    fn canonical(&self) -> CommandSpec {
        let mut spec = self.clone();
        spec.options = canonical_options(&self.options);
        spec
    }
}

/// Subcommands are ordered by name; plain parameters keep their order since
/// it is part of what users see.
fn canonical_options(options: &[OptionSpec]) -> Vec<OptionSpec> {
    let mut options: Vec<OptionSpec> = options
        .iter()
        .map(|opt| OptionSpec {
            options: canonical_options(&opt.options),
            ..opt.clone()
        })
        .collect();

    if options.iter().all(|opt| opt.kind == OptionKind::SubCommand) {
        options.sort_by(|a, b| a.name.cmp(&b.name));
    }
    options
}

/// Fingerprint of the whole catalog, independent of registration order.
pub fn catalog_hash(commands: &[CommandSpec]) -> Result<u64> {
    let mut canonical: Vec<CommandSpec> = commands.iter().map(CommandSpec::canonical).collect();
    canonical.sort_by(|a, b| a.name.cmp(&b.name));

    let json = serde_json::to_vec(&canonical)?;
    let digest = Sha256::digest(&json);

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Ok(u64::from_be_bytes(head))
}

/// Last published hash, as 8 raw big-endian bytes with owner-only permissions.
pub struct HashStore {
    path: PathBuf,
}

impl HashStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Anything but exactly 8 readable bytes counts as "never published".
    pub async fn load(&self) -> Option<u64> {
        let raw = fs::read(&self.path).await.ok()?;
        let bytes: [u8; 8] = raw.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    pub async fn save(&self, hash: u64) -> Result<()> {
        storage::write_private(&self.path, &hash.to_be_bytes()).await
    }
}

/// Where the catalog gets published (Discord in production).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    async fn publish(&self, commands: &[CommandSpec]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Published(u64),
    Unchanged(u64),
}

pub struct CatalogSynchronizer {
    store: HashStore,
}

impl CatalogSynchronizer {
    pub fn new(store: HashStore) -> Self {
        Self { store }
    }

    /// Publishes `commands` unless the stored hash says they are already live.
    ///
    /// The hash is persisted only after a successful publish, so a failed
    /// attempt is retried on the next start.
    pub async fn sync(
        &self,
        commands: &[CommandSpec],
        publisher: &dyn CatalogPublisher,
    ) -> Result<SyncOutcome> {
        let hash = catalog_hash(commands)?;

        match self.store.load().await {
            Some(stored) if stored == hash => {
                info!("✅ Catálogo de comandos sin cambios ({:016x}), se omite el registro", hash);
                return Ok(SyncOutcome::Unchanged(hash));
            }
            Some(stored) => debug!("Hash de catálogo cambió: {:016x} -> {:016x}", stored, hash),
            None => debug!("Sin hash previo en {}", self.store.path().display()),
        }

        info!("📝 Registrando {} comandos slash...", commands.len());
        publisher.publish(commands).await?;

        if let Err(e) = self.store.save(hash).await {
            // Los comandos ya están publicados; el próximo inicio solo repetirá el registro
            warn!("⚠️ No se pudo guardar el hash del catálogo: {:?}", e);
        }
        info!("✅ Catálogo publicado ({:016x})", hash);
        Ok(SyncOutcome::Published(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("play", "Play audio.")
                .option(OptionSpec::new(OptionKind::String, "search", "Query").required()),
            CommandSpec::new("queue", "Queue commands.")
                .option(OptionSpec::subcommand("get", "Show it."))
                .option(
                    OptionSpec::subcommand("remove", "Remove one.")
                        .option(OptionSpec::new(OptionKind::Integer, "entry", "Position").required()),
                ),
            CommandSpec::new("help", "Help.").anywhere(),
        ]
    }

    #[test]
    fn test_hash_ignores_registration_order() {
        let commands = sample();
        let mut reversed = commands.clone();
        reversed.reverse();
        reversed[1].options.reverse();

        assert_eq!(catalog_hash(&commands).unwrap(), catalog_hash(&reversed).unwrap());
    }

    #[test]
    fn test_hash_changes_with_description() {
        let commands = sample();
        let mut edited = commands.clone();
        edited[0].description = "Play audio from a URL.".into();

        assert_ne!(catalog_hash(&commands).unwrap(), catalog_hash(&edited).unwrap());
    }

    #[test]
    fn test_hash_keeps_parameter_order() {
        let two_params = |first: &str, second: &str| {
            vec![CommandSpec::new("move", "Move.")
                .option(OptionSpec::new(OptionKind::Integer, first, "x").required())
                .option(OptionSpec::new(OptionKind::Integer, second, "y").required())]
        };

        assert_ne!(
            catalog_hash(&two_params("before", "after")).unwrap(),
            catalog_hash(&two_params("after", "before")).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_hash_forces_publish_then_skips() {
        let dir = tempfile::tempdir().unwrap();
        let sync = CatalogSynchronizer::new(HashStore::new(dir.path().join("catalog.hash")));
        let commands = sample();

        let mut publisher = MockCatalogPublisher::new();
        publisher.expect_publish().times(1).returning(|_| Ok(()));

        let first = sync.sync(&commands, &publisher).await.unwrap();
        let second = sync.sync(&commands, &publisher).await.unwrap();

        let hash = catalog_hash(&commands).unwrap();
        assert_eq!(first, SyncOutcome::Published(hash));
        assert_eq!(second, SyncOutcome::Unchanged(hash));
        assert_eq!(std::fs::read(dir.path().join("catalog.hash")).unwrap(), hash.to_be_bytes());
    }

    #[tokio::test]
    async fn test_failed_publish_does_not_persist_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("catalog.hash");
        let sync = CatalogSynchronizer::new(HashStore::new(&store_path));

        let mut publisher = MockCatalogPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("rate limited")));

        assert!(sync.sync(&sample(), &publisher).await.is_err());
        assert!(!store_path.exists());
    }

    #[tokio::test]
    async fn test_truncated_hash_file_forces_publish() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("catalog.hash");
        std::fs::write(&store_path, [1, 2, 3]).unwrap();
        let sync = CatalogSynchronizer::new(HashStore::new(&store_path));

        let mut publisher = MockCatalogPublisher::new();
        publisher.expect_publish().times(1).returning(|_| Ok(()));

        assert!(matches!(
            sync.sync(&sample(), &publisher).await.unwrap(),
            SyncOutcome::Published(_)
        ));
    }
}
