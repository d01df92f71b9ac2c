use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

use crate::audio::session::MAX_VOLUME;

const APP_DIR: &str = "musebot";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: Option<String>,
    pub application_id: Option<u64>,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: u16,

    // Vista de cola
    pub queue_page_size: usize,
    pub view_timeout: Duration,

    // Paths
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            // Discord
            discord_token: var("DISCORD_TOKEN"),
            application_id: var("APPLICATION_ID")
                .map(|v| v.parse())
                .transpose()
                .context("APPLICATION_ID must be a numeric id")?,
            guild_id: var("GUILD_ID")
                .map(|v| v.parse())
                .transpose()
                .context("GUILD_ID must be a numeric id")?,

            // Audio
            default_volume: var("DEFAULT_VOLUME")
                .map(|v| v.parse())
                .transpose()
                .context("DEFAULT_VOLUME must be an integer")?
                .unwrap_or(defaults.default_volume),

            // Vista de cola
            queue_page_size: var("QUEUE_PAGE_SIZE")
                .map(|v| v.parse())
                .transpose()
                .context("QUEUE_PAGE_SIZE must be an integer")?
                .unwrap_or(defaults.queue_page_size),
            view_timeout: var("VIEW_TIMEOUT")
                .map(|v| humantime::parse_duration(&v))
                .transpose()
                .context("VIEW_TIMEOUT must be a duration such as `180s` or `3m`")?
                .unwrap_or(defaults.view_timeout),

            // Paths
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            cache_dir: var("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "Default volume must be between 0 and {}, got: {}",
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.view_timeout.is_zero() {
            anyhow::bail!("View timeout must be greater than 0");
        }

        Ok(())
    }

    /// Hash file for the command catalog. Guild-scoped publishes get their
    /// own file so switching scope always republishes.
    pub fn catalog_hash_path(&self) -> PathBuf {
        match self.guild_id {
            Some(guild_id) => self.cache_dir.join(format!("command_catalog.{guild_id}.hash")),
            None => self.cache_dir.join("command_catalog.hash"),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Commands: {})\n  \
            Audio: {}% default volume\n  \
            Queue view: {} per page, {} timeout\n  \
            Paths: data={}, cache={}",
            self.application_id.map_or("auto".to_string(), |id| id.to_string()),
            self.guild_id.map_or("global".to_string(), |id| format!("guild {id}")),
            self.default_volume,
            self.queue_page_size,
            humantime::format_duration(self.view_timeout),
            self.data_dir.display(),
            self.cache_dir.display(),
        )
    }
}

/// Default configuration values.
impl Default for Config {
    fn default() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);

        Self {
            // Discord (no defaults - must be provided)
            discord_token: None,
            application_id: None,
            guild_id: None,

            default_volume: 100,

            queue_page_size: 10,
            view_timeout: Duration::from_secs(180),

            data_dir: base(dirs::data_dir()),
            cache_dir: base(dirs::cache_dir()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.discord_token, None);
        assert_eq!(config.default_volume, 100);
        assert_eq!(config.queue_page_size, 10);
        assert_eq!(config.view_timeout, Duration::from_secs(180));
        assert!(config.cache_dir.ends_with(APP_DIR));
    }

    #[test]
    fn test_values_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "tok"),
            ("GUILD_ID", "1234"),
            ("DEFAULT_VOLUME", "250"),
            ("QUEUE_PAGE_SIZE", "5"),
            ("VIEW_TIMEOUT", "3m"),
            ("CACHE_DIR", "/tmp/muse"),
        ]))
        .unwrap();

        assert_eq!(config.discord_token.as_deref(), Some("tok"));
        assert_eq!(config.guild_id, Some(1234));
        assert_eq!(config.default_volume, 250);
        assert_eq!(config.queue_page_size, 5);
        assert_eq!(config.view_timeout, Duration::from_secs(180));
        assert_eq!(
            config.catalog_hash_path(),
            PathBuf::from("/tmp/muse/command_catalog.1234.hash")
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("DEFAULT_VOLUME", "1001")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DEFAULT_VOLUME", "-3")])).is_err());
        assert!(Config::from_lookup(lookup(&[("QUEUE_PAGE_SIZE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("VIEW_TIMEOUT", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("GUILD_ID", "abc")])).is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: Some("super-secret".into()),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("global"));
    }
}
