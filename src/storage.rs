use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{info, warn};

const CREDENTIALS_FILE: &str = "credentials.json";

/// Crea un directorio y los padres que falten, accesibles solo por el dueño.
///
/// Directories that already exist keep their permissions.
pub async fn ensure_private_dir(dir: &Path) -> Result<()> {
    let mut missing = Vec::new();
    let mut cursor = Some(dir);
    while let Some(path) = cursor {
        if path.as_os_str().is_empty() || fs::try_exists(path).await.unwrap_or(false) {
            break;
        }
        missing.push(path);
        cursor = path.parent();
    }

    for path in missing.into_iter().rev() {
        match fs::create_dir(path).await {
            Ok(()) => restrict(path, 0o700).await?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).with_context(|| format!("no se pudo crear {}", path.display()))
            }
        }
    }
    Ok(())
}

/// Escribe un archivo con permisos 0600, creando su directorio si hace falta
pub async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent).await?;
    }
    fs::write(path, contents)
        .await
        .with_context(|| format!("no se pudo escribir {}", path.display()))?;
    restrict(path, 0o600).await
}

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("no se pudieron ajustar permisos de {}", path.display()))
}

#[cfg(not(unix))]
async fn restrict(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Credenciales guardadas con `--token`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub discord_token: Option<String>,
}

/// Archivo JSON de credenciales dentro del directorio de datos
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CREDENTIALS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files yield empty credentials.
    pub async fn load(&self) -> Credentials {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return Credentials::default(),
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!("⚠️ Credenciales ilegibles en {}: {}", self.path.display(), e);
            Credentials::default()
        })
    }

    pub async fn save_token(&self, token: &str) -> Result<()> {
        let mut credentials = self.load().await;
        credentials.discord_token = Some(token.trim().to_string());

        let json = serde_json::to_vec_pretty(&credentials)?;
        write_private(&self.path, &json).await?;

        info!("💾 Token guardado en {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(&dir.path().join("nested"));

        assert!(store.load().await.discord_token.is_none());

        store.save_token("  abc.def.ghi\n").await.unwrap();
        assert_eq!(store.load().await.discord_token.as_deref(), Some("abc.def.ghi"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("state");
        let file = sub.join("secret");

        write_private(&file, b"x").await.unwrap();

        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode();
        let dir_mode = std::fs::metadata(&sub).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_directories_keep_their_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        let file = dir.path().join("command_catalog.hash");

        write_private(&file, b"12345678").await.unwrap();

        let dir_mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_credentials_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        std::fs::write(store.path(), b"{not json").unwrap();

        assert!(store.load().await.discord_token.is_none());
    }
}
