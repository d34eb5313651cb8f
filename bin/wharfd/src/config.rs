//! Server configuration — loaded from a TOML context file.
//!
//! There are no built-in fallbacks for storage locations: a config
//! without a usable `data_dir` (or explicit `sqlite_path`) refuses to
//! start rather than writing somewhere surprising.

use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Listen address for the HTTP server.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Directory holding all persistent state for this instance.
    #[serde(default)]
    pub data_dir: String,

    /// Explicit SQLite database path (defaults to `{data_dir}/data.sqlite`).
    pub sqlite_path: Option<String>,
}

impl ServerConfig {
    /// Resolve a context name to a config path.
    ///
    /// A bare name maps to `/etc/wharf/<name>.toml`; anything containing
    /// a `/` or `.` is treated as a literal path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/wharf/{name_or_path}.toml"))
        }
    }

    /// Load and parse a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        let config: ServerConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Verify the configuration is complete enough to start.
    pub fn verify(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen is empty in configuration.");
        }
        if self.storage.data_dir.is_empty() && self.storage.sqlite_path.is_none() {
            anyhow::bail!(
                "No storage configured: set storage.data_dir or storage.sqlite_path.\n\
                 Refusing to start without an explicit database location."
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_resolves_under_etc() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/wharf/prod.toml")
        );
    }

    #[test]
    fn path_like_argument_is_used_directly() {
        assert_eq!(
            ServerConfig::resolve_path("./wharf.toml"),
            PathBuf::from("./wharf.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("/tmp/x.toml"),
            PathBuf::from("/tmp/x.toml")
        );
    }

    #[test]
    fn load_parses_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wharf.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/var/lib/wharf\"\n").unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.storage.data_dir, "/var/lib/wharf");
        assert!(config.storage.sqlite_path.is_none());
        config.verify().unwrap();
    }

    #[test]
    fn verify_rejects_missing_storage() {
        let config: ServerConfig =
            toml::from_str("[storage]\ndata_dir = \"\"\n").unwrap();
        assert!(config.verify().is_err());
    }
}
