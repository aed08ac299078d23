use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by both retrieval handlers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Source file suffixes that force binary transfer mode on FTP
    pub binary_suffixes: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            binary_suffixes: vec!["gz".to_string()],
        }
    }
}

impl RetrievalConfig {
    /// Whether `file_name` has to be fetched in binary mode
    pub fn requires_binary(&self, file_name: &str) -> bool {
        self.binary_suffixes
            .iter()
            .any(|suffix| file_name.ends_with(suffix.as_str()))
    }
}

/// Sizing and timeouts of a [`KeyedPool`](crate::KeyedPool)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections kept per key, extra ones are closed on release
    pub max_idle_per_key: usize,
    /// Idle connections older than this are closed instead of handed out
    #[serde(with = "seconds")]
    pub idle_timeout: Duration,
    /// Upper bound on creating a fresh connection
    #[serde(with = "seconds")]
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_key: 4,
            idle_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(60),
        }
    }
}

/// How SSH sessions are opened for SFTP retrievals
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Directory for SSH control sockets
    pub control_dir: PathBuf,
    /// Private key used for authentication, the ssh defaults apply when unset
    pub keyfile: Option<PathBuf>,
    /// Accept host keys that are not in known_hosts yet
    pub accept_unknown_hosts: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            control_dir: std::env::temp_dir(),
            keyfile: None,
            accept_unknown_hosts: false,
        }
    }
}

/// Complete configuration, as read from a JSON document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub pool: PoolConfig,
    pub ssh: SshConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        serde_json::from_str(json).context("invalid configuration")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&json)
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.retrieval.requires_binary("A1.xml.gz"));
        assert!(!config.retrieval.requires_binary("A1.xml"));
        assert_eq!(config.pool.max_idle_per_key, 4);
        assert!(!config.ssh.accept_unknown_hosts);
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json_str(
            r#"{
                "retrieval": { "binary_suffixes": ["gz", "zip"] },
                "pool": { "idle_timeout": 30 },
                "ssh": { "keyfile": "/home/pm/.ssh/id_ed25519", "accept_unknown_hosts": true }
            }"#,
        )
        .unwrap();
        assert!(config.retrieval.requires_binary("bundle.zip"));
        assert_eq!(config.pool.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.pool.connect_timeout, Duration::from_secs(60));
        assert_eq!(
            config.ssh.keyfile.as_deref(),
            Some(Path::new("/home/pm/.ssh/id_ed25519"))
        );
    }

    #[test]
    fn test_invalid_json() {
        let err = Config::from_json_str(r#"{"pool": {"idle_timeout": "soon"}}"#).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_json_file("/nonexistent/eftp.json").is_err());
    }
}
