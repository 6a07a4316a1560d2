//! Connection settings.
//!
//! Values come from command-line flags or their environment variables first,
//! then from a TOML settings file:
//!
//! ```toml
//! rancher_url = "https://rancher.example.com"
//! cluster = "c-abc12"
//! token = "token-xyz:secret"
//! ```

use crate::cli::ConnectionArgs;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of the settings file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub rancher_url: Option<String>,
    pub cluster: Option<String>,
    pub token: Option<String>,
}

impl SettingsFile {
    /// Default location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rancherctl").join("config.toml"))
    }

    /// Load settings from `explicit`, or from the default location if present.
    ///
    /// An explicit file must exist; a missing default file yields empty settings.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        toml::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }
}

/// Resolved connection settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: Option<String>,
    pub cluster_id: Option<String>,
    pub token: Option<String>,
}

impl Settings {
    /// Merge flags over file values.
    pub fn resolve(args: ConnectionArgs, file: SettingsFile) -> Self {
        // An empty flag or variable does not hide a file value
        let pick = |flag: Option<String>, file: Option<String>| {
            let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
            non_empty(flag).or_else(|| non_empty(file))
        };
        Self {
            server_url: pick(args.rancher_url, file.rancher_url)
                .map(|url| url.trim_end_matches('/').to_string()),
            cluster_id: pick(args.cluster, file.cluster),
            token: pick(args.token, file.token),
        }
    }

    /// Server URL, required by every remote command.
    pub fn server_url(&self) -> Result<&str> {
        required(self.server_url.as_deref(), "rancher-url")
    }

    /// API token, required by every remote command.
    pub fn token(&self) -> Result<&str> {
        required(self.token.as_deref(), "token")
    }

    /// Cluster id, required by cluster-scoped commands.
    pub fn cluster_id(&self) -> Result<&str> {
        required(self.cluster_id.as_deref(), "cluster")
    }
}

fn required<'a>(value: Option<&'a str>, flag: &str) -> Result<&'a str> {
    match value {
        Some(v) => Ok(v),
        None => bail!(
            "missing setting '{flag}' (set --{flag}, its environment variable or the settings file)"
        ),
    }
}
