use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_database_name")]
    pub name: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub uri: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/tictactoe-db-init/config.toml")
    }

    /// The file `load` and `write_template` act on, with `~/` expanded.
    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        path.map(expand_path).unwrap_or_else(Self::default_path)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    /// `port` is applied after `uri`, so `--uri` picks the host and `--port` the port.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(uri) = overrides.uri {
            self.database.uri = uri;
        }
        if let Some(port) = overrides.port {
            self.database.uri = with_port(&self.database.uri, port)?;
        }
        if let Some(database) = overrides.database {
            self.database.name = database;
        }
        Ok(())
    }

    pub fn write_template(path: &Path) -> Result<()> {
        let path = expand_path(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(&path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[database]
uri = "mongodb://localhost:5000"
name = "myapp"
app_name = "tictactoe-db-init"
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => expand_tilde(raw),
        None => path.to_path_buf(),
    }
}

/// Replaces the port of a single-host `mongodb://` connection string, keeping
/// credentials, path and query untouched.
pub fn with_port(uri: &str, port: u16) -> Result<String> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| anyhow!("connection string has no scheme"))?;
    if scheme != "mongodb" {
        bail!("a port cannot be set on a {scheme}:// connection string");
    }
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (credentials, host) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };
    if host.contains(',') {
        bail!("a port cannot be set on a multi-host connection string");
    }
    if host.is_empty() {
        bail!("connection string has no host");
    }
    Ok(format!("{scheme}://{credentials}{}:{port}{tail}", strip_port(host)))
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((bare, _)) => bare,
        None => host,
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            name: default_database_name(),
            app_name: default_app_name(),
        }
    }
}

fn default_uri() -> String {
    "mongodb://localhost:5000".to_string()
}

fn default_database_name() -> String {
    "myapp".to_string()
}

fn default_app_name() -> String {
    "tictactoe-db-init".to_string()
}
