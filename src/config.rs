//! Connection settings, loaded from defaults, an optional JSON file and `HPCC_*` environment
//! variables (in that order of precedence, lowest first).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HpccError, HpccResult};

/// How to reach the cluster and which client tools to run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host name or IP of the ESP server, optionally with an `http://`/`https://` scheme.
    pub server: String,
    /// ECL Watch port.
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    /// Root of a local ECL repository passed to the compiler with `-I`.
    pub repo: Option<PathBuf>,
    /// Run `ecl`/`eclcc` with `-legacy`.
    pub legacy: bool,
    /// Target cluster for `ecl run`.
    pub cluster: String,
    /// Path or name of the `ecl` client tool.
    pub ecl_binary: String,
    /// Path or name of the `eclcc` compiler.
    pub eclcc_binary: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 8010,
            username: "hpcc-client".to_string(),
            password: None,
            repo: None,
            legacy: false,
            cluster: "thor".to_string(),
            ecl_binary: "ecl".to_string(),
            eclcc_binary: "eclcc".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration for `server` with every other setting at its default.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file; keys that are absent keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> HpccResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            HpccError::invalid_input(format!("bad connection config {}: {e}", path.display()))
        })
    }

    /// Defaults overlaid with `HPCC_*` environment variables.
    pub fn from_env() -> HpccResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay settings from a key lookup (`HPCC_SERVER`, `HPCC_PORT`, `HPCC_USERNAME`,
    /// `HPCC_PASSWORD`, `HPCC_REPO`, `HPCC_LEGACY`, `HPCC_CLUSTER`).
    pub fn with_overrides<F>(mut self, lookup: F) -> HpccResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HPCC_SERVER") {
            self.server = v;
        }
        if let Some(v) = lookup("HPCC_PORT") {
            self.port = v
                .trim()
                .parse()
                .map_err(|e| HpccError::invalid_input(format!("HPCC_PORT='{v}': {e}")))?;
        }
        if let Some(v) = lookup("HPCC_USERNAME") {
            self.username = v;
        }
        if let Some(v) = lookup("HPCC_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("HPCC_REPO") {
            self.repo = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HPCC_LEGACY") {
            self.legacy = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("HPCC_CLUSTER") {
            self.cluster = v;
        }
        Ok(self)
    }

    /// Server with any URL scheme removed, as the `ecl` tool expects it.
    pub fn host(&self) -> &str {
        self.server
            .strip_prefix("http://")
            .or_else(|| self.server.strip_prefix("https://"))
            .unwrap_or(&self.server)
            .trim_end_matches('/')
    }

    /// Base URL of the ESP server.
    pub fn base_url(&self) -> String {
        let scheme = if self.server.starts_with("https://") { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host(), self.port)
    }
}
