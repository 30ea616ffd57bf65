//! Startup configuration.
//!
//! Built once in `main` and passed down by reference. Sources, lowest
//! precedence first: built-in defaults, `~/.sfmcp/sfmcp.toml` (or
//! `--config`), environment variables, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable naming the default org alias.
pub const ENV_TARGET_ORG: &str = "SF_ORG_ALIAS";
pub const ENV_SF_BIN: &str = "SFMCP_SF_BIN";
pub const ENV_WORKDIR: &str = "SFMCP_WORKDIR";
pub const ENV_TIMEOUT_SECS: &str = "SFMCP_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "SFMCP_LOG_LEVEL";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfmcpConfig {
    /// Salesforce CLI executable (name on PATH or absolute path).
    #[serde(default = "default_sf_bin")]
    pub sf_bin: String,

    /// Arguments placed before every `sf` subcommand, e.g. when `sf_bin` is
    /// a launcher such as `npx`.
    #[serde(default)]
    pub sf_args: Vec<String>,

    /// Org alias passed as `--target-org`. When unset the CLI's default org is used.
    #[serde(default)]
    pub target_org: Option<String>,

    /// Directory `sf` runs in; flow artifacts are searched for beneath it.
    /// Defaults to the process working directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Upper bound on a single `sf` invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,

    /// `tracing` filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SfmcpConfig {
    fn default() -> Self {
        Self {
            sf_bin: default_sf_bin(),
            sf_args: Vec::new(),
            target_org: None,
            working_dir: None,
            command_timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

fn default_sf_bin() -> String {
    "sf".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "warn".into()
}

/// `~/.sfmcp/sfmcp.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sfmcp")
        .join("sfmcp.toml")
}

impl SfmcpConfig {
    /// Load from the default config file.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&default_config_path())
    }

    /// Load from a specific path. A missing file yields defaults; a file that
    /// exists but does not parse is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config.expanded())
    }

    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(org) = non_empty(ENV_TARGET_ORG) {
            self.target_org = Some(org);
        }
        if let Some(bin) = non_empty(ENV_SF_BIN) {
            self.sf_bin = bin;
        }
        if let Some(dir) = non_empty(ENV_WORKDIR) {
            self.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = non_empty(ENV_TIMEOUT_SECS) {
            match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.command_timeout_secs = secs,
                _ => tracing::warn!("ignoring invalid {ENV_TIMEOUT_SECS}={secs:?}"),
            }
        }
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Expand `${VAR}` references in string fields.
    fn expanded(mut self) -> Self {
        self.sf_bin = expand_env_vars(&self.sf_bin);
        self.sf_args = self.sf_args.iter().map(|a| expand_env_vars(a)).collect();
        self.target_org = self.target_org.map(|org| expand_env_vars(&org));
        self.working_dir = self
            .working_dir
            .map(|dir| PathBuf::from(expand_env_vars(&dir.to_string_lossy())));
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    /// Configured working directory, else the process working directory.
    pub fn resolved_working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Expand `${VAR}` references. Unresolved variables are left as written.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{var_name}}}")),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
