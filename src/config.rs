//! Layered configuration.
//!
//! Sources, later ones winning: built-in defaults, `reposnap.toml` in the
//! working directory, an explicit config file, then `REPOSNAP_*`
//! environment variables (nested keys separated by `__`, for example
//! `REPOSNAP_LIMITS__MAX_DEPTH=3`).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::filter::{Filter, DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_FILES};
use crate::ignorefile::DEFAULT_IGNORE_FILE;

/// Config file picked up from the working directory when present.
pub const LOCAL_CONFIG_FILE: &str = "reposnap.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "REPOSNAP_";

/// Evaluation request appended after the serialized snapshot.
pub const DEFAULT_INSTRUCTION: &str = "Please evaluate this repository on the following criteria:\n\
- Monetary Potential\n\
- Uniqueness\n\
- Quality\n\
Provide a rating for each criterion and any additional insights you may have.";

/// Resource ceilings for one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Files with more lines than this are skipped.
    pub max_lines: usize,
    /// Files larger than this many bytes on disk are skipped.
    pub max_bytes: u64,
    /// Directories at this depth or deeper are not descended into.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_lines: 1000,
            max_bytes: 100 * 1024,
            max_depth: 2,
        }
    }
}

/// Remote chat endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "deepseek-r1:1.5b".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: Limits,
    pub excluded_extensions: Vec<String>,
    pub excluded_files: Vec<String>,
    /// Name of the root-level ignore file.
    pub ignore_file: String,
    /// Version-control metadata directory that is never traversed.
    pub vcs_dir: String,
    pub chat: ChatConfig,
    pub instruction: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            excluded_files: DEFAULT_EXCLUDED_FILES.iter().map(|s| s.to_string()).collect(),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            vcs_dir: ".git".to_string(),
            chat: ChatConfig::default(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    pub fn load(explicit: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE));

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()
    }

    /// Load defaults overlaid with a single TOML file, ignoring the
    /// working directory and environment.
    pub fn from_file(path: &Path) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file_exact(path))
            .extract()
    }

    /// Admission filter for these deny-lists. The ignore file's own name is
    /// always excluded.
    pub fn filter(&self) -> Filter {
        Filter::new(&self.excluded_extensions, &self.excluded_files).exclude_filename(&self.ignore_file)
    }
}
