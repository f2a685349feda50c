use crate::cache::CacheStore;
use crate::error::{AutoverError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in a repository and the
/// current directory
pub const CONFIG_FILE_NAME: &str = "autover.toml";

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "GIT_AUTOVER_CACHE_DIR";

/// Represents the complete configuration for git-autover.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_true() -> bool {
    true
}

fn default_retention_hours() -> u64 {
    24
}

/// How versions are resolved.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResolutionConfig {
    /// Bump once more when the working tree has uncommitted changes
    #[serde(default)]
    pub check_working_tree: bool,

    /// Read tags through the persistent tag cache
    #[serde(default = "default_true")]
    pub use_tag_cache: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            check_working_tree: false,
            use_tag_cache: default_true(),
        }
    }
}

/// Where and for how long tag cache files are kept.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            directory: None,
            retention_hours: default_retention_hours(),
        }
    }
}

impl CacheConfig {
    /// Resolves the cache directory.
    ///
    /// Precedence:
    /// 1. `cli_dir` (the `--cache-dir` flag)
    /// 2. `GIT_AUTOVER_CACHE_DIR`
    /// 3. `[cache].directory`
    /// 4. `git-autover` in the user cache directory
    /// 5. `git-autover` in the system temp directory
    pub fn resolve_dir(&self, cli_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = cli_dir {
            return dir.to_path_buf();
        }
        if let Some(dir) = env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.directory {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("git-autover")
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(60 * 60))
    }

    /// Cache store for the resolved directory and retention window
    pub fn store(&self, cli_dir: Option<&Path>) -> CacheStore {
        CacheStore::new(self.resolve_dir(cli_dir)).with_retention(self.retention())
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `autover.toml` in the repository directory
/// 3. `autover.toml` in current directory
/// 4. `.autover.toml` in user config directory
/// 5. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err(Config)` - If a file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>, repo_path: Option<&Path>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match find_config_file(repo_path) {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    let config_str = fs::read_to_string(&path)
        .map_err(|e| AutoverError::config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&config_str)
        .map_err(|e| AutoverError::config(format!("invalid {}: {}", path.display(), e)))
}

fn find_config_file(repo_path: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(repo) = repo_path {
        candidates.push(repo.join(CONFIG_FILE_NAME));
    }
    candidates.push(Path::new(".").join(CONFIG_FILE_NAME));
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(format!(".{}", CONFIG_FILE_NAME)));
    }
    candidates.into_iter().find(|path| path.is_file())
}
