//! Configuration file parsing for scriptdock.toml.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scriptdock_runtime::{CompilerConfig, DEFAULT_EXTENSIONS};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Script directory and reload settings
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Compiler settings
    #[serde(default)]
    pub compiler: CompilerSection,

    /// Values injected into every script under their key names
    #[serde(default)]
    pub globals: BTreeMap<String, serde_json::Value>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Script directory configuration.
#[derive(Debug, Deserialize)]
pub struct ScriptsConfig {
    /// Watched directory
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Extensions treated as scripts
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names never listed or watched
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Quiet period before a change triggers a reload
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Skip re-executing files whose mtime did not change
    #[serde(default)]
    pub skip_unchanged: bool,

    /// Prefix stripped from identifiers when deriving names
    pub name_prefix: Option<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            extensions: default_extensions(),
            ignore_dirs: default_ignore_dirs(),
            debounce_ms: default_debounce_ms(),
            skip_unchanged: false,
            name_prefix: None,
        }
    }
}

/// `[compiler]` section.
#[derive(Debug, Default, Deserialize)]
pub struct CompilerSection {
    /// ECMAScript target such as `es2020` or `esnext`
    pub target: Option<String>,
}

fn default_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_ignore_dirs() -> Vec<String> {
    vec!["node_modules".to_string(), ".git".to_string()]
}

fn default_debounce_ms() -> u64 {
    300
}

impl Config {
    /// Script directory: the CLI override, else `scripts.dir`, relative to `base_dir`
    pub fn scripts_dir(&self, cli_dir: Option<&Path>) -> PathBuf {
        match cli_dir {
            Some(dir) => dir.to_path_buf(),
            None => self.base_dir.join(&self.scripts.dir),
        }
    }

    pub fn compiler_config(&self) -> anyhow::Result<CompilerConfig> {
        let mut config = CompilerConfig::default();
        if let Some(target) = &self.compiler.target {
            let target = CompilerConfig::parse_target(target)
                .ok_or_else(|| anyhow::anyhow!("Unknown compiler target: {target}"))?;
            config = config.with_target(target);
        }
        Ok(config)
    }
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.map(PathBuf::from).or_else(find_config_file);

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let mut config = parse_config(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            config.base_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        Some(path) => Err(anyhow::anyhow!("Config file not found: {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Search for configuration file in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_ancestors(&cwd)
}

fn find_config_in_ancestors(start: &Path) -> Option<PathBuf> {
    const CONFIG_NAMES: &[&str] = &["scriptdock.toml", ".scriptdock.toml"];

    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}
