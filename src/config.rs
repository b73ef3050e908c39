//! Configuration module for symbol ranking and search.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SYMRANK_` and use double
//! underscores to separate nested levels:
//! - `SYMRANK_RANK__DAMPING=0.9` sets `rank.damping`
//! - `SYMRANK_SUBGRAPH__FLOW_POLICY=forward` sets `subgraph.flow_policy`
//! - `SYMRANK_INDEX__ARTIFACT_PATH=/tmp/index.json` sets `index.artifact_path`

use crate::embedding::RetryPolicy;
use crate::error::RankError;
use crate::graph::{DEFAULT_EXCLUDE_PATTERNS, ExclusionRules};
use crate::rank::RankConfig;
use crate::search::CombinationStrategy;
use crate::types::{FlowPolicy, SymbolKind};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the settings file and default data files
pub const CONFIG_DIR: &str = ".symrank";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .symrank is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub subgraph: SubgraphConfig,

    #[serde(default)]
    pub rank: RankConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Index artifact produced by the external indexer
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SubgraphConfig {
    /// Edge orientation used for ranking
    #[serde(default)]
    pub flow_policy: FlowPolicy,

    /// Gitignore-style patterns for definition paths that are never ranked
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_exclude_kinds")]
    pub exclude_kinds: Vec<SymbolKind>,

    /// Symbol id prefixes that are never ranked
    #[serde(default)]
    pub exclude_namespaces: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded models are cached
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,

    /// Retries after a failed provider request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default)]
    pub combination: CombinationStrategy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// EnvFilter directives; RUST_LOG takes precedence when set
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default = "default_false")]
    pub with_target: bool,
}

fn default_version() -> u32 {
    1
}
fn default_artifact_path() -> PathBuf {
    PathBuf::from(".symrank/index.json")
}
fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}
fn default_exclude_kinds() -> Vec<SymbolKind> {
    vec![SymbolKind::Parameter]
}
fn default_store_path() -> PathBuf {
    PathBuf::from(".symrank/embeddings.json")
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_model_cache_dir() -> PathBuf {
    PathBuf::from(".symrank/models")
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_top_k() -> usize {
    10
}
fn default_log_filter() -> String {
    "symrank=info".to_string()
}
fn default_false() -> bool {
    false
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            index: IndexConfig::default(),
            subgraph: SubgraphConfig::default(),
            rank: RankConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
        }
    }
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            flow_policy: FlowPolicy::default(),
            exclude_patterns: default_exclude_patterns(),
            exclude_kinds: default_exclude_kinds(),
            exclude_namespaces: Vec::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            model: default_embedding_model(),
            cache_dir: default_model_cache_dir(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            combination: CombinationStrategy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            with_target: false,
        }
    }
}

impl SubgraphConfig {
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::from_parts(
            &self.exclude_patterns,
            &self.exclude_kinds,
            &self.exclude_namespaces,
        )
    }
}

impl EmbeddingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .symrank directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| Path::new(CONFIG_DIR).join("settings.toml"));

        Self::layered(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::layered(path.as_ref()).extract().map_err(Box::new)
    }

    fn layered(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nesting levels; single underscores
            // stay part of the field name
            .merge(Env::prefixed("SYMRANK_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the settings file by looking for a .symrank directory from the
    /// current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .symrank is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Resolve a configured path against the workspace root. Absolute paths
    /// and settings without a workspace root are returned unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), RankError> {
        self.rank.validate()
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments in the current
    /// directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = Path::new(CONFIG_DIR).join("settings.toml");
        Self::write_template(&config_path, force)?;
        Ok(config_path)
    }

    fn write_template(config_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(config_path, CONFIG_TEMPLATE)?;
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# symrank configuration
#
# Every value can be overridden with an environment variable, e.g.
# SYMRANK_RANK__DAMPING=0.9 or SYMRANK_SUBGRAPH__FLOW_POLICY=forward

# Version of the configuration schema
version = 1

[index]
# Index artifact written by the indexer (relative to the workspace root)
artifact_path = ".symrank/index.json"

[subgraph]
# Edge orientation used for ranking: "forward", "backward" or "bidirectional"
flow_policy = "bidirectional"

# Definition paths that are never ranked (gitignore syntax)
exclude_patterns = ["tests/", "test/", "test_*", "*_test.*", "conftest.py", "*.generated.*"]

# Symbol kinds that are never ranked
exclude_kinds = ["parameter"]

# Symbol id prefixes that are never ranked
exclude_namespaces = []

[rank]
# Probability of following a reference instead of jumping to a random symbol
damping = 0.85

# Stop once the total score change of one iteration falls below this
tolerance = 1e-6

max_iterations = 100

[embedding]
store_path = ".symrank/embeddings.json"

# Local model used when built with the `fastembed` feature
model = "AllMiniLML6V2"
cache_dir = ".symrank/models"

# Retries with exponential backoff when the provider fails
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 10000

[search]
default_top_k = 10

# How similarity and rank are merged:
#   { strategy = "multiplicative" }
#   { strategy = "weighted", similarity_weight = 0.7 }
combination = { strategy = "multiplicative" }

[logging]
# tracing EnvFilter directives; RUST_LOG takes precedence
filter = "symrank=info"
with_target = false
"#;
