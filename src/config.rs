//! Configuration module for embed-store.
//!
//! Settings are layered, later sources overriding earlier ones:
//! - Default values
//! - TOML configuration file (`.embed-store/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `EMBED_STORE_` and use double
//! underscores to separate nested levels:
//! - `EMBED_STORE_SERVER__BIND=127.0.0.1:9000` sets `server.bind`
//! - `EMBED_STORE_CLUSTER__BATCH_SIZE=500` sets `cluster.batch_size`
//! - `EMBED_STORE_RUN_IMPORT=true` sets `run_import`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cluster::VECTOR_DIMENSION_384;
use crate::cluster::run::{
    ClusterJob, DEFAULT_BATCH_SIZE, DEFAULT_CLUSTERS, DEFAULT_LIMIT, DEFAULT_RUN_ITERATIONS,
    DEFAULT_RUN_WORKERS, DEFAULT_TIMEOUT_SECS,
};
use crate::importer::ImportConfig;

const CONFIG_DIR: &str = ".embed-store";
const ENV_PREFIX: &str = "EMBED_STORE_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// One of `info`, `warn`, `error`, `debug`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Snapshot file of the chunk store
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Embedding dimension of every stored chunk
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Import `import.file_path` in the background when serving
    #[serde(default)]
    pub run_import: bool,

    /// Run one clustering pass when serving
    #[serde(default)]
    pub run_cluster: bool,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub import: ImportSettings,

    #[serde(default)]
    pub cluster: ClusterSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ImportSettings {
    #[serde(default = "default_import_path")]
    pub file_path: PathBuf,

    /// Insert workers (defaults to CPU count)
    #[serde(default = "default_import_workers")]
    pub workers: usize,

    #[serde(default = "default_import_batch_size")]
    pub batch_size: usize,

    /// 0 imports every row
    #[serde(default)]
    pub limit: usize,

    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterSettings {
    #[serde(default = "default_clusters")]
    pub clusters: usize,

    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default = "default_cluster_workers")]
    pub workers: usize,

    /// Maximum rows fetched for one run
    #[serde(default = "default_cluster_limit")]
    pub limit: usize,

    /// Labels written per store call
    #[serde(default = "default_cluster_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_version() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("chunks.json")
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_import_path() -> PathBuf {
    PathBuf::from("data/chunks.csv")
}
fn default_import_workers() -> usize {
    num_cpus::get()
}
fn default_import_batch_size() -> usize {
    500
}
fn default_progress_interval() -> u64 {
    5
}
fn default_clusters() -> usize {
    DEFAULT_CLUSTERS
}
fn default_iterations() -> usize {
    DEFAULT_RUN_ITERATIONS
}
fn default_cluster_workers() -> usize {
    DEFAULT_RUN_WORKERS
}
fn default_cluster_limit() -> usize {
    DEFAULT_LIMIT
}
fn default_cluster_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            data_path: default_data_path(),
            dimension: default_dimension(),
            run_import: false,
            run_cluster: false,
            server: ServerConfig::default(),
            import: ImportSettings::default(),
            cluster: ClusterSettings::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            file_path: default_import_path(),
            workers: default_import_workers(),
            batch_size: default_import_batch_size(),
            limit: 0,
            progress_interval_secs: default_progress_interval(),
        }
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            iterations: default_iterations(),
            workers: default_cluster_workers(),
            limit: default_cluster_limit(),
            batch_size: default_cluster_batch_size(),
            timeout_secs: default_timeout_secs(),
            seed: None,
        }
    }
}

impl ImportSettings {
    pub fn to_config(&self, dimension: usize) -> ImportConfig {
        ImportConfig {
            file_path: self.file_path.clone(),
            workers: self.workers,
            batch_size: self.batch_size,
            limit: self.limit,
            dimension,
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }
}

impl ClusterSettings {
    pub fn to_job(&self) -> ClusterJob {
        ClusterJob {
            clusters: self.clusters,
            iterations: self.iterations,
            workers: self.workers,
            limit: self.limit,
            batch_size: self.batch_size,
            seed: self.seed,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still applying env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Searches from the current directory up for `.embed-store/settings.toml`
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with comments in `.embed-store/`
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::default();
        let template = format!(
            r#"# embed-store configuration

# Version of the configuration schema
version = 1

# Log level: info, warn, error or debug (RUST_LOG overrides it)
log_level = "info"

# Snapshot file of the chunk store
data_path = "{data_path}"

# Embedding dimension of stored chunks
dimension = {dimension}

# When serving, import [import].file_path in the background
run_import = false

# When serving, run one clustering pass after startup
run_cluster = false

[server]
bind = "{bind}"

[import]
file_path = "{file_path}"
# Insert workers (defaults to CPU count)
# workers = {workers}
batch_size = {import_batch}
# 0 imports every row
limit = 0
progress_interval_secs = {progress}

[cluster]
clusters = {clusters}
iterations = {iterations}
workers = {cluster_workers}
limit = {cluster_limit}
batch_size = {cluster_batch}
timeout_secs = {timeout}
# Fixed seed for reproducible centroid sampling
# seed = 42
"#,
            data_path = defaults.data_path.display(),
            dimension = defaults.dimension,
            bind = defaults.server.bind,
            file_path = defaults.import.file_path.display(),
            workers = defaults.import.workers,
            import_batch = defaults.import.batch_size,
            progress = defaults.import.progress_interval_secs,
            clusters = defaults.cluster.clusters,
            iterations = defaults.cluster.iterations,
            cluster_workers = defaults.cluster.workers,
            cluster_limit = defaults.cluster.limit,
            cluster_batch = defaults.cluster.batch_size,
            timeout = defaults.cluster.timeout_secs,
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
