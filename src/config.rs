use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NominaError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("NOMINA_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                NominaError::MissingConfig(format!("config file {} not found", path.display()))
            })?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Defaults with a single TOML document merged on top.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let patch: ConfigPatch = toml::from_str(raw)
            .map_err(|err| NominaError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("nomina/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| NominaError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw).map_err(|err| {
            NominaError::Config(format!("parse config {}: {err}", path.display()))
        })?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.source {
            self.source.merge(patch);
        }
        if let Some(patch) = patch.loader {
            self.loader.merge(patch);
        }
        if let Some(patch) = patch.cache {
            self.cache.merge(patch);
        }
        if let Some(patch) = patch.store {
            self.store.merge(patch);
        }
        if let Some(patch) = patch.remote {
            self.remote.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(&|key| std::env::var(key).ok())
    }

    /// Apply `NOMINA_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let env = EnvSource(lookup);

        if let Some(values) = env.list("NOMINA_SOURCE_PATHS") {
            self.source.paths = values.into_iter().map(PathBuf::from).collect();
        }

        if let Some(value) = env.parse::<usize>("NOMINA_LOADER_MIN_FIELDS")? {
            self.loader.min_fields = value;
        }
        if let Some(value) = env.parse::<u64>("NOMINA_LOADER_STREAMING_THRESHOLD_BYTES")? {
            self.loader.streaming_threshold_bytes = value;
        }
        if let Some(value) = env.parse::<usize>("NOMINA_LOADER_CHUNK_SIZE")? {
            self.loader.chunk_size = value;
        }
        if let Some(value) = env.parse::<usize>("NOMINA_LOADER_BATCH_SIZE")? {
            self.loader.batch_size = value;
        }

        if env.bool("NOMINA_CACHE_DISABLED").unwrap_or(false) {
            self.cache.enabled = false;
        }
        if let Some(value) = env.bool("NOMINA_CACHE_ENABLED") {
            self.cache.enabled = value;
        }
        if let Some(value) = env.parse::<usize>("NOMINA_CACHE_CAPACITY")? {
            self.cache.capacity = value;
        }

        if let Some(value) = env.string("NOMINA_STORE_PATH") {
            self.store.path = PathBuf::from(value);
        }
        if let Some(value) = env.parse::<usize>("NOMINA_STORE_BATCH_SIZE")? {
            self.store.batch_size = value;
        }
        if let Some(value) = env.parse::<usize>("NOMINA_STORE_BROWSE_LIMIT")? {
            self.store.browse_limit = value;
        }
        if let Some(value) = env.parse::<usize>("NOMINA_STORE_SEARCH_LIMIT")? {
            self.store.search_limit = value;
        }

        if let Some(value) = env.string("NOMINA_REMOTE_URL") {
            self.remote.url = Some(value);
        }
        if let Some(value) = env.string("NOMINA_REMOTE_API_KEY") {
            self.remote.api_key = Some(value);
        }
        if let Some(value) = env.string("NOMINA_REMOTE_TABLE") {
            self.remote.table = value;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("loader.chunk_size", self.loader.chunk_size),
            ("loader.batch_size", self.loader.batch_size),
            ("cache.capacity", self.cache.capacity),
            ("store.batch_size", self.store.batch_size),
            ("store.browse_limit", self.store.browse_limit),
            ("store.search_limit", self.store.search_limit),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(NominaError::Config(format!("{key} must be greater than 0")));
            }
        }
        if self.remote.table.trim().is_empty() {
            return Err(NominaError::Config("remote.table must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Candidate export files, tried in order.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from("nomina.csv")],
        }
    }
}

impl SourceConfig {
    fn merge(&mut self, patch: SourcePatch) {
        if let Some(values) = patch.paths {
            self.paths = values;
        }
    }

    /// Candidates with relative entries anchored at `root`.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> Vec<PathBuf> {
        self.paths.iter().map(|path| root.join(path)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub min_fields: usize,
    #[serde(default)]
    pub streaming_threshold_bytes: u64,
    #[serde(default)]
    pub chunk_size: usize,
    #[serde(default)]
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            min_fields: 11,
            streaming_threshold_bytes: 10 * 1024 * 1024,
            chunk_size: 8 * 1024,
            batch_size: 50,
        }
    }
}

impl LoaderConfig {
    fn merge(&mut self, patch: LoaderPatch) {
        if let Some(value) = patch.min_fields {
            self.min_fields = value;
        }
        if let Some(value) = patch.streaming_threshold_bytes {
            self.streaming_threshold_bytes = value;
        }
        if let Some(value) = patch.chunk_size {
            self.chunk_size = value;
        }
        if let Some(value) = patch.batch_size {
            self.batch_size = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 50,
        }
    }
}

impl CacheConfig {
    fn merge(&mut self, patch: CachePatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.capacity {
            self.capacity = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; relative paths live under the data root.
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub batch_size: usize,
    #[serde(default)]
    pub browse_limit: usize,
    #[serde(default)]
    pub search_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("payroll.sqlite"),
            batch_size: 100,
            browse_limit: 50,
            search_limit: 100,
        }
    }
}

impl StoreConfig {
    fn merge(&mut self, patch: StorePatch) {
        if let Some(value) = patch.path {
            self.path = value;
        }
        if let Some(value) = patch.batch_size {
            self.batch_size = value;
        }
        if let Some(value) = patch.browse_limit {
            self.browse_limit = value;
        }
        if let Some(value) = patch.search_limit {
            self.search_limit = value;
        }
    }

    #[must_use]
    pub fn resolve_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub table: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: "payroll_records".to_string(),
        }
    }
}

impl RemoteConfig {
    fn merge(&mut self, patch: RemotePatch) {
        if let Some(value) = patch.url {
            self.url = Some(value);
        }
        if let Some(value) = patch.api_key {
            self.api_key = Some(value);
        }
        if let Some(value) = patch.table {
            self.table = value;
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub source: Option<SourcePatch>,
    pub loader: Option<LoaderPatch>,
    pub cache: Option<CachePatch>,
    pub store: Option<StorePatch>,
    pub remote: Option<RemotePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SourcePatch {
    pub paths: Option<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LoaderPatch {
    pub min_fields: Option<usize>,
    pub streaming_threshold_bytes: Option<u64>,
    pub chunk_size: Option<usize>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CachePatch {
    pub enabled: Option<bool>,
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorePatch {
    pub path: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub browse_limit: Option<usize>,
    pub search_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RemotePatch {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: Option<String>,
}

struct EnvSource<'a>(&'a dyn Fn(&str) -> Option<String>);

impl EnvSource<'_> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.string(key)
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|err| {
                NominaError::Config(format!("invalid {key} value {value}: {err}"))
            }),
            None => Ok(None),
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.string(key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(ToString::to_string)
                .collect()
        })
    }
}
