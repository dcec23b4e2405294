use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::{Cli, OutputMode};
use crate::config::Config;
use crate::error::{NominaError, Result};
use crate::ingest::BulkLoader;
use crate::remote::{CallerIdentity, RestRecordStore};
use crate::search::SearchEngine;
use crate::storage::PayrollStore;

/// Everything a command needs, built explicitly from the CLI invocation.
pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub output: OutputMode,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = Self::find_root()?;
        let config = Config::load(cli.config.as_deref(), &root)?;
        tracing::debug!(root = %root.display(), "nomina root resolved");

        Ok(Self {
            root,
            config,
            output: cli.output_mode(),
            verbosity: cli.verbose,
        })
    }

    #[must_use]
    pub fn new(root: PathBuf, config: Config) -> Self {
        Self {
            root,
            config,
            output: OutputMode::Human,
            verbosity: 0,
        }
    }

    #[must_use]
    pub const fn robot(&self) -> bool {
        matches!(self.output, OutputMode::Robot)
    }

    /// Loader over the configured candidates, or over `source` alone when given.
    #[must_use]
    pub fn loader(&self, source: Option<&Path>) -> BulkLoader {
        let candidates = match source {
            Some(path) => vec![path.to_path_buf()],
            None => self.config.source.resolve(&self.root),
        };
        BulkLoader::new(candidates, &self.config.loader)
    }

    pub fn open_store(&self) -> Result<PayrollStore> {
        PayrollStore::open(self.config.store.resolve_path(&self.root), &self.config.store)
    }

    #[must_use]
    pub fn search_engine(&self) -> Arc<SearchEngine> {
        Arc::new(SearchEngine::from_config(&self.config.cache))
    }

    pub fn remote_store(&self) -> Result<RestRecordStore> {
        RestRecordStore::from_config(&self.config.remote)
    }

    /// Identity for remote writes; `None` when either part is missing.
    #[must_use]
    pub fn identity(user_id: Option<&str>, access_token: Option<&str>) -> Option<CallerIdentity> {
        match (user_id, access_token) {
            (Some(user), Some(token)) => Some(CallerIdentity::new(user, token)),
            _ => None,
        }
    }

    fn find_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("NOMINA_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, ".nomina") {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| NominaError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("nomina"))
    }
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}
