use anyhow::{Context, Result};
use tracing::info;

use crate::config::{self, AppConfig, WorkspacePaths};
use crate::events::EventLog;
use crate::media::MediaStorage;
use crate::store::Database;

/// Everything a flow needs: configuration, the store, media and the audit log.
pub struct Site {
    pub config: AppConfig,
    pub paths: WorkspacePaths,
    pub db: Database,
    pub media: MediaStorage,
    pub events: EventLog,
}

impl Site {
    /// Opens the site rooted at `paths`, creating directories, the store
    /// file and the placeholder photo on first use.
    pub fn open(paths: WorkspacePaths, config: AppConfig) -> Result<Self> {
        paths.ensure()?;
        let db = Database::open(paths.database_file())
            .with_context(|| format!("Failed opening store {:?}", paths.database_file()))?;
        let media = MediaStorage::new(&paths.media_dir, &config.uploads);
        media.ensure_placeholder()?;
        let events = EventLog::at(paths.events_file());
        info!(root = %paths.root.display(), "Site opened");
        Ok(Self {
            config,
            paths,
            db,
            media,
            events,
        })
    }

    /// Opens the site at `FANSITE_HOME` (or the OS data dir) with its config file.
    pub fn from_environment() -> Result<Self> {
        let paths = config::ensure_workspace_structure()?;
        let mut config = config::load_or_default(&paths.config_file())?;
        config::apply_env_overrides(&mut config);
        Self::open(paths, config)
    }
}
