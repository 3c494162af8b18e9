//! Wiring shared by the commands that talk to backends.

use std::error::Error;
use std::sync::Arc;

use crate::core::backends::BackendRegistry;
use crate::core::config::Config;
use crate::core::credentials::{default_sources, process_env, resolve_backend_settings};
use crate::core::orchestrator::CompletionOrchestrator;
use crate::core::personality::PersonalityRegistry;
use crate::core::session_store::{FileStorage, SessionStore};

pub struct ChatContext {
    pub config: Config,
    pub personalities: Arc<PersonalityRegistry>,
    pub orchestrator: Arc<CompletionOrchestrator>,
}

impl ChatContext {
    pub fn load() -> Result<Self, Box<dyn Error>> {
        Ok(Self::from_config(Config::load()?))
    }

    pub fn from_config(config: Config) -> Self {
        let personalities = Arc::new(PersonalityRegistry::with_overrides(&config.personalities));
        let settings = resolve_backend_settings(&config, &default_sources(&config), process_env);
        let backends = BackendRegistry::from_settings(&reqwest::Client::new(), settings);
        let orchestrator = Arc::new(CompletionOrchestrator::new(
            Arc::clone(&personalities),
            backends,
        ));

        Self {
            config,
            personalities,
            orchestrator,
        }
    }

    /// Personality requested on the command line, else the configured
    /// default.
    pub fn personality_or_default<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.config.default_personality.as_deref())
    }
}

pub fn session_store(config: &Config) -> Result<SessionStore, Box<dyn Error>> {
    let dir = match &config.sessions_dir {
        Some(dir) => dir.clone(),
        None => FileStorage::default_dir().ok_or("Failed to determine data directory")?,
    };
    Ok(SessionStore::new(FileStorage::new(dir)))
}
