// Application state module
// Immutable state shared by every connection

use super::types::Config;
use crate::flyer::Schedule;

/// Application state, built once at startup and never mutated
pub struct AppState {
    pub config: Config,
    pub schedule: Schedule,
    upload_password: String,
}

impl AppState {
    pub fn new(config: Config, upload_password: String) -> Result<Self, config::ConfigError> {
        let schedule = config.schedule()?;
        Ok(Self {
            config,
            schedule,
            upload_password,
        })
    }

    /// Plain comparison against the configured upload password
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.upload_password == candidate
    }
}
