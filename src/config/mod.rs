// Configuration module entry point
// Loads layered configuration and builds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

use chrono::{DateTime, Duration, FixedOffset};

use crate::flyer::Schedule;

// Re-export public types
pub use state::AppState;
pub use types::{Config, FlyerConfig, HealthConfig};

/// Environment variable holding the upload password
pub const PASSWORD_VAR: &str = "password";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::defaults(config::Config::builder())?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FLYER")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(";")
                    .with_list_parse_key("flyer.venue")
                    .with_list_parse_key("flyer.footer")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in configuration with no file or environment overrides
    #[cfg(test)]
    #[allow(clippy::redundant_closure_for_method_calls)] // `build` exists for every builder state
    pub fn from_defaults() -> Self {
        Self::defaults(config::Config::builder())
            .and_then(|builder| builder.build())
            .and_then(config::Config::try_deserialize)
            .expect("built-in defaults deserialize")
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 60)?
            .set_default("performance.write_timeout", 300)?
            .set_default("http.server_name", "meeting-flyer/0.1")?
            .set_default("flyer.image_dir", "img")?
            .set_default("flyer.font_path", "arial.ttf")?
            .set_default("flyer.anchor", "2024-02-01T15:30:00-05:00")?
            .set_default("flyer.interval_days", 14)?
            .set_default("flyer.duration_minutes", 120)?
            .set_default("flyer.title", "Board of Bored Board Game Players")?
            .set_default(
                "flyer.venue",
                vec!["Harmon Meeting Room", "Local History Center", "Bryan, Ohio"],
            )?
            .set_default("flyer.footer", vec!["More info:", "bbbgp.org"])?
            .set_default("upload.max_body_size", 52_428_800) // 50MB
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        self.schedule()?;
        if self.flyer.footer.len() > 2 {
            return Err(config::ConfigError::Message(
                "flyer.footer holds at most two lines".to_string(),
            ));
        }
        if self.flyer.venue.len() > 3 {
            return Err(config::ConfigError::Message(
                "flyer.venue holds at most three lines".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Parse the meeting schedule from the flyer section
    pub fn schedule(&self) -> Result<Schedule, config::ConfigError> {
        let anchor: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(&self.flyer.anchor)
            .map_err(|e| {
                config::ConfigError::Message(format!(
                    "Invalid flyer.anchor '{}': {e}",
                    self.flyer.anchor
                ))
            })?;
        if self.flyer.interval_days <= 0 {
            return Err(config::ConfigError::Message(
                "flyer.interval_days must be positive".to_string(),
            ));
        }
        Ok(Schedule::new(
            anchor,
            Duration::days(self.flyer.interval_days),
            Duration::minutes(self.flyer.duration_minutes),
        ))
    }
}

/// Read the upload password, refusing to start without it
pub fn upload_password_from_env() -> Result<String, config::ConfigError> {
    std::env::var(PASSWORD_VAR).map_err(|_| {
        config::ConfigError::NotFound(format!(
            "{PASSWORD_VAR} (set the upload password in the environment)"
        ))
    })
}
