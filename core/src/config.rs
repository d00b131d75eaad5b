use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::auth::{
    ChallengeRequest, DEFAULT_NEGATIVE_BUTTON, DEFAULT_SUBTITLE, DEFAULT_TITLE,
};
use crate::{BioAuthError, BioAuthResult};

/// Environment prefix, e.g. `BIOAUTH_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "BIOAUTH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BioAuthConfig {
    pub prompt: PromptConfig,
    pub logging: LoggingConfig,
}

/// Texts shown by the platform authenticator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub title: String,
    pub subtitle: Option<String>,
    pub negative_button_text: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            subtitle: Some(DEFAULT_SUBTITLE.to_string()),
            negative_button_text: DEFAULT_NEGATIVE_BUTTON.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub include_timestamp: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            include_timestamp: true,
            include_target: true,
        }
    }
}

impl BioAuthConfig {
    /// Load configuration layered as defaults, then the TOML file, then `BIOAUTH_*` variables.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(config_override: Option<&Path>) -> BioAuthResult<Self> {
        let (path, required) = match config_override {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (Self::default_path(), false),
        };

        let mut builder = Config::builder();
        if let Some(path) = path.as_ref() {
            debug!("Loading configuration from: {}", path.display());
            builder = builder.add_source(File::from(path.as_path()).required(required));
        }

        let config: BioAuthConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// `<config dir>/bioauth/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bioauth").join("config.toml"))
    }

    /// Build the challenge request described by the prompt section.
    pub fn challenge_request(&self) -> BioAuthResult<ChallengeRequest> {
        let mut builder = ChallengeRequest::builder()
            .title(self.prompt.title.clone())
            .negative_button_text(self.prompt.negative_button_text.clone());
        if let Some(subtitle) = &self.prompt.subtitle {
            builder = builder.subtitle(subtitle.clone());
        }
        builder.build()
    }

    pub fn log_level(&self) -> BioAuthResult<tracing::Level> {
        self.logging.level.parse::<tracing::Level>().map_err(|_| {
            BioAuthError::ConfigurationError(format!(
                "invalid log level '{}'",
                self.logging.level
            ))
        })
    }
}
