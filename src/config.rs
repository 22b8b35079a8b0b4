//! # Configuration Management
//!
//! This module loads application configuration from multiple sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP__ prefix)
//! - Bare deployment variables (HOST, PORT, LIMIT, ENVIRONMENT, ...)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Bare deployment variables (`LIMIT=300`, `ENVIRONMENT=PRODUCTION`, ...)
//! 2. Prefixed environment variables (`APP__SONIFICATION__LIMIT=300`)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::sonification::variant::ScriptVariant;

/// Value of `ENVIRONMENT` that switches on production behaviour.
pub const PRODUCTION_MARKER: &str = "PRODUCTION";

/// Bare environment variables and the config keys they override.
const DEPLOYMENT_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("LIMIT", "sonification.limit"),
    ("ENVIRONMENT", "sonification.environment"),
    ("PYTHON_PATH", "sonification.python_path"),
    ("AUDIO_DIR", "sonification.audio_dir"),
    ("SCRIPTS_DIR", "sonification.scripts_dir"),
];

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sonification: SonificationConfig,
    pub retention: RetentionConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings for the fetch → slice → render pipeline.
///
/// ## Fields:
/// - `limit`: size of the slice window forwarded to the renderer (characters)
/// - `environment`: deployment flag; `"PRODUCTION"` enables unique artifact
///   names and retention sweeping
/// - `python_path`: interpreter used to run the rendering scripts
/// - `scripts_dir` / `script_extension`: where `{variant}.{ext}` scripts live
/// - `default_variant`: script used when a request names none
/// - `audio_dir`: where generated artifacts are written and served from
/// - `scratch_dir`: where per-request slice files are staged
/// - `project_root`: working directory of the rendering subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SonificationConfig {
    pub limit: usize,
    pub environment: String,
    pub python_path: String,
    pub scripts_dir: PathBuf,
    pub script_extension: String,
    pub default_variant: String,
    pub audio_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub project_root: PathBuf,
    pub render_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

/// How long generated artifacts are kept before the sweeper removes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub max_age_hours: u64,
}

/// Deployment mode derived from the `environment` flag.
///
/// Only the exact string `"PRODUCTION"` selects production; every other value
/// (including an empty one) is treated as development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    Development,
}

impl DeploymentMode {
    pub fn from_flag(flag: &str) -> Self {
        if flag == PRODUCTION_MARKER {
            DeploymentMode::Production
        } else {
            DeploymentMode::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::Production => "production",
            DeploymentMode::Development => "development",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            sonification: SonificationConfig {
                limit: 300,
                environment: "DEVELOPMENT".to_string(),
                python_path: "python3".to_string(),
                scripts_dir: PathBuf::from("scripts"),
                script_extension: "py".to_string(),
                default_variant: "html_to_sound".to_string(),
                audio_dir: PathBuf::from("audios"),
                scratch_dir: PathBuf::from("tmp"),
                project_root: PathBuf::from("."),
                render_timeout_secs: 120,
                fetch_timeout_secs: 30,
            },
            retention: RetentionConfig { max_age_hours: 24 },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP__SERVER__PORT=8080`: Override server port
    /// - `APP__SONIFICATION__RENDER_TIMEOUT_SECS=60`: Override render timeout
    /// - `LIMIT=500`: Slice window size
    /// - `ENVIRONMENT=PRODUCTION`: Enable unique naming and retention sweeps
    /// - `PYTHON_PATH=/opt/venv/bin/python`: Rendering interpreter
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // Double underscore keeps snake_case keys such as audio_dir intact
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        for (var, key) in DEPLOYMENT_OVERRIDES {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(*key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.sonification.limit == 0 {
            return Err(anyhow::anyhow!("LIMIT must be greater than 0"));
        }

        if self.sonification.python_path.trim().is_empty() {
            return Err(anyhow::anyhow!("Interpreter path cannot be empty"));
        }

        if self.sonification.render_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Render timeout must be greater than 0"));
        }

        if self.sonification.fetch_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Fetch timeout must be greater than 0"));
        }

        if self.retention.max_age_hours == 0 {
            return Err(anyhow::anyhow!("Retention window must be greater than 0"));
        }

        ScriptVariant::parse(&self.sonification.default_variant)
            .map_err(|e| anyhow::anyhow!("Invalid default variant: {}", e))?;

        Ok(())
    }
}

impl SonificationConfig {
    pub fn mode(&self) -> DeploymentMode {
        DeploymentMode::from_flag(&self.environment)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 60 * 60)
    }
}
