//! Output name assignment for generated artifacts.

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::config::DeploymentMode;

/// Extension of every generated artifact.
pub const ARTIFACT_EXTENSION: &str = "wav";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("No URL provided")]
    MissingUrl,
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("URL '{0}' has no hostname")]
    MissingHost(String),
}

/// Derive the artifact file name for `url` requested at `timestamp`.
///
/// - production: `{hostname}_{epochMillis}.wav`, unique per millisecond
/// - development: `{hostname}.wav`, so repeated runs against one host
///   overwrite the same file
pub fn assign_name(
    url: Option<&str>,
    timestamp: DateTime<Utc>,
    mode: DeploymentMode,
) -> Result<String, NamingError> {
    let raw = url.map(str::trim).filter(|u| !u.is_empty()).ok_or(NamingError::MissingUrl)?;
    let host = hostname(raw)?;

    let name = match mode {
        DeploymentMode::Production => {
            format!("{}_{}.{}", host, timestamp.timestamp_millis(), ARTIFACT_EXTENSION)
        }
        DeploymentMode::Development => format!("{}.{}", host, ARTIFACT_EXTENSION),
    };
    Ok(name)
}

fn hostname(raw: &str) -> Result<String, NamingError> {
    let parsed = Url::parse(raw).map_err(|e| NamingError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        // IPv6 hosts come back bracketed, which makes for an awkward file name
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').replace(':', "-"))
        .ok_or_else(|| NamingError::MissingHost(raw.to_string()))
}
