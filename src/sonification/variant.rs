//! Script variant and preset names.
//!
//! Both end up on the rendering subprocess command line, and the variant also
//! becomes part of a filesystem path, so only a conservative character set is
//! accepted.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariantError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },
    #[error("{kind} '{value}' may only contain letters, digits, '_' or '-'")]
    InvalidCharacters { kind: &'static str, value: String },
}

/// Name of the rendering script to run, e.g. `html_to_sound_trigrams`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptVariant(String);

/// Optional style argument forwarded to the script, e.g. `lofi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPreset(String);

impl ScriptVariant {
    pub fn parse(raw: &str) -> Result<Self, VariantError> {
        validate_token("script variant", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RenderPreset {
    pub fn parse(raw: &str) -> Result<Self, VariantError> {
        validate_token("preset", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RenderPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_token(kind: &'static str, raw: &str) -> Result<String, VariantError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VariantError::Empty { kind });
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    if !trimmed.chars().all(allowed) {
        return Err(VariantError::InvalidCharacters {
            kind,
            value: trimmed.to_string(),
        });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_script_names() {
        let variant = ScriptVariant::parse("html_to_sound_trigrams").unwrap();
        assert_eq!(variant.as_str(), "html_to_sound_trigrams");
        assert_eq!(ScriptVariant::parse(" didgeridoo ").unwrap().as_str(), "didgeridoo");
        assert_eq!(RenderPreset::parse("lo-fi").unwrap().as_str(), "lo-fi");
    }

    #[test]
    fn rejects_paths_and_shell_characters() {
        for raw in ["../secrets", "a/b", "a b", "x;rm", "café"] {
            assert!(
                matches!(
                    ScriptVariant::parse(raw),
                    Err(VariantError::InvalidCharacters { .. })
                ),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn rejects_blank_names() {
        assert_eq!(
            RenderPreset::parse("   "),
            Err(VariantError::Empty { kind: "preset" })
        );
    }
}
