//! PDP configuration, loaded from TOML.
//!
//! ```toml
//! enable_xpath = false
//! strict_attribute_issuer_match = false
//! max_variable_reference_depth = 32
//! rule_target_extended_indeterminate = false
//! standard_env_attributes = "request_else_pdp"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where current-time, current-date and current-dateTime come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardEnvAttributeSource {
    /// Use the request's value when present, otherwise the PDP clock.
    #[default]
    RequestElsePdp,
    /// Only the request (or an attribute provider) may supply them.
    RequestOnly,
    /// Always the PDP clock; request values are ignored.
    PdpOnly,
}

/// Engine-wide evaluation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdpConfig {
    /// Evaluate AttributeSelectors. When off, every selector evaluates to
    /// Indeterminate with a feature-disabled status.
    #[serde(default)]
    pub enable_xpath: bool,

    /// When true, a designator without an issuer only matches attributes
    /// that have no issuer either. When false it matches any issuer.
    #[serde(default)]
    pub strict_attribute_issuer_match: bool,

    /// Maximum nesting of VariableReference evaluation. None = unlimited
    /// (cycles are still detected).
    #[serde(default)]
    pub max_variable_reference_depth: Option<usize>,

    /// Rule Target evaluating to Indeterminate: false yields Indeterminate
    /// without extended status, true yields Indeterminate{P} or {D} by the
    /// rule's effect.
    #[serde(default)]
    pub rule_target_extended_indeterminate: bool,

    /// Source of current-time, current-date and current-dateTime. The PDP
    /// clock stamps them in UTC, and UTC is also the implicit timezone for
    /// any time, date or dateTime written without a zone, including the
    /// arguments of time-in-range.
    #[serde(default)]
    pub standard_env_attributes: StandardEnvAttributeSource,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            enable_xpath: false,
            strict_attribute_issuer_match: false,
            max_variable_reference_depth: None,
            rule_target_extended_indeterminate: false,
            standard_env_attributes: StandardEnvAttributeSource::default(),
        }
    }
}

impl PdpConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = PdpConfig::from_toml_str("").unwrap();
        assert_eq!(config, PdpConfig::default());
        assert_eq!(
            config.standard_env_attributes,
            StandardEnvAttributeSource::RequestElsePdp
        );
    }

    #[test]
    fn parses_every_key() {
        let config = PdpConfig::from_toml_str(
            r#"
            enable_xpath = true
            strict_attribute_issuer_match = true
            max_variable_reference_depth = 8
            rule_target_extended_indeterminate = true
            standard_env_attributes = "pdp_only"
            "#,
        )
        .unwrap();
        assert!(config.enable_xpath);
        assert!(config.strict_attribute_issuer_match);
        assert_eq!(config.max_variable_reference_depth, Some(8));
        assert!(config.rule_target_extended_indeterminate);
        assert_eq!(config.standard_env_attributes, StandardEnvAttributeSource::PdpOnly);
    }

    #[test]
    fn rejects_unknown_env_source() {
        let err = PdpConfig::from_toml_str(r#"standard_env_attributes = "sometimes""#);
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match PdpConfig::load(&path) {
            Err(ConfigError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
