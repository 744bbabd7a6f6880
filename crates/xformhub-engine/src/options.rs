//! Registry configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) yields
//! the stock behavior:
//!
//! ```toml
//! identifier_limit = 64
//! table_prefix = "x_"
//! populate_mode = "lenient"
//! extra_fields = "warn"
//! required_meta_fields = ["deviceid", "timestart", "timeend", "username", "chw_id", "uid"]
//! ```

#![allow(clippy::result_large_err)]

use std::path::Path;

use serde::Deserialize;
use xformhub_core::errors::{ExError, ExErrorKind};
use xformhub_core::sanitize::{DEFAULT_IDENTIFIER_LIMIT, DEFAULT_TABLE_PREFIX};
use xformhub_core::validation::{FormCheckOptions, DEFAULT_META_FIELDS};
use xformhub_core::{ExtraFieldPolicy, IdentifierSanitizer};
use xformhub_store::errors::{io_error, Result};
use xformhub_store::{PopulateMode, PopulateOptions};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryOptions {
    /// Maximum length of generated table and column names
    pub identifier_limit: usize,
    pub table_prefix: String,
    pub populate_mode: PopulateMode,
    pub extra_fields: ExtraFieldPolicy,
    /// Fields expected in every form's meta block
    pub required_meta_fields: Vec<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            identifier_limit: DEFAULT_IDENTIFIER_LIMIT,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            populate_mode: PopulateMode::default(),
            extra_fields: ExtraFieldPolicy::default(),
            required_meta_fields: DEFAULT_META_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl RegistryOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("load_options")
                .with_message(format!("invalid registry options: {}", e))
        })
    }

    /// Read options from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| io_error("load_options", e))?;
        Self::from_toml_str(&text)
    }

    pub fn sanitizer(&self) -> Result<IdentifierSanitizer> {
        IdentifierSanitizer::new(self.identifier_limit, self.table_prefix.clone())
            .map_err(ExError::from)
    }

    pub fn populate_options(&self) -> PopulateOptions {
        PopulateOptions {
            mode: self.populate_mode,
            extra_fields: self.extra_fields,
            meta_fields: self.required_meta_fields.clone(),
        }
    }

    pub fn form_check_options(&self) -> FormCheckOptions {
        FormCheckOptions {
            required_meta_fields: self.required_meta_fields.clone(),
            extra_fields: self.extra_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let options = RegistryOptions::from_toml_str("").unwrap();
        assert_eq!(options, RegistryOptions::default());
        assert_eq!(options.identifier_limit, 64);
        assert_eq!(options.populate_mode, PopulateMode::Lenient);
        assert_eq!(options.extra_fields, ExtraFieldPolicy::Warn);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let options = RegistryOptions::from_toml_str(
            "populate_mode = \"strict\"\nextra_fields = \"reject\"\nidentifier_limit = 30\n",
        )
        .unwrap();
        assert_eq!(options.populate_mode, PopulateMode::Strict);
        assert_eq!(options.extra_fields, ExtraFieldPolicy::Reject);
        assert_eq!(options.identifier_limit, 30);
        assert_eq!(options.table_prefix, "x_");
    }

    #[test]
    fn test_unknown_key_is_invalid_input() {
        let err = RegistryOptions::from_toml_str("identifer_limit = 30").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_INPUT");
    }

    #[test]
    fn test_bad_limit_fails_when_building_sanitizer() {
        let options = RegistryOptions {
            identifier_limit: 2,
            ..RegistryOptions::default()
        };
        assert_eq!(options.sanitizer().unwrap_err().code(), "ERR_INVALID_INPUT");
    }

    #[test]
    fn test_meta_fields_reach_populate_options() {
        let options =
            RegistryOptions::from_toml_str("required_meta_fields = [\"deviceid\", \"uid\"]\n").unwrap();
        assert_eq!(options.populate_options().meta_fields, vec!["deviceid", "uid"]);
    }
}
