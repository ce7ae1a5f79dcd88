//! Backend configuration.
//!
//! Configuration is a two-level mapping of section → key → string value,
//! read once at startup and immutable afterwards. Only the keys listed
//! below are interpreted.
//!
//! ```toml
//! [block_backend]
//! name = "filesystem"
//! block_dir = "/var/lib/blocks"
//! tmp_dir = "/var/lib/blocks-tmp"
//! ```

use crate::error::{ConfigError, ConfigResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Section holding the backend selection and non-S3 parameters.
pub const BLOCK_BACKEND_SECTION: &str = "block_backend";
/// Section holding cloud-object parameters.
pub const S3_SECTION: &str = "s3_config";

/// Selected backend variant.
pub const KEY_NAME: &str = "name";
/// Filesystem: primary block directory.
pub const KEY_BLOCK_DIR: &str = "block_dir";
/// Filesystem: staging directory.
pub const KEY_TMP_DIR: &str = "tmp_dir";
/// Distributed-object: cluster configuration reference.
pub const KEY_CLUSTER_CONFIG: &str = "cluster_config";
/// Distributed-object: pool name.
pub const KEY_POOL: &str = "pool";
/// Cloud-object: bucket name.
pub const KEY_BUCKET_NAME: &str = "bucket_name";
/// Cloud-object: access key ID.
pub const KEY_KEY_ID: &str = "key_id";
/// Cloud-object: secret access key.
pub const KEY_KEY: &str = "key";
/// Cloud-object: endpoint host (optional).
pub const KEY_HOST: &str = "host";
/// Cloud-object: `true`/`false` (optional).
pub const KEY_USE_HTTPS: &str = "use_https";

/// Parsed backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl BackendConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` in `section`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        self.set(section, key, value);
        self
    }

    /// Sets `key` in `section`, replacing any previous value.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Returns the value of `key` in `section`, if present.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Returns the value of a required parameter.
    ///
    /// # Errors
    ///
    /// Returns `MissingParameter` if the key is absent or blank.
    pub fn require(&self, section: &str, key: &str) -> ConfigResult<&str> {
        match self.get(section, key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::missing(section, key)),
        }
    }

    /// Returns an optional boolean parameter, or `default` if absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` unless the value is `true` or `false`.
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> ConfigResult<bool> {
        match self.get(section, key).map(str::trim) {
            None | Some("") => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("expected true or false, got {other:?}"),
            }),
        }
    }

    /// Returns the names of all sections.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Parses a TOML document whose tables are sections.
    ///
    /// String values are taken verbatim; booleans, integers and floats are
    /// rendered to strings.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML, top-level values outside a table,
    /// or nested tables and arrays.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let document: toml::Table = s
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::new();
        for (section, value) in document {
            let toml::Value::Table(table) = value else {
                return Err(ConfigError::Parse(format!(
                    "top-level key {section:?} must be a section table"
                )));
            };
            for (key, value) in table {
                let rendered = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Boolean(b) => b.to_string(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    _ => {
                        return Err(ConfigError::Parse(format!(
                            "[{section}] {key} must be a scalar value"
                        )))
                    }
                };
                config.set(&section, &key, rendered);
            }
        }
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, or `Parse` as for
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
