//! INI configuration adapter.
//!
//! Section and key names are case-insensitive. Parse failures carry the
//! source name so the CLI can point at the offending file.

use configparser::ini::Ini;
use std::path::Path;
use std::str::FromStr;

use crate::domain::error::FxsimError;
use crate::ports::config_port::ConfigPort;

const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
    source: String,
}

impl FileConfigAdapter {
    pub fn from_file(path: &Path) -> Result<Self, FxsimError> {
        let source = path.display().to_string();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| FxsimError::ConfigParse {
            file: source.clone(),
            reason,
        })?;
        Ok(Self { config, source })
    }

    pub fn from_string(content: &str) -> Result<Self, FxsimError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| FxsimError::ConfigParse {
                file: INLINE_SOURCE.to_string(),
                reason,
            })?;
        Ok(Self {
            config,
            source: INLINE_SOURCE.to_string(),
        })
    }

    /// File path the configuration was read from, or `<inline>`.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.get_string(section, key)?.parse().ok()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.parsed(section, key).unwrap_or(default)
    }
}
