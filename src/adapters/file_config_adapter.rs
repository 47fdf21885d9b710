//! INI file configuration adapter.
//!
//! Section and key names are case-insensitive; values keep their case.

use crate::domain::error::TradecoreError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TradecoreError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TradecoreError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

fn invalid_value(section: &str, key: &str, reason: String) -> TradecoreError {
    TradecoreError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, TradecoreError> {
        self.config
            .getint(section, key)
            .map_err(|reason| invalid_value(section, key, reason))
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, TradecoreError> {
        self.config
            .getfloat(section, key)
            .map_err(|reason| invalid_value(section, key, reason))
    }
}
