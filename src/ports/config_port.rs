//! Configuration access port.

use crate::domain::error::TradecoreError;

/// Typed lookups return `Ok(None)` for an absent key and
/// [`TradecoreError::ConfigInvalid`] for a present key that does not parse.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, TradecoreError>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, TradecoreError>;

    /// Comma-separated value split into trimmed, non-empty entries.
    fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_string(section, key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}
