//! Configuration access port trait.

/// Section/key lookups over the run configuration. Numeric getters fall
/// back to `default` when the key is missing or does not parse.
pub trait ConfigPort {
    /// Trimmed value, `None` when missing or blank.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// Comma separated values with blanks dropped. Empty when the key is missing.
    fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get_string(section, key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}
