//! Ordered key/value telemetry rebuilt every tick.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchList {
    entries: Vec<(String, String)>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`. Re-adding a key keeps its original position.
    pub fn add(&mut self, name: &str, value: impl fmt::Display) {
        let value = value.to_string();
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for WatchList {
    /// `key=value` pairs separated by single spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
