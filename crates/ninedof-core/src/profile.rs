//! Calibration profiles
//!
//! A profile is a list of named sections holding `key = value` text pairs,
//! one section per device. The host reads and writes profile files; this
//! module only holds the values and answers typed queries. Section and key
//! order is preserved, so merging values into a loaded profile only touches
//! the keys that changed.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::ConfigError;
use crate::sample::Scalar;

#[derive(Debug, Clone, PartialEq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }
}

/// Sectioned calibration values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    sections: Vec<Section>,
}

impl Profile {
    /// Empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile extended with `key = value` in `section`.
    pub fn with_entry(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        self.set(section, key, value);
        self
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }

    fn set_in(&mut self, section: usize, key: &str, value: String) {
        let entries = &mut self.sections[section].entries;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    /// Names of all sections, in insertion order
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.section(section).is_some()
    }

    /// Key/value pairs of `section`, in insertion order
    pub fn entries<'a>(&'a self, section: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.section(section)
            .into_iter()
            .flat_map(|s| s.entries.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw value of `key` in `section`
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Numeric value of `key` in `section`, `None` when the key is absent.
    pub fn get_number(&self, section: &str, key: &str) -> Result<Option<Scalar>, ConfigError> {
        let Some(value) = self.get(section, key) else {
            return Ok(None);
        };

        value
            .parse::<Scalar>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                section: section.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            })
    }

    /// Set `key` in `section`, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let index = self.section_index_or_insert(section);
        self.set_in(index, key, value.into());
    }

    /// Store a number so that parsing it back yields the same bits.
    pub fn set_number(&mut self, section: &str, key: &str, value: Scalar) {
        self.set(section, key, alloc::format!("{value}"));
    }

    /// Remove `key` from `section`, returning its previous value.
    pub fn remove(&mut self, section: &str, key: &str) -> Option<String> {
        let entries = &mut self.sections.iter_mut().find(|s| s.name == section)?.entries;
        let index = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(index).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stick() -> Profile {
        Profile::new()
            .with_entry("accelerometer", "x_factor", "0.0383")
            .with_entry("accelerometer", "x_offset", "-0.12")
            .with_entry("gyroscope", "x_offset", "3")
    }

    #[test]
    fn test_sections_and_values() {
        let profile = stick();

        assert_eq!(
            profile.sections().collect::<Vec<_>>(),
            vec!["accelerometer", "gyroscope"]
        );
        assert_eq!(profile.get("accelerometer", "x_factor"), Some("0.0383"));
        assert_eq!(profile.get_number("gyroscope", "x_offset").unwrap(), Some(3.0));
        assert_eq!(profile.get("gyroscope", "x_factor"), None);
        assert_eq!(profile.get("compass", "x_factor"), None);
    }

    #[test]
    fn test_entries_keep_order_and_overwrite_in_place() {
        let profile = stick().with_entry("accelerometer", "x_factor", "2");

        assert_eq!(
            profile.entries("accelerometer").collect::<Vec<_>>(),
            vec![("x_factor", "2"), ("x_offset", "-0.12")]
        );
        assert_eq!(profile.entries("compass").count(), 0);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let profile = Profile::new().with_entry("a", "x_factor", "fast");
        assert!(matches!(
            profile.get_number("a", "x_factor"),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_set_and_remove_leave_other_sections() {
        let mut profile = stick();

        profile.set_number("gyroscope", "y_offset", -0.1);
        profile.set("compass", "x_factor", "2");
        assert_eq!(profile.remove("accelerometer", "x_offset"), Some("-0.12".into()));
        assert_eq!(profile.remove("accelerometer", "x_offset"), None);

        assert_eq!(profile.get("accelerometer", "x_factor"), Some("0.0383"));
        assert_eq!(profile.get("gyroscope", "x_offset"), Some("3"));
        assert_eq!(profile.get_number("gyroscope", "y_offset").unwrap(), Some(-0.1));
        assert!(profile.has_section("compass"));
    }

    #[test]
    fn test_number_text_is_exact() {
        let mut profile = Profile::new();
        let value = 0.1f32 + 0.2f32;
        profile.set_number("a", "v_factor", value);

        let parsed = profile.get_number("a", "v_factor").unwrap().unwrap();
        assert_eq!(parsed.to_bits(), value.to_bits());
    }
}
