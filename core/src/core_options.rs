//! Core option manager
//!
//! Created from the schema a core declares with `SET_VARIABLES` or
//! `SET_CORE_OPTIONS*`, queried through `GET_VARIABLE`, and persisted per core
//! as a flat TOML table of `key = "value"`.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::config::{self, ConfigError};
use crate::plugin::env::{CoreOptionCategory, CoreOptionDefinition, OptionValue};

/// One option with its selectable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreOption {
    pub key: String,
    pub desc: String,
    pub info: Option<String>,
    pub category: Option<String>,
    pub values: Vec<OptionValue>,
    pub default_index: usize,
    pub index: usize,
    pub visible: bool,
}

impl CoreOption {
    pub fn value(&self) -> &str {
        self.values
            .get(self.index)
            .map(|v| v.value.as_str())
            .unwrap_or_default()
    }

    fn position(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v.value == value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoreOptionManager {
    options: Vec<CoreOption>,
    by_key: HashMap<String, usize>,
    categories: Vec<CoreOptionCategory>,
    /// Options API version the core declared with.
    version: u32,
    /// Latched on any value change, cleared by [`Self::take_updated`].
    updated: bool,
}

impl CoreOptionManager {
    /// Build from a `SET_CORE_OPTIONS*` schema. Definitions without values are
    /// skipped.
    pub fn from_definitions(
        version: u32,
        definitions: Vec<CoreOptionDefinition>,
        categories: Vec<CoreOptionCategory>,
    ) -> Self {
        let mut manager = Self {
            version,
            categories,
            ..Self::default()
        };
        for def in definitions {
            if def.values.is_empty() {
                tracing::warn!(key = %def.key, "Core option has no values; ignored");
                continue;
            }
            let default_index = def
                .default_value
                .as_deref()
                .and_then(|d| def.values.iter().position(|v| v.value == d))
                .unwrap_or(0);
            manager.insert(CoreOption {
                key: def.key,
                desc: def.desc,
                info: def.info,
                category: def.category,
                values: def.values,
                default_index,
                index: default_index,
                visible: true,
            });
        }
        manager
    }

    /// Build from legacy `key = "Description; a|b|c"` variables. The first
    /// value is the default.
    pub fn from_variables(variables: Vec<(String, String)>) -> Self {
        let definitions = variables
            .into_iter()
            .filter_map(|(key, spec)| {
                let (desc, values) = spec.split_once("; ")?;
                Some(CoreOptionDefinition {
                    key,
                    desc: desc.to_string(),
                    info: None,
                    category: None,
                    values: values
                        .split('|')
                        .map(|v| OptionValue {
                            value: v.to_string(),
                            label: None,
                        })
                        .collect(),
                    default_value: None,
                })
            })
            .collect();
        Self::from_definitions(0, definitions, Vec::new())
    }

    fn insert(&mut self, option: CoreOption) {
        if let Some(&idx) = self.by_key.get(&option.key) {
            self.options[idx] = option;
        } else {
            self.by_key.insert(option.key.clone(), self.options.len());
            self.options.push(option);
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn options(&self) -> &[CoreOption] {
        &self.options
    }

    pub fn categories(&self) -> &[CoreOptionCategory] {
        &self.categories
    }

    pub fn option(&self, key: &str) -> Option<&CoreOption> {
        self.by_key.get(key).map(|&idx| &self.options[idx])
    }

    fn option_mut(&mut self, key: &str) -> Option<&mut CoreOption> {
        let idx = *self.by_key.get(key)?;
        Some(&mut self.options[idx])
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.option(key).map(CoreOption::value)
    }

    /// Whether any value changed since the last call; clears the flag.
    pub fn take_updated(&mut self) -> bool {
        std::mem::take(&mut self.updated)
    }

    pub fn set_visible(&mut self, key: &str, visible: bool) -> bool {
        match self.option_mut(key) {
            Some(option) => {
                option.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Select `value` for `key`; false if either is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let Some(option) = self.option_mut(key) else {
            return false;
        };
        let Some(index) = option.position(value) else {
            return false;
        };
        if option.index != index {
            option.index = index;
            self.updated = true;
        }
        true
    }

    /// Advance to the next value, wrapping.
    pub fn next(&mut self, key: &str) -> bool {
        self.step(key, 1)
    }

    /// Go back to the previous value, wrapping.
    pub fn prev(&mut self, key: &str) -> bool {
        self.step(key, -1)
    }

    fn step(&mut self, key: &str, delta: isize) -> bool {
        let Some(option) = self.option_mut(key) else {
            return false;
        };
        let count = option.values.len() as isize;
        option.index = (option.index as isize + delta).rem_euclid(count) as usize;
        self.updated = true;
        true
    }

    /// Restore every option to its default.
    pub fn reset(&mut self) {
        for option in &mut self.options {
            option.index = option.default_index;
        }
        self.updated = true;
    }

    /// Apply values saved at `path`. Unknown keys and values are ignored.
    pub fn load_values(&mut self, path: &Path) -> Result<(), ConfigError> {
        let Some(table) = config::read_table(path)? else {
            return Ok(());
        };
        for (key, value) in table {
            let Some(value) = value.as_str() else {
                continue;
            };
            if !self.set(&key, value) {
                tracing::debug!(%key, value, "Ignoring stale core option value");
            }
        }
        Ok(())
    }

    /// Write current values to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut table = toml::Table::new();
        for option in &self.options {
            table.insert(
                option.key.clone(),
                toml::Value::String(option.value().to_string()),
            );
        }
        config::write_table(path, &table)
    }
}

/// Per-core options file, `{dir}/{library_name}.toml`.
pub fn options_path(dir: &Path, library_name: &str) -> PathBuf {
    dir.join(format!("{}.toml", sanitize_file_name(library_name)))
}

/// Replace characters that are awkward in file names.
pub(crate) fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: &str) -> OptionValue {
        OptionValue {
            value: v.to_string(),
            label: None,
        }
    }

    fn sample() -> CoreOptionManager {
        CoreOptionManager::from_definitions(
            2,
            vec![
                CoreOptionDefinition {
                    key: "region".to_string(),
                    desc: "Region".to_string(),
                    info: None,
                    category: Some("system".to_string()),
                    values: vec![value("auto"), value("ntsc"), value("pal")],
                    default_value: Some("ntsc".to_string()),
                },
                CoreOptionDefinition {
                    key: "empty".to_string(),
                    desc: "No values".to_string(),
                    info: None,
                    category: None,
                    values: Vec::new(),
                    default_value: None,
                },
            ],
            vec![CoreOptionCategory {
                key: "system".to_string(),
                desc: "System".to_string(),
                info: None,
            }],
        )
    }

    #[test]
    fn test_default_value_selected() {
        let manager = sample();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get("region"), Some("ntsc"));
        assert_eq!(manager.version(), 2);
        assert_eq!(manager.categories().len(), 1);
    }

    #[test]
    fn test_legacy_variables() {
        let manager = CoreOptionManager::from_variables(vec![
            ("speed".to_string(), "Speed; slow|fast".to_string()),
            ("broken".to_string(), "no separator".to_string()),
        ]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get("speed"), Some("slow"));
        assert_eq!(manager.option("speed").unwrap().desc, "Speed");
    }

    #[test]
    fn test_next_prev_wrap() {
        let mut manager = sample();
        assert!(manager.next("region"));
        assert_eq!(manager.get("region"), Some("pal"));
        assert!(manager.next("region"));
        assert_eq!(manager.get("region"), Some("auto"));
        assert!(manager.prev("region"));
        assert_eq!(manager.get("region"), Some("pal"));
        assert!(!manager.next("missing"));
    }

    #[test]
    fn test_updated_flag_latches() {
        let mut manager = sample();
        assert!(!manager.take_updated());
        assert!(manager.set("region", "pal"));
        assert!(manager.take_updated());
        assert!(!manager.take_updated());
        assert!(!manager.set("region", "secam"));
        assert!(!manager.take_updated());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut manager = sample();
        manager.set("region", "auto");
        manager.reset();
        assert_eq!(manager.get("region"), Some("ntsc"));
    }

    #[test]
    fn test_visibility() {
        let mut manager = sample();
        assert!(manager.set_visible("region", false));
        assert!(!manager.option("region").unwrap().visible);
        assert!(!manager.set_visible("missing", false));
    }

    #[test]
    fn test_save_and_load_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = options_path(dir.path(), "Test/Core");
        assert_eq!(path.file_name().unwrap(), "Test_Core.toml");

        let mut manager = sample();
        manager.set("region", "pal");
        manager.save(&path).unwrap();

        let mut reloaded = sample();
        reloaded.load_values(&path).unwrap();
        assert_eq!(reloaded.get("region"), Some("pal"));
    }
}
