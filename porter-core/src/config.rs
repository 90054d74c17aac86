//! Configuration for the porter middle-end
//!
//! Selects the target backend, the traversal depth bound, and per-target splice tables

use miette::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PassError, PassResult};
use crate::native::{BUILTIN_TARGETS, RemapTable};
use crate::visit::DEFAULT_MAX_DEPTH;

pub type ConfigError = Report;

fn config_msg(message: impl Into<String>) -> ConfigError {
    Report::msg(message.into())
}

/// One splice template, keyed by where the fragment was written
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpliceEntry {
    pub file: String,
    pub line: u32,
    pub template: String,
}

/// Settings for one target backend
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Language name written into rewritten native nodes (defaults to the target name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    /// Extra or overriding splice templates
    #[serde(default)]
    pub splices: Vec<SpliceEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PorterConfig {
    /// Default target backend
    #[serde(default = "default_target")]
    pub target: String,

    /// Maximum traversal depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Per-target settings
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

fn default_target() -> String {
    "java".to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for PorterConfig {
    fn default() -> Self {
        PorterConfig {
            target: default_target(),
            max_depth: default_max_depth(),
            targets: BTreeMap::new(),
        }
    }
}

impl PorterConfig {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_msg(format!("Failed to read config {}: {}", path.display(), e)))?;

        Self::from_str(&content)
    }

    /// Save configuration to file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| config_msg(format!("Failed to create config directory: {}", e)))?;
        }

        let content = self.to_string()?;
        std::fs::write(path, content)
            .map_err(|e| config_msg(format!("Failed to write config: {}", e)))
    }

    /// Parse TOML from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: PorterConfig =
            toml::from_str(content).map_err(|e| config_msg(format!("Invalid TOML: {}", e)))?;
        if config.max_depth == 0 {
            return Err(config_msg("max_depth must be at least 1"));
        }
        Ok(config)
    }

    /// Serialize to TOML string
    #[allow(clippy::inherent_to_string_shadow_display)]
    pub fn to_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| config_msg(format!("Failed to serialize: {}", e)))
    }

    /// Targets with a remap table, built in or configured
    pub fn target_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_TARGETS.iter().map(|t| t.to_string()).collect();
        for name in self.targets.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// The splice table for `target`: the built-in table, if any, extended and overridden by
    /// configured entries
    pub fn remap_table(&self, target: &str) -> PassResult<RemapTable> {
        let configured = self.targets.get(target);
        let mut table = match (RemapTable::builtin(target), configured) {
            (Some(table), _) => table,
            (None, Some(_)) => RemapTable::new(target, target),
            (None, None) => {
                return Err(PassError::UnknownTarget {
                    target: target.to_string(),
                });
            }
        };
        if let Some(cfg) = configured {
            if let Some(lang) = &cfg.lang {
                table.set_lang(lang.clone());
            }
            for entry in &cfg.splices {
                table.insert(entry.file.clone(), entry.line, entry.template.clone());
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PorterConfig::default();
        assert_eq!(config.target, "java");
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = PorterConfig::from_str("").unwrap();
        assert_eq!(config, PorterConfig::default());
    }

    #[test]
    fn test_configured_splices_override_builtin() {
        let config = PorterConfig::from_str(
            r#"
target = "java"

[targets.java]

[[targets.java.splices]]
file = "collections.ivy"
line = 923
template = "LinkedHashSet<`0`>"

[[targets.java.splices]]
file = "queue.ivy"
line = 12
template = "`0`.poll()"
"#,
        )
        .unwrap();
        let table = config.remap_table("java").unwrap();
        assert_eq!(table.get("collections.ivy", 923), Some("LinkedHashSet<`0`>"));
        assert_eq!(table.get("queue.ivy", 12), Some("`0`.poll()"));
        assert_eq!(table.get("collections.ivy", 939), Some("`0`.add(`1`)"));
    }

    #[test]
    fn test_configured_target_without_builtin() {
        let config = PorterConfig::from_str(
            r#"
[targets.scala]
lang = "scala"
splices = [{ file = "collections.ivy", line = 939, template = "`0` += `1`" }]
"#,
        )
        .unwrap();
        let table = config.remap_table("scala").unwrap();
        assert_eq!(table.lang(), "scala");
        assert_eq!(table.len(), 1);
        assert_eq!(config.target_names(), vec!["java", "scala"]);
    }

    #[test]
    fn test_unknown_target() {
        let config = PorterConfig::default();
        assert_eq!(
            config.remap_table("rust").unwrap_err(),
            PassError::UnknownTarget {
                target: "rust".into()
            }
        );
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(PorterConfig::from_str("max_depth = 0").is_err());
    }
}
