// Run configuration. Loaded from a JSON file, validated here; the core
// only ever sees already-validated payloads.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::rules::RuleRegistry;
use crate::domain::version::TargetVersion;
use crate::rules::{
    ClassRename, MethodCallToPropertyRule, MethodToPropertyMapping, RemoveUnusedLoopKeyRule,
    RenameClassRule, SimplifyIfElseSameContentRule,
};

pub const RULE_METHOD_CALL_TO_PROPERTY: &str = "method_call_to_property";
pub const RULE_SIMPLIFY_IF_ELSE: &str = "simplify_if_else_same_content";
pub const RULE_REMOVE_UNUSED_LOOP_KEY: &str = "remove_unused_loop_key";
pub const RULE_RENAME_CLASS: &str = "rename_class";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Files or directories to process.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Enabled rule names, in dispatch order.
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub method_to_property: Vec<MethodToPropertyMapping>,
    #[serde(default)]
    pub class_renames: Vec<ClassRename>,
    /// Target language version, dotted or raw (e.g. "1.70" or "10700").
    #[serde(default)]
    pub target_version: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// e.g. "512M"; forwarded to workers and applied at their startup.
    #[serde(default)]
    pub memory_limit: Option<String>,
    /// Echo each file path before processing it.
    #[serde(default)]
    pub debug: bool,
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: Configuration = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn target_version(&self) -> Result<TargetVersion> {
        match &self.target_version {
            Some(text) => text
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}", e)),
            None => Ok(TargetVersion::LATEST),
        }
    }

    /// Builds the run's rule registry. Rule configuration is validated
    /// here, once; dispatch never re-checks it.
    pub fn build_registry(&self) -> Result<RuleRegistry> {
        let mut registry = RuleRegistry::new(self.target_version()?);
        for name in &self.rules {
            match name.as_str() {
                RULE_METHOD_CALL_TO_PROPERTY => {
                    let rule = MethodCallToPropertyRule::new(self.method_to_property.clone())?;
                    registry.register(Box::new(rule));
                }
                RULE_SIMPLIFY_IF_ELSE => {
                    registry.register(Box::new(SimplifyIfElseSameContentRule));
                }
                RULE_REMOVE_UNUSED_LOOP_KEY => {
                    registry.register(Box::new(RemoveUnusedLoopKeyRule));
                }
                RULE_RENAME_CLASS => {
                    let rule = RenameClassRule::new(self.class_renames.clone())?;
                    registry.register(Box::new(rule));
                }
                unknown => bail!("unknown rule: {}", unknown),
            }
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_built_in_listed_order() {
        let config = Configuration {
            rules: vec![
                RULE_SIMPLIFY_IF_ELSE.to_string(),
                RULE_REMOVE_UNUSED_LOOP_KEY.to_string(),
            ],
            ..Configuration::default()
        };
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.rules()[0].name(), RULE_SIMPLIFY_IF_ELSE);
        assert_eq!(registry.rules()[1].name(), RULE_REMOVE_UNUSED_LOOP_KEY);
    }

    #[test]
    fn test_unknown_rule_is_rejected() {
        let config = Configuration {
            rules: vec!["definitely_not_a_rule".to_string()],
            ..Configuration::default()
        };
        assert!(config.build_registry().is_err());
    }

    #[test]
    fn test_configured_rule_without_payload_is_rejected() {
        let config = Configuration {
            rules: vec![RULE_METHOD_CALL_TO_PROPERTY.to_string()],
            ..Configuration::default()
        };
        // No mappings configured: validation fails at registry build.
        assert!(config.build_registry().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let json = r#"{
            "paths": ["src"],
            "rules": ["rename_class"],
            "class_renames": [{"old": "a::Old", "new": "b::New"}],
            "target_version": "1.70",
            "workers": 4,
            "batch_size": 8,
            "memory_limit": "512M",
            "debug": true
        }"#;
        let config: Configuration = serde_json::from_str(json).unwrap();
        assert_eq!(config.paths, vec!["src"]);
        assert!(config.debug);
        assert_eq!(config.batch_size, Some(8));
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 1);
    }
}
