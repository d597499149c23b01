use crate::classifier::LogisticModel;
use crate::engine::DetectionEngine;
use crate::rules::{builtin_rules, RuleSet};
use crate::scoring::ScoringPolicy;
use crate::threat_intel::{ThreatSnapshot, DEFAULT_BRAND_DOMAINS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Engine configuration: scoring policy plus the external data sources
/// (rule file, blacklist feed, model artifact). Everything is optional;
/// the engine falls back to the built-in rule set, an empty snapshot, and
/// rule-only scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub scoring: ScoringPolicy,
    pub brand_domains: Vec<String>,
    pub rules_file: Option<String>,
    pub blacklist_file: Option<String>,
    pub model_file: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringPolicy::default(),
            brand_domains: DEFAULT_BRAND_DOMAINS.iter().map(|s| s.to_string()).collect(),
            rules_file: None,
            blacklist_file: None,
            model_file: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn generate_default(path: &str) -> anyhow::Result<()> {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Assemble a ready-to-use engine. A missing or unreadable model
    /// artifact degrades to rule-only scoring rather than failing startup;
    /// missing rule or blacklist files are configuration errors.
    pub fn build_engine(&self) -> anyhow::Result<DetectionEngine> {
        let rules = match &self.rules_file {
            Some(path) => RuleSet::load_from_file(path)?,
            None => builtin_rules(),
        };

        let snapshot = match &self.blacklist_file {
            Some(path) => ThreatSnapshot::load_from_file(path, 1, self.brand_domains.clone())?,
            None => ThreatSnapshot::from_records(1, Vec::new(), self.brand_domains.clone()),
        };

        let classifier = match &self.model_file {
            Some(path) => match LogisticModel::load_from_file(path) {
                Ok(model) => Some(Arc::new(model) as Arc<dyn crate::classifier::Classifier>),
                Err(e) => {
                    log::warn!("classifier disabled: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(DetectionEngine::new(
            snapshot,
            rules,
            classifier,
            self.scoring.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::PHISHING_DECISION_THRESHOLD;

    #[test]
    fn test_default_config_round_trip() {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.scoring.decision_threshold,
            PHISHING_DECISION_THRESHOLD
        );
        assert!(parsed.brand_domains.contains(&"paypal.com".to_string()));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("scoring:\n  decision_threshold: 60.0\n").unwrap();
        assert_eq!(config.scoring.decision_threshold, 60.0);
        assert_eq!(config.scoring.high_floor, 50.0);
        assert!(config.rules_file.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<EngineConfig, _> = serde_yaml::from_str("no_such_option: true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_build_engine_with_defaults() {
        let engine = EngineConfig::default().build_engine().unwrap();
        assert_eq!(engine.snapshot_version(), 1);
    }

    #[test]
    fn test_missing_rules_file_is_an_error() {
        let config = EngineConfig {
            rules_file: Some("/nonexistent/rules.yaml".to_string()),
            ..EngineConfig::default()
        };
        assert!(config.build_engine().is_err());
    }
}
