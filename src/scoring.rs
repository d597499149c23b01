use serde::{Deserialize, Serialize};

/// Signal source names used by the built-in stages. Rule signals use the
/// rule's own name as source.
pub const SOURCE_THREAT_INTEL: &str = "threat_intel";
pub const SOURCE_TYPOSQUAT: &str = "typosquat";
pub const SOURCE_ML: &str = "ml_classifier";

// Default scoring policy. These are operator-tunable via ScoringPolicy; the
// constants exist so tests and docs can reference the defaults by name.
pub const RULE_COMPONENT_WEIGHT: f64 = 0.5;
pub const ML_COMPONENT_WEIGHT: f64 = 0.5;
pub const MEDIUM_RISK_FLOOR: f64 = 25.0;
pub const HIGH_RISK_FLOOR: f64 = 50.0;
pub const CRITICAL_RISK_FLOOR: f64 = 75.0;
pub const PHISHING_DECISION_THRESHOLD: f64 = 50.0;

/// One piece of evidence contributing to the verdict.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSignal {
    pub source: String,
    pub weight: f64,
    pub description: String,
}

impl DetectionSignal {
    pub fn new(source: impl Into<String>, weight: f64, description: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            weight,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable scoring policy: component blend and risk thresholds. Risk floors
/// are inclusive lower bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub rule_weight: f64,
    pub ml_weight: f64,
    pub medium_floor: f64,
    pub high_floor: f64,
    pub critical_floor: f64,
    pub decision_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            rule_weight: RULE_COMPONENT_WEIGHT,
            ml_weight: ML_COMPONENT_WEIGHT,
            medium_floor: MEDIUM_RISK_FLOOR,
            high_floor: HIGH_RISK_FLOOR,
            critical_floor: CRITICAL_RISK_FLOOR,
            decision_threshold: PHISHING_DECISION_THRESHOLD,
        }
    }
}

impl ScoringPolicy {
    pub fn risk_level(&self, score: f64) -> RiskLevel {
        if score >= self.critical_floor {
            RiskLevel::Critical
        } else if score >= self.high_floor {
            RiskLevel::High
        } else if score >= self.medium_floor {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Confidence percentage per risk band. Keyed off the same floors as
    /// `risk_level` so retuned thresholds keep the bands aligned.
    pub fn confidence_for(&self, score: f64) -> u8 {
        if score >= self.critical_floor {
            95
        } else if score >= self.high_floor {
            85
        } else if score >= self.medium_floor {
            70
        } else {
            60
        }
    }
}

/// Scoring outcome before the orchestrator assembles the final result.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub threat_score: f64,
    pub rule_component: f64,
    pub ml_component: Option<f64>,
    pub risk_level: RiskLevel,
    pub is_phishing: bool,
    pub degraded: bool,
    pub confidence: u8,
}

pub struct ScoreAggregator {
    policy: ScoringPolicy,
}

impl ScoreAggregator {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Combine rule/lookup signals and an optional classifier probability
    /// into the final score. Without a probability the result is the rule
    /// component alone, flagged as degraded confidence.
    pub fn aggregate(
        &self,
        signals: &[DetectionSignal],
        ml_probability: Option<f64>,
    ) -> ScoreBreakdown {
        let raw_sum: f64 = signals
            .iter()
            .filter(|s| s.source != SOURCE_ML)
            .map(|s| s.weight)
            .sum();
        let rule_component = raw_sum.clamp(0.0, 100.0);

        let (threat_score, ml_component, degraded) = match ml_probability {
            Some(p) => {
                let ml = (p.clamp(0.0, 1.0)) * 100.0;
                let blended =
                    self.policy.rule_weight * rule_component + self.policy.ml_weight * ml;
                (blended.clamp(0.0, 100.0), Some(ml), false)
            }
            None => (rule_component, None, true),
        };

        let risk_level = self.policy.risk_level(threat_score);

        ScoreBreakdown {
            threat_score,
            rule_component,
            ml_component,
            risk_level,
            is_phishing: threat_score >= self.policy.decision_threshold,
            degraded,
            confidence: self.policy.confidence_for(threat_score),
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}
