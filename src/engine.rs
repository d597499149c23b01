use crate::classifier::Classifier;
use crate::error::ScanError;
use crate::language::Language;
use crate::normalization::{ContentKind, ContentNormalizer, NormalizedContent};
use crate::rules::RuleSet;
use crate::scoring::{DetectionSignal, RiskLevel, ScoreAggregator, ScoringPolicy, SOURCE_ML};
use crate::threat_intel::{self, ThreatSnapshot};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// URLs embedded in text/SMS run through the URL rules; their averaged
/// weight is folded in at half strength since the link is secondhand
/// evidence about the message.
pub const EMBEDDED_URL_DAMPING: f64 = 0.5;
const MAX_EMBEDDED_URLS: usize = 5;

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub content: String,
    pub kind: ContentKind,
    pub language: Option<Language>,
}

impl ScanRequest {
    pub fn new(content: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            content: content.into(),
            kind,
            language: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }
}

/// The engine's sole output. Persistence, user association, and
/// timestamping belong to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub content_kind: ContentKind,
    pub threat_score: f64,
    pub risk_level: RiskLevel,
    pub is_phishing: bool,
    pub confidence: u8,
    pub degraded: bool,
    pub signals: Vec<DetectionSignal>,
}

/// Public entry point: sequences normalize -> {intel, rules, classifier}
/// -> aggregate. Stateless per call; the snapshot and rule set are swapped
/// wholesale on reload so in-flight scans always see one consistent
/// version.
pub struct DetectionEngine {
    normalizer: ContentNormalizer,
    aggregator: ScoreAggregator,
    snapshot: RwLock<Arc<ThreatSnapshot>>,
    rules: RwLock<Arc<RuleSet>>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl DetectionEngine {
    pub fn new(
        snapshot: ThreatSnapshot,
        rules: RuleSet,
        classifier: Option<Arc<dyn Classifier>>,
        policy: ScoringPolicy,
    ) -> Self {
        if classifier.is_none() {
            log::warn!("no classifier loaded; scans will run rule-only with degraded confidence");
        }
        Self {
            normalizer: ContentNormalizer::new(),
            aggregator: ScoreAggregator::new(policy),
            snapshot: RwLock::new(Arc::new(snapshot)),
            rules: RwLock::new(Arc::new(rules)),
            classifier,
        }
    }

    /// Atomically swap in a new threat snapshot (e.g. a periodic feed
    /// refresh). Scans already running keep their version.
    pub fn swap_snapshot(&self, snapshot: ThreatSnapshot) {
        let version = snapshot.version();
        let mut guard = self.snapshot.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(snapshot);
        log::info!("threat snapshot swapped to v{version}");
    }

    pub fn swap_rules(&self, rules: RuleSet) {
        let count = rules.rule_count();
        let mut guard = self.rules.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(rules);
        log::info!("rule set swapped ({count} rules)");
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .version()
    }

    /// Run one scan. Fails only on empty/whitespace content; classifier
    /// failures degrade the result instead of aborting it.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        let normalized =
            self.normalizer
                .normalize(&request.content, request.kind, request.language)?;

        let snapshot = self
            .snapshot
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let rules = self.rules.read().unwrap_or_else(|p| p.into_inner()).clone();

        // Independent stages; joined results are concatenated in a fixed
        // order (intel, rules, ml) so output ordering never depends on
        // completion order.
        let (intel_signals, rule_signals, ml_probability) = tokio::join!(
            async { threat_intel::lookup(&normalized, &snapshot) },
            async {
                let mut signals = rules.evaluate(&normalized, request.kind);
                if let Some(signal) = self.embedded_url_signal(&normalized, &rules) {
                    signals.push(signal);
                }
                signals
            },
            async {
                match &self.classifier {
                    Some(classifier) => match classifier.classify(&normalized) {
                        Ok(p) => Some(p),
                        Err(e) => {
                            log::warn!("classifier failed, continuing rule-only: {e}");
                            None
                        }
                    },
                    None => None,
                }
            }
        );

        let mut signals = intel_signals;
        signals.extend(rule_signals);

        let breakdown = self.aggregator.aggregate(&signals, ml_probability);

        if let Some(p) = ml_probability {
            signals.push(DetectionSignal::new(
                SOURCE_ML,
                p * 100.0,
                format!("model probability {p:.2}"),
            ));
        }

        log::debug!(
            "scan kind={} score={:.1} level={} signals={}",
            request.kind.as_str(),
            breakdown.threat_score,
            breakdown.risk_level,
            signals.len()
        );

        Ok(ScanResult {
            content_kind: request.kind,
            threat_score: breakdown.threat_score,
            risk_level: breakdown.risk_level,
            is_phishing: breakdown.is_phishing,
            confidence: breakdown.confidence,
            degraded: breakdown.degraded,
            signals,
        })
    }

    /// Run URLs found inside a message through the URL rules and fold
    /// their averaged weight in as one signal.
    fn embedded_url_signal(
        &self,
        normalized: &NormalizedContent,
        rules: &RuleSet,
    ) -> Option<DetectionSignal> {
        let text = normalized.as_text()?;
        if text.embedded_urls.is_empty() {
            return None;
        }

        let mut total = 0.0;
        let mut analyzed = 0;
        for raw in text.embedded_urls.iter().take(MAX_EMBEDDED_URLS) {
            if let Ok(embedded) = self.normalizer.normalize(raw, ContentKind::Url, None) {
                total += rules
                    .evaluate(&embedded, ContentKind::Url)
                    .iter()
                    .map(|s| s.weight)
                    .sum::<f64>();
                analyzed += 1;
            }
        }

        if analyzed == 0 {
            return None;
        }
        let average = total / analyzed as f64;
        if average <= 0.0 {
            return None;
        }

        Some(DetectionSignal::new(
            "embedded_url_analysis",
            average * EMBEDDED_URL_DAMPING,
            format!("{analyzed} embedded url(s), average structural weight {average:.1}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use crate::rules::builtin_rules;
    use crate::scoring::{RiskLevel, SOURCE_THREAT_INTEL};
    use crate::threat_intel::{Severity, ThreatRecord, ThreatRecordKind, DEFAULT_BRAND_DOMAINS};

    struct FixedClassifier(f64);

    impl Classifier for FixedClassifier {
        fn classify(&self, _normalized: &NormalizedContent) -> Result<f64, ClassifierError> {
            Ok(self.0)
        }

        fn version(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn classify(&self, _normalized: &NormalizedContent) -> Result<f64, ClassifierError> {
            Err(ClassifierError::Unavailable("model file corrupt".into()))
        }

        fn version(&self) -> &str {
            "broken"
        }
    }

    fn brands() -> Vec<String> {
        DEFAULT_BRAND_DOMAINS.iter().map(|s| s.to_string()).collect()
    }

    fn engine_with(
        records: Vec<ThreatRecord>,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> DetectionEngine {
        DetectionEngine::new(
            ThreatSnapshot::from_records(1, records, brands()),
            builtin_rules(),
            classifier,
            ScoringPolicy::default(),
        )
    }

    fn domain_record(value: &str, severity: Severity) -> ThreatRecord {
        ThreatRecord {
            kind: ThreatRecordKind::Domain,
            value: value.to_string(),
            severity,
            first_seen: 1_700_000_000,
            last_seen: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_empty_input_rejected_for_every_kind() {
        let engine = engine_with(Vec::new(), None);
        for kind in [ContentKind::Url, ContentKind::Text, ContentKind::Sms] {
            for content in ["", "   ", "\t\n"] {
                let result = engine.scan(&ScanRequest::new(content, kind)).await;
                assert!(matches!(result, Err(ScanError::InvalidContent)));
            }
        }
    }

    #[tokio::test]
    async fn test_scan_is_deterministic() {
        let engine = engine_with(
            vec![domain_record("phishing-example.com", Severity::High)],
            Some(Arc::new(FixedClassifier(0.7))),
        );
        let request = ScanRequest::new("http://phishing-example.com/login", ContentKind::Url);
        let first = engine.scan(&request).await.unwrap();
        let second = engine.scan(&request).await.unwrap();
        assert_eq!(first.threat_score, second.threat_score);
        assert_eq!(first.risk_level, second.risk_level);
        assert_eq!(first.is_phishing, second.is_phishing);
        assert_eq!(first.signals.len(), second.signals.len());
        for (a, b) in first.signals.iter().zip(second.signals.iter()) {
            assert_eq!(a.source, b.source);
            assert_eq!(a.weight, b.weight);
        }
    }

    #[tokio::test]
    async fn test_clean_url_scores_low() {
        let engine = engine_with(Vec::new(), Some(Arc::new(FixedClassifier(0.05))));
        let result = engine
            .scan(&ScanRequest::new(
                "https://example.com/about",
                ContentKind::Url,
            ))
            .await
            .unwrap();
        assert!((result.threat_score - 2.5).abs() < 1e-9);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.is_phishing);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_blacklisted_domain_flags_phishing() {
        let engine = engine_with(
            vec![domain_record("phishing-example.com", Severity::High)],
            Some(Arc::new(FixedClassifier(0.9))),
        );
        let result = engine
            .scan(&ScanRequest::new(
                "http://phishing-example.com/login",
                ContentKind::Url,
            ))
            .await
            .unwrap();
        assert!(result.threat_score >= 50.0);
        assert!(result.risk_level >= RiskLevel::High);
        assert!(result.is_phishing);
        assert!(result
            .signals
            .iter()
            .any(|s| s.source == SOURCE_THREAT_INTEL));
    }

    #[tokio::test]
    async fn test_homoglyph_brand_url_is_not_clean() {
        let engine = engine_with(Vec::new(), None);
        // Cyrillic р; the host folds to the genuine paypal.com
        let result = engine
            .scan(&ScanRequest::new(
                "https://\u{0440}aypal.com/signin",
                ContentKind::Url,
            ))
            .await
            .unwrap();
        let sources: Vec<&str> = result.signals.iter().map(|s| s.source.as_str()).collect();
        assert!(sources.contains(&"typosquat"));
        assert!(sources.contains(&"unicode_obfuscation"));
        // typosquat (15) + unicode_obfuscation (25), rule-only
        assert_eq!(result.threat_score, 40.0);
        assert!(result.risk_level >= RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_sms_urgency_scenario_signal_sources() {
        let engine = engine_with(Vec::new(), None);
        let result = engine
            .scan(&ScanRequest::new(
                "Your account will be suspended! Verify now: bit.ly/xyz",
                ContentKind::Sms,
            ))
            .await
            .unwrap();
        let sources: Vec<&str> = result.signals.iter().map(|s| s.source.as_str()).collect();
        assert!(sources.contains(&"urgency_language"));
        assert!(sources.contains(&"url_shortener"));
        assert!(result.signals.len() >= 2);
    }

    #[tokio::test]
    async fn test_classifier_failure_degrades_gracefully() {
        let engine = engine_with(
            vec![domain_record("phishing-example.com", Severity::Critical)],
            Some(Arc::new(BrokenClassifier)),
        );
        let result = engine
            .scan(&ScanRequest::new(
                "http://phishing-example.com/login",
                ContentKind::Url,
            ))
            .await
            .unwrap();
        assert!(result.degraded);
        // Rule component alone: critical hit (40) + plain http (10)
        assert_eq!(result.threat_score, 50.0);
        assert!(result.is_phishing);
    }

    #[tokio::test]
    async fn test_blacklist_addition_never_lowers_score() {
        let request = ScanRequest::new("https://newly-flagged.com/promo", ContentKind::Url);
        let classifier: Option<Arc<dyn Classifier>> = Some(Arc::new(FixedClassifier(0.3)));

        let without = engine_with(Vec::new(), classifier.clone());
        let baseline = without.scan(&request).await.unwrap().threat_score;

        for severity in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let with = engine_with(
                vec![domain_record("newly-flagged.com", severity)],
                classifier.clone(),
            );
            let score = with.scan(&request).await.unwrap().threat_score;
            assert!(
                score >= baseline,
                "severity {severity:?} lowered score: {score} < {baseline}"
            );
        }
    }

    #[tokio::test]
    async fn test_signal_ordering_intel_rules_ml() {
        let engine = engine_with(
            vec![domain_record("phishing-example.com", Severity::High)],
            Some(Arc::new(FixedClassifier(0.8))),
        );
        let result = engine
            .scan(&ScanRequest::new(
                "http://phishing-example.com/login",
                ContentKind::Url,
            ))
            .await
            .unwrap();
        let first_intel = result
            .signals
            .iter()
            .position(|s| s.source == SOURCE_THREAT_INTEL)
            .unwrap();
        let first_rule = result
            .signals
            .iter()
            .position(|s| s.source == "plain_http")
            .unwrap();
        let ml = result
            .signals
            .iter()
            .position(|s| s.source == SOURCE_ML)
            .unwrap();
        assert!(first_intel < first_rule);
        assert!(first_rule < ml);
        assert_eq!(ml, result.signals.len() - 1);
    }

    #[tokio::test]
    async fn test_snapshot_swap_changes_verdict() {
        let engine = engine_with(Vec::new(), None);
        let request = ScanRequest::new("https://fake-login.net/session", ContentKind::Url);

        let before = engine.scan(&request).await.unwrap();
        assert!(!before
            .signals
            .iter()
            .any(|s| s.source == SOURCE_THREAT_INTEL));

        engine.swap_snapshot(ThreatSnapshot::from_records(
            2,
            vec![domain_record("fake-login.net", Severity::Critical)],
            brands(),
        ));
        assert_eq!(engine.snapshot_version(), 2);

        let after = engine.scan(&request).await.unwrap();
        assert!(after
            .signals
            .iter()
            .any(|s| s.source == SOURCE_THREAT_INTEL));
        assert!(after.threat_score > before.threat_score);
    }

    #[tokio::test]
    async fn test_embedded_url_analysis_in_text() {
        let engine = engine_with(Vec::new(), None);
        let result = engine
            .scan(&ScanRequest::new(
                "Special offer, see details: http://promo-deals.tk/win",
                ContentKind::Text,
            ))
            .await
            .unwrap();
        assert!(result
            .signals
            .iter()
            .any(|s| s.source == "embedded_url_analysis"));
    }

    #[tokio::test]
    async fn test_concurrent_scans_share_engine() {
        let engine = Arc::new(engine_with(Vec::new(), Some(Arc::new(FixedClassifier(0.1)))));
        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .scan(&ScanRequest::new(
                        format!("https://example.com/page/{i}"),
                        ContentKind::Url,
                    ))
                    .await
                    .unwrap()
                    .threat_score
            }));
        }
        for handle in handles {
            let score = handle.await.unwrap();
            assert!(score < 25.0);
        }
    }
}
