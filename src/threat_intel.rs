use crate::normalization::{registrable_domain, NormalizedContent};
use crate::scoring::{DetectionSignal, SOURCE_THREAT_INTEL, SOURCE_TYPOSQUAT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Signal weight per record severity.
pub const CRITICAL_SEVERITY_WEIGHT: f64 = 40.0;
pub const HIGH_SEVERITY_WEIGHT: f64 = 25.0;
pub const MEDIUM_SEVERITY_WEIGHT: f64 = 12.0;
pub const LOW_SEVERITY_WEIGHT: f64 = 5.0;

// Typosquat matching is a heuristic, not a database hit; it carries a
// smaller weight and its own signal source.
pub const TYPOSQUAT_WEIGHT: f64 = 15.0;
pub const TYPOSQUAT_SIMILARITY_FLOOR: f64 = 0.85;

pub const DEFAULT_BRAND_DOMAINS: &[&str] = &[
    "google.com",
    "facebook.com",
    "amazon.com",
    "microsoft.com",
    "apple.com",
    "paypal.com",
    "netflix.com",
    "linkedin.com",
    "github.com",
    "twitter.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => CRITICAL_SEVERITY_WEIGHT,
            Severity::High => HIGH_SEVERITY_WEIGHT,
            Severity::Medium => MEDIUM_SEVERITY_WEIGHT,
            Severity::Low => LOW_SEVERITY_WEIGHT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatRecordKind {
    Domain,
    Url,
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub kind: ThreatRecordKind,
    pub value: String,
    pub severity: Severity,
    #[serde(default)]
    pub first_seen: u64,
    #[serde(default)]
    pub last_seen: u64,
}

/// Point-in-time view of known-threat records plus the brand set used for
/// typosquat matching. Never mutated after construction; reloads swap in a
/// whole new snapshot.
#[derive(Debug, Clone)]
pub struct ThreatSnapshot {
    version: u64,
    domains: HashMap<String, ThreatRecord>,
    urls: HashMap<String, ThreatRecord>,
    keywords: HashMap<String, ThreatRecord>,
    brand_domains: Vec<String>,
}

impl ThreatSnapshot {
    pub fn empty(version: u64) -> Self {
        Self::from_records(version, Vec::new(), default_brands())
    }

    pub fn from_records(
        version: u64,
        records: Vec<ThreatRecord>,
        brand_domains: Vec<String>,
    ) -> Self {
        let mut domains = HashMap::new();
        let mut urls = HashMap::new();
        let mut keywords = HashMap::new();

        for mut record in records {
            record.value = record.value.trim().to_lowercase();
            if record.value.is_empty() {
                continue;
            }
            match record.kind {
                ThreatRecordKind::Domain => {
                    domains.insert(record.value.clone(), record);
                }
                ThreatRecordKind::Url => {
                    let key = record.value.trim_end_matches('/').to_string();
                    urls.insert(key, record);
                }
                ThreatRecordKind::Keyword => {
                    keywords.insert(record.value.clone(), record);
                }
            }
        }

        Self {
            version,
            domains,
            urls,
            keywords,
            brand_domains: brand_domains
                .into_iter()
                .map(|b| b.trim().to_lowercase())
                .collect(),
        }
    }

    /// Load records from a YAML file (a list of ThreatRecord entries).
    pub fn load_from_file(
        path: &str,
        version: u64,
        brand_domains: Vec<String>,
    ) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ThreatRecord> = serde_yaml::from_str(&content)?;
        log::info!(
            "loaded threat snapshot v{version} with {} records from {path}",
            records.len()
        );
        Ok(Self::from_records(version, records, brand_domains))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn record_count(&self) -> usize {
        self.domains.len() + self.urls.len() + self.keywords.len()
    }

    fn domain_hit(&self, domain: &str) -> Option<&ThreatRecord> {
        self.domains.get(domain)
    }

    fn url_hit(&self, url: &str) -> Option<&ThreatRecord> {
        self.urls.get(url.trim_end_matches('/'))
    }
}

/// Check normalized content against the snapshot. Exact hits come first,
/// then typosquat suspicions; no match yields an empty vec.
pub fn lookup(normalized: &NormalizedContent, snapshot: &ThreatSnapshot) -> Vec<DetectionSignal> {
    let mut signals = Vec::new();

    match normalized {
        NormalizedContent::Url(url) => {
            if let Some(record) = snapshot.url_hit(&url.full) {
                signals.push(exact_hit_signal(record, "url"));
            }
            if !url.registrable_domain.is_empty() {
                if let Some(record) = snapshot.domain_hit(&url.registrable_domain) {
                    signals.push(exact_hit_signal(record, "domain"));
                }
            }
            for (keyword, record) in &snapshot.keywords {
                if url.full.contains(keyword.as_str()) {
                    signals.push(exact_hit_signal(record, "keyword"));
                }
            }
            if let Some(signal) =
                typosquat_signal(&url.registrable_domain, url.had_homoglyphs, snapshot)
            {
                signals.push(signal);
            }
        }
        NormalizedContent::Text(text) => {
            let lowered = text.cleaned.to_lowercase();
            for (keyword, record) in &snapshot.keywords {
                if lowered.contains(keyword.as_str()) {
                    signals.push(exact_hit_signal(record, "keyword"));
                }
            }
            for embedded in &text.embedded_urls {
                let domain = embedded_domain(embedded);
                if domain.is_empty() {
                    continue;
                }
                if let Some(record) = snapshot.domain_hit(&domain) {
                    signals.push(exact_hit_signal(record, "embedded url domain"));
                }
                if let Some(signal) = typosquat_signal(&domain, text.had_homoglyphs, snapshot) {
                    signals.push(signal);
                }
            }
        }
    }

    // Keyword map iteration order is not stable; keep the evidence trail
    // deterministic for identical input.
    signals.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.description.cmp(&b.description))
    });
    signals
}

fn exact_hit_signal(record: &ThreatRecord, matched_as: &str) -> DetectionSignal {
    DetectionSignal::new(
        SOURCE_THREAT_INTEL,
        record.severity.weight(),
        format!(
            "known-threat {matched_as} match: {} (severity {})",
            record.value,
            record.severity.as_str()
        ),
    )
}

fn typosquat_signal(
    domain: &str,
    folded_homoglyphs: bool,
    snapshot: &ThreatSnapshot,
) -> Option<DetectionSignal> {
    if domain.is_empty() {
        return None;
    }
    for brand in &snapshot.brand_domains {
        if domain == brand {
            // An exact brand match is genuine only if it arrived as plain
            // Latin; a host that needed homoglyph folding to read as the
            // brand is the spoof itself.
            if folded_homoglyphs {
                return Some(DetectionSignal::new(
                    SOURCE_TYPOSQUAT,
                    TYPOSQUAT_WEIGHT,
                    format!("domain impersonates {brand} using look-alike characters"),
                ));
            }
            return None;
        }
        let similarity = strsim::normalized_levenshtein(domain, brand);
        if similarity >= TYPOSQUAT_SIMILARITY_FLOOR {
            return Some(DetectionSignal::new(
                SOURCE_TYPOSQUAT,
                TYPOSQUAT_WEIGHT,
                format!("domain {domain} resembles {brand} (similarity {similarity:.2})"),
            ));
        }
    }
    None
}

fn embedded_domain(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| registrable_domain(h))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn default_brands() -> Vec<String> {
    DEFAULT_BRAND_DOMAINS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::{ContentKind, ContentNormalizer};

    fn record(kind: ThreatRecordKind, value: &str, severity: Severity) -> ThreatRecord {
        ThreatRecord {
            kind,
            value: value.to_string(),
            severity,
            first_seen: 1_700_000_000,
            last_seen: 1_700_000_000,
        }
    }

    fn normalize_url(content: &str) -> NormalizedContent {
        ContentNormalizer::new()
            .normalize(content, ContentKind::Url, None)
            .unwrap()
    }

    fn normalize_text(content: &str) -> NormalizedContent {
        ContentNormalizer::new()
            .normalize(content, ContentKind::Text, None)
            .unwrap()
    }

    #[test]
    fn test_empty_snapshot_yields_no_signals() {
        let snapshot = ThreatSnapshot::empty(1);
        let signals = lookup(&normalize_url("https://example.com/about"), &snapshot);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_exact_domain_match_uses_severity_weight() {
        let snapshot = ThreatSnapshot::from_records(
            1,
            vec![record(
                ThreatRecordKind::Domain,
                "phishing-example.com",
                Severity::High,
            )],
            default_brands(),
        );
        let signals = lookup(
            &normalize_url("http://phishing-example.com/login"),
            &snapshot,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, SOURCE_THREAT_INTEL);
        assert_eq!(signals[0].weight, HIGH_SEVERITY_WEIGHT);
    }

    #[test]
    fn test_subdomain_resolves_to_registrable_domain() {
        let snapshot = ThreatSnapshot::from_records(
            1,
            vec![record(
                ThreatRecordKind::Domain,
                "malicious-bank.com",
                Severity::Critical,
            )],
            default_brands(),
        );
        let signals = lookup(
            &normalize_url("https://secure.malicious-bank.com/verify"),
            &snapshot,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].weight, CRITICAL_SEVERITY_WEIGHT);
    }

    #[test]
    fn test_keyword_record_matches_inside_text() {
        let snapshot = ThreatSnapshot::from_records(
            1,
            vec![record(
                ThreatRecordKind::Keyword,
                "verify-account",
                Severity::Medium,
            )],
            default_brands(),
        );
        let signals = lookup(
            &normalize_text("Go to example.com/verify-account today"),
            &snapshot,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].weight, MEDIUM_SEVERITY_WEIGHT);
    }

    #[test]
    fn test_typosquat_detection() {
        let snapshot = ThreatSnapshot::empty(1);
        let signals = lookup(&normalize_url("https://paypa1.com/signin"), &snapshot);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, SOURCE_TYPOSQUAT);
        assert_eq!(signals[0].weight, TYPOSQUAT_WEIGHT);
        assert!(signals[0].description.contains("paypal.com"));
    }

    #[test]
    fn test_genuine_brand_domain_is_not_typosquat() {
        let snapshot = ThreatSnapshot::empty(1);
        let signals = lookup(&normalize_url("https://www.paypal.com/signin"), &snapshot);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_homoglyph_brand_spoof_detected() {
        let snapshot = ThreatSnapshot::empty(1);
        // Cyrillic р folds to the genuine brand; that is the attack, not
        // the brand.
        let signals = lookup(
            &normalize_url("https://\u{0440}aypal.com/signin"),
            &snapshot,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, SOURCE_TYPOSQUAT);
        assert_eq!(signals[0].weight, TYPOSQUAT_WEIGHT);
        assert!(signals[0].description.contains("look-alike"));
    }

    #[test]
    fn test_embedded_url_domain_hit_in_text() {
        let snapshot = ThreatSnapshot::from_records(
            1,
            vec![record(
                ThreatRecordKind::Domain,
                "fake-login.net",
                Severity::Critical,
            )],
            default_brands(),
        );
        let signals = lookup(
            &normalize_text("Update your details at http://fake-login.net/session"),
            &snapshot,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].weight, CRITICAL_SEVERITY_WEIGHT);
    }

    #[test]
    fn test_snapshot_is_versioned() {
        let snapshot = ThreatSnapshot::empty(7);
        assert_eq!(snapshot.version(), 7);
        assert_eq!(snapshot.record_count(), 0);
    }
}
