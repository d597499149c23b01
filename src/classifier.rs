use crate::error::ClassifierError;
use crate::normalization::NormalizedContent;
use serde::Deserialize;
use std::collections::HashMap;

/// Narrow inference seam: concrete model technology stays swappable and
/// mockable without touching the aggregator or orchestrator.
pub trait Classifier: Send + Sync {
    /// Phishing probability in [0,1] for the normalized content.
    fn classify(&self, normalized: &NormalizedContent) -> Result<f64, ClassifierError>;

    fn version(&self) -> &str;
}

/// Deterministic, kind-specific feature extraction. A pure function of the
/// normalized content so identical input always produces identical scores.
pub fn extract_features(normalized: &NormalizedContent) -> Vec<(&'static str, f64)> {
    match normalized {
        NormalizedContent::Url(url) => {
            let digit_count = url.full.chars().filter(|c| c.is_ascii_digit()).count();
            vec![
                ("url_length", url.full.len() as f64 / 100.0),
                ("host_length", url.host.len() as f64 / 50.0),
                ("digit_ratio", digit_count as f64 / url.full.len().max(1) as f64),
                ("dot_count", url.host.matches('.').count() as f64 / 10.0),
                ("hyphen_count", url.host.matches('-').count() as f64 / 10.0),
                (
                    "path_depth",
                    url.path.matches('/').count() as f64 / 10.0,
                ),
                (
                    "query_length",
                    url.query.as_deref().map_or(0, str::len) as f64 / 100.0,
                ),
                ("plain_http", if url.scheme == "http" { 1.0 } else { 0.0 }),
                ("opaque", if url.opaque { 1.0 } else { 0.0 }),
                ("entropy", shannon_entropy(&url.full) / 8.0),
            ]
        }
        NormalizedContent::Text(text) => {
            let chars = text.cleaned.chars().count();
            let letters = text.cleaned.chars().filter(|c| c.is_alphabetic()).count();
            let caps = text
                .cleaned
                .chars()
                .filter(|c| c.is_alphabetic() && c.is_uppercase())
                .count();
            let digits = text.cleaned.chars().filter(|c| c.is_ascii_digit()).count();
            vec![
                ("text_length", chars as f64 / 500.0),
                ("caps_ratio", caps as f64 / letters.max(1) as f64),
                (
                    "exclamation_count",
                    text.cleaned.matches('!').count() as f64 / 10.0,
                ),
                ("digit_ratio", digits as f64 / chars.max(1) as f64),
                ("url_count", text.embedded_urls.len() as f64 / 5.0),
                (
                    "obfuscated",
                    if text.had_zero_width || text.had_homoglyphs {
                        1.0
                    } else {
                        0.0
                    },
                ),
                ("entropy", shannon_entropy(&text.cleaned) / 8.0),
            ]
        }
    }
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for ch in text.chars() {
        *counts.entry(ch).or_insert(0) += 1;
    }
    let total = text.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Pre-trained logistic model over the named features. The artifact is a
/// JSON file with a bias and per-feature weights; features absent from the
/// artifact contribute nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    #[serde(default = "default_version")]
    pub version: String,
    pub bias: f64,
    pub weights: HashMap<String, f64>,
}

fn default_version() -> String {
    "unversioned".to_string()
}

impl LogisticModel {
    pub fn load_from_file(path: &str) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::Unavailable(format!("read {path}: {e}")))?;
        let model: LogisticModel = serde_json::from_str(&content)
            .map_err(|e| ClassifierError::Unavailable(format!("parse {path}: {e}")))?;
        log::info!(
            "loaded classifier model '{}' with {} feature weights",
            model.version,
            model.weights.len()
        );
        Ok(model)
    }
}

impl Classifier for LogisticModel {
    fn classify(&self, normalized: &NormalizedContent) -> Result<f64, ClassifierError> {
        let mut activation = self.bias;
        for (name, value) in extract_features(normalized) {
            if let Some(weight) = self.weights.get(name) {
                activation += weight * value;
            }
        }
        Ok(sigmoid(activation))
    }

    fn version(&self) -> &str {
        &self.version
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
