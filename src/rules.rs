use crate::language::Language;
use crate::normalization::{ContentKind, NormalizedContent, NormalizedText};
use crate::scoring::DetectionSignal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_enabled() -> bool {
    true
}

fn default_min_matches() -> usize {
    1
}

/// Structural heuristics evaluated against the normalized shape of the
/// content rather than a pattern string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum StructuralCheck {
    SuspiciousTld { tlds: Vec<String> },
    IpLiteralHost,
    UrlShortener { domains: Vec<String> },
    ExcessiveSubdomains { max_labels: usize },
    AtSymbolInUrl,
    PlainHttp,
    LongUrl { max_len: usize },
    ExcessiveHyphens { max: usize },
    MalformedUrl,
    UnicodeObfuscation,
    AllCaps { min_len: usize },
    ExcessiveExclamations { max: usize },
    EmbeddedUrls,
    ShortMessageWithUrl { max_len: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RulePattern {
    /// Per-language term dictionaries; fires when at least `min_matches`
    /// terms appear. Unsupported languages fall back to the English list.
    Keyword {
        terms: HashMap<Language, Vec<String>>,
        #[serde(default = "default_min_matches")]
        min_matches: usize,
    },
    Regex {
        pattern: String,
    },
    Structural {
        #[serde(flatten)]
        check: StructuralCheck,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub description: String,
    pub weight: f64,
    pub applies_to: Vec<ContentKind>,
    pub pattern: RulePattern,
}

/// An ordered rule set with pre-compiled regex patterns. A rule whose regex
/// fails to compile is logged and skipped; it never aborts the others.
pub struct RuleSet {
    rules: Vec<Rule>,
    compiled: HashMap<String, Regex>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut compiled = HashMap::new();
        for rule in &rules {
            if let RulePattern::Regex { pattern } = &rule.pattern {
                match Regex::new(pattern) {
                    Ok(regex) => {
                        compiled.insert(rule.name.clone(), regex);
                    }
                    Err(e) => {
                        log::warn!("skipping rule '{}': invalid regex: {e}", rule.name);
                    }
                }
            }
        }
        Self { rules, compiled }
    }

    /// Load an ordered rule list from a YAML file.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rules: Vec<Rule> = serde_yaml::from_str(&content)?;
        log::info!("loaded {} rules from {path}", rules.len());
        Ok(Self::new(rules))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate every applicable rule; all matches fire, no short-circuit.
    pub fn evaluate(
        &self,
        normalized: &NormalizedContent,
        kind: ContentKind,
    ) -> Vec<DetectionSignal> {
        let mut signals = Vec::new();

        for rule in &self.rules {
            if !rule.enabled || !rule.applies_to.contains(&kind) {
                continue;
            }
            if let Some(signal) = self.evaluate_rule(rule, normalized, kind) {
                signals.push(signal);
            }
        }

        signals
    }

    fn evaluate_rule(
        &self,
        rule: &Rule,
        normalized: &NormalizedContent,
        kind: ContentKind,
    ) -> Option<DetectionSignal> {
        match &rule.pattern {
            RulePattern::Keyword { terms, min_matches } => {
                self.evaluate_keyword(rule, terms, *min_matches, normalized)
            }
            RulePattern::Regex { .. } => {
                // Absent from the compiled map means the pattern was bad.
                let regex = self.compiled.get(&rule.name)?;
                let haystack = match_target(normalized);
                if regex.is_match(&haystack) {
                    Some(DetectionSignal::new(
                        &rule.name,
                        rule.weight,
                        rule.description.clone(),
                    ))
                } else {
                    None
                }
            }
            RulePattern::Structural { check } => evaluate_structural(rule, check, normalized, kind),
        }
    }

    fn evaluate_keyword(
        &self,
        rule: &Rule,
        terms: &HashMap<Language, Vec<String>>,
        min_matches: usize,
        normalized: &NormalizedContent,
    ) -> Option<DetectionSignal> {
        let (haystack, language, confident) = match normalized {
            NormalizedContent::Url(url) => (url.full.clone(), Language::English, true),
            NormalizedContent::Text(text) => (
                text.cleaned.to_lowercase(),
                text.language,
                text.language_confident,
            ),
        };

        let (dictionary, fallback) = match terms.get(&language) {
            Some(list) if confident => (list, false),
            _ => (terms.get(&Language::English)?, true),
        };

        let matched: Vec<&str> = dictionary
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .map(|term| term.as_str())
            .collect();

        if matched.len() >= min_matches {
            let mut description = format!(
                "{} ({} term{}: {})",
                rule.description,
                matched.len(),
                if matched.len() == 1 { "" } else { "s" },
                matched.join(", ")
            );
            if fallback {
                description.push_str(" [english fallback]");
            }
            Some(DetectionSignal::new(&rule.name, rule.weight, description))
        } else {
            None
        }
    }
}

fn match_target(normalized: &NormalizedContent) -> String {
    match normalized {
        NormalizedContent::Url(url) => url.full.clone(),
        NormalizedContent::Text(text) => text.cleaned.to_lowercase(),
    }
}

fn evaluate_structural(
    rule: &Rule,
    check: &StructuralCheck,
    normalized: &NormalizedContent,
    kind: ContentKind,
) -> Option<DetectionSignal> {
    let fired = match (check, normalized) {
        (StructuralCheck::SuspiciousTld { tlds }, NormalizedContent::Url(url)) => tlds
            .iter()
            .any(|tld| url.host.ends_with(&format!(".{}", tld.trim_start_matches('.')))),
        (StructuralCheck::IpLiteralHost, NormalizedContent::Url(url)) => is_ip_literal(&url.host),
        (StructuralCheck::UrlShortener { domains }, NormalizedContent::Url(url)) => domains
            .iter()
            .any(|d| url.host == *d || url.host.ends_with(&format!(".{d}"))),
        (StructuralCheck::UrlShortener { domains }, NormalizedContent::Text(text)) => {
            let lowered = text.cleaned.to_lowercase();
            domains.iter().any(|d| lowered.contains(d.as_str()))
        }
        (StructuralCheck::ExcessiveSubdomains { max_labels }, NormalizedContent::Url(url)) => {
            !url.host.is_empty() && url.host.split('.').count() > *max_labels
        }
        (StructuralCheck::AtSymbolInUrl, NormalizedContent::Url(url)) => url.full.contains('@'),
        (StructuralCheck::PlainHttp, NormalizedContent::Url(url)) => {
            !url.opaque && url.scheme == "http"
        }
        (StructuralCheck::LongUrl { max_len }, NormalizedContent::Url(url)) => {
            url.full.len() > *max_len
        }
        (StructuralCheck::ExcessiveHyphens { max }, NormalizedContent::Url(url)) => {
            url.host.matches('-').count() > *max
        }
        (StructuralCheck::MalformedUrl, NormalizedContent::Url(url)) => url.opaque,
        (StructuralCheck::UnicodeObfuscation, NormalizedContent::Text(text)) => {
            text.had_zero_width || text.had_homoglyphs
        }
        (StructuralCheck::UnicodeObfuscation, NormalizedContent::Url(url)) => {
            url.had_zero_width || url.had_homoglyphs
        }
        (StructuralCheck::AllCaps { min_len }, NormalizedContent::Text(text)) => {
            let letters: Vec<char> = text.cleaned.chars().filter(|c| c.is_alphabetic()).collect();
            text.cleaned.chars().count() >= *min_len
                && !letters.is_empty()
                && letters.iter().all(|c| c.is_uppercase())
        }
        (StructuralCheck::ExcessiveExclamations { max }, NormalizedContent::Text(text)) => {
            text.cleaned.matches('!').count() > *max
        }
        (StructuralCheck::EmbeddedUrls, NormalizedContent::Text(text)) => {
            !text.embedded_urls.is_empty()
        }
        (StructuralCheck::ShortMessageWithUrl { max_len }, NormalizedContent::Text(text)) => {
            kind == ContentKind::Sms
                && text.cleaned.chars().count() < *max_len
                && contains_any_link(text)
        }
        _ => false,
    };

    if fired {
        Some(DetectionSignal::new(
            &rule.name,
            rule.weight,
            rule.description.clone(),
        ))
    } else {
        None
    }
}

fn is_ip_literal(host: &str) -> bool {
    host.parse::<std::net::IpAddr>().is_ok()
        || host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(|h| h.parse::<std::net::IpAddr>().is_ok())
            .unwrap_or(false)
}

/// SMS links often omit the scheme; treat a bare shortener-style token as a
/// link too.
fn contains_any_link(text: &NormalizedText) -> bool {
    if !text.embedded_urls.is_empty() {
        return true;
    }
    let lowered = text.cleaned.to_lowercase();
    lowered
        .split_whitespace()
        .any(|token| {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/');
            token.contains('.') && token.contains('/') && !token.ends_with('.')
        })
}

fn english(terms: &[&str]) -> HashMap<Language, Vec<String>> {
    let mut map = HashMap::new();
    map.insert(
        Language::English,
        terms.iter().map(|s| s.to_string()).collect(),
    );
    map
}

/// The default rule set. Operators normally load a tuned YAML file; this
/// set covers the stock heuristics so the engine is useful out of the box.
pub fn builtin_rules() -> RuleSet {
    let url = vec![ContentKind::Url];
    let text = vec![ContentKind::Text, ContentKind::Sms];
    let all = vec![ContentKind::Url, ContentKind::Text, ContentKind::Sms];

    let mut phishing_terms = english(&[
        "urgent", "verify", "suspended", "locked", "confirm", "update", "click here", "act now",
        "limited time", "expire", "account", "password", "credit card", "bank", "security",
        "alert", "winner", "prize", "congratulations", "claim", "free", "refund", "tax",
        "payment", "invoice", "billing",
    ]);
    phishing_terms.insert(
        Language::Hindi,
        [
            "तुरंत", "सत्यापित", "निलंबित", "लॉक", "पुष्टि", "अपडेट", "यहाँ क्लिक करें",
            "अभी कार्य करें", "खाता", "पासवर्ड", "बैंक", "सुरक्षा", "चेतावनी", "विजेता", "पुरस्कार",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    );
    phishing_terms.insert(
        Language::Tamil,
        [
            "அவசரம்", "சரிபார்", "இடைநிறுத்தப்பட்டது", "பூட்டப்பட்டது", "உறுதிப்படுத்து",
            "புதுப்பிப்பு", "கணக்கு", "கடவுச்சொல்",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    );
    phishing_terms.insert(
        Language::Telugu,
        [
            "అత్యవసరం", "ధృవీకరించు", "నిలిపివేయబడింది", "లాక్", "నిర్ధారించు", "నవీకరణ",
            "ఖాతా", "పాస్వర్డ్",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    );

    let mut urgency_terms = english(&[
        "urgent", "immediately", "act now", "asap", "hurry", "expire", "deadline",
        "last chance", "limited time", "suspended", "verify now", "within 24 hours",
    ]);
    urgency_terms.insert(
        Language::Hindi,
        ["तुरंत", "अभी कार्य करें", "चेतावनी", "निलंबित"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    urgency_terms.insert(
        Language::Tamil,
        ["அவசரம்", "இடைநிறுத்தப்பட்டது"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    urgency_terms.insert(
        Language::Telugu,
        ["అత్యవసరం", "నిలిపివేయబడింది"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );

    let rules = vec![
        Rule {
            name: "suspicious_tld".to_string(),
            enabled: true,
            description: "Host uses a TLD heavily abused for phishing".to_string(),
            weight: 20.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::SuspiciousTld {
                    tlds: [
                        "tk", "ml", "ga", "cf", "gq", "xyz", "top", "work", "click", "link",
                        "buzz", "icu", "monster",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                },
            },
        },
        Rule {
            name: "ip_literal_host".to_string(),
            enabled: true,
            description: "URL uses an IP address instead of a domain".to_string(),
            weight: 25.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::IpLiteralHost,
            },
        },
        Rule {
            name: "url_shortener".to_string(),
            enabled: true,
            description: "Shortened URL hides the real destination".to_string(),
            weight: 15.0,
            applies_to: all.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::UrlShortener {
                    domains: [
                        "bit.ly", "tinyurl.com", "goo.gl", "t.co", "ow.ly", "is.gd", "rb.gy",
                        "cutt.ly",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                },
            },
        },
        Rule {
            name: "excessive_subdomains".to_string(),
            enabled: true,
            description: "Unusually deep subdomain nesting".to_string(),
            weight: 15.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::ExcessiveSubdomains { max_labels: 4 },
            },
        },
        Rule {
            name: "at_symbol_obfuscation".to_string(),
            enabled: true,
            description: "URL contains '@', hiding the real host".to_string(),
            weight: 25.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::AtSymbolInUrl,
            },
        },
        Rule {
            name: "plain_http".to_string(),
            enabled: true,
            description: "No TLS on a page asking for input".to_string(),
            weight: 10.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::PlainHttp,
            },
        },
        Rule {
            name: "long_url".to_string(),
            enabled: true,
            description: "Unusually long URL".to_string(),
            weight: 10.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::LongUrl { max_len: 75 },
            },
        },
        Rule {
            name: "excessive_hyphens".to_string(),
            enabled: true,
            description: "Hyphen-stuffed host mimicking a brand".to_string(),
            weight: 10.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::ExcessiveHyphens { max: 3 },
            },
        },
        Rule {
            name: "malformed_url".to_string(),
            enabled: true,
            description: "Content could not be parsed as a URL".to_string(),
            weight: 30.0,
            applies_to: url.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::MalformedUrl,
            },
        },
        Rule {
            name: "suspicious_url_keywords".to_string(),
            enabled: true,
            description: "Credential-bait keywords in URL".to_string(),
            weight: 20.0,
            applies_to: url,
            pattern: RulePattern::Keyword {
                terms: english(&[
                    "login", "signin", "account", "verify", "secure", "update", "banking",
                    "suspended", "locked", "confirm", "urgent", "alert",
                ]),
                min_matches: 2,
            },
        },
        Rule {
            name: "urgency_language".to_string(),
            enabled: true,
            description: "Urgency pressure tactics".to_string(),
            weight: 15.0,
            applies_to: text.clone(),
            pattern: RulePattern::Keyword {
                terms: urgency_terms,
                min_matches: 1,
            },
        },
        Rule {
            name: "credential_request".to_string(),
            enabled: true,
            description: "Requests sensitive credentials".to_string(),
            weight: 30.0,
            applies_to: text.clone(),
            pattern: RulePattern::Regex {
                pattern: r"(enter|provide|verify|confirm)[^.!?]{0,40}(password|pin|otp|code)|credit card|card number|cvv".to_string(),
            },
        },
        Rule {
            name: "suspicious_call_to_action".to_string(),
            enabled: true,
            description: "Suspicious call-to-action phrasing".to_string(),
            weight: 20.0,
            applies_to: text.clone(),
            pattern: RulePattern::Regex {
                pattern: r"\b(click here|click now|verify now|update now|act now)\b".to_string(),
            },
        },
        Rule {
            name: "phishing_keywords".to_string(),
            enabled: true,
            description: "Multiple phishing keywords".to_string(),
            weight: 10.0,
            applies_to: text.clone(),
            pattern: RulePattern::Keyword {
                terms: phishing_terms,
                min_matches: 2,
            },
        },
        Rule {
            name: "all_caps".to_string(),
            enabled: true,
            description: "Message shouted entirely in capitals".to_string(),
            weight: 15.0,
            applies_to: text.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::AllCaps { min_len: 20 },
            },
        },
        Rule {
            name: "excessive_exclamations".to_string(),
            enabled: true,
            description: "Excessive exclamation marks".to_string(),
            weight: 10.0,
            applies_to: text.clone(),
            pattern: RulePattern::Structural {
                check: StructuralCheck::ExcessiveExclamations { max: 2 },
            },
        },
        Rule {
            name: "unicode_obfuscation".to_string(),
            enabled: true,
            description: "Zero-width or look-alike characters in content".to_string(),
            weight: 25.0,
            applies_to: all,
            pattern: RulePattern::Structural {
                check: StructuralCheck::UnicodeObfuscation,
            },
        },
        Rule {
            name: "embedded_urls".to_string(),
            enabled: true,
            description: "Message carries links".to_string(),
            weight: 10.0,
            applies_to: text,
            pattern: RulePattern::Structural {
                check: StructuralCheck::EmbeddedUrls,
            },
        },
        Rule {
            name: "short_message_with_url".to_string(),
            enabled: true,
            description: "Short message pushing a link, typical of smishing".to_string(),
            weight: 15.0,
            applies_to: vec![ContentKind::Sms],
            pattern: RulePattern::Structural {
                check: StructuralCheck::ShortMessageWithUrl { max_len: 100 },
            },
        },
    ];

    RuleSet::new(rules)
}
