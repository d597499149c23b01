use serde::{Deserialize, Serialize};

/// Languages the rule dictionaries cover. Anything else falls back to
/// English-rule evaluation rather than failing the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Tamil,
    Telugu,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Tamil => "tamil",
            Language::Telugu => "telugu",
        }
    }

    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.to_lowercase().as_str() {
            "english" | "en" => Some(Language::English),
            "hindi" | "hi" => Some(Language::Hindi),
            "tamil" | "ta" => Some(Language::Tamil),
            "telugu" | "te" => Some(Language::Telugu),
            _ => None,
        }
    }
}

pub struct LanguageDetector;

impl LanguageDetector {
    /// Detect the dominant supported language from script ranges.
    /// Returns the language and whether the detection is confident; an
    /// ambiguous or unrecognized script defaults to (English, false).
    pub fn detect(text: &str) -> (Language, bool) {
        if Self::contains_devanagari(text) {
            return (Language::Hindi, true);
        }
        if Self::contains_tamil(text) {
            return (Language::Tamil, true);
        }
        if Self::contains_telugu(text) {
            return (Language::Telugu, true);
        }
        if text.chars().any(|c| c.is_ascii_alphabetic()) {
            return (Language::English, true);
        }
        log::debug!("no supported script detected, defaulting to english");
        (Language::English, false)
    }

    fn contains_devanagari(text: &str) -> bool {
        text.chars().any(|c| {
            // Devanagari: U+0900–U+097F
            // Devanagari Extended: U+A8E0–U+A8FF
            matches!(c,
                '\u{0900}'..='\u{097F}' |
                '\u{A8E0}'..='\u{A8FF}'
            )
        })
    }

    fn contains_tamil(text: &str) -> bool {
        // Tamil: U+0B80–U+0BFF
        text.chars().any(|c| matches!(c, '\u{0B80}'..='\u{0BFF}'))
    }

    fn contains_telugu(text: &str) -> bool {
        // Telugu: U+0C00–U+0C7F
        text.chars().any(|c| matches!(c, '\u{0C00}'..='\u{0C7F}'))
    }
}
