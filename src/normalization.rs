use crate::error::ScanError;
use crate::language::{Language, LanguageDetector};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Url,
    Text,
    Sms,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Url => "url",
            ContentKind::Text => "text",
            ContentKind::Sms => "sms",
        }
    }
}

/// Canonical form of a URL submission. When the input cannot be parsed even
/// with a default scheme, `opaque` is set and only `full` is meaningful;
/// malformed input is evidence for the rule engine, never an error.
#[derive(Debug, Clone)]
pub struct NormalizedUrl {
    pub scheme: String,
    pub host: String,
    pub registrable_domain: String,
    pub path: String,
    pub query: Option<String>,
    pub full: String,
    pub opaque: bool,
    pub had_zero_width: bool,
    pub had_homoglyphs: bool,
}

/// Canonical form of a text/SMS submission after unicode cleanup.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub cleaned: String,
    pub language: Language,
    pub language_confident: bool,
    pub embedded_urls: Vec<String>,
    pub had_zero_width: bool,
    pub had_homoglyphs: bool,
}

#[derive(Debug, Clone)]
pub enum NormalizedContent {
    Url(NormalizedUrl),
    Text(NormalizedText),
}

impl NormalizedContent {
    pub fn as_url(&self) -> Option<&NormalizedUrl> {
        match self {
            NormalizedContent::Url(u) => Some(u),
            NormalizedContent::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&NormalizedText> {
        match self {
            NormalizedContent::Text(t) => Some(t),
            NormalizedContent::Url(_) => None,
        }
    }
}

// Two-part public suffixes we care about; enough to derive a registrable
// domain for the markets the language set targets without a PSL dependency.
const MULTI_PART_SUFFIXES: &[&str] = &[
    "co.uk", "co.in", "co.nz", "co.za", "co.jp", "com.au", "com.br", "org.uk", "net.in", "org.in",
    "gov.in", "ac.in", "firm.in",
];

pub struct ContentNormalizer {
    url_regex: Regex,
    homoglyph_map: HashMap<char, char>,
    zero_width_chars: Vec<char>,
}

impl ContentNormalizer {
    pub fn new() -> Self {
        let mut homoglyph_map = HashMap::new();

        // Cyrillic to Latin mappings
        homoglyph_map.insert('а', 'a');
        homoglyph_map.insert('е', 'e');
        homoglyph_map.insert('о', 'o');
        homoglyph_map.insert('р', 'p');
        homoglyph_map.insert('с', 'c');
        homoglyph_map.insert('х', 'x');
        homoglyph_map.insert('і', 'i');
        homoglyph_map.insert('ѕ', 's');

        // Greek to Latin mappings
        homoglyph_map.insert('α', 'a');
        homoglyph_map.insert('ο', 'o');
        homoglyph_map.insert('ε', 'e');
        homoglyph_map.insert('ι', 'i');

        Self {
            url_regex: Regex::new(r#"https?://[^\s<>"']+"#).expect("static regex"),
            homoglyph_map,
            zero_width_chars: vec!['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'],
        }
    }

    /// Produce the canonical representation for one submission.
    /// Fails only on empty or whitespace-only content.
    pub fn normalize(
        &self,
        content: &str,
        kind: ContentKind,
        language_hint: Option<Language>,
    ) -> Result<NormalizedContent, ScanError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ScanError::InvalidContent);
        }

        match kind {
            ContentKind::Url => Ok(NormalizedContent::Url(self.normalize_url(trimmed))),
            ContentKind::Text | ContentKind::Sms => Ok(NormalizedContent::Text(
                self.normalize_text(trimmed, language_hint),
            )),
        }
    }

    fn normalize_url(&self, raw: &str) -> NormalizedUrl {
        // Obfuscation characters hide in URLs too; strip before parsing,
        // but keep the flags: a folded host that now reads as a genuine
        // brand is exactly the evidence downstream stages need.
        let (cleaned, had_zero_width, had_homoglyphs) = self.strip_obfuscation(raw);
        let cleaned = cleaned.trim().to_string();

        let parsed = Url::parse(&cleaned).ok().or_else(|| {
            if cleaned.contains("://") {
                None
            } else {
                // Bare host input like "paypal-login.tk/verify"
                Url::parse(&format!("http://{cleaned}")).ok()
            }
        });

        match parsed {
            Some(url) if url.host_str().is_some() => {
                let host = url.host_str().unwrap_or_default().to_lowercase();
                let query = url.query().map(|q| q.to_string());
                NormalizedUrl {
                    scheme: url.scheme().to_string(),
                    registrable_domain: registrable_domain(&host),
                    path: url.path().to_string(),
                    query,
                    host,
                    full: cleaned.to_lowercase(),
                    opaque: false,
                    had_zero_width,
                    had_homoglyphs,
                }
            }
            _ => {
                log::debug!("unparseable url treated as opaque token: {cleaned}");
                NormalizedUrl {
                    scheme: String::new(),
                    host: String::new(),
                    registrable_domain: String::new(),
                    path: String::new(),
                    query: None,
                    full: cleaned.to_lowercase(),
                    opaque: true,
                    had_zero_width,
                    had_homoglyphs,
                }
            }
        }
    }

    fn normalize_text(&self, raw: &str, language_hint: Option<Language>) -> NormalizedText {
        // Canonical decomposition/recomposition first so folded characters
        // compare equal regardless of input form.
        let composed: String = raw.nfkc().collect();
        let (cleaned, had_zero_width, had_homoglyphs) = self.strip_obfuscation(&composed);

        let (language, language_confident) = match language_hint {
            Some(lang) => (lang, true),
            None => LanguageDetector::detect(&cleaned),
        };

        let embedded_urls = self
            .url_regex
            .find_iter(&cleaned)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ')', '!']).to_string())
            .collect();

        NormalizedText {
            cleaned,
            language,
            language_confident,
            embedded_urls,
            had_zero_width,
            had_homoglyphs,
        }
    }

    /// Fold homoglyphs to Latin and drop zero-width and bidi-control
    /// characters. Returns the cleaned string plus what was found.
    fn strip_obfuscation(&self, text: &str) -> (String, bool, bool) {
        let mut result = String::with_capacity(text.len());
        let mut found_zero_width = false;
        let mut found_homoglyphs = false;

        for ch in text.chars() {
            if let Some(&replacement) = self.homoglyph_map.get(&ch) {
                result.push(replacement);
                found_homoglyphs = true;
            } else if self.zero_width_chars.contains(&ch) {
                found_zero_width = true;
            } else if matches!(
                ch,
                '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{061C}' | '\u{200E}' | '\u{200F}'
            ) {
                // Bidi-control characters, a common display-spoofing vector
                found_zero_width = true;
            } else {
                result.push(ch);
            }
        }

        (result, found_zero_width, found_homoglyphs)
    }
}

impl Default for ContentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive the registrable domain (eTLD+1) for a host, recognizing a small
/// set of two-part suffixes.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_start_matches("www.").to_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let last_two = labels[labels.len() - 2..].join(".");
    if MULTI_PART_SUFFIXES.contains(&last_two.as_str()) {
        labels[labels.len() - 3..].join(".")
    } else {
        last_two
    }
}
