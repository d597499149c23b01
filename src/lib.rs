pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod normalization;
pub mod rules;
pub mod scoring;
pub mod threat_intel;

pub use config::EngineConfig;
pub use engine::{DetectionEngine, ScanRequest, ScanResult};
pub use error::{ClassifierError, ScanError};
pub use language::{Language, LanguageDetector};
pub use normalization::{ContentKind, ContentNormalizer, NormalizedContent};
pub use rules::RuleSet;
pub use scoring::{DetectionSignal, RiskLevel};
pub use threat_intel::{Severity, ThreatRecord, ThreatSnapshot};
