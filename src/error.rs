use thiserror::Error;

/// Errors that abort a scan and surface to the caller.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Empty or whitespace-only content. The only fatal input condition;
    /// malformed URLs and unsupported languages are handled as evidence,
    /// not errors.
    #[error("content is empty or whitespace-only")]
    InvalidContent,
}

/// Classifier failures. Recovered by the aggregator: the scan continues on
/// the rule component alone with the result marked as degraded confidence.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}
