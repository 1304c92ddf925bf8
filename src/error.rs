//! Pipeline error taxonomy.
//!
//! Errors are classified by severity:
//! - ConfigurationMissing: the one fatal class, reported before any fetch
//! - SourceUnavailable: a remote source failed entirely; run degrades
//! - Everything else: local failures surfaced at the step boundary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Source {src} unavailable: {reason}")]
    SourceUnavailable { src: &'static str, reason: String },

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Returns true if this error must abort the run.
    ///
    /// Everything except a missing credential degrades to a best-effort
    /// output document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::ConfigurationMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_configuration_is_fatal() {
        assert!(PipelineError::ConfigurationMissing("crmToken".into()).is_fatal());
        assert!(!PipelineError::SourceUnavailable {
            src: "pipeline export",
            reason: "timeout".into(),
        }
        .is_fatal());
        assert!(!PipelineError::Config("bad json".into()).is_fatal());
    }
}
