use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("canvas error: {0}")]
    Canvas(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("record error: {0}")]
    Record(#[from] serde_json::Error),

    #[error("logo fetch failed: {0}")]
    Fetch(String),

    #[error("layout invariant violated: {0}")]
    Invariant(String),

    #[error("output verification failed: {0}")]
    Verification(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Errors a block or asset step can recover from without failing the render.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReportError::Image(_) | ReportError::Fetch(_))
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        ReportError::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_asset_failures_are_recoverable() {
        assert!(ReportError::Image("bad png".into()).is_recoverable());
        assert!(ReportError::Fetch("404".into()).is_recoverable());
        assert!(!ReportError::Canvas("zero page".into()).is_recoverable());
        assert!(!ReportError::Invariant("cursor".into()).is_recoverable());
    }

    #[test]
    fn record_errors_wrap_json_failures() {
        let err: ReportError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(ReportError::from)
            .expect_err("must fail");
        assert!(err.to_string().starts_with("record error"));
    }
}
