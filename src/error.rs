use thiserror::Error;

/// Fatal error kinds for a reporting run. Every kind terminates the run; the
/// external scheduler is responsible for the next attempt.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("hardware registry unavailable: {0}")]
    SourceUnavailable(String),
    #[error("hardware registry output malformed: {0}")]
    MalformedSource(String),
    #[error("registry node is not battery data: {0}")]
    MissingRequiredField(String),
    #[error("remote schema update failed: {0}")]
    SchemaUpdateFailed(String),
    #[error("report upload failed: {0}")]
    UploadFailed(String),
}

impl ReporterError {
    /// Distinct process exit code per kind so launchd/cron logs can tell the
    /// failure stages apart without parsing stderr.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReporterError::Configuration(_) => 2,
            ReporterError::SourceUnavailable(_) => 3,
            ReporterError::MalformedSource(_) => 4,
            ReporterError::MissingRequiredField(_) => 5,
            ReporterError::SchemaUpdateFailed(_) => 6,
            ReporterError::UploadFailed(_) => 7,
        }
    }
}
