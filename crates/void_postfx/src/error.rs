//! Post-processing error types

use thiserror::Error;

/// Errors raised while building or tearing down a post-process pipeline
#[derive(Debug, Error)]
pub enum PostFxError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Effect '{effect}' failed to compile: {message}")]
    ProgramCompile { effect: String, message: String },

    #[error("Depth map unavailable: {0}")]
    DepthUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown pipeline type: {0}")]
    UnknownCustomType(String),

    #[error("Pipeline '{0}' has been disposed")]
    Disposed(String),

    #[error("Pipeline manager error: {0}")]
    Manager(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

/// Result type for post-processing operations
pub type PostFxResult<T> = Result<T, PostFxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostFxError::ProgramCompile {
            effect: "bloom".into(),
            message: "missing entry point".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bloom"));
        assert!(msg.contains("missing entry point"));

        let err = PostFxError::Disposed("default".into());
        assert_eq!(err.to_string(), "Pipeline 'default' has been disposed");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{ not json");
        let err: PostFxError = parse.unwrap_err().into();
        assert!(matches!(err, PostFxError::Serialization(_)));
    }
}
