//! Error types for the login queue service
//!
//! Admission itself never fails; these errors cover the fallible edges
//! around it: configuration and credential hashing.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific login queue scenarios
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Unsupported hash algorithm: {algorithm}")]
    UnsupportedHashAlgorithm { algorithm: String },

    #[error("Malformed encoded credential: {reason}")]
    MalformedCredential { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QueueError::UnsupportedHashAlgorithm {
            algorithm: "md5".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported hash algorithm: md5");

        let err = QueueError::ConfigurationError {
            message: "grace margin must be positive".to_string(),
        };
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let result: Result<()> = Err(QueueError::MalformedCredential {
            reason: "empty digest".to_string(),
        }
        .into());

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueueError>(),
            Some(QueueError::MalformedCredential { .. })
        ));
    }
}
