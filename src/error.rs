use thiserror::Error;

/// Pipeline stage a minimum-count threshold applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Alive,
    Restrictive,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Alive => "alive",
            Stage::Restrictive => "restrictive",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for subsift
#[derive(Error, Debug)]
pub enum SiftError {
    // Batch-level outcomes
    #[error("Source yielded no descriptors")]
    SourceUnavailable,

    #[error("Insufficient {stage} descriptors: found {found}, required {required}")]
    InsufficientResults {
        stage: Stage,
        found: usize,
        required: usize,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid selection policy: {0}")]
    Policy(#[from] serde_json::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for subsift operations
pub type Result<T> = std::result::Result<T, SiftError>;

impl SiftError {
    /// Whether the caller should leave previously written output untouched
    pub fn preserves_previous_output(&self) -> bool {
        matches!(
            self,
            SiftError::SourceUnavailable | SiftError::InsufficientResults { .. }
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SiftError::SourceUnavailable | SiftError::InsufficientResults { .. } => 1,
            SiftError::InvalidConfig(_) | SiftError::Policy(_) => 2,
            SiftError::Io(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_errors_preserve_previous_output() {
        assert!(SiftError::SourceUnavailable.preserves_previous_output());
        assert!(SiftError::InsufficientResults {
            stage: Stage::Alive,
            found: 9,
            required: 10,
        }
        .preserves_previous_output());

        assert!(!SiftError::InvalidConfig("bad".to_string()).preserves_previous_output());
        assert!(!SiftError::Io(std::io::Error::other("disk")).preserves_previous_output());
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(SiftError::SourceUnavailable.exit_code(), 1);
        assert_eq!(SiftError::InvalidConfig("bad".to_string()).exit_code(), 2);
        assert_eq!(
            SiftError::Io(std::io::Error::other("disk")).exit_code(),
            3
        );
    }

    #[test]
    fn test_insufficient_results_message() {
        let err = SiftError::InsufficientResults {
            stage: Stage::Alive,
            found: 9,
            required: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient alive descriptors: found 9, required 10"
        );
    }
}
