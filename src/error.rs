/*!
 * Error Handling for the Key Management Core
 *
 * Provides the error type shared by the registries, the lifecycle operations
 * and the boundary layer, together with numeric error codes, the negative
 * result codes surfaced across the trust boundary, user-friendly messages and
 * suggested remediation.
 */

use thiserror::Error;

use crate::registry::Descriptor;

/// Error type for all key-object operations
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("{object} descriptor {descriptor} not found")]
    NotFound {
        object: &'static str,
        descriptor: Descriptor,
        error_code: u32,
    },

    #[error("Invalid parameter: {parameter} - {expected} - got {actual}")]
    InvalidParameter {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Resource exhaustion: {resource} - limit {limit}")]
    ResourceExhaustion {
        resource: String,
        limit: usize,
        error_code: u32,
    },

    #[error("Memory operation failed: {operation} - {cause}")]
    MemoryError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Operation not supported: {operation}")]
    UnsupportedOperation { operation: String, error_code: u32 },

    #[error("Bad address while copying {direction} for {operation}")]
    BadAddress {
        operation: String,
        direction: &'static str,
        error_code: u32,
    },

    #[error("Random number generation failed: {cause}")]
    RandomGenerationError { cause: String, error_code: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Registry errors: 1000-1999
    pub const KEY_NOT_FOUND: u32 = 1001;
    pub const DATA_NOT_FOUND: u32 = 1002;
    pub const KEY_LIMIT_EXCEEDED: u32 = 1003;
    pub const DATA_LIMIT_EXCEEDED: u32 = 1004;
    pub const DESCRIPTORS_EXHAUSTED: u32 = 1005;

    // Parameter errors: 2000-2999
    pub const INVALID_KEY_TYPE: u32 = 2001;
    pub const INVALID_KEY_SIZE: u32 = 2002;
    pub const INVALID_KEY_ID_SIZE: u32 = 2003;
    pub const INSUFFICIENT_CAPACITY: u32 = 2004;
    pub const INVALID_ALGORITHM: u32 = 2005;
    pub const INVALID_PARAMETER: u32 = 2999;

    // Unsupported operations: 3000-3999
    pub const ASYMMETRIC_UNSUPPORTED: u32 = 3001;

    // Memory errors: 4000-4999
    pub const MEMORY_ALLOCATION_FAILED: u32 = 4001;

    // Boundary errors: 5000-5999
    pub const COPY_FROM_USER_FAILED: u32 = 5001;
    pub const COPY_TO_USER_FAILED: u32 = 5002;

    // Randomness errors: 6000-6999
    pub const RANDOM_SOURCE_FAILED: u32 = 6001;

    // Configuration errors: 9000-9999
    pub const CONFIG_INVALID: u32 = 9001;
}

impl KeyError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            KeyError::NotFound { error_code, .. } => *error_code,
            KeyError::InvalidParameter { error_code, .. } => *error_code,
            KeyError::ResourceExhaustion { error_code, .. } => *error_code,
            KeyError::MemoryError { error_code, .. } => *error_code,
            KeyError::UnsupportedOperation { error_code, .. } => *error_code,
            KeyError::BadAddress { error_code, .. } => *error_code,
            KeyError::RandomGenerationError { error_code, .. } => *error_code,
            KeyError::ConfigError(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Negative errno reported to the far side of the trust boundary
    pub fn result_code(&self) -> i32 {
        let errno = match self {
            KeyError::NotFound { .. } => libc::ENOENT,
            KeyError::InvalidParameter { .. } => libc::EINVAL,
            KeyError::ResourceExhaustion { .. } => libc::EDQUOT,
            KeyError::MemoryError { .. } => libc::ENOMEM,
            KeyError::UnsupportedOperation { .. } => libc::EOPNOTSUPP,
            KeyError::BadAddress { .. } => libc::EFAULT,
            KeyError::RandomGenerationError { .. } => libc::EIO,
            KeyError::ConfigError(_) => libc::EINVAL,
        };
        -errno
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            KeyError::NotFound {
                object, descriptor, ..
            } => format!(
                "No {} with descriptor {} exists in this session.",
                object, descriptor
            ),
            KeyError::InvalidParameter {
                parameter,
                expected,
                ..
            } => format!(
                "Invalid parameter '{}'. Expected {}.",
                parameter, expected
            ),
            KeyError::ResourceExhaustion { resource, limit, .. } => format!(
                "Too many {} objects are open for this session (limit {}).",
                resource, limit
            ),
            KeyError::MemoryError { operation, .. } => format!(
                "Memory operation '{}' failed. System may be low on memory.",
                operation
            ),
            KeyError::UnsupportedOperation { operation, .. } => format!(
                "Operation '{}' is not supported by this key subsystem.",
                operation
            ),
            KeyError::BadAddress { operation, .. } => format!(
                "The request buffer for '{}' could not be accessed.",
                operation
            ),
            KeyError::RandomGenerationError { .. } => {
                "Random number generation failed. Key material was not generated.".to_string()
            }
            KeyError::ConfigError(_) => {
                "The key store configuration is invalid.".to_string()
            }
        }
    }

    /// Get suggested remediation steps
    pub fn suggested_remediation(&self) -> Option<String> {
        match self {
            KeyError::NotFound { .. } => Some(
                "Check that the descriptor was created in this session and not yet destroyed."
                    .to_string(),
            ),
            KeyError::InvalidParameter { error_code, .. } => match *error_code {
                error_codes::INVALID_KEY_SIZE => Some(
                    "Use a key size that is a multiple of 8 bits and at most 256 bits.".to_string(),
                ),
                error_codes::INSUFFICIENT_CAPACITY => {
                    Some("Create a data item large enough to hold the key.".to_string())
                }
                error_codes::INVALID_KEY_TYPE => {
                    Some("Only secret (symmetric) keys are supported.".to_string())
                }
                _ => None,
            },
            KeyError::ResourceExhaustion { .. } => {
                Some("Destroy unused objects before creating new ones.".to_string())
            }
            KeyError::UnsupportedOperation { .. } => Some(
                "Public-key operations are not available; use secret keys instead.".to_string(),
            ),
            KeyError::RandomGenerationError { .. } => {
                Some("Check system entropy sources.".to_string())
            }
            _ => None,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            KeyError::NotFound { .. } => "NotFound",
            KeyError::InvalidParameter { .. } => "InvalidParameter",
            KeyError::ResourceExhaustion { .. } => "ResourceExhaustion",
            KeyError::MemoryError { .. } => "MemoryError",
            KeyError::UnsupportedOperation { .. } => "UnsupportedOperation",
            KeyError::BadAddress { .. } => "BadAddress",
            KeyError::RandomGenerationError { .. } => "RandomGenerationError",
            KeyError::ConfigError(_) => "ConfigError",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KeyError::NotFound { .. })
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, KeyError::InvalidParameter { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, KeyError::UnsupportedOperation { .. })
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, KeyError::ResourceExhaustion { .. })
    }
}

/// Convenience constructors for common error types
impl KeyError {
    pub fn not_found(object: &'static str, descriptor: Descriptor, error_code: u32) -> Self {
        KeyError::NotFound {
            object,
            descriptor,
            error_code,
        }
    }

    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str) -> Self {
        Self::invalid_parameter_with_code(
            parameter,
            expected,
            actual,
            error_codes::INVALID_PARAMETER,
        )
    }

    pub fn invalid_parameter_with_code(
        parameter: &str,
        expected: &str,
        actual: &str,
        error_code: u32,
    ) -> Self {
        KeyError::InvalidParameter {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code,
        }
    }

    pub fn resource_exhaustion(resource: &str, limit: usize, error_code: u32) -> Self {
        KeyError::ResourceExhaustion {
            resource: resource.to_string(),
            limit,
            error_code,
        }
    }

    pub fn memory_error(operation: &str, cause: &str) -> Self {
        KeyError::MemoryError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::MEMORY_ALLOCATION_FAILED,
        }
    }

    pub fn unsupported(operation: &str) -> Self {
        KeyError::UnsupportedOperation {
            operation: operation.to_string(),
            error_code: error_codes::ASYMMETRIC_UNSUPPORTED,
        }
    }

    pub fn bad_address(operation: &str, direction: &'static str, error_code: u32) -> Self {
        KeyError::BadAddress {
            operation: operation.to_string(),
            direction,
            error_code,
        }
    }

    pub fn random_error(cause: &str) -> Self {
        KeyError::RandomGenerationError {
            cause: cause.to_string(),
            error_code: error_codes::RANDOM_SOURCE_FAILED,
        }
    }
}

impl From<std::io::Error> for KeyError {
    fn from(err: std::io::Error) -> Self {
        KeyError::ConfigError(format!("IO operation failed: {}", err))
    }
}

impl From<serde_json::Error> for KeyError {
    fn from(err: serde_json::Error) -> Self {
        KeyError::ConfigError(format!("Malformed configuration: {}", err))
    }
}

impl From<std::collections::TryReserveError> for KeyError {
    fn from(err: std::collections::TryReserveError) -> Self {
        KeyError::memory_error("reserve", &err.to_string())
    }
}

/// Result type alias for key-object operations
pub type KeyResult<T> = Result<T, KeyError>;
