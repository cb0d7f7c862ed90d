/*!
 * Syscall Types
 * Result type handed back across the user/kernel boundary
 */

use crate::core::errors::ProcessError;
use serde::{Deserialize, Serialize};

/// System call result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SyscallResult {
    /// Successful call with its return register value
    Success { value: i64 },
    /// Failed call with errno and a human-readable message
    Error { errno: i32, message: String },
}

impl SyscallResult {
    #[inline]
    #[must_use]
    pub fn success(value: impl Into<i64>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn error(errno: i32, message: impl Into<String>) -> Self {
        Self::Error {
            errno,
            message: message.into(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> Option<i64> {
        match self {
            Self::Success { value } => Some(*value),
            Self::Error { .. } => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn errno(&self) -> Option<i32> {
        match self {
            Self::Success { .. } => None,
            Self::Error { errno, .. } => Some(*errno),
        }
    }
}

impl From<ProcessError> for SyscallResult {
    fn from(err: ProcessError) -> Self {
        Self::Error {
            errno: err.errno(),
            message: err.to_string(),
        }
    }
}
