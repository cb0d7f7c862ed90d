/*!
 * Kernel Configuration
 *
 * Boot-time settings for the lifecycle kernel
 */

use super::errors::{KernelError, KernelResult};
use super::limits::{DEFAULT_PID_MAX, PID_MAX_ENV, PID_MIN};
use super::types::Pid;
use serde::{Deserialize, Serialize};

/// Lifecycle kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KernelConfig {
    /// Largest identifier the allocator may hand out (inclusive)
    pub pid_max: Pid,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pid_max: DEFAULT_PID_MAX,
        }
    }
}

impl KernelConfig {
    #[inline]
    #[must_use]
    pub const fn with_pid_max(mut self, pid_max: Pid) -> Self {
        self.pid_max = pid_max;
        self
    }

    /// Load configuration from the process environment
    ///
    /// Environment variables:
    /// - KERNEL_PID_MAX: identifier bound (default: 32767)
    pub fn from_env() -> KernelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> KernelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(PID_MAX_ENV) {
            config.pid_max = raw.trim().parse().map_err(|e| {
                KernelError::Configuration(format!("{PID_MAX_ENV}={raw:?} is not a valid pid: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject bounds the allocator can't honour
    pub fn validate(&self) -> KernelResult<()> {
        if self.pid_max < PID_MIN {
            return Err(KernelError::Configuration(format!(
                "pid_max must be at least {PID_MIN}, got {}",
                self.pid_max
            )));
        }
        // The high-water mark is kept one past the last allocation
        if self.pid_max == Pid::MAX {
            return Err(KernelError::Configuration(format!(
                "pid_max must be below {}",
                Pid::MAX
            )));
        }
        Ok(())
    }
}
