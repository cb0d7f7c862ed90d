/*!
 * System Limits and Constants
 *
 * Identifier bounds and other fixed values of the lifecycle kernel.
 * Linux-compatible values are marked with [LINUX-COMPAT]
 */

use super::types::Pid;

// =============================================================================
// PROCESS IDENTIFIERS
// =============================================================================

/// Reserved identifier, never handed out
/// Callers use it as a wildcard ("my process group") so it can't name a process
pub const PID_RESERVED: Pid = 0;

/// First identifier the allocator hands out
pub const PID_MIN: Pid = 1;

/// Default upper bound for process identifiers (inclusive)
/// [LINUX-COMPAT] Matches the classic 15-bit pid_max
pub const DEFAULT_PID_MAX: Pid = 32767;

/// Environment variable overriding the identifier bound
pub const PID_MAX_ENV: &str = "KERNEL_PID_MAX";

// =============================================================================
// OBSERVABILITY
// =============================================================================

/// Environment variable switching tracing output to JSON
pub const TRACE_JSON_ENV: &str = "KERNEL_TRACE_JSON";

/// Default tracing filter when RUST_LOG is unset
pub const DEFAULT_TRACE_FILTER: &str = "info";
