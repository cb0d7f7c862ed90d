/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type
pub type Pid = u32;

/// Exit status reported by a process on `exit` and handed to its waiter
pub type ExitCode = i32;
