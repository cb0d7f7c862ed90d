/*!
 * Syscalls Module
 * errno-style entry points for the process lifecycle
 */

pub mod executor;
pub mod types;

pub use executor::SyscallExecutor;
pub use types::SyscallResult;
