//! Build-time configuration constants (spec §6).
//!
//! Registry capacities are const generics on `osal_core`'s types, so they
//! have to be actual `const`s rather than fields of a runtime value; these
//! match the reference sizes the cFE OSAL test harness uses.

/// Maximum concurrently-existing tasks.
pub const MAX_TASKS: usize = 32;
/// Maximum concurrently-existing queues.
pub const MAX_QUEUES: usize = 32;
/// Maximum concurrently-existing binary semaphores.
pub const MAX_BIN_SEMAPHORES: usize = 16;
/// Maximum concurrently-existing counting semaphores.
pub const MAX_COUNT_SEMAPHORES: usize = 16;
/// Maximum concurrently-existing mutexes.
pub const MAX_MUTEXES: usize = 16;
/// Maximum concurrently-existing timers.
pub const MAX_TIMERS: usize = 16;
/// Name buffer size, including the terminator the original C API reserved
/// one byte for; Rust `&str` names don't need the terminator byte, but the
/// limit itself (as a length bound) is kept identical so `NameTooLong`
/// triggers at the same length.
pub const MAX_API_NAME: usize = 32;

/// A runtime-readable snapshot of the compile-time capacities above, for
/// introspection (diagnostics, `GetInfo`-style reporting) by code that
/// doesn't want to depend on the `osal_core` const generics directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsalConfig {
    pub max_tasks: usize,
    pub max_queues: usize,
    pub max_bin_semaphores: usize,
    pub max_count_semaphores: usize,
    pub max_mutexes: usize,
    pub max_timers: usize,
    pub max_api_name: usize,
}

impl Default for OsalConfig {
    fn default() -> Self {
        OsalConfig {
            max_tasks: MAX_TASKS,
            max_queues: MAX_QUEUES,
            max_bin_semaphores: MAX_BIN_SEMAPHORES,
            max_count_semaphores: MAX_COUNT_SEMAPHORES,
            max_mutexes: MAX_MUTEXES,
            max_timers: MAX_TIMERS,
            max_api_name: MAX_API_NAME,
        }
    }
}
