//! The OSAL error taxonomy.
//!
//! One enum for every operation in the crate, mirroring the `int32` return
//! codes of the original C API (see `OS_GetErrorName` in
//! `original_source/src/os/freertos/osapi.c`) but surfaced the idiomatic-Rust
//! way: every fallible call returns `Result<T, OsError>` instead of writing a
//! code into an out-parameter. `code()` recovers the legacy numeric value for
//! callers that need ABI parity; `Display`/`Error` give the human-readable
//! name the original looked up via a hand-written `switch`.

use thiserror::Error;

/// Every way an OSAL operation can fail.
///
/// Discriminants are stable across releases (§6: "Numeric error values are
/// part of the external contract"); `Success` is not a variant here because
/// success is modeled as `Ok(_)`, never as an `OsError` value — see
/// [`OsError::code`] for the zero value callers comparing against legacy
/// numeric codes expect.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OsError {
    #[error("OS_ERR_INVALID_POINTER")]
    InvalidPointer = -1,
    #[error("OS_ERR_INVALID_ID")]
    InvalidId = -2,
    #[error("OS_ERR_INVALID_PRIORITY")]
    InvalidPriority = -3,
    #[error("OS_ERR_INVALID_SEM_VALUE")]
    InvalidSemValue = -4,
    #[error("OS_ERR_NAME_TOO_LONG")]
    NameTooLong = -5,
    #[error("OS_ERR_NAME_TAKEN")]
    NameTaken = -6,
    #[error("OS_ERR_NAME_NOT_FOUND")]
    NameNotFound = -7,
    #[error("OS_ERR_NO_FREE_IDS")]
    NoFreeIds = -8,
    #[error("OS_ERR_SEM_FAILURE")]
    SemFailure = -9,
    #[error("OS_ERROR_TIMEOUT")]
    SemTimeout = -10,
    #[error("OS_ERR_QUEUE_EMPTY")]
    QueueEmpty = -11,
    #[error("OS_ERR_QUEUE_FULL")]
    QueueFull = -12,
    #[error("OS_ERR_QUEUE_TIMEOUT")]
    QueueTimeout = -13,
    #[error("OS_ERR_QUEUE_INVALID_SIZE")]
    QueueInvalidSize = -14,
    #[error("OS_ERR_TIMER_UNAVAILABLE")]
    TimerUnavailable = -15,
    #[error("OS_ERR_TIMER_INVALID_ARGS")]
    TimerInvalidArgs = -16,
    #[error("OS_ERR_TIMER_INTERNAL")]
    TimerInternal = -17,
    #[error("OS_ERR_NOT_IMPLEMENTED")]
    NotImplemented = -18,
    #[error("OS_ERROR")]
    KernelFailure = -19,
}

impl OsError {
    /// The legacy numeric error code, for callers translating against the
    /// original `int32` ABI (`OS_SUCCESS == 0`, every error kind negative).
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// The ASCII name the original `OS_GetErrorName` would have returned,
    /// identical to what [`std::fmt::Display`] renders.
    pub const fn name(self) -> &'static str {
        match self {
            OsError::InvalidPointer => "OS_ERR_INVALID_POINTER",
            OsError::InvalidId => "OS_ERR_INVALID_ID",
            OsError::InvalidPriority => "OS_ERR_INVALID_PRIORITY",
            OsError::InvalidSemValue => "OS_ERR_INVALID_SEM_VALUE",
            OsError::NameTooLong => "OS_ERR_NAME_TOO_LONG",
            OsError::NameTaken => "OS_ERR_NAME_TAKEN",
            OsError::NameNotFound => "OS_ERR_NAME_NOT_FOUND",
            OsError::NoFreeIds => "OS_ERR_NO_FREE_IDS",
            OsError::SemFailure => "OS_ERR_SEM_FAILURE",
            OsError::SemTimeout => "OS_ERROR_TIMEOUT",
            OsError::QueueEmpty => "OS_ERR_QUEUE_EMPTY",
            OsError::QueueFull => "OS_ERR_QUEUE_FULL",
            OsError::QueueTimeout => "OS_ERR_QUEUE_TIMEOUT",
            OsError::QueueInvalidSize => "OS_ERR_QUEUE_INVALID_SIZE",
            OsError::TimerUnavailable => "OS_ERR_TIMER_UNAVAILABLE",
            OsError::TimerInvalidArgs => "OS_ERR_TIMER_INVALID_ARGS",
            OsError::TimerInternal => "OS_ERR_TIMER_INTERNAL",
            OsError::NotImplemented => "OS_ERR_NOT_IMPLEMENTED",
            OsError::KernelFailure => "OS_ERROR",
        }
    }
}

/// The success code of the legacy numeric ABI, for symmetry with
/// [`OsError::code`]. Rust callers never see this directly — success is
/// `Ok(_)` — but it's useful when bridging to a numeric-return-code caller.
pub const OS_SUCCESS: i32 = 0;
