//! Local wall-clock time (spec's supplemental `OS_GetLocalTime`/
//! `OS_SetLocalTime`). The original stubs return success with no actual
//! effect, since the board they target has nothing to back a settable clock
//! with; a hosted target does have `std::time::SystemTime`, so these are
//! real implementations rather than stubs, offset-adjustable via
//! `set_local_time`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static OFFSET_NANOS: AtomicI64 = AtomicI64::new(0);

/// Current local time, `SystemTime::now()` adjusted by any offset installed
/// with [`set_local_time`].
pub fn get_local_time() -> SystemTime {
    let offset = OFFSET_NANOS.load(Ordering::Relaxed);
    let now = SystemTime::now();
    if offset >= 0 {
        now + Duration::from_nanos(offset as u64)
    } else {
        now - Duration::from_nanos((-offset) as u64)
    }
}

/// Install `time` as the current local time by recording the delta from the
/// real wall clock; subsequent [`get_local_time`] calls apply that delta.
pub fn set_local_time(time: SystemTime) {
    let now = SystemTime::now();
    let offset_nanos = match time.duration_since(now) {
        Ok(d) => d.as_nanos() as i64,
        Err(e) => -(e.duration().as_nanos() as i64),
    };
    OFFSET_NANOS.store(offset_nanos, Ordering::Relaxed);
}

/// Convenience: the offset-adjusted time as seconds since the Unix epoch.
pub fn get_local_time_unix_secs() -> u64 {
    get_local_time()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
