//! The narrow interface the object-table core consumes from an underlying
//! real-time kernel.
//!
//! [`Port`] is the seam named in the design: tasks, bounded queues, counting
//! semaphores, recursive mutexes, event groups, and one-shot timers, plus a
//! tick counter. `osal_core` is generic over `P: Port` and never talks to an
//! operating system directly. The only implementation shipped in this
//! workspace is `osal_port_std`, which plays the kernel's role with
//! `std::thread` and `std::sync`.

use std::fmt;
use std::time::Duration;

/// A bounded wait expressed the way every blocking OSAL operation expresses
/// it: forever, not at all, or up to a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortTimeout {
    Forever,
    NonBlocking,
    Duration(Duration),
}

/// Failure from a port-level create call. The core maps this to
/// `OsError::KernelFailure`; the port itself has no richer taxonomy because
/// the real kernel doesn't either (`xTaskCreate`/`xQueueCreate`/... return a
/// pass/fail `BaseType_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCreateError;

impl fmt::Display for PortCreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("port-level kernel object creation failed")
    }
}
impl std::error::Error for PortCreateError {}

/// Outcome of a bounded or unbounded wait on a port primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortWaitError {
    /// The bound expired before the condition was satisfied.
    Timeout,
    /// Non-blocking wait found the condition unsatisfied.
    WouldBlock,
}

/// Entry point handed to [`Port::task_spawn`]. Boxed because the core
/// doesn't know the concrete closure type a caller constructs it with.
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Callback invoked by the port's timer-service thread when a one-shot timer
/// expires. Re-arming (periodic re-dispatch) is the core's job, not the
/// port's — see `osal_core::timer`.
pub type TimerCallback = std::sync::Arc<dyn Fn() + Send + Sync + 'static>;

/// The kernel primitives the object-table core is built against.
///
/// Every method here has a direct counterpart in the FreeRTOS API the
/// original OSAL targets (`xTaskCreate`, `xQueueCreate`, `xSemaphoreCreateCounting`,
/// `xSemaphoreCreateRecursiveMutex`, `xEventGroupCreate`, `xTimerCreate`, ...).
/// `osal_core` calls these and nothing else to talk to "the kernel".
pub trait Port: Send + Sync + 'static {
    /// Opaque handle to a spawned task.
    type TaskHandle: Copy + Eq + Send + Sync + fmt::Debug;
    /// Opaque handle to a bounded FIFO queue.
    type QueueHandle: Copy + Eq + Send + Sync + fmt::Debug;
    /// Opaque handle to a counting semaphore.
    type CountingSemHandle: Copy + Eq + Send + Sync + fmt::Debug;
    /// Opaque handle to a recursive mutex.
    type MutexHandle: Copy + Eq + Send + Sync + fmt::Debug;
    /// Opaque handle to an event group (a small set/clear/wait bitmask).
    type EventGroupHandle: Copy + Eq + Send + Sync + fmt::Debug;
    /// Opaque handle to a one-shot timer.
    type TimerHandle: Copy + Eq + Send + Sync + fmt::Debug;

    /// The number of scheduler ticks per second. A build-time constant on a
    /// real kernel; a fixed value here is fine too, since a host simulation
    /// has no hardware tick source to vary.
    const TICKS_PER_SEC: u32;

    // ---- tasks ---------------------------------------------------------

    fn task_spawn(
        &self,
        name: &str,
        stack_size: u32,
        priority: u8,
        entry: TaskEntry,
    ) -> Result<Self::TaskHandle, PortCreateError>;

    /// Unconditionally terminate a task. No-op if it has already exited on
    /// its own.
    fn task_terminate(&self, handle: Self::TaskHandle);

    /// The handle of the calling task, if the calling thread was spawned by
    /// [`Port::task_spawn`]. `None` for the root/boot thread.
    fn task_current(&self) -> Option<Self::TaskHandle>;

    /// Per-task-local storage slot used by `TaskRegister`/`TaskGetId`. Absent
    /// until the current task calls [`Port::task_local_slot_set`].
    fn task_local_slot_get(&self) -> Option<u32>;
    fn task_local_slot_set(&self, id: u32);

    /// Block the calling task for the given duration (`OS_TaskDelay`).
    fn task_delay(&self, duration: Duration);

    // ---- queues ---------------------------------------------------------

    fn queue_create(
        &self,
        depth: usize,
        msg_size: usize,
    ) -> Result<Self::QueueHandle, PortCreateError>;
    fn queue_destroy(&self, handle: Self::QueueHandle);
    /// Non-blocking enqueue. `Err(PortWaitError::WouldBlock)` iff full.
    fn queue_send(&self, handle: Self::QueueHandle, msg: &[u8]) -> Result<(), PortWaitError>;
    /// Dequeue into `buf` (exactly `msg_size` bytes), honoring `timeout`.
    /// Returns the number of bytes written on success.
    fn queue_receive(
        &self,
        handle: Self::QueueHandle,
        buf: &mut [u8],
        timeout: PortTimeout,
    ) -> Result<usize, PortWaitError>;

    // ---- counting semaphore --------------------------------------------

    fn counting_sem_create(
        &self,
        initial: u32,
        max: u32,
    ) -> Result<Self::CountingSemHandle, PortCreateError>;
    fn counting_sem_destroy(&self, handle: Self::CountingSemHandle);
    fn counting_sem_post(&self, handle: Self::CountingSemHandle);
    fn counting_sem_wait(
        &self,
        handle: Self::CountingSemHandle,
        timeout: PortTimeout,
    ) -> Result<(), PortWaitError>;

    // ---- recursive mutex -------------------------------------------------

    fn mutex_create(&self) -> Result<Self::MutexHandle, PortCreateError>;
    fn mutex_destroy(&self, handle: Self::MutexHandle);
    /// Indefinite lock; the real kernel's recursive mutex permits the owner
    /// to relock without deadlocking.
    fn mutex_lock(&self, handle: Self::MutexHandle);
    fn mutex_unlock(&self, handle: Self::MutexHandle);

    // ---- event group -----------------------------------------------------

    fn event_group_create(&self) -> Result<Self::EventGroupHandle, PortCreateError>;
    fn event_group_destroy(&self, handle: Self::EventGroupHandle);
    fn event_group_set_bits(&self, handle: Self::EventGroupHandle, bits: u32);
    fn event_group_clear_bits(&self, handle: Self::EventGroupHandle, bits: u32);
    /// Wait for `mask` (any bit if `wait_all` is false, all bits if true).
    /// Never auto-clears on a satisfied wait — callers that want the bits
    /// cleared call [`Port::event_group_clear_bits`] themselves, matching
    /// the `auto-clear=false` contract in the port interface.
    fn event_group_wait_bits(
        &self,
        handle: Self::EventGroupHandle,
        mask: u32,
        wait_all: bool,
        timeout: PortTimeout,
    ) -> Result<u32, PortWaitError>;

    // ---- one-shot timer --------------------------------------------------

    /// Create a one-shot timer. The kernel rejects a zero period, so
    /// implementations start with a dummy non-zero period and leave the
    /// timer stopped, matching `xTimerCreate(..., pdMS_TO_TICKS(1000), ...)`.
    fn timer_create(&self, callback: TimerCallback) -> Result<Self::TimerHandle, PortCreateError>;
    fn timer_destroy(&self, handle: Self::TimerHandle);
    /// Reprogram the timer's period (in ticks) and (re)start it.
    fn timer_change_period_and_start(&self, handle: Self::TimerHandle, period_ticks: u32);
    fn timer_stop(&self, handle: Self::TimerHandle);

    // ---- clock ------------------------------------------------------------

    /// Monotonic tick count since port initialization.
    fn tick_count(&self) -> u64;
}

/// Convert a tick count to microseconds: `ticks * (1_000_000 / ticks_per_sec)`.
pub fn ticks_to_usecs(ticks: u64, ticks_per_sec: u32) -> u64 {
    let usecs_per_tick = 1_000_000 / u64::from(ticks_per_sec);
    ticks * usecs_per_tick
}

/// Convert microseconds to ticks, rounding up to at least 1 tick when
/// `usecs > 0`.
pub fn usecs_to_ticks(usecs: u64, ticks_per_sec: u32) -> u32 {
    let usecs_per_tick = 1_000_000 / u64::from(ticks_per_sec);
    if usecs == 0 {
        0
    } else if usecs < usecs_per_tick {
        1
    } else {
        (usecs / usecs_per_tick) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usecs_round_up_to_one_tick() {
        // 1000 ticks/sec => 1000 usecs/tick
        assert_eq!(usecs_to_ticks(1, 1000), 1);
        assert_eq!(usecs_to_ticks(999, 1000), 1);
        assert_eq!(usecs_to_ticks(0, 1000), 0);
    }

    #[test]
    fn usecs_floor_division_above_one_tick() {
        assert_eq!(usecs_to_ticks(2500, 1000), 2);
        assert_eq!(usecs_to_ticks(1000, 1000), 1);
    }

    #[test]
    fn ticks_to_usecs_matches_rate() {
        assert_eq!(ticks_to_usecs(5, 1000), 5000);
    }
}
