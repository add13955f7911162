//! Host simulation of the OSAL port interface.
//!
//! `StdPort` plays the role the real-time kernel plays on target hardware,
//! using only stable `std::thread` and `std::sync` primitives. It's the one
//! `Port` implementation this workspace ships; `osal_core` is written
//! against the trait, not against this crate, so swapping in a bare-metal
//! port later touches nothing above this layer.

mod event_group;
mod mutex;
mod queue;
mod sem;
mod task;
mod timer;

use std::time::{Duration, Instant};

use osal_port::{Port, PortCreateError, PortTimeout, PortWaitError, TaskEntry, TimerCallback};

pub use event_group::StdEventGroupHandle;
pub use mutex::StdMutexHandle;
pub use queue::StdQueueHandle;
pub use sem::StdCountingSemHandle;
pub use task::StdTaskHandle;
pub use timer::StdTimerHandle;

/// Ticks-per-second used by the host simulation. Arbitrary since there's no
/// real hardware tick source backing it; chosen to give microsecond
/// conversions comfortable headroom (1 ms ticks).
pub const TICKS_PER_SEC: u32 = 1000;

#[derive(Default)]
pub struct StdPort {
    tasks: task::TaskTable,
    queues: queue::QueueTable,
    counting_sems: sem::CountingSemTable,
    mutexes: mutex::MutexTable,
    event_groups: event_group::EventGroupTable,
    timers: timer::TimerTable,
    boot: std::sync::OnceLock<Instant>,
}

impl StdPort {
    pub fn new() -> Self {
        let port = Self::default();
        let _ = port.boot.set(Instant::now());
        port
    }

    /// Whether the task named by `handle` has been asked to stop. Tasks with
    /// long-running loops should poll this cooperatively, since the port
    /// cannot forcibly interrupt a running `std::thread`.
    pub fn should_stop(&self, handle: StdTaskHandle) -> bool {
        self.tasks.should_stop(handle)
    }
}

impl Port for StdPort {
    type TaskHandle = StdTaskHandle;
    type QueueHandle = StdQueueHandle;
    type CountingSemHandle = StdCountingSemHandle;
    type MutexHandle = StdMutexHandle;
    type EventGroupHandle = StdEventGroupHandle;
    type TimerHandle = StdTimerHandle;

    const TICKS_PER_SEC: u32 = TICKS_PER_SEC;

    fn task_spawn(
        &self,
        name: &str,
        _stack_size: u32,
        _priority: u8,
        entry: TaskEntry,
    ) -> Result<Self::TaskHandle, PortCreateError> {
        // std::thread has no priority knob and sizes its own stacks by
        // default; stack_size/priority are accepted for interface parity
        // with the kernel API and otherwise ignored here.
        self.tasks.spawn(name, entry)
    }

    fn task_terminate(&self, handle: Self::TaskHandle) {
        self.tasks.terminate(handle);
    }

    fn task_current(&self) -> Option<Self::TaskHandle> {
        self.tasks.current()
    }

    fn task_local_slot_get(&self) -> Option<u32> {
        task::local_slot_get()
    }

    fn task_local_slot_set(&self, id: u32) {
        task::local_slot_set(id);
    }

    fn task_delay(&self, duration: Duration) {
        task::delay(duration);
    }

    fn queue_create(
        &self,
        depth: usize,
        msg_size: usize,
    ) -> Result<Self::QueueHandle, PortCreateError> {
        self.queues.create(depth, msg_size)
    }

    fn queue_destroy(&self, handle: Self::QueueHandle) {
        self.queues.destroy(handle);
    }

    fn queue_send(&self, handle: Self::QueueHandle, msg: &[u8]) -> Result<(), PortWaitError> {
        self.queues.send(handle, msg)
    }

    fn queue_receive(
        &self,
        handle: Self::QueueHandle,
        buf: &mut [u8],
        timeout: PortTimeout,
    ) -> Result<usize, PortWaitError> {
        self.queues.receive(handle, buf, timeout)
    }

    fn counting_sem_create(
        &self,
        initial: u32,
        max: u32,
    ) -> Result<Self::CountingSemHandle, PortCreateError> {
        self.counting_sems.create(initial, max)
    }

    fn counting_sem_destroy(&self, handle: Self::CountingSemHandle) {
        self.counting_sems.destroy(handle);
    }

    fn counting_sem_post(&self, handle: Self::CountingSemHandle) {
        self.counting_sems.post(handle);
    }

    fn counting_sem_wait(
        &self,
        handle: Self::CountingSemHandle,
        timeout: PortTimeout,
    ) -> Result<(), PortWaitError> {
        self.counting_sems.wait(handle, timeout)
    }

    fn mutex_create(&self) -> Result<Self::MutexHandle, PortCreateError> {
        self.mutexes.create()
    }

    fn mutex_destroy(&self, handle: Self::MutexHandle) {
        self.mutexes.destroy(handle);
    }

    fn mutex_lock(&self, handle: Self::MutexHandle) {
        self.mutexes.lock(handle);
    }

    fn mutex_unlock(&self, handle: Self::MutexHandle) {
        self.mutexes.unlock(handle);
    }

    fn event_group_create(&self) -> Result<Self::EventGroupHandle, PortCreateError> {
        self.event_groups.create()
    }

    fn event_group_destroy(&self, handle: Self::EventGroupHandle) {
        self.event_groups.destroy(handle);
    }

    fn event_group_set_bits(&self, handle: Self::EventGroupHandle, bits: u32) {
        self.event_groups.set_bits(handle, bits);
    }

    fn event_group_clear_bits(&self, handle: Self::EventGroupHandle, bits: u32) {
        self.event_groups.clear_bits(handle, bits);
    }

    fn event_group_wait_bits(
        &self,
        handle: Self::EventGroupHandle,
        mask: u32,
        wait_all: bool,
        timeout: PortTimeout,
    ) -> Result<u32, PortWaitError> {
        self.event_groups.wait_bits(handle, mask, wait_all, timeout)
    }

    fn timer_create(&self, callback: TimerCallback) -> Result<Self::TimerHandle, PortCreateError> {
        self.timers.create(callback)
    }

    fn timer_destroy(&self, handle: Self::TimerHandle) {
        self.timers.destroy(handle);
    }

    fn timer_change_period_and_start(&self, handle: Self::TimerHandle, period_ticks: u32) {
        let usecs = osal_port::ticks_to_usecs(u64::from(period_ticks), Self::TICKS_PER_SEC);
        self.timers
            .change_period_and_start(handle, Duration::from_micros(usecs));
    }

    fn timer_stop(&self, handle: Self::TimerHandle) {
        self.timers.stop(handle);
    }

    fn tick_count(&self) -> u64 {
        let boot = *self.boot.get_or_init(Instant::now);
        let elapsed = Instant::now().saturating_duration_since(boot);
        (elapsed.as_micros() as u64 * u64::from(Self::TICKS_PER_SEC)) / 1_000_000
    }
}
