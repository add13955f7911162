//! The application-facing OSAL facade.
//!
//! `Osal` wires `osal_core`'s six registries together over a single
//! [`osal_port::Port`] instance — by default [`osal_port_std::StdPort`], the
//! host simulation this workspace ships. Applications depend on this crate
//! alone; swapping in a bare-metal port later means instantiating `Osal`
//! over a different `P`, untouched above this layer.

pub mod config;
pub mod fpu;
pub mod heap;
pub mod time;
pub mod timebase;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use osal_core::{
    BinSemRegistry, CountSemRegistry, MutexRegistry, QueueRegistry, TaskRegistry, TimerRegistry,
};
pub use osal_core::{
    BinSemInfo, OsError, QueueTimeout, TaskInfo, TimerInfo, UserTimerCallback, UNKNOWN_CREATOR,
    UNREGISTERED_TASK_ID,
};
use osal_port::{Port, TaskEntry};
use osal_port_std::StdPort;

use config::{MAX_BIN_SEMAPHORES, MAX_COUNT_SEMAPHORES, MAX_MUTEXES, MAX_QUEUES, MAX_TASKS, MAX_TIMERS};

/// Name of the internal binary semaphore [`Osal::idle_loop`] blocks on,
/// release by [`Osal::application_shutdown`] (spec §4.7).
const SHUTDOWN_SEM_NAME: &str = "__osal_shutdown__";

/// The portable OSAL surface, generic over the kernel port. Defaults to the
/// host simulation ([`StdPort`]) so application code can write `Osal` rather
/// than `Osal<StdPort>` in the common case.
pub struct Osal<P: Port = StdPort> {
    port: Arc<P>,
    tasks: TaskRegistry<P, MAX_TASKS>,
    queues: QueueRegistry<P, MAX_QUEUES>,
    binsems: BinSemRegistry<P, MAX_BIN_SEMAPHORES>,
    countsems: CountSemRegistry<P, MAX_COUNT_SEMAPHORES>,
    mutexes: MutexRegistry<P, MAX_MUTEXES>,
    timers: TimerRegistry<P, MAX_TIMERS>,
    shutdown_sem_id: u32,
    exit_status: AtomicI32,
    shutting_down: AtomicBool,
}

impl Osal<StdPort> {
    /// Boot the API over the host-simulation port: allocates every
    /// registry and the internal shutdown semaphore. Mirrors the original
    /// API-init routine that must run before any application task spawns.
    pub fn new() -> Self {
        Self::with_port(Arc::new(StdPort::new()))
    }
}

impl Default for Osal<StdPort> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> Osal<P> {
    pub fn with_port(port: Arc<P>) -> Self {
        let tasks = TaskRegistry::new(Arc::clone(&port), config::MAX_API_NAME);
        let queues = QueueRegistry::new(Arc::clone(&port), config::MAX_API_NAME);
        let binsems = BinSemRegistry::new(Arc::clone(&port), config::MAX_API_NAME);
        let countsems = CountSemRegistry::new(Arc::clone(&port), config::MAX_API_NAME);
        let mutexes = MutexRegistry::new(Arc::clone(&port), config::MAX_API_NAME);
        let timers = TimerRegistry::new(Arc::clone(&port), config::MAX_API_NAME);

        let shutdown_sem_id = binsems
            .create(SHUTDOWN_SEM_NAME, 0, UNKNOWN_CREATOR)
            .expect("the shutdown semaphore is the first binary semaphore created");

        Osal {
            port,
            tasks,
            queues,
            binsems,
            countsems,
            mutexes,
            timers,
            shutdown_sem_id,
            exit_status: AtomicI32::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> config::OsalConfig {
        config::OsalConfig::default()
    }

    // ---- tasks ----------------------------------------------------------

    pub fn task_create(
        &self,
        name: &str,
        entry: TaskEntry,
        stack_size: u32,
        priority: u8,
    ) -> Result<u32, OsError> {
        self.tasks.create(name, stack_size, priority, entry)
    }

    pub fn task_delete(&self, id: u32) -> Result<(), OsError> {
        self.tasks.delete(id)
    }

    pub fn task_exit(&self) -> Result<(), OsError> {
        self.tasks.exit()
    }

    pub fn task_set_priority(&self, id: u32, priority: u8) -> Result<(), OsError> {
        self.tasks.set_priority(id, priority)
    }

    pub fn task_register(&self) -> Result<(), OsError> {
        self.tasks.register()
    }

    pub fn task_get_id(&self) -> u32 {
        self.tasks.get_id()
    }

    pub fn task_install_delete_hook(&self, hook: Box<dyn FnMut() + Send>) -> Result<(), OsError> {
        self.tasks.install_delete_hook(hook)
    }

    pub fn task_get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.tasks.get_id_by_name(name)
    }

    pub fn task_get_info(&self, id: u32) -> Result<TaskInfo, OsError> {
        self.tasks.get_info(id)
    }

    pub fn task_delay_ms(&self, ms: u32) {
        self.port
            .task_delay(std::time::Duration::from_millis(u64::from(ms)));
    }

    // ---- queues -----------------------------------------------------------

    pub fn queue_create(&self, name: &str, depth: usize, msg_size: usize) -> Result<u32, OsError> {
        self.queues
            .create(name, depth, msg_size, self.tasks.get_id())
    }

    pub fn queue_delete(&self, id: u32) -> Result<(), OsError> {
        self.queues.delete(id)
    }

    pub fn queue_put(&self, id: u32, msg: &[u8]) -> Result<(), OsError> {
        self.queues.put(id, msg)
    }

    pub fn queue_get(&self, id: u32, buf: &mut [u8], timeout: QueueTimeout) -> Result<usize, OsError> {
        self.queues.get(id, buf, timeout)
    }

    pub fn queue_get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.queues.get_id_by_name(name)
    }

    // ---- binary semaphores ------------------------------------------------

    pub fn bin_sem_create(&self, name: &str, initial: u32) -> Result<u32, OsError> {
        self.binsems.create(name, initial, self.tasks.get_id())
    }

    pub fn bin_sem_delete(&self, id: u32) -> Result<(), OsError> {
        self.binsems.delete(id)
    }

    pub fn bin_sem_give(&self, id: u32) -> Result<(), OsError> {
        self.binsems.give(id)
    }

    pub fn bin_sem_take(&self, id: u32) -> Result<(), OsError> {
        self.binsems.take(id)
    }

    pub fn bin_sem_timed_take(&self, id: u32, msecs: u32) -> Result<(), OsError> {
        self.binsems.timed_take(id, msecs)
    }

    pub fn bin_sem_flush(&self, id: u32) -> Result<(), OsError> {
        self.binsems.flush(id)
    }

    pub fn bin_sem_get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.binsems.get_id_by_name(name)
    }

    pub fn bin_sem_get_info(&self, id: u32) -> Result<BinSemInfo, OsError> {
        self.binsems.get_info(id)
    }

    // ---- counting semaphores -----------------------------------------------

    pub fn count_sem_create(&self, name: &str, initial: u32) -> Result<u32, OsError> {
        self.countsems.create(name, initial, self.tasks.get_id())
    }

    pub fn count_sem_delete(&self, id: u32) -> Result<(), OsError> {
        self.countsems.delete(id)
    }

    pub fn count_sem_give(&self, id: u32) -> Result<(), OsError> {
        self.countsems.give(id)
    }

    pub fn count_sem_take(&self, id: u32) -> Result<(), OsError> {
        self.countsems.take(id)
    }

    pub fn count_sem_timed_take(&self, id: u32, msecs: u32) -> Result<(), OsError> {
        self.countsems.timed_take(id, msecs)
    }

    pub fn count_sem_get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.countsems.get_id_by_name(name)
    }

    // ---- mutexes ------------------------------------------------------------

    pub fn mutex_create(&self, name: &str) -> Result<u32, OsError> {
        self.mutexes.create(name, self.tasks.get_id())
    }

    pub fn mutex_delete(&self, id: u32) -> Result<(), OsError> {
        self.mutexes.delete(id)
    }

    pub fn mutex_lock(&self, id: u32) -> Result<(), OsError> {
        self.mutexes.lock(id)
    }

    pub fn mutex_unlock(&self, id: u32) -> Result<(), OsError> {
        self.mutexes.unlock(id)
    }

    pub fn mutex_get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.mutexes.get_id_by_name(name)
    }

    // ---- timers -------------------------------------------------------------

    pub fn timer_create(&self, name: &str, callback: UserTimerCallback) -> Result<(u32, u32), OsError> {
        self.timers.create(name, self.tasks.get_id(), callback)
    }

    pub fn timer_set(&self, id: u32, start_us: u32, interval_us: u32) -> Result<(), OsError> {
        self.timers.set(id, start_us, interval_us)
    }

    pub fn timer_delete(&self, id: u32) -> Result<(), OsError> {
        self.timers.delete(id)
    }

    pub fn timer_get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.timers.get_id_by_name(name)
    }

    pub fn timer_get_info(&self, id: u32) -> Result<TimerInfo, OsError> {
        self.timers.get_info(id)
    }

    // ---- clock ----------------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.port.tick_count()
    }

    // ---- boot, idle, shutdown (spec §4.7) --------------------------------------

    /// Run the application: call `startup` (which should register tasks and
    /// return), then block in the idle loop until
    /// [`Osal::application_shutdown`] or [`Osal::application_exit`] fires.
    /// Returns the process exit status.
    pub fn run(self: Arc<Self>, startup: impl FnOnce(&Arc<Self>)) -> i32 {
        startup(&self);
        self.idle_loop();
        self.exit_status.load(Ordering::Acquire)
    }

    /// Blocks indefinitely on the internal shutdown semaphore (spec §4.7).
    pub fn idle_loop(&self) {
        log::debug!("idle_loop: blocking for shutdown");
        // Only `ApplicationShutdown` releases this; `ApplicationExit`
        // terminates the process directly and never returns here.
        let _ = self.binsems.take(self.shutdown_sem_id);
        log::debug!("idle_loop: returning after shutdown");
    }

    /// Releases the idle loop with the given exit status (0 == success).
    pub fn application_shutdown(&self, status: i32) {
        self.shutting_down.store(true, Ordering::Release);
        self.exit_status.store(status, Ordering::Release);
        let _ = self.binsems.give(self.shutdown_sem_id);
    }

    /// Stops the scheduler and terminates the process immediately; status
    /// `0` exits `0`, any other status exits non-zero. Unlike
    /// `application_shutdown`, this never returns to the idle loop.
    pub fn application_exit(status: i32) -> ! {
        std::process::exit(if status == 0 { 0 } else { 1 });
    }

    /// Iterates every registry and deletes each allocated slot; tolerant of
    /// slots freed concurrently (ignores `InvalidId`).
    pub fn delete_all_objects(&self) {
        for id in self.tasks.allocated_ids() {
            let _ = self.tasks.delete(id as u32);
        }
        for id in self.queues.allocated_ids() {
            let _ = self.queues.delete(id as u32);
        }
        for id in self.binsems.allocated_ids() {
            if id as u32 == self.shutdown_sem_id {
                continue;
            }
            let _ = self.binsems.delete(id as u32);
        }
        for id in self.countsems.allocated_ids() {
            let _ = self.countsems.delete(id as u32);
        }
        for id in self.mutexes.allocated_ids() {
            let _ = self.mutexes.delete(id as u32);
        }
        for id in self.timers.allocated_ids() {
            let _ = self.timers.delete(id as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn scenario_1_task_create_duplicate_name() {
        let osal = Osal::new();
        let id = osal.task_create("A", Box::new(|| {}), 1024, 100).unwrap();
        assert_eq!(id, 0);
        assert_eq!(
            osal.task_create("A", Box::new(|| {}), 1024, 100),
            Err(OsError::NameTaken)
        );
        assert_eq!(osal.task_get_id_by_name("A").unwrap(), 0);
    }

    #[test]
    fn scenario_6_idle_loop_and_shutdown() {
        let osal = Arc::new(Osal::new());
        let osal2 = Arc::clone(&osal);
        let idle = std::thread::spawn(move || osal2.idle_loop());
        std::thread::sleep(Duration::from_millis(20));
        osal.application_shutdown(0);
        idle.join().unwrap();
    }

    #[test]
    fn scenario_4_binary_semaphore_flush() {
        let osal = Arc::new(Osal::new());
        let s = osal.bin_sem_create("S", 0).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let osal2 = Arc::clone(&osal);
            let tx = tx.clone();
            waiters.push(std::thread::spawn(move || {
                osal2.bin_sem_take(s).unwrap();
                tx.send(()).unwrap();
            }));
        }
        std::thread::sleep(Duration::from_millis(30));
        osal.bin_sem_flush(s).unwrap();
        for _ in 0..3 {
            rx.recv_timeout(Duration::from_millis(200)).unwrap();
        }
        for w in waiters {
            w.join().unwrap();
        }
        assert_eq!(osal.bin_sem_get_info(s).unwrap().current_value, 0);
    }

    #[test]
    fn delete_all_objects_tolerates_mixed_state() {
        let osal = Osal::new();
        osal.task_create("A", Box::new(|| {}), 1024, 100).unwrap();
        osal.queue_create("Q", 2, 8).unwrap();
        osal.bin_sem_create("S", 0).unwrap();
        osal.delete_all_objects();
        assert_eq!(osal.task_get_id_by_name("A"), Err(OsError::NameNotFound));
        assert_eq!(osal.queue_get_id_by_name("Q"), Err(OsError::NameNotFound));
        assert_eq!(osal.bin_sem_get_id_by_name("S"), Err(OsError::NameNotFound));
    }
}
