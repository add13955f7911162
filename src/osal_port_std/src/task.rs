//! Task primitives: a thin wrapper over `std::thread`.
//!
//! `std` gives us no safe way to preemptively stop a running thread (unlike
//! a real RTOS, which can yank a task off the ready queue at any point), so
//! [`StdPort::task_terminate`](crate::StdPort::task_terminate) can only mark
//! the task for cooperative exit and detach its join handle. Applications
//! that need prompt teardown should have their task entry points poll
//! [`StdPort::should_stop`].

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use osal_port::{PortCreateError, TaskEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdTaskHandle(pub(crate) u64);

pub(crate) struct TaskSlot {
    pub(crate) stop_requested: AtomicBool,
    pub(crate) join: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
pub(crate) struct TaskTable {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, Arc<TaskSlot>>>,
}

thread_local! {
    static CURRENT_TASK: Cell<Option<StdTaskHandle>> = const { Cell::new(None) };
    static REGISTERED_SLOT: Cell<Option<u32>> = const { Cell::new(None) };
}

impl TaskTable {
    pub(crate) fn spawn(
        &self,
        name: &str,
        entry: TaskEntry,
    ) -> Result<StdTaskHandle, PortCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = StdTaskHandle(id);
        let slot = Arc::new(TaskSlot {
            stop_requested: AtomicBool::new(false),
            join: Mutex::new(None),
        });

        let slot_for_thread = Arc::clone(&slot);
        let built = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                CURRENT_TASK.with(|c| c.set(Some(handle)));
                let _ = &slot_for_thread;
                entry();
            })
            .map_err(|_| PortCreateError)?;

        *slot.join.lock().unwrap() = Some(built);
        self.slots.lock().unwrap().insert(id, slot);
        log::trace!("task_spawn({name}) -> {handle:?}");
        Ok(handle)
    }

    pub(crate) fn terminate(&self, handle: StdTaskHandle) {
        if let Some(slot) = self.slots.lock().unwrap().remove(&handle.0) {
            slot.stop_requested.store(true, Ordering::Release);
            // We cannot forcibly stop a std::thread; detach the join handle
            // so the underlying OS thread is free to finish on its own.
            drop(slot.join.lock().unwrap().take());
        }
        log::trace!("task_terminate({handle:?})");
    }

    pub(crate) fn current(&self) -> Option<StdTaskHandle> {
        CURRENT_TASK.with(|c| c.get())
    }

    pub(crate) fn should_stop(&self, handle: StdTaskHandle) -> bool {
        self.slots
            .lock()
            .unwrap()
            .get(&handle.0)
            .map(|slot| slot.stop_requested.load(Ordering::Acquire))
            .unwrap_or(true)
    }
}

pub(crate) fn local_slot_get() -> Option<u32> {
    REGISTERED_SLOT.with(|c| c.get())
}

pub(crate) fn local_slot_set(id: u32) {
    REGISTERED_SLOT.with(|c| c.set(Some(id)));
}

pub(crate) fn delay(duration: Duration) {
    std::thread::sleep(duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn spawned_task_observes_its_own_handle() {
        let table = TaskTable::default();
        let (tx, rx) = mpsc::channel();
        let handle = table
            .spawn(
                "t",
                Box::new(move || {
                    tx.send(CURRENT_TASK.with(|c| c.get())).unwrap();
                }),
            )
            .unwrap();
        let observed = rx.recv().unwrap();
        assert_eq!(observed, Some(handle));
    }

    #[test]
    fn terminate_marks_stop_requested() {
        let table = TaskTable::default();
        let handle = table.spawn("t", Box::new(|| {})).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        table.terminate(handle);
        // The slot was removed, so should_stop conservatively reports true.
        assert!(table.should_stop(handle));
    }
}
