//! Recursive mutex: tracks owner thread and recursion depth under a plain
//! `Mutex`, with a `Condvar` for contended waiters. Mirrors
//! `xSemaphoreCreateRecursiveMutex`, which lets the owning task relock
//! without deadlocking itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;

use osal_port::PortCreateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdMutexHandle(pub(crate) u64);

struct MutexState {
    owner: Option<ThreadId>,
    depth: u32,
}

struct MutexSlot {
    state: Mutex<MutexState>,
    released: Condvar,
}

#[derive(Default)]
pub(crate) struct MutexTable {
    next_id: AtomicU64,
    // `Arc`-wrapped so a blocked `lock` can drop the table lock before
    // parking on the slot's own condvar, rather than blocking every other
    // mutex's `unlock`/`create`/`destroy` for the duration of the wait.
    slots: Mutex<HashMap<u64, Arc<MutexSlot>>>,
}

impl MutexTable {
    pub(crate) fn create(&self) -> Result<StdMutexHandle, PortCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(MutexSlot {
            state: Mutex::new(MutexState {
                owner: None,
                depth: 0,
            }),
            released: Condvar::new(),
        });
        self.slots.lock().unwrap().insert(id, slot);
        Ok(StdMutexHandle(id))
    }

    pub(crate) fn destroy(&self, handle: StdMutexHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.remove(&handle.0) {
            slot.released.notify_all();
        }
    }

    fn slot(&self, handle: StdMutexHandle) -> Option<Arc<MutexSlot>> {
        self.slots.lock().unwrap().get(&handle.0).cloned()
    }

    pub(crate) fn lock(&self, handle: StdMutexHandle) {
        let slot = match self.slot(handle) {
            Some(slot) => slot,
            None => return,
        };
        let me = std::thread::current().id();
        let mut state = slot.state.lock().unwrap();
        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(_) => {
                    state = slot.released.wait(state).unwrap();
                }
            }
        }
    }

    pub(crate) fn unlock(&self, handle: StdMutexHandle) {
        let slot = match self.slot(handle) {
            Some(slot) => slot,
            None => return,
        };
        let me = std::thread::current().id();
        let mut state = slot.state.lock().unwrap();
        if state.owner != Some(me) {
            log::debug!("mutex_unlock called by non-owner thread, ignoring");
            return;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            slot.released.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_can_relock() {
        let table = MutexTable::default();
        let h = table.create().unwrap();
        table.lock(h);
        table.lock(h);
        table.unlock(h);
        table.unlock(h);
    }

    #[test]
    fn second_thread_blocks_until_release() {
        use std::sync::Arc;
        let table = Arc::new(MutexTable::default());
        let h = table.create().unwrap();
        table.lock(h);

        let t2 = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                table.lock(h);
                table.unlock(h);
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        table.unlock(h);
        t2.join().unwrap();
    }
}
