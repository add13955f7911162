//! Counting semaphore: `Mutex<u32>` count bounded by `max`, signaled by a
//! `Condvar`. Mirrors `xSemaphoreCreateCounting`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use osal_port::{PortCreateError, PortTimeout, PortWaitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdCountingSemHandle(pub(crate) u64);

struct SemSlot {
    max: u32,
    count: Mutex<u32>,
    available: Condvar,
}

#[derive(Default)]
pub(crate) struct CountingSemTable {
    next_id: AtomicU64,
    // `Arc`-wrapped so `wait` can release the table lock before parking on
    // the slot's own condvar, rather than blocking every other semaphore's
    // `post`/`create`/`destroy` for the duration of the wait.
    slots: Mutex<HashMap<u64, Arc<SemSlot>>>,
}

impl CountingSemTable {
    pub(crate) fn create(
        &self,
        initial: u32,
        max: u32,
    ) -> Result<StdCountingSemHandle, PortCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(SemSlot {
            max,
            count: Mutex::new(initial.min(max)),
            available: Condvar::new(),
        });
        self.slots.lock().unwrap().insert(id, slot);
        Ok(StdCountingSemHandle(id))
    }

    pub(crate) fn destroy(&self, handle: StdCountingSemHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.remove(&handle.0) {
            slot.available.notify_all();
        }
    }

    fn slot(&self, handle: StdCountingSemHandle) -> Option<Arc<SemSlot>> {
        self.slots.lock().unwrap().get(&handle.0).cloned()
    }

    pub(crate) fn post(&self, handle: StdCountingSemHandle) {
        if let Some(slot) = self.slot(handle) {
            let mut count = slot.count.lock().unwrap();
            if *count < slot.max {
                *count += 1;
            }
            slot.available.notify_one();
        }
    }

    pub(crate) fn wait(
        &self,
        handle: StdCountingSemHandle,
        timeout: PortTimeout,
    ) -> Result<(), PortWaitError> {
        let slot = self.slot(handle).ok_or(PortWaitError::WouldBlock)?;
        let mut count = slot.count.lock().unwrap();

        let deadline = match timeout {
            PortTimeout::Duration(d) => Some(Instant::now() + d),
            _ => None,
        };

        loop {
            if *count > 0 {
                *count -= 1;
                return Ok(());
            }
            match timeout {
                PortTimeout::NonBlocking => return Err(PortWaitError::WouldBlock),
                PortTimeout::Forever => {
                    count = slot.available.wait(count).unwrap();
                }
                PortTimeout::Duration(_) => {
                    let remaining = deadline.unwrap().saturating_duration_since(Instant::now());
                    if remaining == Duration::ZERO {
                        return Err(PortWaitError::Timeout);
                    }
                    let (guard, result) = slot.available.wait_timeout(count, remaining).unwrap();
                    count = guard;
                    if result.timed_out() && *count == 0 {
                        return Err(PortWaitError::Timeout);
                    }
                }
            }
        }
    }
}
