//! One-shot timer, simulated with a dedicated background thread per timer.
//!
//! `std` has no native one-shot-timer primitive, so each timer gets its own
//! worker parked on a `Condvar` until it is armed, stopped, or torn down.
//! `MAX_TIMERS` is small (see `osal_core::timer`), so a thread per timer is
//! cheap; a single shared timer-service thread (closer to FreeRTOS's one
//! timer task) would save threads at the cost of a priority-queue and is not
//! worth the complexity here.
//!
//! Re-arming a *periodic* timer is `osal_core`'s job: the callback handed to
//! [`TimerTable::create`] is whatever `osal_core::timer` gave us, and this
//! module only ever fires it once per arm/expire cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use osal_port::{PortCreateError, TimerCallback};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdTimerHandle(pub(crate) u64);

enum TimerState {
    Stopped,
    Armed(Instant),
    ShuttingDown,
}

struct TimerWorker {
    state: Mutex<TimerState>,
    cv: Condvar,
    callback: TimerCallback,
}

struct TimerSlot {
    worker: Arc<TimerWorker>,
    join: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
pub(crate) struct TimerTable {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, TimerSlot>>,
}

fn run_worker(worker: Arc<TimerWorker>) {
    let mut state = worker.state.lock().unwrap();
    loop {
        match *state {
            TimerState::ShuttingDown => return,
            TimerState::Stopped => {
                state = worker.cv.wait(state).unwrap();
            }
            TimerState::Armed(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    *state = TimerState::Stopped;
                    drop(state);
                    (worker.callback)();
                    state = worker.state.lock().unwrap();
                } else {
                    let (guard, _) = worker
                        .cv
                        .wait_timeout(state, deadline - now)
                        .unwrap();
                    state = guard;
                    // Re-check the deadline/state at the top of the loop:
                    // the wakeup may have been spurious or a reprogram.
                }
            }
        }
    }
}

impl TimerTable {
    pub(crate) fn create(
        &self,
        callback: TimerCallback,
    ) -> Result<StdTimerHandle, PortCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let worker = Arc::new(TimerWorker {
            state: Mutex::new(TimerState::Stopped),
            cv: Condvar::new(),
            callback,
        });
        let worker_for_thread = Arc::clone(&worker);
        let join = std::thread::Builder::new()
            .name(format!("osal-timer-{id}"))
            .spawn(move || run_worker(worker_for_thread))
            .map_err(|_| PortCreateError)?;
        self.slots.lock().unwrap().insert(
            id,
            TimerSlot {
                worker,
                join: Mutex::new(Some(join)),
            },
        );
        Ok(StdTimerHandle(id))
    }

    pub(crate) fn destroy(&self, handle: StdTimerHandle) {
        let slot = self.slots.lock().unwrap().remove(&handle.0);
        if let Some(slot) = slot {
            {
                let mut state = slot.worker.state.lock().unwrap();
                *state = TimerState::ShuttingDown;
                slot.worker.cv.notify_all();
            }
            if let Some(join) = slot.join.lock().unwrap().take() {
                // A timer destroying itself from inside its own callback
                // would deadlock here; the core never does this; it defers
                // destruction until outside the callback.
                let _ = join.join();
            }
        }
    }

    pub(crate) fn change_period_and_start(&self, handle: StdTimerHandle, period: Duration) {
        let slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get(&handle.0) {
            let mut state = slot.worker.state.lock().unwrap();
            *state = TimerState::Armed(Instant::now() + period);
            slot.worker.cv.notify_all();
        }
    }

    pub(crate) fn stop(&self, handle: StdTimerHandle) {
        let slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get(&handle.0) {
            let mut state = slot.worker.state.lock().unwrap();
            *state = TimerState::Stopped;
            slot.worker.cv.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn fires_once_after_period() {
        let table = TimerTable::default();
        let (tx, rx) = mpsc::channel();
        let cb: TimerCallback = Arc::new(move || {
            let _ = tx.send(());
        });
        let h = table.create(cb).unwrap();
        table.change_period_and_start(h, Duration::from_millis(15));
        rx.recv_timeout(Duration::from_millis(500)).unwrap();
        table.destroy(h);
    }

    #[test]
    fn stop_before_expiry_suppresses_callback() {
        let table = TimerTable::default();
        let (tx, rx) = mpsc::channel();
        let cb: TimerCallback = Arc::new(move || {
            let _ = tx.send(());
        });
        let h = table.create(cb).unwrap();
        table.change_period_and_start(h, Duration::from_millis(50));
        table.stop(h);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        table.destroy(h);
    }
}
