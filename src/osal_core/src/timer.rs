//! Timer registry (spec §4.6): periodic software timers layered over a
//! kernel one-shot timer.
//!
//! The kernel only offers one-shot timers, so a period is obtained by having
//! the expiry trampoline reprogram and restart the kernel timer itself
//! whenever the interval is nonzero (`Set(s, 0)` means fire once and go
//! quiet until the next `Set`). The trampoline takes the registry lock to
//! check the slot is still allocated before dispatching — the fix spec §9
//! calls out for the "periodic-timer race": a `Delete` that frees the slot
//! between kernel expiry and trampoline entry must suppress the callback.

use std::sync::Arc;

use osal_port::{Port, TimerCallback};

use crate::error::OsError;
use crate::registry::{Named, Registry};

pub type UserTimerCallback = Arc<dyn Fn(u32) + Send + Sync>;

struct TimerSlot<P: Port> {
    name: String,
    handle: P::TimerHandle,
    creator: u32,
    start_us: u32,
    interval_us: u32,
    accuracy_us: u32,
    callback: UserTimerCallback,
}

impl<P: Port> Named for TimerSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone)]
pub struct TimerInfo {
    pub name: String,
    pub creator: u32,
    pub start_us: u32,
    pub interval_us: u32,
    pub accuracy_us: u32,
}

/// The part of the registry a running trampoline needs a stable handle to;
/// split out so `create` can build the trampoline closure before the slot
/// (and its kernel handle) exist.
struct TimerCore<P: Port, const N: usize> {
    port: Arc<P>,
    inner: Registry<TimerSlot<P>, N>,
}

impl<P: Port, const N: usize> TimerCore<P, N> {
    fn trampoline(&self, id: usize) {
        let dispatch = self
            .inner
            .with_allocated_ref(id, |s| (Arc::clone(&s.callback), s.interval_us));
        let (callback, interval_us) = match dispatch {
            Ok(v) => v,
            Err(_) => {
                log::trace!("timer trampoline {id}: slot freed, skipping dispatch");
                return;
            }
        };

        callback(id as u32);

        if interval_us > 0 {
            // Re-read the handle after the callback ran: `Delete` or a
            // fresh `Set` may have happened from inside the callback or a
            // racing task.
            if let Ok(handle) = self.inner.with_allocated_ref(id, |s| s.handle) {
                let ticks = osal_port::usecs_to_ticks(u64::from(interval_us), P::TICKS_PER_SEC);
                self.port.timer_change_period_and_start(handle, ticks);
            }
        }
    }
}

pub struct TimerRegistry<P: Port, const N: usize> {
    core: Arc<TimerCore<P, N>>,
    max_name_len: usize,
}

impl<P: Port, const N: usize> TimerRegistry<P, N> {
    pub fn new(port: Arc<P>, max_name_len: usize) -> Self {
        TimerRegistry {
            core: Arc::new(TimerCore {
                port,
                inner: Registry::new(),
            }),
            max_name_len,
        }
    }

    fn accuracy_us(&self) -> u32 {
        osal_port::ticks_to_usecs(1, P::TICKS_PER_SEC) as u32
    }

    /// Create (spec §4.6 step 1): allocates a slot and a stopped kernel
    /// one-shot timer. Returns `(id, accuracy_us)`.
    pub fn create(
        &self,
        name: &str,
        creator: u32,
        callback: UserTimerCallback,
    ) -> Result<(u32, u32), OsError> {
        if name.len() >= self.max_name_len {
            return Err(OsError::NameTooLong);
        }
        let id = self.core.inner.reserve_by_name(name)?;
        let accuracy_us = self.accuracy_us();

        let core_for_trampoline = Arc::clone(&self.core);
        let trampoline: TimerCallback = Arc::new(move || core_for_trampoline.trampoline(id));

        let handle = match self.core.port.timer_create(trampoline) {
            Ok(handle) => handle,
            Err(_) => {
                self.core.inner.rollback(id);
                return Err(OsError::TimerUnavailable);
            }
        };

        self.core.inner.commit(
            id,
            TimerSlot {
                name: name.to_owned(),
                handle,
                creator,
                start_us: 0,
                interval_us: 0,
                accuracy_us,
                callback,
            },
        );
        log::debug!("timer_create({name:?}) -> {id}, accuracy={accuracy_us}us");
        Ok((id as u32, accuracy_us))
    }

    /// Set (spec §4.6 step 2): round sub-accuracy nonzero values up to
    /// accuracy, store the new start/interval, and (re)arm the kernel timer
    /// with the start delay.
    pub fn set(&self, id: u32, start_us: u32, interval_us: u32) -> Result<(), OsError> {
        let (handle, start_us) = self.core.inner.with_allocated(id as usize, |s| {
            s.start_us = round_up_to_accuracy(start_us, s.accuracy_us);
            s.interval_us = round_up_to_accuracy(interval_us, s.accuracy_us);
            (s.handle, s.start_us)
        })?;
        let ticks = osal_port::usecs_to_ticks(u64::from(start_us), P::TICKS_PER_SEC);
        self.core.port.timer_change_period_and_start(handle, ticks);
        Ok(())
    }

    /// Delete (spec §4.6 step 4): free the slot under the lock before
    /// destroying the kernel timer, so a racing trampoline sees free and
    /// refuses to dispatch.
    pub fn delete(&self, id: u32) -> Result<(), OsError> {
        let slot = self.core.inner.take(id as usize)?;
        self.core.port.timer_destroy(slot.handle);
        Ok(())
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.core.inner.lookup_by_name(name).map(|id| id as u32)
    }

    pub fn get_info(&self, id: u32) -> Result<TimerInfo, OsError> {
        self.core.inner.with_allocated_ref(id as usize, |s| TimerInfo {
            name: s.name.clone(),
            creator: s.creator,
            start_us: s.start_us,
            interval_us: s.interval_us,
            accuracy_us: s.accuracy_us,
        })
    }

    pub fn allocated_ids(&self) -> Vec<usize> {
        self.core.inner.allocated_ids()
    }
}

fn round_up_to_accuracy(value_us: u32, accuracy_us: u32) -> u32 {
    if value_us != 0 && value_us < accuracy_us {
        accuracy_us
    } else {
        value_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osal_port_std::StdPort;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn registry() -> TimerRegistry<StdPort, 4> {
        TimerRegistry::new(Arc::new(StdPort::new()), 32)
    }

    #[test]
    fn one_shot_fires_once() {
        let reg = registry();
        let (tx, rx) = mpsc::channel();
        let (t, _acc) = reg
            .create("TMR", 0, Arc::new(move |_id| tx.send(()).unwrap()))
            .unwrap();
        reg.set(t, 15_000, 0).unwrap();
        rx.recv_timeout(Duration::from_millis(500)).unwrap();
        // No second callback within a window well past one interval.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn periodic_fires_repeatedly() {
        let reg = registry();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let (t, _acc) = reg
            .create(
                "TMR",
                0,
                Arc::new(move |_id| {
                    count2.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        reg.set(t, 10_000, 10_000).unwrap();
        std::thread::sleep(Duration::from_millis(250));
        reg.delete(t).unwrap();
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn delete_suppresses_pending_callback() {
        let reg = registry();
        let (tx, rx) = mpsc::channel();
        let (t, _acc) = reg
            .create("TMR", 0, Arc::new(move |_id| tx.send(()).unwrap()))
            .unwrap();
        reg.set(t, 20_000, 0).unwrap();
        reg.delete(t).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(60)).is_err());
    }

    #[test]
    fn sub_accuracy_rounds_up() {
        let reg = registry();
        let (t, acc) = reg.create("TMR", 0, Arc::new(|_| {})).unwrap();
        reg.set(t, 1, 1).unwrap();
        let info = reg.get_info(t).unwrap();
        assert_eq!(info.start_us, acc);
        assert_eq!(info.interval_us, acc);
    }
}
