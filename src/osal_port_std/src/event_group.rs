//! Event group: a small bitmask with set/clear/wait-any/wait-all semantics,
//! mirroring `xEventGroupCreate`. `osal_core`'s binary semaphore is the only
//! consumer, layering a STATE bit and a FLUSH bit on top of one of these.
//!
//! Per the port contract, a satisfied wait never auto-clears the bits it
//! matched; callers clear explicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use osal_port::{PortCreateError, PortTimeout, PortWaitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdEventGroupHandle(pub(crate) u64);

struct EventGroupSlot {
    bits: Mutex<u32>,
    changed: Condvar,
}

#[derive(Default)]
pub(crate) struct EventGroupTable {
    next_id: AtomicU64,
    // `Arc`-wrapped so a blocking waiter can clone its slot out from under
    // the table lock and release it before parking on the slot's own
    // condvar: holding the table lock across a blocking wait would stall
    // every other event group's set/clear/create/destroy too, and
    // `osal_core::binsem`'s Give/Take rely on a concurrent Give never
    // blocking behind a parked Take on the same semaphore.
    slots: Mutex<HashMap<u64, Arc<EventGroupSlot>>>,
}

fn satisfies(bits: u32, mask: u32, wait_all: bool) -> bool {
    if wait_all {
        bits & mask == mask
    } else {
        bits & mask != 0
    }
}

impl EventGroupTable {
    pub(crate) fn create(&self) -> Result<StdEventGroupHandle, PortCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(EventGroupSlot {
            bits: Mutex::new(0),
            changed: Condvar::new(),
        });
        self.slots.lock().unwrap().insert(id, slot);
        Ok(StdEventGroupHandle(id))
    }

    pub(crate) fn destroy(&self, handle: StdEventGroupHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.remove(&handle.0) {
            slot.changed.notify_all();
        }
    }

    fn slot(&self, handle: StdEventGroupHandle) -> Option<Arc<EventGroupSlot>> {
        self.slots.lock().unwrap().get(&handle.0).cloned()
    }

    pub(crate) fn set_bits(&self, handle: StdEventGroupHandle, bits: u32) {
        if let Some(slot) = self.slot(handle) {
            *slot.bits.lock().unwrap() |= bits;
            slot.changed.notify_all();
        }
    }

    pub(crate) fn clear_bits(&self, handle: StdEventGroupHandle, bits: u32) {
        if let Some(slot) = self.slot(handle) {
            *slot.bits.lock().unwrap() &= !bits;
        }
    }

    pub(crate) fn get_bits(&self, handle: StdEventGroupHandle) -> u32 {
        self.slot(handle)
            .map(|slot| *slot.bits.lock().unwrap())
            .unwrap_or(0)
    }

    pub(crate) fn wait_bits(
        &self,
        handle: StdEventGroupHandle,
        mask: u32,
        wait_all: bool,
        timeout: PortTimeout,
    ) -> Result<u32, PortWaitError> {
        let slot = self.slot(handle).ok_or(PortWaitError::WouldBlock)?;
        let mut bits = slot.bits.lock().unwrap();

        let deadline = match timeout {
            PortTimeout::Duration(d) => Some(Instant::now() + d),
            _ => None,
        };

        loop {
            if satisfies(*bits, mask, wait_all) {
                return Ok(*bits);
            }
            match timeout {
                PortTimeout::NonBlocking => return Err(PortWaitError::WouldBlock),
                PortTimeout::Forever => {
                    bits = slot.changed.wait(bits).unwrap();
                }
                PortTimeout::Duration(_) => {
                    let remaining = deadline.unwrap().saturating_duration_since(Instant::now());
                    if remaining == Duration::ZERO {
                        return Err(PortWaitError::Timeout);
                    }
                    let (guard, result) = slot.changed.wait_timeout(bits, remaining).unwrap();
                    bits = guard;
                    if result.timed_out() && !satisfies(*bits, mask, wait_all) {
                        return Err(PortWaitError::Timeout);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_any_satisfied_by_one_bit() {
        let table = EventGroupTable::default();
        let h = table.create().unwrap();
        table.set_bits(h, 0b01);
        assert_eq!(
            table.wait_bits(h, 0b11, false, PortTimeout::NonBlocking),
            Ok(0b01)
        );
    }

    #[test]
    fn wait_all_requires_every_bit() {
        let table = EventGroupTable::default();
        let h = table.create().unwrap();
        table.set_bits(h, 0b01);
        assert_eq!(
            table.wait_bits(h, 0b11, true, PortTimeout::NonBlocking),
            Err(PortWaitError::WouldBlock)
        );
        table.set_bits(h, 0b10);
        assert_eq!(
            table.wait_bits(h, 0b11, true, PortTimeout::NonBlocking),
            Ok(0b11)
        );
    }

    #[test]
    fn wait_does_not_auto_clear() {
        let table = EventGroupTable::default();
        let h = table.create().unwrap();
        table.set_bits(h, 0b01);
        table.wait_bits(h, 0b01, false, PortTimeout::NonBlocking).unwrap();
        assert_eq!(table.get_bits(h), 0b01);
    }

    /// A blocked `Forever` wait must not hold the table lock: a `set_bits`
    /// on the very same handle from another thread has to be able to reach
    /// its slot and wake the waiter, or this test hangs.
    #[test]
    fn blocked_wait_does_not_stall_concurrent_set_bits() {
        use std::sync::Arc as StdArc;
        let table = StdArc::new(EventGroupTable::default());
        let h = table.create().unwrap();

        let table2 = StdArc::clone(&table);
        let waiter = std::thread::spawn(move || {
            table2.wait_bits(h, 0b01, false, PortTimeout::Forever)
        });
        std::thread::sleep(std::time::Duration::from_millis(30));
        table.set_bits(h, 0b01);
        assert_eq!(waiter.join().unwrap(), Ok(0b01));
    }
}
