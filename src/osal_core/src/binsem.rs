//! Binary-semaphore registry with flush (spec §4.4) — the single most
//! intricate component. Layers two named bits on a kernel event group:
//!
//! | Bit | Meaning |
//! |---|---|
//! | `STATE` | semaphore is "available" (`current_value == 1`) |
//! | `FLUSH` | a broadcast unblock is in progress |
//!
//! Grounded on `r3_kernel::event_group`'s wait-any poll core, adapted to
//! these two fixed bits instead of an arbitrary mask.
//!
//! Per spec §9, `Give`/`Take` hold the slot's kernel handle and counters by
//! value (through a refcounted [`BinSemShared`]) instead of the registry
//! lock, so concurrent `Give`/`Take` never contends with unrelated creates
//! or deletes, and a `Delete` racing a blocked `Take` can't leave the latter
//! holding a dangling handle. The mandatory fix from §9's "Binary-semaphore
//! flush residue" note — the last draining waiter clears `FLUSH`, not the
//! next `Give` — is implemented with the `waiters` counter below.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use osal_port::{Port, PortTimeout, PortWaitError};

use crate::error::OsError;
use crate::registry::{Named, Registry};

const STATE: u32 = 0b01;
const FLUSH: u32 = 0b10;

struct BinSemShared<P: Port> {
    handle: P::EventGroupHandle,
    current_value: AtomicU32,
    waiters: AtomicUsize,
}

pub struct BinSemSlot<P: Port> {
    name: String,
    creator: u32,
    shared: Arc<BinSemShared<P>>,
}

impl<P: Port> Named for BinSemSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone)]
pub struct BinSemInfo {
    pub name: String,
    pub creator: u32,
    pub current_value: u32,
}

pub struct BinSemRegistry<P: Port, const N: usize> {
    port: Arc<P>,
    inner: Registry<BinSemSlot<P>, N>,
    max_name_len: usize,
}

impl<P: Port, const N: usize> BinSemRegistry<P, N> {
    pub fn new(port: Arc<P>, max_name_len: usize) -> Self {
        BinSemRegistry {
            port,
            inner: Registry::new(),
            max_name_len,
        }
    }

    pub fn create(&self, name: &str, initial: u32, creator: u32) -> Result<u32, OsError> {
        if name.len() >= self.max_name_len {
            return Err(OsError::NameTooLong);
        }
        if initial > 1 {
            return Err(OsError::InvalidSemValue);
        }
        let id = self.inner.reserve_by_name(name)?;
        let handle = match self.port.event_group_create() {
            Ok(handle) => handle,
            Err(_) => {
                self.inner.rollback(id);
                return Err(OsError::KernelFailure);
            }
        };
        if initial == 1 {
            self.port.event_group_set_bits(handle, STATE);
        }
        self.inner.commit(
            id,
            BinSemSlot {
                name: name.to_owned(),
                creator,
                shared: Arc::new(BinSemShared {
                    handle,
                    current_value: AtomicU32::new(initial),
                    waiters: AtomicUsize::new(0),
                }),
            },
        );
        log::debug!("binsem_create({name:?}, initial={initial}) -> {id}");
        Ok(id as u32)
    }

    pub fn delete(&self, id: u32) -> Result<(), OsError> {
        let slot = self.inner.take(id as usize)?;
        self.port.event_group_destroy(slot.shared.handle);
        Ok(())
    }

    fn shared(&self, id: u32) -> Result<Arc<BinSemShared<P>>, OsError> {
        self.inner
            .with_allocated_ref(id as usize, |s| Arc::clone(&s.shared))
    }

    /// `Give` (spec §4.4): if `current_value < 1`, set it and `STATE`,
    /// clearing any stale `FLUSH`. A second `Give` while already 1 is a
    /// no-op success.
    pub fn give(&self, id: u32) -> Result<(), OsError> {
        let shared = self.shared(id)?;
        loop {
            let current = shared.current_value.load(Ordering::Acquire);
            if current >= 1 {
                return Ok(());
            }
            if shared
                .current_value
                .compare_exchange(current, 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.port.event_group_set_bits(shared.handle, STATE);
                self.port.event_group_clear_bits(shared.handle, FLUSH);
                return Ok(());
            }
        }
    }

    fn take_inner(&self, id: u32, timeout: PortTimeout) -> Result<(), OsError> {
        let shared = self.shared(id)?;
        shared.waiters.fetch_add(1, Ordering::AcqRel);

        let wait_result = self
            .port
            .event_group_wait_bits(shared.handle, STATE | FLUSH, false, timeout);

        let result = match wait_result {
            Err(PortWaitError::Timeout) => Err(OsError::SemTimeout),
            Err(PortWaitError::WouldBlock) => Err(OsError::SemFailure),
            Ok(bits) => {
                let state_set = bits & STATE != 0;
                let flush_set = bits & FLUSH != 0;
                if state_set && flush_set {
                    // Flush in progress while STATE happens to be set: per
                    // spec, return success without consuming STATE.
                    Ok(())
                } else if state_set {
                    if shared
                        .current_value
                        .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.port.event_group_clear_bits(shared.handle, STATE);
                    }
                    Ok(())
                } else if flush_set {
                    Ok(())
                } else {
                    // Can't happen under an indefinite wait-any on a
                    // nonzero mask; defensive per spec §4.4.
                    Err(OsError::SemFailure)
                }
            }
        };

        let remaining = shared.waiters.fetch_sub(1, Ordering::AcqRel) - 1;
        if matches!(wait_result, Ok(bits) if bits & FLUSH != 0) && remaining == 0 {
            // Last draining waiter clears FLUSH itself (spec §9's mandated
            // fix), instead of leaving it for the next Give and exposing a
            // spurious-wakeup window to a Take arriving in between.
            self.port.event_group_clear_bits(shared.handle, FLUSH);
        }

        result
    }

    pub fn take(&self, id: u32) -> Result<(), OsError> {
        self.take_inner(id, PortTimeout::Forever)
    }

    pub fn timed_take(&self, id: u32, msecs: u32) -> Result<(), OsError> {
        self.take_inner(
            id,
            PortTimeout::Duration(std::time::Duration::from_millis(u64::from(msecs))),
        )
    }

    /// `Flush` (spec §4.4): releases every currently-blocked `Take` exactly
    /// once without touching `current_value`. If nothing is blocked right
    /// now, this is a no-op: setting `FLUSH` with no waiter to drain it
    /// would leave it set for the next `Take` to see spuriously, which is
    /// exactly the stale-`FLUSH` case spec §9 requires implementations to
    /// avoid.
    pub fn flush(&self, id: u32) -> Result<(), OsError> {
        let shared = self.shared(id)?;
        if shared.waiters.load(Ordering::Acquire) > 0 {
            self.port.event_group_set_bits(shared.handle, FLUSH);
        }
        Ok(())
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.inner.lookup_by_name(name).map(|id| id as u32)
    }

    pub fn get_info(&self, id: u32) -> Result<BinSemInfo, OsError> {
        self.inner.with_allocated_ref(id as usize, |s| BinSemInfo {
            name: s.name.clone(),
            creator: s.creator,
            current_value: s.shared.current_value.load(Ordering::Acquire),
        })
    }

    pub fn allocated_ids(&self) -> Vec<usize> {
        self.inner.allocated_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osal_port_std::StdPort;
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    fn registry() -> BinSemRegistry<StdPort, 4> {
        BinSemRegistry::new(StdArc::new(StdPort::new()), 32)
    }

    #[test]
    fn take_after_give_succeeds_and_consumes() {
        let reg = registry();
        let s = reg.create("S", 1, 0).unwrap();
        reg.take(s).unwrap();
        assert_eq!(reg.get_info(s).unwrap().current_value, 0);
    }

    #[test]
    fn take_blocks_until_give() {
        let reg = StdArc::new(registry());
        let s = reg.create("S", 0, 0).unwrap();
        let reg2 = StdArc::clone(&reg);
        let taker = std::thread::spawn(move || reg2.take(s).unwrap());
        std::thread::sleep(Duration::from_millis(30));
        reg.give(s).unwrap();
        taker.join().unwrap();
        assert_eq!(reg.get_info(s).unwrap().current_value, 0);
    }

    #[test]
    fn flush_releases_all_waiters_state_unchanged() {
        let reg = StdArc::new(registry());
        let s = reg.create("S", 0, 0).unwrap();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let reg2 = StdArc::clone(&reg);
            handles.push(std::thread::spawn(move || reg2.take(s).unwrap()));
        }
        std::thread::sleep(Duration::from_millis(30));
        reg.flush(s).unwrap();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.get_info(s).unwrap().current_value, 0);
    }

    #[test]
    fn take_after_flush_quiesces_does_not_see_stale_flush() {
        let reg = StdArc::new(registry());
        let s = reg.create("S", 0, 0).unwrap();
        let reg2 = StdArc::clone(&reg);
        let waiter = std::thread::spawn(move || reg2.take(s).unwrap());
        std::thread::sleep(Duration::from_millis(20));
        reg.flush(s).unwrap();
        waiter.join().unwrap();

        // A Take arriving after the flush has fully drained must block
        // (not observe a stale FLUSH) until an actual Give.
        let reg3 = StdArc::clone(&reg);
        let late_taker = std::thread::spawn(move || reg3.take(s).unwrap());
        std::thread::sleep(Duration::from_millis(30));
        assert!(!late_taker.is_finished());
        reg.give(s).unwrap();
        late_taker.join().unwrap();
    }

    #[test]
    fn timed_take_expires() {
        let reg = registry();
        let s = reg.create("S", 0, 0).unwrap();
        assert_eq!(reg.timed_take(s, 20), Err(OsError::SemTimeout));
    }

    /// Flushing with nobody blocked must not leave FLUSH set for the next
    /// Take to see spuriously (spec §9).
    #[test]
    fn flush_with_no_waiters_does_not_affect_next_take() {
        let reg = registry();
        let s = reg.create("S", 0, 0).unwrap();
        reg.flush(s).unwrap();
        assert_eq!(reg.timed_take(s, 20), Err(OsError::SemTimeout));
    }
}
