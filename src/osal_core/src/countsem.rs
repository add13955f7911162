//! Counting-semaphore registry (spec §4.5): a thin wrapper over the kernel
//! counting-semaphore primitive.

use std::sync::Arc;

use osal_port::{Port, PortTimeout, PortWaitError};

use crate::error::OsError;
use crate::registry::{Named, Registry};

/// Implementation-chosen capacity cap; spec §4.5 requires only "≥255".
pub const MAX_COUNT_SEM_VALUE: u32 = u16::MAX as u32;

pub struct CountSemSlot<P: Port> {
    name: String,
    handle: P::CountingSemHandle,
    creator: u32,
}

impl<P: Port> Named for CountSemSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

pub struct CountSemRegistry<P: Port, const N: usize> {
    port: Arc<P>,
    inner: Registry<CountSemSlot<P>, N>,
    max_name_len: usize,
}

impl<P: Port, const N: usize> CountSemRegistry<P, N> {
    pub fn new(port: Arc<P>, max_name_len: usize) -> Self {
        CountSemRegistry {
            port,
            inner: Registry::new(),
            max_name_len,
        }
    }

    pub fn create(&self, name: &str, initial: u32, creator: u32) -> Result<u32, OsError> {
        if name.len() >= self.max_name_len {
            return Err(OsError::NameTooLong);
        }
        if initial > MAX_COUNT_SEM_VALUE {
            return Err(OsError::InvalidSemValue);
        }
        let id = self.inner.reserve_by_name(name)?;
        let handle = match self
            .port
            .counting_sem_create(initial, MAX_COUNT_SEM_VALUE)
        {
            Ok(handle) => handle,
            Err(_) => {
                self.inner.rollback(id);
                return Err(OsError::KernelFailure);
            }
        };
        self.inner.commit(
            id,
            CountSemSlot {
                name: name.to_owned(),
                handle,
                creator,
            },
        );
        Ok(id as u32)
    }

    pub fn delete(&self, id: u32) -> Result<(), OsError> {
        let slot = self.inner.take(id as usize)?;
        self.port.counting_sem_destroy(slot.handle);
        Ok(())
    }

    pub fn give(&self, id: u32) -> Result<(), OsError> {
        let handle = self.inner.with_allocated_ref(id as usize, |s| s.handle)?;
        self.port.counting_sem_post(handle);
        Ok(())
    }

    pub fn take(&self, id: u32) -> Result<(), OsError> {
        let handle = self.inner.with_allocated_ref(id as usize, |s| s.handle)?;
        self.port
            .counting_sem_wait(handle, PortTimeout::Forever)
            .map_err(|_| OsError::SemFailure)
    }

    /// Timed take: cannot distinguish timeout from other wait failures, per
    /// spec §4.5's explicit contract — every non-success maps to
    /// `SemFailure`.
    pub fn timed_take(&self, id: u32, msecs: u32) -> Result<(), OsError> {
        let handle = self.inner.with_allocated_ref(id as usize, |s| s.handle)?;
        match self.port.counting_sem_wait(
            handle,
            PortTimeout::Duration(std::time::Duration::from_millis(u64::from(msecs))),
        ) {
            Ok(()) => Ok(()),
            Err(PortWaitError::Timeout) | Err(PortWaitError::WouldBlock) => {
                Err(OsError::SemFailure)
            }
        }
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.inner.lookup_by_name(name).map(|id| id as u32)
    }

    pub fn allocated_ids(&self) -> Vec<usize> {
        self.inner.allocated_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osal_port_std::StdPort;

    fn registry() -> CountSemRegistry<StdPort, 4> {
        CountSemRegistry::new(Arc::new(StdPort::new()), 32)
    }

    #[test]
    fn give_then_take_succeeds() {
        let reg = registry();
        let s = reg.create("S", 0, 0).unwrap();
        reg.give(s).unwrap();
        reg.take(s).unwrap();
    }

    #[test]
    fn timed_take_on_empty_times_out() {
        let reg = registry();
        let s = reg.create("S", 0, 0).unwrap();
        assert_eq!(reg.timed_take(s, 20), Err(OsError::SemFailure));
    }
}
