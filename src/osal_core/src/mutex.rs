//! Mutex registry (spec §4.5): thin wrapper over the kernel's recursive
//! mutex, where the owning task may lock N times and must unlock N times.

use std::sync::Arc;

use osal_port::Port;

use crate::error::OsError;
use crate::registry::{Named, Registry};

pub struct MutexSlot<P: Port> {
    name: String,
    handle: P::MutexHandle,
    creator: u32,
}

impl<P: Port> Named for MutexSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

pub struct MutexRegistry<P: Port, const N: usize> {
    port: Arc<P>,
    inner: Registry<MutexSlot<P>, N>,
    max_name_len: usize,
}

impl<P: Port, const N: usize> MutexRegistry<P, N> {
    pub fn new(port: Arc<P>, max_name_len: usize) -> Self {
        MutexRegistry {
            port,
            inner: Registry::new(),
            max_name_len,
        }
    }

    pub fn create(&self, name: &str, creator: u32) -> Result<u32, OsError> {
        if name.len() >= self.max_name_len {
            return Err(OsError::NameTooLong);
        }
        let id = self.inner.reserve_by_name(name)?;
        let handle = match self.port.mutex_create() {
            Ok(handle) => handle,
            Err(_) => {
                self.inner.rollback(id);
                return Err(OsError::KernelFailure);
            }
        };
        self.inner.commit(
            id,
            MutexSlot {
                name: name.to_owned(),
                handle,
                creator,
            },
        );
        Ok(id as u32)
    }

    pub fn delete(&self, id: u32) -> Result<(), OsError> {
        let slot = self.inner.take(id as usize)?;
        self.port.mutex_destroy(slot.handle);
        Ok(())
    }

    pub fn lock(&self, id: u32) -> Result<(), OsError> {
        let handle = self.inner.with_allocated_ref(id as usize, |s| s.handle)?;
        self.port.mutex_lock(handle);
        Ok(())
    }

    pub fn unlock(&self, id: u32) -> Result<(), OsError> {
        let handle = self.inner.with_allocated_ref(id as usize, |s| s.handle)?;
        self.port.mutex_unlock(handle);
        Ok(())
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

    fn registry() -> MutexRegistry<StdPort, 4> {
        MutexRegistry::new(Arc::new(StdPort::new()), 32)
    }

    #[test]
    fn recursive_lock_same_task() {
        let reg = registry();
        let m = reg.create("M", 0).unwrap();
        reg.lock(m).unwrap();
        reg.lock(m).unwrap();
        reg.unlock(m).unwrap();
        reg.unlock(m).unwrap();
    }

    #[test]
    fn duplicate_name_rejected() {
        let reg = registry();
        reg.create("M", 0).unwrap();
        assert_eq!(reg.create("M", 0), Err(OsError::NameTaken));
    }
}
