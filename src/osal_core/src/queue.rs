//! Queue registry (spec §4.3): a name-unique table of bounded FIFOs of
//! fixed-size messages, layered directly over `Port`'s queue primitive.

use std::sync::Arc;

use osal_port::{Port, PortTimeout, PortWaitError};

use crate::error::OsError;
use crate::registry::{Named, Registry};

/// The three timeout modes `Get` accepts, matching the sentinel-encoded
/// signed-integer parameter of the original API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTimeout {
    /// Block indefinitely.
    Pend,
    /// Non-blocking; fail immediately if nothing is ready.
    Check,
    /// Block up to this many milliseconds.
    Milliseconds(u32),
}

pub struct QueueSlot<P: Port> {
    name: String,
    handle: P::QueueHandle,
    msg_size: usize,
    creator: u32,
}

impl<P: Port> Named for QueueSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

pub struct QueueRegistry<P: Port, const N: usize> {
    port: Arc<P>,
    inner: Registry<QueueSlot<P>, N>,
    max_name_len: usize,
}

impl<P: Port, const N: usize> QueueRegistry<P, N> {
    pub fn new(port: Arc<P>, max_name_len: usize) -> Self {
        QueueRegistry {
            port,
            inner: Registry::new(),
            max_name_len,
        }
    }

    pub fn create(
        &self,
        name: &str,
        depth: usize,
        msg_size: usize,
        creator: u32,
    ) -> Result<u32, OsError> {
        if name.len() >= self.max_name_len {
            return Err(OsError::NameTooLong);
        }
        let id = self.inner.reserve_by_name(name)?;
        let handle = match self.port.queue_create(depth, msg_size) {
            Ok(handle) => handle,
            Err(_) => {
                self.inner.rollback(id);
                return Err(OsError::KernelFailure);
            }
        };
        self.inner.commit(
            id,
            QueueSlot {
                name: name.to_owned(),
                handle,
                msg_size,
                creator,
            },
        );
        log::debug!("queue_create({name:?}) -> {id}");
        Ok(id as u32)
    }

    pub fn delete(&self, id: u32) -> Result<(), OsError> {
        let slot = self.inner.take(id as usize)?;
        self.port.queue_destroy(slot.handle);
        Ok(())
    }

    /// Non-blocking enqueue; `QueueFull` if the kernel queue is at capacity.
    pub fn put(&self, id: u32, msg: &[u8]) -> Result<(), OsError> {
        let handle = self.inner.with_allocated_ref(id as usize, |s| s.handle)?;
        self.port
            .queue_send(handle, msg)
            .map_err(|_| OsError::QueueFull)
    }

    /// Dequeue into `buf`. `buf.len()` must equal the queue's configured
    /// message size exactly, or `QueueInvalidSize` is returned and no data
    /// is read (spec §4.3's "size validation").
    pub fn get(&self, id: u32, buf: &mut [u8], timeout: QueueTimeout) -> Result<usize, OsError> {
        let (handle, msg_size) = self
            .inner
            .with_allocated_ref(id as usize, |s| (s.handle, s.msg_size))?;
        if buf.len() < msg_size {
            return Err(OsError::QueueInvalidSize);
        }

        let port_timeout = match timeout {
            QueueTimeout::Pend => PortTimeout::Forever,
            QueueTimeout::Check => PortTimeout::NonBlocking,
            QueueTimeout::Milliseconds(ms) => {
                PortTimeout::Duration(std::time::Duration::from_millis(u64::from(ms)))
            }
        };

        match self.port.queue_receive(handle, &mut buf[..msg_size], port_timeout) {
            Ok(n) => Ok(n),
            Err(PortWaitError::Timeout) => Err(OsError::QueueTimeout),
            Err(PortWaitError::WouldBlock) => Err(OsError::QueueEmpty),
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

    fn registry() -> QueueRegistry<StdPort, 4> {
        QueueRegistry::new(Arc::new(StdPort::new()), 32)
    }

    #[test]
    fn end_to_end_scenario_3() {
        let reg = registry();
        let q = reg.create("Q", 2, 8, 0).unwrap();
        reg.put(q, b"abcdefgh").unwrap();
        reg.put(q, b"abcdefgh").unwrap();
        assert_eq!(reg.put(q, b"abcdefgh"), Err(OsError::QueueFull));

        let mut buf = [0u8; 8];
        let n = reg.get(q, &mut buf, QueueTimeout::Pend).unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf, b"abcdefgh");

        reg.get(q, &mut buf, QueueTimeout::Check).unwrap();
        assert_eq!(
            reg.get(q, &mut buf, QueueTimeout::Check),
            Err(OsError::QueueEmpty)
        );

        let mut small = [0u8; 4];
        assert_eq!(
            reg.get(q, &mut small, QueueTimeout::Check),
            Err(OsError::QueueInvalidSize)
        );
    }

    #[test]
    fn timed_get_expires() {
        let reg = registry();
        let q = reg.create("Q", 1, 4, 0).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            reg.get(q, &mut buf, QueueTimeout::Milliseconds(20)),
            Err(OsError::QueueTimeout)
        );
    }
}
