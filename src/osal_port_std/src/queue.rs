//! Bounded message queues: `Mutex<VecDeque<Vec<u8>>>` plus a `Condvar`,
//! mirroring FreeRTOS's `xQueueCreate`/`xQueueSend`/`xQueueReceive` contract
//! of a fixed depth and a fixed per-message size.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use osal_port::{PortCreateError, PortTimeout, PortWaitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdQueueHandle(pub(crate) u64);

struct QueueSlot {
    msg_size: usize,
    depth: usize,
    messages: Mutex<VecDeque<Vec<u8>>>,
    not_empty: Condvar,
    not_full: Condvar,
}

#[derive(Default)]
pub(crate) struct QueueTable {
    next_id: AtomicU64,
    // `Arc`-wrapped so `receive` (and, symmetrically, a blocking `send`
    // against a full queue) can drop the table lock before parking on the
    // slot's own condvars, rather than blocking every other queue's
    // `send`/`create`/`destroy` for the duration of the wait.
    slots: Mutex<HashMap<u64, Arc<QueueSlot>>>,
}

impl QueueTable {
    pub(crate) fn create(
        &self,
        depth: usize,
        msg_size: usize,
    ) -> Result<StdQueueHandle, PortCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(QueueSlot {
            msg_size,
            depth,
            messages: Mutex::new(VecDeque::with_capacity(depth)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        });
        self.slots.lock().unwrap().insert(id, slot);
        Ok(StdQueueHandle(id))
    }

    pub(crate) fn destroy(&self, handle: StdQueueHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.remove(&handle.0) {
            // Wake anyone blocked on this queue so they observe it vanish
            // rather than wait forever; they'll find the handle gone.
            slot.not_empty.notify_all();
            slot.not_full.notify_all();
        }
    }

    fn slot(&self, handle: StdQueueHandle) -> Option<Arc<QueueSlot>> {
        self.slots.lock().unwrap().get(&handle.0).cloned()
    }

    pub(crate) fn send(&self, handle: StdQueueHandle, msg: &[u8]) -> Result<(), PortWaitError> {
        let slot = self.slot(handle).ok_or(PortWaitError::WouldBlock)?;
        let mut messages = slot.messages.lock().unwrap();
        if messages.len() >= slot.depth {
            return Err(PortWaitError::WouldBlock);
        }
        messages.push_back(msg.to_vec());
        slot.not_empty.notify_one();
        Ok(())
    }

    pub(crate) fn receive(
        &self,
        handle: StdQueueHandle,
        buf: &mut [u8],
        timeout: PortTimeout,
    ) -> Result<usize, PortWaitError> {
        let slot = self.slot(handle).ok_or(PortWaitError::WouldBlock)?;
        let mut messages = slot.messages.lock().unwrap();

        let deadline = match timeout {
            PortTimeout::Duration(d) => Some(Instant::now() + d),
            _ => None,
        };

        loop {
            if let Some(msg) = messages.pop_front() {
                let n = msg.len().min(slot.msg_size).min(buf.len());
                buf[..n].copy_from_slice(&msg[..n]);
                slot.not_full.notify_one();
                return Ok(n);
            }
            match timeout {
                PortTimeout::NonBlocking => return Err(PortWaitError::WouldBlock),
                PortTimeout::Forever => {
                    messages = slot.not_empty.wait(messages).unwrap();
                }
                PortTimeout::Duration(_) => {
                    let remaining = deadline.unwrap().saturating_duration_since(Instant::now());
                    if remaining == Duration::ZERO {
                        return Err(PortWaitError::Timeout);
                    }
                    let (guard, result) =
                        slot.not_empty.wait_timeout(messages, remaining).unwrap();
                    messages = guard;
                    if result.timed_out() && messages.is_empty() {
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
    fn send_then_receive_round_trips() {
        let table = QueueTable::default();
        let h = table.create(4, 8).unwrap();
        table.send(h, b"hello").unwrap();
        let mut buf = [0u8; 8];
        let n = table.receive(h, &mut buf, PortTimeout::NonBlocking).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn send_fails_when_full() {
        let table = QueueTable::default();
        let h = table.create(1, 4).unwrap();
        table.send(h, b"a").unwrap();
        assert_eq!(table.send(h, b"b"), Err(PortWaitError::WouldBlock));
    }

    #[test]
    fn receive_nonblocking_empty_would_block() {
        let table = QueueTable::default();
        let h = table.create(1, 4).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            table.receive(h, &mut buf, PortTimeout::NonBlocking),
            Err(PortWaitError::WouldBlock)
        );
    }

    #[test]
    fn receive_with_timeout_expires() {
        let table = QueueTable::default();
        let h = table.create(1, 4).unwrap();
        let mut buf = [0u8; 4];
        let start = Instant::now();
        let result = table.receive(h, &mut buf, PortTimeout::Duration(Duration::from_millis(20)));
        assert_eq!(result, Err(PortWaitError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
