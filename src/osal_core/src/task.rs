//! Task registry (spec §4.2).

use std::sync::{Arc, Mutex};

use osal_port::{Port, TaskEntry};

use crate::error::OsError;
use crate::registry::{Named, Registry};

/// Sentinel creator id for a caller that isn't itself a registered task
/// (spec §9 "Creator identification"): the scan's past-the-end index.
pub const UNKNOWN_CREATOR: u32 = u32::MAX;

/// Sentinel returned by `GetId` for a task that hasn't called `Register`
/// yet (spec §4.2: "GetId before Register on a given task returns a
/// sentinel (0)").
pub const UNREGISTERED_TASK_ID: u32 = 0;

pub struct TaskSlot<P: Port> {
    name: String,
    handle: P::TaskHandle,
    creator: u32,
    stack_size: u32,
    priority: u8,
    delete_hook: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl<P: Port> Named for TaskSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A snapshot of a task's metadata, as returned by `GetInfo`.
#[derive(Clone)]
pub struct TaskInfo {
    pub name: String,
    pub creator: u32,
    pub stack_size: u32,
    pub priority: u8,
}

pub struct TaskRegistry<P: Port, const N: usize> {
    port: Arc<P>,
    inner: Registry<TaskSlot<P>, N>,
    max_name_len: usize,
    // A linear-scan table rather than a `HashMap`: `Port::TaskHandle` is
    // only required to be `Eq`, not `Hash`, and `N` is small enough that
    // this never matters in practice.
    handle_to_id: Mutex<Vec<(P::TaskHandle, u32)>>,
}

impl<P: Port, const N: usize> TaskRegistry<P, N> {
    pub fn new(port: Arc<P>, max_name_len: usize) -> Self {
        TaskRegistry {
            port,
            inner: Registry::new(),
            max_name_len,
            handle_to_id: Mutex::new(Vec::new()),
        }
    }

    fn creator_id(&self) -> u32 {
        self.port
            .task_current()
            .and_then(|h| {
                self.handle_to_id
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|(handle, _)| *handle == h)
                    .map(|(_, id)| *id)
            })
            .unwrap_or(UNKNOWN_CREATOR)
    }

    /// Create a task (spec §4.2): spawns the kernel task with `entry`,
    /// reserving a name-unique slot first.
    pub fn create(
        &self,
        name: &str,
        stack_size: u32,
        priority: u8,
        entry: TaskEntry,
    ) -> Result<u32, OsError> {
        if name.len() >= self.max_name_len {
            return Err(OsError::NameTooLong);
        }
        if priority as u32 > 255 {
            return Err(OsError::InvalidPriority);
        }
        let id = self.inner.reserve_by_name(name)?;
        let creator = self.creator_id();

        let handle = match self.port.task_spawn(name, stack_size, priority, entry) {
            Ok(handle) => handle,
            Err(_) => {
                self.inner.rollback(id);
                return Err(OsError::KernelFailure);
            }
        };

        self.handle_to_id.lock().unwrap().push((handle, id as u32));
        self.inner.commit(
            id,
            TaskSlot {
                name: name.to_owned(),
                handle,
                creator,
                stack_size,
                priority,
                delete_hook: Mutex::new(None),
            },
        );
        log::debug!("task_create({name:?}) -> {id}");
        Ok(id as u32)
    }

    /// Delete by id (spec §4.2): run the delete hook, then terminate the
    /// kernel task, then free the slot. `Delete(self)` is equivalent to
    /// `Exit` per spec, since both end up here with the caller's own id.
    pub fn delete(&self, id: u32) -> Result<(), OsError> {
        // Fire the hook while the slot is still allocated so its state is
        // visible to it, but don't hold the registry lock across an
        // arbitrary user callback.
        let hook = self
            .inner
            .with_allocated(id as usize, |slot| slot.delete_hook.lock().unwrap().take())?;
        if let Some(mut hook) = hook {
            hook();
        }

        let slot = self.inner.take(id as usize)?;
        self.handle_to_id
            .lock()
            .unwrap()
            .retain(|(handle, _)| *handle != slot.handle);
        self.port.task_terminate(slot.handle);
        log::debug!("task_delete({id})");
        Ok(())
    }

    /// Self-delete: resolve the calling task's own id via `GetId` and
    /// delete it. Per spec, identical to `Delete(self)`.
    pub fn exit(&self) -> Result<(), OsError> {
        self.delete(self.get_id())
    }

    pub fn set_priority(&self, id: u32, priority: u8) -> Result<(), OsError> {
        if priority as u32 > 255 {
            return Err(OsError::InvalidPriority);
        }
        let handle =
            self.inner
                .with_allocated(id as usize, |slot| {
                    slot.priority = priority;
                    slot.handle
                })?;
        let _ = handle; // priority changes have no separate kernel call in this port
        Ok(())
    }

    /// Bind the calling kernel task to its registry slot in thread-local
    /// storage, so later `GetId` calls on this thread are O(1) (spec §4.2,
    /// §9 "Task-id retrieval cost").
    pub fn register(&self) -> Result<(), OsError> {
        let handle = self.port.task_current().ok_or(OsError::InvalidId)?;
        let id = self
            .handle_to_id
            .lock()
            .unwrap()
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, id)| *id)
            .ok_or(OsError::InvalidId)?;
        self.port.task_local_slot_set(id);
        Ok(())
    }

    /// Sentinel-tolerant: returns `UNREGISTERED_TASK_ID` (0) if the calling
    /// task never called `Register`.
    pub fn get_id(&self) -> u32 {
        self.port.task_local_slot_get().unwrap_or(UNREGISTERED_TASK_ID)
    }

    /// Install a delete-hook on the calling task's own slot. Fails with
    /// `InvalidId` if the calling thread never called `Register`, the same
    /// as `register()` itself would for an unbound caller — otherwise this
    /// would silently land on whatever task happens to hold the sentinel id.
    pub fn install_delete_hook(&self, hook: Box<dyn FnMut() + Send>) -> Result<(), OsError> {
        let id = self.port.task_local_slot_get().ok_or(OsError::InvalidId)?;
        self.inner
            .with_allocated(id as usize, |slot| *slot.delete_hook.lock().unwrap() = Some(hook))
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<u32, OsError> {
        self.inner.lookup_by_name(name).map(|id| id as u32)
    }

    pub fn get_info(&self, id: u32) -> Result<TaskInfo, OsError> {
        self.inner.with_allocated_ref(id as usize, |slot| TaskInfo {
            name: slot.name.clone(),
            creator: slot.creator,
            stack_size: slot.stack_size,
            priority: slot.priority,
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
    use std::sync::mpsc;

    fn port() -> Arc<StdPort> {
        Arc::new(StdPort::new())
    }

    #[test]
    fn create_duplicate_name_fails() {
        let reg: TaskRegistry<StdPort, 4> = TaskRegistry::new(port(), 32);
        reg.create("A", 1024, 100, Box::new(|| {})).unwrap();
        assert_eq!(
            reg.create("A", 1024, 100, Box::new(|| {})),
            Err(OsError::NameTaken)
        );
    }

    #[test]
    fn get_id_by_name_matches_create() {
        let reg: TaskRegistry<StdPort, 4> = TaskRegistry::new(port(), 32);
        let id = reg.create("A", 1024, 100, Box::new(|| {})).unwrap();
        assert_eq!(reg.get_id_by_name("A").unwrap(), id);
    }

    #[test]
    fn capacity_then_delete_then_reuse() {
        let reg: TaskRegistry<StdPort, 4> = TaskRegistry::new(port(), 32);
        for i in 0..4 {
            reg.create(&format!("T{i}"), 1024, 100, Box::new(|| {}))
                .unwrap();
        }
        assert_eq!(
            reg.create("T4", 1024, 100, Box::new(|| {})),
            Err(OsError::NoFreeIds)
        );
        reg.delete(2).unwrap();
        assert_eq!(reg.create("T2b", 1024, 100, Box::new(|| {})).unwrap(), 2);
    }

    #[test]
    fn register_then_get_id_round_trips() {
        let p = port();
        let reg: Arc<TaskRegistry<StdPort, 4>> = Arc::new(TaskRegistry::new(Arc::clone(&p), 32));
        let (tx, rx) = mpsc::channel();
        let reg_for_entry = Arc::clone(&reg);
        let id = reg
            .create(
                "A",
                1024,
                100,
                Box::new(move || {
                    reg_for_entry.register().unwrap();
                    tx.send(reg_for_entry.get_id()).unwrap();
                }),
            )
            .unwrap();
        let observed = rx.recv().unwrap();
        assert_eq!(observed, id);
    }

    #[test]
    fn get_id_sentinel_before_register() {
        let reg: TaskRegistry<StdPort, 4> = TaskRegistry::new(port(), 32);
        assert_eq!(reg.get_id(), UNREGISTERED_TASK_ID);
    }

    #[test]
    fn install_delete_hook_rejects_unregistered_caller() {
        let reg: TaskRegistry<StdPort, 4> = TaskRegistry::new(port(), 32);
        reg.create("A", 1024, 100, Box::new(|| {})).unwrap();
        assert_eq!(
            reg.install_delete_hook(Box::new(|| {})),
            Err(OsError::InvalidId)
        );
    }

    #[test]
    fn name_too_long_rejected() {
        let reg: TaskRegistry<StdPort, 4> = TaskRegistry::new(port(), 4);
        assert_eq!(
            reg.create("abcd", 1024, 100, Box::new(|| {})),
            Err(OsError::NameTooLong)
        );
    }
}
