//! The registry primitive every typed wrapper (task, queue, binary
//! semaphore, counting semaphore, mutex, timer) builds on: a fixed-capacity
//! array of slots behind one mutex, supporting the reserve/commit/rollback
//! two-phase create protocol from spec §4.1.
//!
//! `N` is a const generic so each registry's capacity is fixed at
//! compile time (`osal::config::OsalConfig`'s reference sizes instantiate
//! `TaskRegistry<P, 32>` and friends) without any dynamic resizing.

use std::sync::Mutex;

use crate::error::OsError;

/// Implemented by every per-registry slot payload so the generic registry
/// can enforce name uniqueness without knowing anything else about `T`.
pub trait Named {
    fn name(&self) -> &str;
}

enum Entry<T> {
    Free,
    /// Reserved by a reserve-by-name call that hasn't committed yet; holds
    /// the name so a concurrent creator sees it as taken immediately,
    /// closing the two-creator race named in spec §4.1.
    Reserved(String),
    Allocated(T),
}

impl<T> Entry<T> {
    fn is_free(&self) -> bool {
        matches!(self, Entry::Free)
    }

    fn name(&self) -> Option<&str>
    where
        T: Named,
    {
        match self {
            Entry::Free => None,
            Entry::Reserved(name) => Some(name.as_str()),
            Entry::Allocated(slot) => Some(slot.name()),
        }
    }
}

/// A fixed-capacity, name-unique registry of `N` slots of type `T`.
pub struct Registry<T, const N: usize> {
    slots: Mutex<Vec<Entry<T>>>,
}

impl<T: Named, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Named, const N: usize> Registry<T, N> {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(N);
        slots.resize_with(N, || Entry::Free);
        Registry {
            slots: Mutex::new(slots),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Reserve-by-name (spec §4.1 step 1): under the lock, find the first
    /// free slot and confirm no allocated-or-reserved slot already carries
    /// `name`. Returns the reserved index, or `NoFreeIds`/`NameTaken`.
    pub fn reserve_by_name(&self, name: &str) -> Result<usize, OsError> {
        let mut slots = self.slots.lock().unwrap();
        let idx = slots
            .iter()
            .position(|e| e.is_free())
            .ok_or(OsError::NoFreeIds)?;
        if slots.iter().any(|e| e.name() == Some(name)) {
            return Err(OsError::NameTaken);
        }
        slots[idx] = Entry::Reserved(name.to_owned());
        log::trace!("registry: reserved slot {idx} for {name:?}");
        Ok(idx)
    }

    /// Commit (spec §4.1 step 2): populate a reserved slot after the
    /// kernel-side create succeeded.
    pub fn commit(&self, id: usize, value: T) {
        let mut slots = self.slots.lock().unwrap();
        debug_assert!(matches!(slots[id], Entry::Reserved(_)));
        slots[id] = Entry::Allocated(value);
        log::trace!("registry: committed slot {id}");
    }

    /// Roll back a reservation after the kernel-side create failed.
    pub fn rollback(&self, id: usize) {
        let mut slots = self.slots.lock().unwrap();
        slots[id] = Entry::Free;
        log::trace!("registry: rolled back slot {id}");
    }

    /// Validate id (spec §4.1 step 3): `id < capacity && allocated`.
    pub fn validate_id(&self, id: usize) -> Result<(), OsError> {
        let slots = self.slots.lock().unwrap();
        match slots.get(id) {
            Some(Entry::Allocated(_)) => Ok(()),
            _ => Err(OsError::InvalidId),
        }
    }

    /// Lookup-by-name (spec §4.1 step 4): first allocated slot with this
    /// name, or `NameNotFound`. Reserved-but-uncommitted slots don't count
    /// as a hit since they aren't valid ids to callers yet.
    pub fn lookup_by_name(&self, name: &str) -> Result<usize, OsError> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .position(|e| matches!(e, Entry::Allocated(s) if s.name() == name))
            .ok_or(OsError::NameNotFound)
    }

    /// Run `f` against the allocated slot `id` under the registry lock,
    /// returning `InvalidId` if it isn't allocated. Used for any read of a
    /// mutable field, or a kernel call whose safety depends on the slot
    /// staying allocated across it (spec §9's "ambiguous locking" note).
    pub fn with_allocated<R>(
        &self,
        id: usize,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, OsError> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get_mut(id) {
            Some(Entry::Allocated(slot)) => Ok(f(slot)),
            _ => Err(OsError::InvalidId),
        }
    }

    /// Same as [`Registry::with_allocated`] but read-only.
    pub fn with_allocated_ref<R>(&self, id: usize, f: impl FnOnce(&T) -> R) -> Result<R, OsError> {
        let slots = self.slots.lock().unwrap();
        match slots.get(id) {
            Some(Entry::Allocated(slot)) => Ok(f(slot)),
            _ => Err(OsError::InvalidId),
        }
    }

    /// Delete (spec §4.1's destroy symmetric-inverse and §4.2's Delete):
    /// atomically validate and free the slot, handing the removed value
    /// back to the caller so it can destroy the kernel-side handle. Freeing
    /// the slot before the kernel destroy is what lets a racing trampoline
    /// (timer expiry, see `crate::timer`) observe free and skip dispatch.
    pub fn take(&self, id: usize) -> Result<T, OsError> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get(id) {
            Some(Entry::Allocated(_)) => {}
            _ => return Err(OsError::InvalidId),
        }
        match std::mem::replace(&mut slots[id], Entry::Free) {
            Entry::Allocated(slot) => Ok(slot),
            _ => unreachable!(),
        }
    }

    /// Iterate every currently-allocated id. Used by `DeleteAllObjects`.
    pub fn allocated_ids(&self) -> Vec<usize> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| matches!(e, Entry::Allocated(_)).then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct S(&'static str);
    impl Named for S {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn reserve_commit_then_lookup() {
        let reg: Registry<S, 4> = Registry::new();
        let id = reg.reserve_by_name("a").unwrap();
        reg.commit(id, S("a"));
        assert_eq!(reg.lookup_by_name("a").unwrap(), id);
        assert!(reg.validate_id(id).is_ok());
    }

    #[test]
    fn duplicate_name_rejected_while_reserved() {
        let reg: Registry<S, 4> = Registry::new();
        let _id = reg.reserve_by_name("a").unwrap();
        assert_eq!(reg.reserve_by_name("a"), Err(OsError::NameTaken));
    }

    #[test]
    fn capacity_exhausted() {
        let reg: Registry<S, 2> = Registry::new();
        reg.commit(reg.reserve_by_name("a").unwrap(), S("a"));
        reg.commit(reg.reserve_by_name("b").unwrap(), S("b"));
        assert_eq!(reg.reserve_by_name("c"), Err(OsError::NoFreeIds));
    }

    #[test]
    fn rollback_frees_the_slot_for_reuse() {
        let reg: Registry<S, 1> = Registry::new();
        let id = reg.reserve_by_name("a").unwrap();
        reg.rollback(id);
        let id2 = reg.reserve_by_name("a").unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn delete_frees_id_and_name() {
        let reg: Registry<S, 4> = Registry::new();
        let id = reg.reserve_by_name("a").unwrap();
        reg.commit(id, S("a"));
        let removed = reg.take(id).unwrap();
        assert_eq!(removed.0, "a");
        assert_eq!(reg.lookup_by_name("a"), Err(OsError::NameNotFound));
        assert_eq!(reg.validate_id(id), Err(OsError::InvalidId));
    }

    #[test]
    fn invalid_id_out_of_range() {
        let reg: Registry<S, 2> = Registry::new();
        assert_eq!(reg.validate_id(5), Err(OsError::InvalidId));
    }
}
