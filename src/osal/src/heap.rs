//! `OS_HeapGetInfo` (spec's supplemental heap-introspection stub). The
//! original never implements this either — it's a declared collaborator
//! outside the object-table core — so this stays `NotImplemented`
//! verbatim rather than growing a real allocator-introspection path.

use osal_core::OsError;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeapInfo {
    pub free_bytes: usize,
    pub largest_free_block: usize,
}

pub fn get_info() -> Result<HeapInfo, OsError> {
    Err(OsError::NotImplemented)
}
