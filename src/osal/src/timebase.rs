//! The Time Base API (spec's supplemental carryover from
//! `original_source/src/os/freertos/ostimer.c`): present in the original
//! purely as a forward-compatibility stub that unconditionally returns
//! `OS_ERR_NOT_IMPLEMENTED`, "so runtime code can check for this return
//! code." Carried here 1:1 — this is a documented non-implementation, not a
//! missing feature.

use osal_core::OsError;

pub fn time_base_create(_name: &str) -> Result<u32, OsError> {
    Err(OsError::NotImplemented)
}

pub fn time_base_set(_id: u32, _start_us: u32, _interval_us: u32) -> Result<(), OsError> {
    Err(OsError::NotImplemented)
}

pub fn time_base_delete(_id: u32) -> Result<(), OsError> {
    Err(OsError::NotImplemented)
}

pub fn time_base_get_id_by_name(_name: &str) -> Result<u32, OsError> {
    Err(OsError::NotImplemented)
}

pub fn timer_add(_timer_id: u32, _time_base_id: u32) -> Result<(), OsError> {
    Err(OsError::NotImplemented)
}
