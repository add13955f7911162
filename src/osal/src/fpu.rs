//! `OS_FPUExcSetMask`/`OS_FPUExcGetMask` (spec's supplemental carryover):
//! both stubs that return success in the original regardless of the mask
//! given. Not meaningful on a hosted `std` target (there's no board-level
//! FPU exception controller to program), so these are true no-ops that
//! always succeed, rather than a `NotImplemented` stub awaiting a real
//! backend.

use bitflags::bitflags;
use osal_core::OsError;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FpuExceptionMask: u32 {
        const INVALID_OP   = 0b0000_0001;
        const DIV_BY_ZERO  = 0b0000_0010;
        const OVERFLOW     = 0b0000_0100;
        const UNDERFLOW    = 0b0000_1000;
        const INEXACT      = 0b0001_0000;
    }
}

pub fn set_fpu_exception_mask(_mask: FpuExceptionMask) -> Result<(), OsError> {
    Ok(())
}

pub fn get_fpu_exception_mask() -> Result<FpuExceptionMask, OsError> {
    Ok(FpuExceptionMask::empty())
}
