//! Page-fault descriptor returned in place of a translation.

use crate::access::LinearAccess;
use crate::paging_state::PagingState;

bitflags::bitflags! {
    /// The page-fault error code, bit-exact with Intel SDM Vol. 3 §4.7.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorCode: u32 {
        /// Set if the faulting entry was present (the fault is a
        /// protection violation rather than a missing mapping).
        const P = 1 << 0;
        /// Set if the access was a write.
        const W = 1 << 1;
        /// Set if the access was user-mode.
        const U = 1 << 2;
        /// Set if a reserved bit was found set in some paging-structure
        /// entry on the path.
        const RSVD = 1 << 3;
        /// Set if the access was an instruction fetch and the system can
        /// distinguish fetches from data reads (SMEP, or NXE with PAE/4-level
        /// paging).
        const I = 1 << 4;
    }
}

/// A page fault: the faulting linear address and the reason it was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFault {
    cr2: u64,
    error_code: ErrorCode,
}

impl PageFault {
    #[must_use]
    pub const fn new(cr2: u64, error_code: ErrorCode) -> Self {
        Self { cr2, error_code }
    }

    #[must_use]
    pub const fn cr2(&self) -> u64 {
        self.cr2
    }

    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        self.error_code
    }
}

/// Builds a [`PageFault`] for `op` given whether the offending entry was
/// present and whether it had a reserved bit set, following Intel SDM
/// Vol. 3 §4.7.
#[must_use]
pub(crate) fn page_fault_info(
    op: &LinearAccess,
    state: &PagingState,
    present: bool,
    reserved_bits_set: bool,
) -> PageFault {
    let mut error = ErrorCode::empty();

    error.set(ErrorCode::P, present);
    error.set(ErrorCode::W, op.is_write());
    error.set(ErrorCode::U, !(op.is_implicit_supervisor() || state.is_supervisor()));
    error.set(ErrorCode::RSVD, present && reserved_bits_set);
    error.set(
        ErrorCode::I,
        op.is_instruction_fetch() && (state.cr4_smep() || (state.cr4_pae() && state.efer_nxe())),
    );

    PageFault::new(op.linear_addr(), error)
}
