//! A hardware-faithful software MMU core for x86/x86-64.
//!
//! Given a snapshot of the CPU state relevant to address translation (see
//! [`PagingState`]) and a handle to guest-physical memory (see
//! [`MemoryBus`]), [`translate`] walks the guest page tables the way real
//! silicon would: across all four paging modes, combining permission
//! attributes level by level, updating accessed/dirty bits with
//! compare-and-exchange, and retrying the whole walk if a concurrent writer
//! wins a race on an intermediate entry.
//!
//! ```text
//!                         translate(access, state, memory)
//!                                       │
//!                                PagingState::paging_mode()
//!          ┌───────────┬──────────────┴───────────┬───────────────┐
//!          │            │                           │               │
//!        PHYS         PM32                     PM32_PAE        PM64_4LEVEL
//!          │            │                           │               │
//!   no_paging() TLB   PD → PT                PDPTE (from state)  PML4 → PDPT
//!      entry                                    → PD → PT          → PD → PT
//! ```
//!
//! [`Tlb`] wraps [`translate`] with a small fully-associative, FIFO-replacement
//! cache, the shape a real TLB takes. A translation only ever reaches an
//! embedder as [`TranslateResult::Success`] or [`TranslateResult::Fault`];
//! the internal retry-on-race state never escapes this crate.
#![cfg_attr(not(test), no_std)]

pub mod access;
pub mod attr;
pub mod entry;
pub mod fault;
pub mod memory;
pub mod paging_state;
pub mod permission;
pub mod tlb;
mod walk;

pub mod bits;

pub use access::{AccessType, LinearAccess, Supervisor};
pub use attr::TlbAttr;
pub use entry::TlbEntry;
pub use fault::{ErrorCode, PageFault};
pub use memory::MemoryBus;
pub use paging_state::{Cr0, Cr4, Efer, PagingMode, PagingState, RFlags};
pub use tlb::Tlb;

use walk::TranslateOutcome;

/// The outcome of a translation visible to embedders: either a usable
/// entry, or a page fault. The walker's internal retry-on-race state is
/// never returned here — see [`translate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateResult {
    Success(TlbEntry),
    Fault(PageFault),
}

/// Translates one linear memory access under the given CPU state,
/// internalizing cmpxchg-retry races: if a concurrent page-table writer
/// invalidates an in-flight accessed/dirty update, the whole walk restarts
/// from the top level rather than patching up the intermediate step, since
/// an intermediate entry may by then point somewhere else entirely.
///
/// This function never caches anything; use [`Tlb::translate`] for that.
#[must_use]
pub fn translate<M: MemoryBus + ?Sized>(
    op: &LinearAccess,
    state: &PagingState,
    memory: &M,
) -> TranslateResult {
    loop {
        match walk::translate_once(op, state, memory) {
            TranslateOutcome::Success(entry) => return TranslateResult::Success(entry),
            TranslateOutcome::Fault(fault) => {
                log::trace!(
                    "page fault at linear address {:#x}, error code {:?}",
                    fault.cr2(),
                    fault.error_code()
                );
                return TranslateResult::Fault(fault);
            }
            TranslateOutcome::Retry => {
                log::trace!("cmpxchg race on page-table entry, retrying translation from the top");
            }
        }
    }
}
