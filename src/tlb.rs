//! A small, fully-associative, FIFO-replacement translation cache.

use crate::access::LinearAccess;
use crate::entry::TlbEntry;
use crate::memory::MemoryBus;
use crate::paging_state::PagingState;
use crate::permission;
use crate::{translate, TranslateResult};

/// A fixed-capacity, fully associative TLB with FIFO replacement.
///
/// `N` must be greater than 1; this is enforced with a compile-time
/// assertion rather than a runtime check, since `N` is always known at the
/// call site.
pub struct Tlb<const N: usize> {
    /// Where the *next* installation will land; decrements (wrapping) on
    /// every insert, so the oldest entry is always the next one evicted.
    cursor: usize,
    entries: [Option<TlbEntry>; N],
}

impl<const N: usize> Tlb<N> {
    const _ASSERT_CAPACITY: () = assert!(N > 1, "Tlb capacity must be greater than 1");

    /// Builds an empty TLB.
    #[must_use]
    pub const fn new() -> Self {
        let _ = Self::_ASSERT_CAPACITY;
        Self { cursor: 0, entries: [None; N] }
    }

    /// Empties every slot. Used on a CR3 switch or an explicit TLB
    /// invalidation from the surrounding CPU emulator.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Translates `op`, consulting the cache first and falling back to a
    /// fresh page-table walk on a miss. A successful walk is installed into
    /// the cache; faults are not cached.
    pub fn translate<M: MemoryBus + ?Sized>(
        &mut self,
        op: &LinearAccess,
        state: &PagingState,
        memory: &M,
    ) -> TranslateResult {
        if let Some(entry) = self.lookup(op, state) {
            log::trace!("tlb hit for linear address {:#x}", op.linear_addr());
            return TranslateResult::Success(entry);
        }

        log::trace!("tlb miss for linear address {:#x}", op.linear_addr());
        let result = translate(op, state, memory);

        if let TranslateResult::Success(entry) = result {
            self.install(entry);
        }

        result
    }

    fn lookup(&self, op: &LinearAccess, state: &PagingState) -> Option<TlbEntry> {
        for i in 0..N {
            let slot = (self.cursor + i) % N;
            if let Some(entry) = self.entries[slot] {
                if entry.translate(op.linear_addr()).is_some() && permission::allows(&entry, op, state) {
                    return Some(entry);
                }
            }
        }
        None
    }

    fn install(&mut self, entry: TlbEntry) {
        self.cursor = (self.cursor + N - 1) % N;
        log::trace!(
            "installing tlb entry for linear address {:#x} at slot {}",
            entry.linear_addr(),
            self.cursor
        );
        self.entries[self.cursor] = Some(entry);
    }
}

impl<const N: usize> Default for Tlb<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessType;
    use crate::attr::TlbAttr;
    use crate::paging_state::{Cr0, Cr4, Efer, RFlags};

    fn phys_state() -> PagingState {
        PagingState::without_pdpte(RFlags::empty(), Cr0::empty(), 0, Cr4::empty(), Efer::empty(), 0)
    }

    struct NoMemory;
    impl MemoryBus for NoMemory {
        fn read_u32(&self, _addr: u64) -> u32 {
            unreachable!("phys mode never touches memory")
        }
        fn read_u64(&self, _addr: u64) -> u64 {
            unreachable!("phys mode never touches memory")
        }
        fn cmpxchg_u32(&self, _addr: u64, _expected: u32, _new: u32) -> bool {
            unreachable!("phys mode never touches memory")
        }
        fn cmpxchg_u64(&self, _addr: u64, _expected: u64, _new: u64) -> bool {
            unreachable!("phys mode never touches memory")
        }
    }

    #[test]
    fn clear_forces_a_miss_on_next_lookup() {
        let mut tlb: Tlb<4> = Tlb::new();
        let state = phys_state();
        let mem = NoMemory;

        let op = LinearAccess::explicit(0, AccessType::Read);
        let first = tlb.translate(&op, &state, &mem);
        assert!(matches!(first, TranslateResult::Success(_)));

        tlb.clear();
        // A second translate still succeeds (it just walks again); what we
        // actually assert is that the slot was really emptied.
        assert!(tlb.entries.iter().all(Option::is_none));
    }

    #[test]
    fn fifo_eviction_order() {
        let mut tlb: Tlb<2> = Tlb::new();
        let e0 = TlbEntry::new(0, 0, 12, TlbAttr::default());
        let e1 = TlbEntry::new(0x1000, 0x1000, 12, TlbAttr::default());
        let e2 = TlbEntry::new(0x2000, 0x2000, 12, TlbAttr::default());

        tlb.install(e0);
        tlb.install(e1);
        // Capacity is 2; installing a third entry evicts the first (e0).
        tlb.install(e2);

        let state = phys_state();
        let op0 = LinearAccess::explicit(0, AccessType::Read);
        assert!(tlb.lookup(&op0, &state).is_none());

        let op2 = LinearAccess::explicit(0x2000, AccessType::Read);
        assert!(tlb.lookup(&op2, &state).is_some());
    }
}
