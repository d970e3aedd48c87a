//! The multi-level page-table walker.
//!
//! Per-level behavior is described by a small runtime table of
//! [`LevelDesc`] values rather than one type per level — the four paging
//! modes differ only in word width, bit positions, and whether a level can
//! terminate the walk early via the PS bit, all of which fit in one
//! descriptor shape.

use crate::access::LinearAccess;
use crate::attr::TlbAttr;
use crate::entry::TlbEntry;
use crate::fault::{page_fault_info, PageFault};
use crate::memory::MemoryBus;
use crate::paging_state::{PagingMode, PagingState};
use crate::permission;

bitflags::bitflags! {
    /// Raw page-table-entry bits this module interprets directly (as
    /// opposed to the permission-oriented subset exposed by
    /// [`crate::attr::TlbAttr`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct PteBits: u64 {
        const P = 1 << 0;
        const W = 1 << 1;
        const U = 1 << 2;
        const A = 1 << 5;
        const D = 1 << 6;
        const PS = 1 << 7;
        const XD = 1 << 63;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LevelFlags: u8 {
        /// This level is always a leaf (the final page-table level).
        const IS_TERMINAL = 1 << 0;
        /// This level's entry may set the PS bit to terminate early as a
        /// large page.
        const HAS_PS = 1 << 1;
        /// Whether `HAS_PS` is additionally gated on CR4.PSE (true only for
        /// the 32-bit non-PAE page directory).
        const RESPECTS_CR4_PSE = 1 << 2;
    }
}

/// The memory-word width a level's entries are stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    const fn bytes(self) -> u64 {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }
}

/// A bit range, as a plain `(hi, lo)` pair rather than a [`crate::bits::BitRange`]
/// const-generic type — this table is built and walked at runtime, so the
/// positions need to be runtime data, not monomorphized types.
type Range = (u32, u32);

fn extract(value: u64, (hi, lo): Range) -> u64 {
    (value >> lo) & ((1u64 << (1 + hi - lo)) - 1)
}

fn extract_no_shift(value: u64, range: Range) -> u64 {
    value & (extract(u64::MAX, range) << range.1)
}

/// One page-table level: word width, the bit range selecting this level's
/// entry from a linear address, the bit range giving the next level's table
/// base (meaningless when `IS_TERMINAL`), the bit range giving the page
/// frame (whose low bit is the page's size order), and behavioral flags.
#[derive(Debug, Clone, Copy)]
struct LevelDesc {
    word: WordSize,
    index: Range,
    next_table: Range,
    frame: Range,
    flags: LevelFlags,
}

impl LevelDesc {
    fn table_index(&self, linear_addr: u64) -> u64 {
        extract(linear_addr, self.index)
    }

    fn next_table_base(&self, entry: u64) -> u64 {
        debug_assert!(!self.flags.contains(LevelFlags::IS_TERMINAL));
        extract_no_shift(entry, self.next_table)
    }

    fn page_frame(&self, entry: u64) -> u64 {
        extract_no_shift(entry, self.frame)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn page_frame_order(&self) -> u8 {
        self.frame.1 as u8
    }

    fn is_leaf(&self, entry: u64, state: &PagingState) -> bool {
        if self.flags.contains(LevelFlags::IS_TERMINAL) {
            return true;
        }
        if !self.flags.contains(LevelFlags::HAS_PS) {
            return false;
        }
        let pse_respected = !self.flags.contains(LevelFlags::RESPECTS_CR4_PSE) || state.cr4_pse();
        pse_respected && (entry & PteBits::PS.bits()) != 0
    }

    /// Reserved-bit checking left intentionally unimplemented; see the
    /// open question this carries forward from the original source.
    fn has_reserved_bits_set(&self, _entry: u64, _state: &PagingState) -> bool {
        false
    }
}

// clang-format equivalent: keep the bit-exact layout table in one glance.
//                                        word        index        next table    frame          flags
const PM32_PD: LevelDesc = LevelDesc { word: WordSize::Bits32, index: (31, 22), next_table: (31, 12), frame: (31, 22), flags: LevelFlags::HAS_PS.union(LevelFlags::RESPECTS_CR4_PSE) };
const PM32_PT: LevelDesc = LevelDesc { word: WordSize::Bits32, index: (21, 12), next_table: (0, 0), frame: (31, 12), flags: LevelFlags::IS_TERMINAL };

const PM64_PML4: LevelDesc = LevelDesc { word: WordSize::Bits64, index: (47, 39), next_table: (51, 12), frame: (0, 0), flags: LevelFlags::empty() };
const PM64_PDPT: LevelDesc = LevelDesc { word: WordSize::Bits64, index: (38, 30), next_table: (51, 12), frame: (51, 30), flags: LevelFlags::HAS_PS };
const PM64_PD: LevelDesc = LevelDesc { word: WordSize::Bits64, index: (29, 21), next_table: (51, 12), frame: (51, 21), flags: LevelFlags::HAS_PS };
const PM64_PT: LevelDesc = LevelDesc { word: WordSize::Bits64, index: (20, 12), next_table: (0, 0), frame: (51, 12), flags: LevelFlags::IS_TERMINAL };

const PM32_LEVELS: [LevelDesc; 2] = [PM32_PD, PM32_PT];
const PM64_LEVELS: [LevelDesc; 4] = [PM64_PML4, PM64_PDPT, PM64_PD, PM64_PT];
const PAE_TAIL_LEVELS: [LevelDesc; 2] = [PM64_PD, PM64_PT];

fn read_entry<M: MemoryBus + ?Sized>(memory: &M, addr: u64, word: WordSize) -> u64 {
    match word {
        WordSize::Bits32 => u64::from(memory.read_u32(addr)),
        WordSize::Bits64 => memory.read_u64(addr),
    }
}

fn cmpxchg_entry<M: MemoryBus + ?Sized>(
    memory: &M,
    addr: u64,
    expected: u64,
    new: u64,
    word: WordSize,
) -> bool {
    match word {
        #[allow(clippy::cast_possible_truncation)]
        WordSize::Bits32 => memory.cmpxchg_u32(addr, expected as u32, new as u32),
        WordSize::Bits64 => memory.cmpxchg_u64(addr, expected, new),
    }
}

/// The internal result of walking the configured levels, before the
/// top-level retry loop collapses [`StepOutcome::Retry`] into another pass.
pub(crate) enum TranslateOutcome {
    Success(TlbEntry),
    Fault(PageFault),
    Retry,
}

/// Descends one level of the walk. Returns either a terminal outcome, or
/// the inputs needed to continue to the next configured level.
enum StepOutcome {
    Done(TranslateOutcome),
    Continue { next_table_base: u64, attr: TlbAttr },
}

fn step<M: MemoryBus + ?Sized>(
    level: &LevelDesc,
    op: &LinearAccess,
    state: &PagingState,
    memory: &M,
    table_base: u64,
    attr: TlbAttr,
) -> StepOutcome {
    let entry_addr = table_base + level.word.bytes() * level.table_index(op.linear_addr());

    let entry = read_entry(memory, entry_addr, level.word);
    let mut updated = entry | PteBits::A.bits();

    let is_present = entry & PteBits::P.bits() != 0;
    let is_rsvd = level.has_reserved_bits_set(entry, state);
    let is_leaf = level.is_leaf(entry, state);

    if !is_present || is_rsvd {
        return StepOutcome::Done(TranslateOutcome::Fault(page_fault_info(
            op, state, is_present, is_rsvd,
        )));
    }

    // Dirty only exists in leaf entries; mask it out of non-leaf
    // contributions before folding them into the accumulated attribute.
    let leaf_mask = if is_leaf { 0 } else { PteBits::D.bits() };
    let attr = TlbAttr::combine(attr, TlbAttr::from_raw_entry(entry & !leaf_mask));

    if is_leaf {
        let mask = (1u64 << level.page_frame_order()) - 1;
        let mut candidate = TlbEntry::new(
            op.linear_addr() & !mask,
            level.page_frame(entry),
            level.page_frame_order(),
            attr,
        );

        if !permission::allows(&candidate, op, state) {
            return StepOutcome::Done(TranslateOutcome::Fault(page_fault_info(
                op, state, true, false,
            )));
        }

        if op.is_write() {
            updated |= PteBits::D.bits();
            candidate.attr_mut().set_d();
        }

        if entry != updated && !cmpxchg_entry(memory, entry_addr, entry, updated, level.word) {
            return StepOutcome::Done(TranslateOutcome::Retry);
        }

        StepOutcome::Done(TranslateOutcome::Success(candidate))
    } else {
        if entry != updated && !cmpxchg_entry(memory, entry_addr, entry, updated, level.word) {
            return StepOutcome::Done(TranslateOutcome::Retry);
        }

        StepOutcome::Continue { next_table_base: level.next_table_base(entry), attr }
    }
}

/// Walks a run of levels starting at `table_base`, reissuing [`step`] for
/// each descended level until a leaf, a fault, or a retry is reached.
fn walk_levels<M: MemoryBus + ?Sized>(
    levels: &[LevelDesc],
    op: &LinearAccess,
    state: &PagingState,
    memory: &M,
    mut table_base: u64,
) -> TranslateOutcome {
    let mut attr = TlbAttr::default();
    let mut remaining = levels;

    loop {
        let (level, rest) = remaining
            .split_first()
            .expect("walk_levels must be given at least one level");

        match step(level, op, state, memory, table_base, attr) {
            StepOutcome::Done(outcome) => return outcome,
            StepOutcome::Continue { next_table_base, attr: next_attr } => {
                assert!(!rest.is_empty(), "non-leaf level must be followed by another level");
                table_base = next_table_base;
                attr = next_attr;
                remaining = rest;
            }
        }
    }
}

/// The PAE PDPTE lookup is special-cased: its four entries live in
/// [`PagingState`] rather than being read from memory (loading them traps
/// architecturally on reserved-bit violations before a translation ever
/// reaches this code), and they do not contribute permission bits to the
/// combined attribute — only the Present bit and the PD base are
/// meaningful at 32-bit PAE's PDPTE level.
fn pae_walk<M: MemoryBus + ?Sized>(
    op: &LinearAccess,
    state: &PagingState,
    memory: &M,
) -> TranslateOutcome {
    #[allow(clippy::cast_possible_truncation)]
    let pdpte_index = extract(op.linear_addr(), (31, 30)) as usize;
    let pdpte = state.pdpte(pdpte_index);
    let next_table = extract_no_shift(pdpte, (51, 12));

    if pdpte & PteBits::P.bits() == 0 {
        // The PDPTE itself was not present. The reference implementation
        // this core is modeled on reports this with the error code's P bit
        // set rather than clear; preserved here for bit-exact fidelity with
        // that implementation (see the design ledger for the reasoning).
        return TranslateOutcome::Fault(page_fault_info(op, state, true, false));
    }

    walk_levels(&PAE_TAIL_LEVELS, op, state, memory, next_table)
}

/// Translates one linear access, internalizing retries. Never returns a
/// retry to its caller — see [`crate::translate`].
pub(crate) fn translate_once<M: MemoryBus + ?Sized>(
    op: &LinearAccess,
    state: &PagingState,
    memory: &M,
) -> TranslateOutcome {
    match state.paging_mode() {
        PagingMode::Phys => TranslateOutcome::Success(TlbEntry::no_paging()),
        PagingMode::Pm32 => {
            let table_base = state.cr3() & 0xFFFF_F000;
            walk_levels(&PM32_LEVELS, op, state, memory, table_base)
        }
        PagingMode::Pm32Pae => pae_walk(op, state, memory),
        PagingMode::Pm64FourLevel => {
            let table_base = state.cr3() & !0xFFF;
            walk_levels(&PM64_LEVELS, op, state, memory, table_base)
        }
    }
}
