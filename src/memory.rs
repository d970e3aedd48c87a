//! The guest-physical memory contract the walker is built against.
//!
//! The walker only ever issues naturally-aligned word reads and
//! compare-exchanges; it never allocates, maps, or owns the memory it reads.
//! Embedders implement [`MemoryBus`] over whatever backs their guest
//! physical address space (a flat `Vec<u8>` in a userspace emulator, MMIO
//! dispatch in a hypervisor, etc).

/// Guest-physical memory as seen by the page-table walker.
///
/// All addresses passed to these methods are naturally aligned to the
/// operand size (4-byte aligned for the `u32` methods, 8-byte aligned for
/// the `u64` methods) — callers in this crate never violate that, so
/// implementations are free to assume it.
///
/// The backend is trusted: it must not report a `cmpxchg` as successful
/// unless the word at `addr` was actually replaced, and a `read` must
/// observe a value that was genuinely stored at some point (no torn reads).
/// Concurrent modification by another vCPU is expected and is exactly what
/// `cmpxchg` failure models; the walker reacts to that failure by retrying
/// the whole translation rather than treating it as an error.
pub trait MemoryBus {
    /// Reads a naturally-aligned 32-bit word at `addr`.
    fn read_u32(&self, addr: u64) -> u32;

    /// Reads a naturally-aligned 64-bit word at `addr`.
    fn read_u64(&self, addr: u64) -> u64;

    /// Atomically replaces the 32-bit word at `addr` with `new` iff it is
    /// currently `expected`. Returns whether the swap occurred.
    fn cmpxchg_u32(&self, addr: u64, expected: u32, new: u32) -> bool;

    /// Atomically replaces the 64-bit word at `addr` with `new` iff it is
    /// currently `expected`. Returns whether the swap occurred.
    fn cmpxchg_u64(&self, addr: u64, expected: u64, new: u64) -> bool;
}
