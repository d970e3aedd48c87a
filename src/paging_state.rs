//! Immutable capture of the CPU state a translation needs.

bitflags::bitflags! {
    /// RFLAGS bits this core inspects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RFlags: u64 {
        /// Bit 1 is architecturally always set; present here for
        /// documentation / round-trip fidelity with raw register captures.
        const RESERVED = 1 << 1;
        /// Alignment check — overloaded by SMAP to permit explicit
        /// accesses to user-mode pages from supervisor mode.
        const AC = 1 << 18;
    }
}

bitflags::bitflags! {
    /// CR0 bits this core inspects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr0: u64 {
        /// Write Protect: when set, supervisor writes respect the R/W bit.
        const WP = 1 << 16;
        /// Paging enable.
        const PG = 1 << 31;
    }
}

bitflags::bitflags! {
    /// CR4 bits this core inspects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr4: u64 {
        /// Page Size Extension (4 MiB pages in 32-bit paging).
        const PSE = 1 << 4;
        /// Physical Address Extension.
        const PAE = 1 << 5;
        /// Global pages enable. Not consulted by the walker itself; carried
        /// for embedders that want bit-exact register round-tripping.
        const PGE = 1 << 7;
        /// Process-context identifiers enable. Same note as PGE.
        const PCIDE = 1 << 17;
        /// Supervisor-Mode Execution Prevention.
        const SMEP = 1 << 20;
        /// Supervisor-Mode Access Prevention.
        const SMAP = 1 << 21;
        /// Protection-Key Enable. Carried but not evaluated — see the
        /// module-level design notes on protection keys.
        const PKE = 1 << 22;
    }
}

bitflags::bitflags! {
    /// EFER bits this core inspects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Efer: u64 {
        /// Long Mode Enable.
        const LME = 1 << 8;
        /// No-Execute Enable, gates whether the XD bit is honored.
        const NXE = 1 << 11;
    }
}

/// The four x86/x86-64 paging modes, in the order the manual discusses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// Paging disabled: linear addresses are physical addresses.
    Phys,
    /// Classic 32-bit paging, two levels, 32-bit entries.
    Pm32,
    /// 32-bit paging with Physical Address Extension: three levels, 64-bit
    /// entries, four architectural PDPTEs held outside the page-table tree.
    Pm32Pae,
    /// 4-level long-mode paging, four levels, 64-bit entries.
    Pm64FourLevel,
}

/// An immutable snapshot of the CPU state needed to perform one page-table
/// walk: CR0/CR3/CR4/EFER/RFLAGS, the four PAE PDPTEs, and CPL.
#[derive(Debug, Clone, Copy)]
pub struct PagingState {
    cr3: u64,
    pdpte: [u64; 4],

    cr0: Cr0,
    cr4: Cr4,
    efer: Efer,
    rflags: RFlags,

    supervisor: bool,
}

impl PagingState {
    /// Builds a snapshot. `cpl` is the current privilege level and must be
    /// in `0..=3`; this is asserted, matching the contract-violation
    /// handling in the rest of this crate.
    #[must_use]
    pub fn new(
        rflags: RFlags,
        cr0: Cr0,
        cr3: u64,
        cr4: Cr4,
        efer: Efer,
        cpl: u8,
        pdpte: [u64; 4],
    ) -> Self {
        assert!(cpl <= 3, "CPL must be in 0..=3");
        Self { cr3, pdpte, cr0, cr4, efer, rflags, supervisor: cpl != 3 }
    }

    /// Builds a snapshot with no PAE PDPTEs configured, for the common case
    /// of non-PAE modes.
    #[must_use]
    pub fn without_pdpte(
        rflags: RFlags,
        cr0: Cr0,
        cr3: u64,
        cr4: Cr4,
        efer: Efer,
        cpl: u8,
    ) -> Self {
        Self::new(rflags, cr0, cr3, cr4, efer, cpl, [0; 4])
    }

    /// The PAE PDPTE at architectural index `i` (0..=3), selected by linear
    /// address bits `[31:30]`. Panics if `i >= 4`.
    #[must_use]
    pub fn pdpte(&self, i: usize) -> u64 {
        assert!(i < self.pdpte.len(), "PDPTE index out of range");
        self.pdpte[i]
    }

    #[must_use]
    pub const fn cr3(&self) -> u64 {
        self.cr3
    }

    #[must_use]
    pub const fn cr0_wp(&self) -> bool {
        self.cr0.contains(Cr0::WP)
    }

    #[must_use]
    pub const fn cr0_pg(&self) -> bool {
        self.cr0.contains(Cr0::PG)
    }

    #[must_use]
    pub const fn cr4_pse(&self) -> bool {
        self.cr4.contains(Cr4::PSE)
    }

    #[must_use]
    pub const fn cr4_pae(&self) -> bool {
        self.cr4.contains(Cr4::PAE)
    }

    #[must_use]
    pub const fn cr4_smep(&self) -> bool {
        self.cr4.contains(Cr4::SMEP)
    }

    #[must_use]
    pub const fn cr4_smap(&self) -> bool {
        self.cr4.contains(Cr4::SMAP)
    }

    #[must_use]
    pub const fn efer_nxe(&self) -> bool {
        self.efer.contains(Efer::NXE)
    }

    #[must_use]
    pub const fn efer_lme(&self) -> bool {
        self.efer.contains(Efer::LME)
    }

    #[must_use]
    pub const fn rflags_ac(&self) -> bool {
        self.rflags.contains(RFlags::AC)
    }

    /// Whether the CPL this snapshot was built with indicates supervisor
    /// mode. Unrelated to implicit-supervisor accesses.
    #[must_use]
    pub const fn is_supervisor(&self) -> bool {
        self.supervisor
    }

    /// The paging mode, derived from CR0.PG / CR4.PAE / EFER.LME per the
    /// truth table in Intel SDM Vol. 3 §4.1.1.
    #[must_use]
    pub const fn paging_mode(&self) -> PagingMode {
        if !self.cr0_pg() {
            return PagingMode::Phys;
        }
        if !self.cr4_pae() {
            return PagingMode::Pm32;
        }
        if !self.efer_lme() {
            return PagingMode::Pm32Pae;
        }
        PagingMode::Pm64FourLevel
    }
}
