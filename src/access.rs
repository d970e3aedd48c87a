//! The request that drives a single translation.

/// The kind of memory operation that triggered a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    Execute,
}

/// Whether an access is always treated as supervisor-mode regardless of
/// CPL, such as a CPU-internal GDT load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervisor {
    /// Always supervisor, independent of CPL. Never an instruction fetch.
    Implicit,
    /// Privilege follows CPL as usual.
    Explicit,
}

/// One linear memory access awaiting translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearAccess {
    linear_addr: u64,
    access_type: AccessType,
    supervisor: Supervisor,
}

impl LinearAccess {
    /// Builds an explicit access. Panics if `access_type` is `Execute` and
    /// `supervisor` is `Implicit` — an implicit access never fetches an
    /// instruction.
    #[must_use]
    pub fn new(linear_addr: u64, access_type: AccessType, supervisor: Supervisor) -> Self {
        assert!(
            !(supervisor == Supervisor::Implicit && access_type == AccessType::Execute),
            "an implicit-supervisor access can never be an instruction fetch"
        );
        Self { linear_addr, access_type, supervisor }
    }

    /// Builds an explicit access, the common case for data reads/writes and
    /// ordinary instruction fetches.
    #[must_use]
    pub fn explicit(linear_addr: u64, access_type: AccessType) -> Self {
        Self::new(linear_addr, access_type, Supervisor::Explicit)
    }

    #[must_use]
    pub const fn linear_addr(&self) -> u64 {
        self.linear_addr
    }

    #[must_use]
    pub const fn access_type(&self) -> AccessType {
        self.access_type
    }

    #[must_use]
    pub const fn supervisor(&self) -> Supervisor {
        self.supervisor
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self.access_type, AccessType::Write)
    }

    #[must_use]
    pub const fn is_data_read(&self) -> bool {
        matches!(self.access_type, AccessType::Read)
    }

    #[must_use]
    pub const fn is_instruction_fetch(&self) -> bool {
        matches!(self.access_type, AccessType::Execute)
    }

    #[must_use]
    pub const fn is_implicit_supervisor(&self) -> bool {
        matches!(self.supervisor, Supervisor::Implicit)
    }
}
