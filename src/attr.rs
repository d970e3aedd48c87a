//! Combinable permission attribute carried by a [`crate::entry::TlbEntry`].

bitflags::bitflags! {
    /// The four permission bits tracked across a page-table walk, packed
    /// the same way a page-table entry stores them.
    ///
    /// `XD` and `D` are stored **inverted**: a set `Xd`/`D` flag in this
    /// bitflags value means the architectural bit is actually clear. That
    /// makes [`TlbAttr::combine`] a single bitwise AND regardless of
    /// whether the architectural semantics for that bit are "most
    /// restrictive wins" (W, U) or "least permissive loses" (XD, D) — see
    /// §4.2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Packed: u64 {
        /// Writable (W), stored non-inverted.
        const W = 1 << 1;
        /// User-accessible (U), stored non-inverted.
        const U = 1 << 2;
        /// Execute-disable (XD), stored inverted: set here means XD=0.
        const XD_CLEAR = 1 << 63;
        /// Dirty (D), stored inverted: set here means D=0.
        const D_CLEAR = 1 << 6;
    }
}

/// A packed, combinable permission descriptor: writable, user-accessible,
/// execute-disable, and dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbAttr(Packed);

impl TlbAttr {
    /// Builds an attribute from the individual architectural bit values
    /// (i.e. `xd` and `d` are given in their natural, non-inverted sense).
    #[must_use]
    pub fn new(w: bool, u: bool, xd: bool, d: bool) -> Self {
        let mut packed = Packed::empty();
        packed.set(Packed::W, w);
        packed.set(Packed::U, u);
        packed.set(Packed::XD_CLEAR, !xd);
        packed.set(Packed::D_CLEAR, !d);
        Self(packed)
    }

    /// Builds an attribute directly from a raw page-table entry word,
    /// keeping only the W/U/XD/D bits at their architectural positions
    /// (bits 1, 2, 63, 6 respectively) and inverting XD/D on the way in.
    #[must_use]
    pub fn from_raw_entry(entry: u64) -> Self {
        Self(Packed::from_bits_retain(entry) ^ (Packed::D_CLEAR | Packed::XD_CLEAR))
    }

    #[must_use]
    pub const fn is_w(&self) -> bool {
        self.0.contains(Packed::W)
    }

    #[must_use]
    pub const fn is_u(&self) -> bool {
        self.0.contains(Packed::U)
    }

    #[must_use]
    pub const fn is_xd(&self) -> bool {
        !self.0.contains(Packed::XD_CLEAR)
    }

    #[must_use]
    pub const fn is_d(&self) -> bool {
        !self.0.contains(Packed::D_CLEAR)
    }

    /// Marks the entry dirty (sets D).
    pub fn set_d(&mut self) {
        self.0.remove(Packed::D_CLEAR);
    }

    /// Combines two attributes across page-table levels: W and U
    /// restrictively (AND), XD and D permissively in the architectural
    /// sense (OR), which the inverted storage reduces to a plain AND of
    /// the packed bits.
    #[must_use]
    pub fn combine(a: Self, b: Self) -> Self {
        Self(a.0 & b.0)
    }

    /// The attribute used for the no-paging sentinel translation:
    /// everything permitted, dirty pre-set so a write never re-triggers a
    /// walk.
    #[must_use]
    pub fn no_paging() -> Self {
        Self::new(true, true, false, true)
    }
}

impl Default for TlbAttr {
    /// The neutral value a walk's attribute accumulator starts from: W=1,
    /// U=1, XD=0, D=0. This is the true identity of [`TlbAttr::combine`]
    /// (AND of the packed form leaves the other operand untouched) — note
    /// that this is deliberately *not* [`TlbAttr::no_paging`], which has D
    /// pre-set and is reserved for the PHYS-mode sentinel entry. The two
    /// coincide on W, U and XD but diverge on D; only this neutral value
    /// combines as an identity for every bit.
    fn default() -> Self {
        Self::new(true, true, false, false)
    }
}
