//! "Determination of Access Rights" — Intel SDM Vol. 3 §4.6.1.

use crate::access::LinearAccess;
use crate::entry::TlbEntry;
use crate::paging_state::{PagingMode, PagingState};

/// Decides whether `entry` (already carrying the combined attribute from a
/// walk, or pulled straight from a TLB) permits `op` under `state`.
///
/// This mirrors the manual's access-rights tables branch for branch; once
/// every branch below is covered by a test, it could be collapsed, but
/// keeping the 1:1 structure makes it possible to audit against the manual
/// directly.
#[must_use]
pub fn allows(entry: &TlbEntry, op: &LinearAccess, state: &PagingState) -> bool {
    let mode = state.paging_mode();

    if matches!(mode, PagingMode::Phys) {
        return true;
    }

    let attr = entry.attr();

    if op.is_implicit_supervisor() || state.is_supervisor() {
        // Data may be read from any supervisor-mode address.
        if op.is_data_read() && !attr.is_u() {
            return true;
        }

        // Data reads from user-mode pages depend on CR4.SMAP.
        if op.is_data_read() && attr.is_u() {
            if !state.cr4_smap() {
                return true;
            }
            return state.rflags_ac() && !op.is_implicit_supervisor();
        }

        // Writes to supervisor-mode addresses depend on CR0.WP.
        if op.is_write() && !attr.is_u() {
            if !state.cr0_wp() {
                return true;
            }
            return attr.is_w();
        }

        // Writes to user-mode addresses depend on CR0.WP and CR4.SMAP.
        if op.is_write() && attr.is_u() {
            if !state.cr0_wp() {
                if !state.cr4_smap() {
                    return true;
                }
                return state.rflags_ac() && !op.is_implicit_supervisor();
            }
            // CR0.WP = 1
            if !state.cr4_smap() {
                return attr.is_w();
            }
            return state.rflags_ac() && !op.is_implicit_supervisor() && attr.is_w();
        }

        // Instruction fetches from supervisor-mode addresses.
        if op.is_instruction_fetch() && !attr.is_u() {
            if matches!(mode, PagingMode::Pm32) || !state.efer_nxe() {
                return true;
            }
            return !attr.is_xd();
        }

        // Instruction fetches from user-mode addresses.
        if op.is_instruction_fetch() && attr.is_u() {
            if state.cr4_smep() {
                return false;
            }
            if matches!(mode, PagingMode::Pm32) || !state.efer_nxe() {
                return true;
            }
            return !attr.is_xd();
        }

        unreachable!("every supervisor-mode access kind is covered above");
    }

    // User-mode accesses (CPL=3, explicit).

    if op.is_data_read() {
        return attr.is_u();
    }

    if op.is_write() {
        return attr.is_u() && attr.is_w();
    }

    if op.is_instruction_fetch() {
        if !attr.is_u() {
            return false;
        }
        if matches!(mode, PagingMode::Pm32) || !state.efer_nxe() {
            return true;
        }
        return !attr.is_xd();
    }

    unreachable!("every user-mode access kind is covered above");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessType, Supervisor};
    use crate::attr::TlbAttr;
    use crate::paging_state::{Cr0, Cr4, Efer, RFlags};

    fn entry(u: bool, w: bool, xd: bool) -> TlbEntry {
        TlbEntry::new(0, 0, 12, TlbAttr::new(w, u, xd, false))
    }

    fn supervisor_state(cr0: Cr0, cr4: Cr4, efer: Efer, rflags: RFlags) -> PagingState {
        PagingState::without_pdpte(rflags, Cr0::PG | cr0, 0, cr4, efer, 0)
    }

    fn user_state(cr4: Cr4, efer: Efer) -> PagingState {
        PagingState::without_pdpte(RFlags::empty(), Cr0::PG, 0, cr4, efer, 3)
    }

    #[test]
    fn phys_mode_allows_everything() {
        let s = PagingState::without_pdpte(RFlags::empty(), Cr0::empty(), 0, Cr4::empty(), Efer::empty(), 3);
        let e = entry(false, false, true);
        let op = LinearAccess::explicit(0, AccessType::Write);
        assert!(allows(&e, &op, &s));
    }

    #[test]
    fn supervisor_read_from_supervisor_page_is_allowed() {
        let s = supervisor_state(Cr0::empty(), Cr4::empty(), Efer::empty(), RFlags::empty());
        let e = entry(false, false, false);
        let op = LinearAccess::explicit(0, AccessType::Read);
        assert!(allows(&e, &op, &s));
    }

    #[test]
    fn supervisor_read_from_user_page_needs_smap_clear_or_ac() {
        let e = entry(true, false, false);
        let op = LinearAccess::explicit(0, AccessType::Read);

        let smap_off = supervisor_state(Cr0::empty(), Cr4::empty(), Efer::empty(), RFlags::empty());
        assert!(allows(&e, &op, &smap_off));

        let smap_on_no_ac = supervisor_state(Cr0::empty(), Cr4::SMAP, Efer::empty(), RFlags::empty());
        assert!(!allows(&e, &op, &smap_on_no_ac));

        let smap_on_ac = supervisor_state(Cr0::empty(), Cr4::SMAP, Efer::empty(), RFlags::AC);
        assert!(allows(&e, &op, &smap_on_ac));
    }

    #[test]
    fn supervisor_read_from_user_page_implicit_ignores_ac() {
        let e = entry(true, false, false);
        let op = LinearAccess::new(0, AccessType::Read, Supervisor::Implicit);
        let smap_on_ac = supervisor_state(Cr0::empty(), Cr4::SMAP, Efer::empty(), RFlags::AC);
        assert!(!allows(&e, &op, &smap_on_ac));
    }

    #[test]
    fn supervisor_write_to_supervisor_page_needs_wp_and_w() {
        let op = LinearAccess::explicit(0, AccessType::Write);

        let wp_off_not_w = supervisor_state(Cr0::empty(), Cr4::empty(), Efer::empty(), RFlags::empty());
        assert!(allows(&entry(false, false, false), &op, &wp_off_not_w));

        let wp_on = supervisor_state(Cr0::WP, Cr4::empty(), Efer::empty(), RFlags::empty());
        assert!(!allows(&entry(false, false, false), &op, &wp_on));
        assert!(allows(&entry(false, true, false), &op, &wp_on));
    }

    #[test]
    fn supervisor_write_to_user_page_matrix() {
        let op = LinearAccess::explicit(0, AccessType::Write);
        let rw_entry = entry(true, true, false);
        let ro_entry = entry(true, false, false);

        // WP=0, SMAP=0: always allowed regardless of W.
        let s = supervisor_state(Cr0::empty(), Cr4::empty(), Efer::empty(), RFlags::empty());
        assert!(allows(&ro_entry, &op, &s));

        // WP=0, SMAP=1, AC=0: denied.
        let s = supervisor_state(Cr0::empty(), Cr4::SMAP, Efer::empty(), RFlags::empty());
        assert!(!allows(&ro_entry, &op, &s));

        // WP=0, SMAP=1, AC=1: allowed regardless of W.
        let s = supervisor_state(Cr0::empty(), Cr4::SMAP, Efer::empty(), RFlags::AC);
        assert!(allows(&ro_entry, &op, &s));

        // WP=1, SMAP=0: requires W.
        let s = supervisor_state(Cr0::WP, Cr4::empty(), Efer::empty(), RFlags::empty());
        assert!(!allows(&ro_entry, &op, &s));
        assert!(allows(&rw_entry, &op, &s));

        // WP=1, SMAP=1, AC=1: requires W.
        let s = supervisor_state(Cr0::WP, Cr4::SMAP, Efer::empty(), RFlags::AC);
        assert!(!allows(&ro_entry, &op, &s));
        assert!(allows(&rw_entry, &op, &s));

        // WP=1, SMAP=1, AC=0: denied regardless of W.
        let s = supervisor_state(Cr0::WP, Cr4::SMAP, Efer::empty(), RFlags::empty());
        assert!(!allows(&rw_entry, &op, &s));
    }

    #[test]
    fn supervisor_fetch_from_supervisor_page() {
        let op = LinearAccess::explicit(0, AccessType::Execute);

        let pm32 = PagingState::without_pdpte(RFlags::empty(), Cr0::PG, 0, Cr4::empty(), Efer::NXE, 0);
        assert!(allows(&entry(false, false, true), &op, &pm32));

        let nxe_off = supervisor_state(Cr0::empty(), Cr4::PAE, Efer::empty(), RFlags::empty());
        assert!(allows(&entry(false, false, true), &op, &nxe_off));

        let nxe_on = supervisor_state(Cr0::empty(), Cr4::PAE, Efer::NXE, RFlags::empty());
        assert!(!allows(&entry(false, false, true), &op, &nxe_on));
        assert!(allows(&entry(false, false, false), &op, &nxe_on));
    }

    #[test]
    fn supervisor_fetch_from_user_page_respects_smep() {
        let op = LinearAccess::explicit(0, AccessType::Execute);

        let smep_on = supervisor_state(Cr0::empty(), Cr4::SMEP, Efer::empty(), RFlags::empty());
        assert!(!allows(&entry(true, false, false), &op, &smep_on));

        let smep_off_nxe_on = supervisor_state(Cr0::empty(), Cr4::PAE, Efer::NXE, RFlags::empty());
        assert!(!allows(&entry(true, false, true), &op, &smep_off_nxe_on));
        assert!(allows(&entry(true, false, false), &op, &smep_off_nxe_on));
    }

    #[test]
    fn user_read_requires_u() {
        let op = LinearAccess::explicit(0, AccessType::Read);
        let s = user_state(Cr4::empty(), Efer::empty());
        assert!(allows(&entry(true, false, false), &op, &s));
        assert!(!allows(&entry(false, false, false), &op, &s));
    }

    #[test]
    fn user_write_requires_u_and_w() {
        let op = LinearAccess::explicit(0, AccessType::Write);
        let s = user_state(Cr4::empty(), Efer::empty());
        assert!(allows(&entry(true, true, false), &op, &s));
        assert!(!allows(&entry(true, false, false), &op, &s));
        assert!(!allows(&entry(false, true, false), &op, &s));
    }

    #[test]
    fn user_fetch_requires_u_and_respects_nxe() {
        let op = LinearAccess::explicit(0, AccessType::Execute);

        let s = user_state(Cr4::empty(), Efer::empty());
        assert!(!allows(&entry(false, false, false), &op, &s));
        assert!(allows(&entry(true, false, true), &op, &s));

        let s = user_state(Cr4::PAE, Efer::NXE);
        assert!(!allows(&entry(true, false, true), &op, &s));
        assert!(allows(&entry(true, false, false), &op, &s));
    }
}
