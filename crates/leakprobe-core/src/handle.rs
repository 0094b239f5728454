//! Region handles and reachability anchors.
//!
//! A [`RegionHandle`] is the only root through which a region is reachable.
//! Handles are move-only: cloning one would let two table slots own the
//! same region. The collaborator that minted a handle keeps the matching
//! [`Reachability`] token and asks it, during an audit, whether any handle
//! still exists. A region whose handle was dropped without being returned
//! to the runtime is unreachable but not freed, i.e. leaked.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::id::RegionId;

/// Opaque reference to one allocated region.
///
/// Returned by the allocation methods of
/// [`LeakRuntime`](crate::traits::LeakRuntime) and consumed by
/// `reallocate`/`deallocate`. Consuming the handle on release makes a
/// double free unrepresentable.
#[derive(Debug)]
#[must_use = "dropping a region handle without deallocating it leaks the region"]
pub struct RegionHandle {
    id: RegionId,
    addr: usize,
    anchor: Arc<()>,
}

impl RegionHandle {
    /// Mint a handle for a freshly allocated region.
    ///
    /// Returns the handle together with the reachability token the
    /// runtime keeps for audits.
    pub fn new(id: RegionId, addr: usize) -> (Self, Reachability) {
        let anchor = Arc::new(());
        let token = Reachability(Arc::downgrade(&anchor));
        (Self { id, addr, anchor }, token)
    }

    /// The region this handle refers to.
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Start address of the region.
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Whether `token` tracks this handle.
    pub fn is_tracked_by(&self, token: &Reachability) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.anchor), token.0.as_ptr())
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {} @ {:#x}", self.id, self.addr)
    }
}

/// Handle for a region obtained through `allocate_aligned`.
///
/// Kept distinct from [`RegionHandle`] so that it can only be released
/// through `deallocate_aligned`.
#[derive(Debug)]
#[must_use = "dropping an aligned handle without deallocating it leaks the region"]
pub struct AlignedHandle {
    region: RegionHandle,
    align: usize,
}

impl AlignedHandle {
    /// Mint a handle for a freshly allocated aligned region.
    pub fn new(id: RegionId, addr: usize, align: usize) -> (Self, Reachability) {
        let (region, token) = RegionHandle::new(id, addr);
        (Self { region, align }, token)
    }

    /// The region this handle refers to.
    pub fn id(&self) -> RegionId {
        self.region.id()
    }

    /// Start address of the region.
    pub fn addr(&self) -> usize {
        self.region.addr()
    }

    /// Alignment that was requested for the region.
    pub fn align(&self) -> usize {
        self.align
    }

    /// Whether `token` tracks this handle.
    pub fn is_tracked_by(&self, token: &Reachability) -> bool {
        self.region.is_tracked_by(token)
    }

    /// Whether the address honours the requested alignment.
    pub fn is_aligned(&self) -> bool {
        self.align != 0 && self.addr() % self.align == 0
    }
}

/// Weak reachability token kept by the runtime for each live region.
#[derive(Clone, Debug)]
pub struct Reachability(Weak<()>);

impl Reachability {
    /// Whether a handle for the region still exists somewhere.
    pub fn is_reachable(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_reachable_while_alive() {
        let (handle, token) = RegionHandle::new(RegionId(7), 0x1000);
        assert!(token.is_reachable());
        assert!(handle.is_tracked_by(&token));
        assert_eq!(handle.id(), RegionId(7));
        assert_eq!(handle.addr(), 0x1000);
        drop(handle);
        assert!(!token.is_reachable());
    }

    #[test]
    fn moving_a_handle_keeps_it_reachable() {
        let (handle, token) = RegionHandle::new(RegionId(1), 0x2000);
        let mut slots: Vec<Option<RegionHandle>> = vec![None, None];
        slots[1] = Some(handle);
        assert!(token.is_reachable());
        let moved = slots[1].take();
        assert!(token.is_reachable());
        drop(moved);
        assert!(!token.is_reachable());
    }

    #[test]
    fn token_does_not_track_other_handles() {
        let (a, _ta) = RegionHandle::new(RegionId(1), 0x10);
        let (_b, tb) = RegionHandle::new(RegionId(2), 0x20);
        assert!(!a.is_tracked_by(&tb));
    }

    #[test]
    fn aligned_handle_checks_alignment() {
        let (ok, _t1) = AlignedHandle::new(RegionId(1), 0x1040, 16);
        assert!(ok.is_aligned());
        let (bad, _t2) = AlignedHandle::new(RegionId(2), 0x1044, 16);
        assert!(!bad.is_aligned());
        let (zero, _t3) = AlignedHandle::new(RegionId(3), 0x1040, 0);
        assert!(!zero.is_aligned());
    }

    #[test]
    fn display_shows_id_and_address() {
        let (h, _t) = RegionHandle::new(RegionId(12), 0x1f0);
        assert_eq!(h.to_string(), "region 12 @ 0x1f0");
    }
}
