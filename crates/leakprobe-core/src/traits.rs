//! Capability traits exposed by a leak detector and its allocator.
//!
//! The harness never touches process-wide collaborator state directly.
//! It configures a [`RuntimeProvider`], consumes it with
//! [`init`](RuntimeProvider::init), and drives the returned
//! [`LeakRuntime`] for the rest of the run.

use crate::handle::{AlignedHandle, RegionHandle};
use crate::leak::LeakReport;

/// One-shot constructor for a collaborator runtime.
///
/// Leak finding must be configured before `init`, since the runtime may
/// fix its instrumentation at initialization time. `init` consumes the
/// provider, so a runtime is initialized exactly once.
pub trait RuntimeProvider {
    /// The runtime produced by initialization.
    type Runtime: LeakRuntime;

    /// Toggle leak-finding instrumentation.
    fn enable_leak_finding(&mut self, enabled: bool);

    /// Perform one-time initialization.
    fn init(self) -> Self::Runtime;
}

/// Allocation lifecycle and leak-audit operations of an initialized runtime.
///
/// Allocation methods return `None` for a null result. Reallocation
/// follows the usual contract: on failure the original region is left
/// untouched and its handle is handed back in `Err`.
pub trait LeakRuntime {
    /// Whether leak finding was enabled when the runtime was initialized.
    fn leak_finding_enabled(&self) -> bool;

    /// Allocate `size` bytes.
    fn allocate(&mut self, size: usize) -> Option<RegionHandle>;

    /// Allocate `size` bytes at an address that is a multiple of `align`.
    fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<AlignedHandle>;

    /// Release a region obtained from [`allocate_aligned`](Self::allocate_aligned).
    fn deallocate_aligned(&mut self, handle: AlignedHandle);

    /// Allocate a terminated copy of `s`.
    fn allocate_copy_of(&mut self, s: &str) -> Option<RegionHandle>;

    /// Allocate a terminated copy of at most `max_len` bytes of `s`.
    fn allocate_bounded_copy_of(&mut self, s: &str, max_len: usize) -> Option<RegionHandle>;

    /// Resize a region to `new_size` bytes, preserving contents up to the
    /// smaller of the old and new sizes.
    fn reallocate(
        &mut self,
        handle: RegionHandle,
        new_size: usize,
    ) -> Result<RegionHandle, RegionHandle>;

    /// Resize a region to hold `count` elements of `elem_size` bytes.
    ///
    /// Fails without touching the region if the multiplication overflows.
    fn reallocate_array(
        &mut self,
        handle: RegionHandle,
        count: usize,
        elem_size: usize,
    ) -> Result<RegionHandle, RegionHandle> {
        match count.checked_mul(elem_size) {
            Some(new_size) => self.reallocate(handle, new_size),
            None => Err(handle),
        }
    }

    /// Release a region.
    fn deallocate(&mut self, handle: RegionHandle);

    /// Usable size of a live region, at least the size that was requested.
    fn usable_size(&self, handle: &RegionHandle) -> usize;

    /// Scan for regions that are allocated but no longer reachable.
    fn audit_for_leaks(&mut self) -> LeakReport;
}
