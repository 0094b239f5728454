//! Fixed-size table of region handles.
//!
//! Each slot is explicitly present or absent. Reading or releasing an
//! absent slot is an error rather than a silent stale read, and storing
//! into an occupied slot hands the displaced handle back to the caller
//! so it can be released instead of dropped.

use leakprobe_core::RegionHandle;

use crate::error::HarnessError;

/// Indexed table of live region handles.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Option<RegionHandle>>,
}

impl SlotTable {
    /// Create a table of `len` vacant slots.
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots currently holding a handle.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether `slot` holds a handle. Out-of-range slots are vacant.
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.is_some())
    }

    /// Borrow the handle in `slot`.
    pub fn get(&self, slot: usize) -> Result<&RegionHandle, HarnessError> {
        self.entry(slot)?
            .as_ref()
            .ok_or(HarnessError::SlotVacant { slot })
    }

    /// Store `handle` in `slot`, returning the handle it displaced.
    #[must_use = "a displaced handle must be released, not dropped"]
    pub fn put(
        &mut self,
        slot: usize,
        handle: RegionHandle,
    ) -> Result<Option<RegionHandle>, HarnessError> {
        Ok(self.entry_mut(slot)?.replace(handle))
    }

    /// Remove and return the handle in `slot`, leaving it vacant.
    pub fn take(&mut self, slot: usize) -> Result<RegionHandle, HarnessError> {
        self.entry_mut(slot)?
            .take()
            .ok_or(HarnessError::SlotVacant { slot })
    }

    /// Remove every handle, in slot order.
    pub fn drain(&mut self) -> impl Iterator<Item = (usize, RegionHandle)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.take().map(|h| (i, h)))
    }

    /// Iterate over occupied slots.
    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, &RegionHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|h| (i, h)))
    }

    fn entry(&self, slot: usize) -> Result<&Option<RegionHandle>, HarnessError> {
        let len = self.slots.len();
        self.slots
            .get(slot)
            .ok_or(HarnessError::SlotOutOfRange { slot, len })
    }

    fn entry_mut(&mut self, slot: usize) -> Result<&mut Option<RegionHandle>, HarnessError> {
        let len = self.slots.len();
        self.slots
            .get_mut(slot)
            .ok_or(HarnessError::SlotOutOfRange { slot, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakprobe_core::RegionId;

    fn handle(id: u64) -> RegionHandle {
        RegionHandle::new(RegionId(id), 0x1000 + id as usize * 16).0
    }

    #[test]
    fn new_table_is_vacant() {
        let table = SlotTable::new(4);
        assert_eq!(table.len(), 4);
        assert!(!table.is_empty());
        assert_eq!(table.occupied(), 0);
        assert_eq!(table.get(0).unwrap_err(), HarnessError::SlotVacant { slot: 0 });
    }

    #[test]
    fn put_then_get() {
        let mut table = SlotTable::new(4);
        assert!(table.put(2, handle(1)).unwrap().is_none());
        assert!(table.is_occupied(2));
        assert_eq!(table.get(2).unwrap().id(), RegionId(1));
        assert_eq!(table.occupied(), 1);
    }

    #[test]
    fn put_returns_displaced_handle() {
        let mut table = SlotTable::new(2);
        assert!(table.put(0, handle(1)).unwrap().is_none());
        let displaced = table.put(0, handle(2)).unwrap().unwrap();
        assert_eq!(displaced.id(), RegionId(1));
        assert_eq!(table.get(0).unwrap().id(), RegionId(2));
        assert_eq!(table.occupied(), 1);
    }

    #[test]
    fn take_vacates() {
        let mut table = SlotTable::new(2);
        assert!(table.put(1, handle(5)).unwrap().is_none());
        let h = table.take(1).unwrap();
        assert_eq!(h.id(), RegionId(5));
        assert!(!table.is_occupied(1));
        assert_eq!(table.take(1).unwrap_err(), HarnessError::SlotVacant { slot: 1 });
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut table = SlotTable::new(2);
        assert_eq!(
            table.get(2).unwrap_err(),
            HarnessError::SlotOutOfRange { slot: 2, len: 2 }
        );
        assert!(table.put(9, handle(1)).is_err());
        assert!(table.take(3).is_err());
        assert!(!table.is_occupied(9));
    }

    #[test]
    fn drain_empties_in_slot_order() {
        let mut table = SlotTable::new(5);
        for (slot, id) in [(4, 40), (1, 10), (3, 30)] {
            assert!(table.put(slot, handle(id)).unwrap().is_none());
        }
        let drained: Vec<usize> = table.drain().map(|(slot, _h)| slot).collect();
        assert_eq!(drained, vec![1, 3, 4]);
        assert_eq!(table.occupied(), 0);
    }

    #[test]
    fn iter_occupied_skips_vacant() {
        let mut table = SlotTable::new(3);
        assert!(table.put(0, handle(1)).unwrap().is_none());
        assert!(table.put(2, handle(3)).unwrap().is_none());
        let ids: Vec<RegionId> = table.iter_occupied().map(|(_, h)| h.id()).collect();
        assert_eq!(ids, vec![RegionId(1), RegionId(3)]);
    }
}
