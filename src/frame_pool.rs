//! Frame buffer pool carved out of a fixed memory region.

use crate::config::GrabMode;
use heapless::{consts, Vec};

/// State of one slot in the pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Slot {
    /// Can be handed to the DMA.
    Free,
    /// Holds `len` bytes of frame number `seq`.
    Filled { seq: u32, len: usize },
    /// Lent out to the application.
    Lent { len: usize },
}

/// Pool errors.
#[derive(Debug, Eq, PartialEq)]
pub enum PoolError {
    /// The slots don't fit in the memory region.
    RegionTooSmall,
    /// More slots than the pool can track, or zero.
    BadSlotCount,
    /// Slot index out of range.
    BadSlot,
    /// The slot was not in the state the call expects (e.g. returned twice).
    BadState,
}

/// `FramePool` is initialized with a base address, a slot size (bytes) and a slot count. Slots
/// cycle `Free -> Filled -> Lent -> Free`; a slot is lent to at most one owner at a time.
#[derive(Clone, Debug)]
pub struct FramePool {
    /// Base address of the region. This field does not change after calling `new`.
    mem_base: u32,

    /// Size of a single slot in bytes. This field does not change after calling `new`.
    slot_size: usize,

    /// Slot states.
    slots: Vec<Slot, consts::U4>,

    /// Number of frames filled so far (calls to `mark_filled`). Increases forever.
    num_caps: u32,
}

impl FramePool {
    /// Creates a new pool of `count` slots of `slot_size` bytes starting at `base`.
    pub fn new(
        base: u32,
        region_size: usize,
        slot_size: usize,
        count: usize,
    ) -> Result<Self, PoolError> {
        if count == 0 || count > 4 {
            return Err(PoolError::BadSlotCount);
        }
        if slot_size == 0 || slot_size.checked_mul(count).map_or(true, |n| n > region_size) {
            return Err(PoolError::RegionTooSmall);
        }

        let mut slots = Vec::new();
        for _ in 0..count {
            slots.push(Slot::Free).map_err(|_| PoolError::BadSlotCount)?;
        }

        Ok(FramePool {
            mem_base: base,
            slot_size,
            slots,
            num_caps: 0,
        })
    }

    /// Address of slot `index`.
    pub fn addr(&self, index: usize) -> u32 {
        self.mem_base + (index * self.slot_size) as u32
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pick a slot for the next capture. A free slot if there is one, otherwise in `Latest`
    /// mode the oldest filled frame gets overwritten. Lent slots are never touched.
    pub fn next_slot(&self, mode: GrabMode) -> Option<usize> {
        if let Some(index) = self.slots.iter().position(|s| *s == Slot::Free) {
            return Some(index);
        }

        match mode {
            GrabMode::WhenEmpty => None,
            GrabMode::Latest => self.filled_by(|a, b| a < b),
        }
    }

    /// Record that the DMA wrote `len` bytes into slot `index`.
    pub fn mark_filled(&mut self, index: usize, len: usize) -> Result<(), PoolError> {
        let slot = self.slots.get_mut(index).ok_or(PoolError::BadSlot)?;
        match *slot {
            Slot::Lent { .. } => Err(PoolError::BadState),
            _ => {
                *slot = Slot::Filled {
                    seq: self.num_caps,
                    len,
                };
                self.num_caps += 1;
                Ok(())
            }
        }
    }

    /// Lend out a filled frame: the newest in `Latest` mode, the oldest in `WhenEmpty` mode.
    /// Returns the slot index and the frame length.
    pub fn take(&mut self, mode: GrabMode) -> Option<(usize, usize)> {
        let index = match mode {
            GrabMode::Latest => self.filled_by(|a, b| a > b),
            GrabMode::WhenEmpty => self.filled_by(|a, b| a < b),
        }?;

        match self.slots[index] {
            Slot::Filled { len, .. } => {
                self.slots[index] = Slot::Lent { len };
                Some((index, len))
            }
            _ => None,
        }
    }

    /// Take back a lent slot.
    pub fn give_back(&mut self, index: usize) -> Result<(), PoolError> {
        let slot = self.slots.get_mut(index).ok_or(PoolError::BadSlot)?;
        match *slot {
            Slot::Lent { .. } => {
                *slot = Slot::Free;
                Ok(())
            }
            _ => Err(PoolError::BadState),
        }
    }

    /// Number of slots currently lent out.
    pub fn lent(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Lent { .. }))
            .count()
    }

    /// Index of the filled slot whose sequence number wins `better` against all others.
    fn filled_by<F: Fn(u32, u32) -> bool>(&self, better: F) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Slot::Filled { seq, .. } = *slot {
                best = match best {
                    Some((_, best_seq)) if !better(seq, best_seq) => best,
                    _ => Some((index, seq)),
                };
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0xC000_0000;

    #[test]
    fn slots_must_fit_region() {
        assert_eq!(
            FramePool::new(BASE, 1000, 600, 2).unwrap_err(),
            PoolError::RegionTooSmall
        );
        assert_eq!(
            FramePool::new(BASE, 1000, 100, 0).unwrap_err(),
            PoolError::BadSlotCount
        );
        assert_eq!(
            FramePool::new(BASE, 1 << 20, 100, 5).unwrap_err(),
            PoolError::BadSlotCount
        );
    }

    #[test]
    fn slot_addresses_are_contiguous() {
        let pool = FramePool::new(BASE, 0x10_0000, 0x4_0000, 2).unwrap();
        assert_eq!(pool.addr(0), BASE);
        assert_eq!(pool.addr(1), BASE + 0x4_0000);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn latest_mode_hands_out_newest_frame() {
        let mut pool = FramePool::new(BASE, 4096, 1024, 2).unwrap();
        pool.mark_filled(0, 10).unwrap();
        pool.mark_filled(1, 20).unwrap();
        assert_eq!(pool.take(GrabMode::Latest), Some((1, 20)));
        assert_eq!(pool.lent(), 1);
    }

    #[test]
    fn when_empty_mode_hands_out_oldest_frame() {
        let mut pool = FramePool::new(BASE, 4096, 1024, 2).unwrap();
        pool.mark_filled(1, 20).unwrap();
        pool.mark_filled(0, 10).unwrap();
        assert_eq!(pool.take(GrabMode::WhenEmpty), Some((1, 20)));
    }

    #[test]
    fn full_pool_overwrites_only_in_latest_mode() {
        let mut pool = FramePool::new(BASE, 4096, 1024, 2).unwrap();
        pool.mark_filled(0, 10).unwrap();
        pool.mark_filled(1, 20).unwrap();
        assert_eq!(pool.next_slot(GrabMode::WhenEmpty), None);
        assert_eq!(pool.next_slot(GrabMode::Latest), Some(0));
    }

    #[test]
    fn lent_slots_are_never_reused() {
        let mut pool = FramePool::new(BASE, 4096, 1024, 1).unwrap();
        pool.mark_filled(0, 10).unwrap();
        assert_eq!(pool.take(GrabMode::Latest), Some((0, 10)));
        assert_eq!(pool.next_slot(GrabMode::Latest), None);
        assert_eq!(pool.mark_filled(0, 5), Err(PoolError::BadState));
        assert_eq!(pool.take(GrabMode::Latest), None);
    }

    #[test]
    fn double_give_back_is_rejected() {
        let mut pool = FramePool::new(BASE, 4096, 1024, 2).unwrap();
        pool.mark_filled(0, 10).unwrap();
        let (index, _) = pool.take(GrabMode::Latest).unwrap();
        assert_eq!(pool.give_back(index), Ok(()));
        assert_eq!(pool.give_back(index), Err(PoolError::BadState));
        assert_eq!(pool.give_back(7), Err(PoolError::BadSlot));
        assert_eq!(pool.next_slot(GrabMode::WhenEmpty), Some(0));
    }
}
