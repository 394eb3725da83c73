//! Slab arena for tree nodes.
//!
//! The arena owns every node the tree ever creates. Storage is carved out of
//! backing blocks that grow geometrically, so the number of calls into the
//! system allocator is logarithmic in the peak number of live nodes:
//!
//! - Block `i` holds `initial_capacity * growth_factor^i` slots.
//! - A block is reserved exactly once and never reallocated, so a live slot's
//!   storage does not move.
//! - Released slots are threaded onto a singly linked free list (through the
//!   slots themselves) and are handed out again most-recently-released first.
//!
//! Slots are addressed by [`SlotId`], a `u32` index across all blocks. The
//! arena has no idea what the stored values mean; the tree keeps its topology
//! as `SlotId` links inside the values.

use std::collections::TryReserveError;
use std::ops::{Index, IndexMut};

use thiserror::Error;
use tracing::{debug, warn};

/// Slots in the first block, unless configured otherwise.
pub const DEFAULT_INITIAL_CAPACITY: usize = 10;

/// Multiplier applied to each successive block, unless configured otherwise.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Largest number of addressable slots (indices are `u32`).
const MAX_SLOTS: usize = u32::MAX as usize;

/// Errors produced while growing or configuring the arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The system allocator refused to reserve a new block.
    #[error("could not reserve a backing block of {slots} slots")]
    Reserve {
        slots: usize,
        #[source]
        source: TryReserveError,
    },

    /// The configured slot limit has been reached.
    #[error("arena limit of {limit} slots reached")]
    CapacityExhausted { limit: usize },

    /// Slot indices would no longer fit in a `u32`.
    #[error("slot index space exhausted")]
    IndexOverflow,

    #[error("invalid arena configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Sizing of the arena's backing blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Slots in the first backing block.
    pub initial_capacity: usize,
    /// Each new block is this many times larger than the previous one.
    pub growth_factor: usize,
    /// Upper bound on the total number of slots, if any.
    pub max_capacity: Option<usize>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_capacity: None,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.initial_capacity == 0 {
            return Err(ArenaError::InvalidConfig("initial_capacity must be non-zero"));
        }
        if self.growth_factor == 0 {
            return Err(ArenaError::InvalidConfig("growth_factor must be non-zero"));
        }
        if self.max_capacity == Some(0) {
            return Err(ArenaError::InvalidConfig("max_capacity must be non-zero"));
        }
        Ok(())
    }
}

/// Snapshot of the arena's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Slots currently holding a value.
    pub live: usize,
    /// Released slots waiting on the free list.
    pub free: usize,
    /// Total slots across all backing blocks.
    pub capacity: usize,
    /// Number of backing blocks.
    pub blocks: usize,
}

/// Index of a slot in a [`NodeArena`].
///
/// A `SlotId` stays valid from `acquire` until the matching `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotId(u32);

impl SlotId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<SlotId> },
}

#[derive(Debug)]
struct Block<T> {
    /// Never grows past `capacity`, so the buffer is never reallocated.
    slots: Vec<Slot<T>>,
    capacity: usize,
}

impl<T> Block<T> {
    fn reserve(capacity: usize) -> Result<Self, ArenaError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|source| ArenaError::Reserve {
                slots: capacity,
                source,
            })?;
        Ok(Self { slots, capacity })
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }
}

impl<T: Clone> Clone for Block<T> {
    fn clone(&self) -> Self {
        let mut slots = Vec::with_capacity(self.capacity);
        slots.extend(self.slots.iter().cloned());
        Self {
            slots,
            capacity: self.capacity,
        }
    }
}

/// Growable slot store with a free list of released slots.
#[derive(Debug, Clone)]
pub struct NodeArena<T> {
    blocks: Vec<Block<T>>,
    /// Index of the first slot of each block.
    block_starts: Vec<usize>,
    free_head: Option<SlotId>,
    free_len: usize,
    live: usize,
    capacity: usize,
    next_block: usize,
    config: ArenaConfig,
}

impl<T> NodeArena<T> {
    /// Creates an empty arena with the default block sizing.
    ///
    /// No memory is reserved until the first `acquire`.
    pub fn new() -> Self {
        Self::from_valid_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ArenaConfig) -> Self {
        Self {
            blocks: Vec::new(),
            block_starts: Vec::new(),
            free_head: None,
            free_len: 0,
            live: 0,
            capacity: 0,
            next_block: config.initial_capacity,
            config,
        }
    }

    /// Number of live slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of released slots on the free list.
    #[inline]
    pub fn free_len(&self) -> usize {
        self.free_len
    }

    /// Total slots across all blocks.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live: self.live,
            free: self.free_len,
            capacity: self.capacity,
            blocks: self.blocks.len(),
        }
    }

    /// Moves `value` into a slot and returns its id.
    ///
    /// The most recently released slot is reused first. Otherwise the next
    /// untouched slot of the newest block is used, and only when that block
    /// is full is a new one reserved. On error the arena is unchanged.
    pub fn acquire(&mut self, value: T) -> Result<SlotId, ArenaError> {
        if let Some(id) = self.free_head {
            let (block, offset) = self.locate(id);
            let slot = &mut self.blocks[block].slots[offset];
            let next_free = match slot {
                Slot::Vacant { next_free } => *next_free,
                Slot::Occupied(_) => unreachable!("free list entry {id:?} is occupied"),
            };
            *slot = Slot::Occupied(value);
            self.free_head = next_free;
            self.free_len -= 1;
            self.live += 1;
            return Ok(id);
        }

        if self.blocks.last().map_or(true, Block::is_full) {
            self.grow()?;
        }

        let start = self.block_starts.last().copied().unwrap_or(0);
        let Some(block) = self.blocks.last_mut() else {
            unreachable!("arena has a block after growing");
        };
        let id = SlotId((start + block.slots.len()) as u32);
        block.slots.push(Slot::Occupied(value));
        self.live += 1;
        Ok(id)
    }

    /// Returns a slot to the free list and moves its value out.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not live.
    pub fn release(&mut self, id: SlotId) -> T {
        match self.try_release(id) {
            Some(value) => value,
            None => panic!("release of vacant slot {id:?}"),
        }
    }

    /// Like [`release`](Self::release), but returns `None` for a slot that is
    /// not live.
    pub fn try_release(&mut self, id: SlotId) -> Option<T> {
        let next_free = self.free_head;
        let slot = self.slot_mut(id)?;
        if matches!(slot, Slot::Vacant { .. }) {
            return None;
        }
        let Slot::Occupied(value) = std::mem::replace(slot, Slot::Vacant { next_free }) else {
            unreachable!();
        };
        self.free_head = Some(id);
        self.free_len += 1;
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        match self.slot(id)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        match self.slot_mut(id)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Mutable access to two distinct live slots at once.
    ///
    /// # Panics
    ///
    /// Panics if `a == b` or either slot is not live.
    pub fn pair_mut(&mut self, a: SlotId, b: SlotId) -> (&mut T, &mut T) {
        assert_ne!(a, b, "pair_mut needs two distinct slots");
        let (block_a, offset_a) = self.locate(a);
        let (block_b, offset_b) = self.locate(b);

        let (slot_a, slot_b) = if block_a == block_b {
            let slots = &mut self.blocks[block_a].slots;
            if offset_a < offset_b {
                let (lo, hi) = slots.split_at_mut(offset_b);
                (&mut lo[offset_a], &mut hi[0])
            } else {
                let (lo, hi) = slots.split_at_mut(offset_a);
                (&mut hi[0], &mut lo[offset_b])
            }
        } else if block_a < block_b {
            let (lo, hi) = self.blocks.split_at_mut(block_b);
            (&mut lo[block_a].slots[offset_a], &mut hi[0].slots[offset_b])
        } else {
            let (lo, hi) = self.blocks.split_at_mut(block_a);
            (&mut hi[0].slots[offset_a], &mut lo[block_b].slots[offset_b])
        };

        match (slot_a, slot_b) {
            (Slot::Occupied(x), Slot::Occupied(y)) => (x, y),
            _ => panic!("pair_mut on vacant slot ({a:?}, {b:?})"),
        }
    }

    /// Drops every value and hands all blocks back to the system allocator.
    ///
    /// Block sizing starts over from `initial_capacity`.
    pub fn clear(&mut self) {
        debug!(
            blocks = self.blocks.len(),
            capacity = self.capacity,
            "releasing arena blocks"
        );
        *self = Self::from_valid_config(self.config);
    }

    fn grow(&mut self) -> Result<(), ArenaError> {
        let mut slots = self.next_block;
        if let Some(limit) = self.config.max_capacity {
            let remaining = limit.saturating_sub(self.capacity);
            if remaining == 0 {
                warn!(limit, "arena slot limit reached");
                return Err(ArenaError::CapacityExhausted { limit });
            }
            slots = slots.min(remaining);
        }
        let remaining = MAX_SLOTS - self.capacity;
        if remaining == 0 {
            warn!(capacity = self.capacity, "arena slot index space exhausted");
            return Err(ArenaError::IndexOverflow);
        }
        slots = slots.min(remaining);

        let block = Block::reserve(slots).inspect_err(|err| {
            warn!(slots, error = %err, "arena block reservation failed");
        })?;

        self.block_starts.push(self.capacity);
        self.blocks.push(block);
        self.capacity += slots;
        self.next_block = self.next_block.saturating_mul(self.config.growth_factor);
        debug!(
            block = self.blocks.len() - 1,
            slots,
            capacity = self.capacity,
            "arena grew"
        );
        Ok(())
    }

    /// Maps a slot id to `(block, offset)`.
    #[inline]
    fn locate(&self, id: SlotId) -> (usize, usize) {
        let block = self.block_starts.partition_point(|&start| start <= id.index()) - 1;
        (block, id.index() - self.block_starts[block])
    }

    fn slot(&self, id: SlotId) -> Option<&Slot<T>> {
        if id.index() >= self.capacity {
            return None;
        }
        let (block, offset) = self.locate(id);
        self.blocks[block].slots.get(offset)
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot<T>> {
        if id.index() >= self.capacity {
            return None;
        }
        let (block, offset) = self.locate(id);
        self.blocks[block].slots.get_mut(offset)
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<SlotId> for NodeArena<T> {
    type Output = T;

    fn index(&self, id: SlotId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("access to vacant slot {id:?}"),
        }
    }
}

impl<T> IndexMut<SlotId> for NodeArena<T> {
    fn index_mut(&mut self, id: SlotId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("access to vacant slot {id:?}"),
        }
    }
}
