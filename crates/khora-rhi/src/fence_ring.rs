// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed-capacity ring of fence slots.
//!
//! Each slot remembers the generation (frame) it was last allocated in. A slot
//! is *in flight* until the GPU has retired that generation; handing it out
//! again before then means the ring wrapped faster than the GPU progressed,
//! which is a capacity failure and is fatal.

use khora_core::rhi::FenceId;

/// Generations start at 1 so that 0 can mean "nothing retired yet".
const FIRST_GENERATION: u32 = 1;

/// Allocates [`FenceId`]s from a fixed number of slots.
#[derive(Debug)]
pub struct FenceRing {
    slots: Vec<Option<u32>>,
    next: usize,
    current_generation: u32,
    retired_through: u32,
}

impl FenceRing {
    /// Creates a ring with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FenceRing capacity must be at least 1");
        Self {
            slots: vec![None; capacity],
            next: 0,
            current_generation: FIRST_GENERATION,
            retired_through: 0,
        }
    }

    /// The number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The generation new fences are allocated in.
    pub fn current_generation(&self) -> u32 {
        self.current_generation
    }

    /// The newest generation known to be complete on the GPU.
    pub fn retired_through(&self) -> u32 {
        self.retired_through
    }

    /// Returns `true` if `slot` holds a fence of a generation not yet retired.
    pub fn is_in_flight(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(generation)) if *generation > self.retired_through)
    }

    /// Allocates the next slot in the current generation.
    ///
    /// # Panics
    ///
    /// Panics if the next slot is still in flight.
    pub fn allocate(&mut self) -> FenceId {
        let slot = self.next;
        if let Some(generation) = self.slots[slot] {
            assert!(
                generation <= self.retired_through,
                "FenceRing exhausted: slot {slot} is still in flight (allocated in generation {generation}, \
                 retired through {}, current generation {}, capacity {})",
                self.retired_through,
                self.current_generation,
                self.slots.len()
            );
        }
        self.slots[slot] = Some(self.current_generation);
        self.next = (slot + 1) % self.slots.len();
        FenceId::new(self.current_generation, slot as u32)
    }

    /// Starts a new generation and returns it.
    pub fn advance_generation(&mut self) -> u32 {
        self.current_generation += 1;
        self.current_generation
    }

    /// Marks every generation up to `generation` as complete.
    ///
    /// The current generation is still being recorded and can never be
    /// retired, so `generation` is clamped below it. The watermark never moves
    /// backwards.
    pub fn retire_through(&mut self, generation: u32) {
        let clamped = generation.min(self.current_generation - 1);
        if clamped > self.retired_through {
            log::trace!("FenceRing: retired through generation {clamped}.");
            self.retired_through = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_generations_never_collide() {
        let capacity = 8;
        let mut ring = FenceRing::new(capacity);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..capacity {
            let id = ring.allocate();
            assert!(seen.insert(id.slot()), "slot {} handed out twice", id.slot());
            ring.advance_generation();
        }
        assert_eq!(seen.len(), capacity);
    }

    #[test]
    #[should_panic(expected = "FenceRing exhausted")]
    fn test_wrap_before_retirement_is_rejected() {
        let capacity = 4;
        let mut ring = FenceRing::new(capacity);
        for _ in 0..capacity {
            ring.allocate();
            ring.advance_generation();
        }
        // Slot 0 was allocated in generation 1, which never retired.
        ring.allocate();
    }

    #[test]
    #[should_panic(expected = "still in flight")]
    fn test_same_generation_reuse_is_rejected() {
        let mut ring = FenceRing::new(2);
        ring.allocate();
        ring.allocate();
        ring.allocate();
    }

    #[test]
    fn test_retired_slots_are_reused() {
        let capacity = 4;
        let mut ring = FenceRing::new(capacity);
        for _ in 0..capacity {
            ring.allocate();
            ring.advance_generation();
        }
        ring.retire_through(1);
        let id = ring.allocate();
        assert_eq!(id.slot(), 0);
        assert_eq!(id.generation(), ring.current_generation());
    }

    #[test]
    fn test_current_generation_cannot_retire() {
        let mut ring = FenceRing::new(2);
        ring.allocate();
        ring.retire_through(100);
        assert_eq!(ring.retired_through(), 0);
        assert!(ring.is_in_flight(0));

        ring.advance_generation();
        ring.retire_through(100);
        assert_eq!(ring.retired_through(), 1);
        assert!(!ring.is_in_flight(0));
    }

    #[test]
    fn test_watermark_never_moves_backwards() {
        let mut ring = FenceRing::new(2);
        for _ in 0..5 {
            ring.advance_generation();
        }
        ring.retire_through(4);
        ring.retire_through(2);
        assert_eq!(ring.retired_through(), 4);
    }
}
