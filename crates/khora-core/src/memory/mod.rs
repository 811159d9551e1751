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

//! Engine-wide counters for command arena memory.
//!
//! Every command arena reports the blocks it acquires and releases here, so
//! any part of the engine can read the total footprint of the command system
//! in a thread-safe manner, independently of which lists are alive.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// --- Global Arena Counters ---

/// Bytes currently held in arena blocks, including blocks parked in pools.
pub static ARENA_RESERVED_BYTES: AtomicUsize = AtomicUsize::new(0);

/// The peak value ever reached by [`ARENA_RESERVED_BYTES`].
pub static PEAK_ARENA_RESERVED_BYTES: AtomicU64 = AtomicU64::new(0);

/// The number of arena blocks ever acquired.
pub static ARENA_BLOCKS_ACQUIRED: AtomicU64 = AtomicU64::new(0);

/// The number of arena blocks ever released.
pub static ARENA_BLOCKS_RELEASED: AtomicU64 = AtomicU64::new(0);

/// Cumulative bytes handed out by arenas, padding included.
pub static ARENA_BYTES_ISSUED_LIFETIME: AtomicU64 = AtomicU64::new(0);

/// Records the acquisition of an arena block of `size` bytes.
pub fn record_block_acquired(size: usize) {
    let total = ARENA_RESERVED_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    PEAK_ARENA_RESERVED_BYTES.fetch_max(total as u64, Ordering::Relaxed);
    ARENA_BLOCKS_ACQUIRED.fetch_add(1, Ordering::Relaxed);
}

/// Records the release of an arena block of `size` bytes.
pub fn record_block_released(size: usize) {
    let result = ARENA_RESERVED_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        current.checked_sub(size)
    });
    if result.is_err() {
        log::error!("Arena reserved-bytes counter underflowed on release! Size: {size}");
    }
    ARENA_BLOCKS_RELEASED.fetch_add(1, Ordering::Relaxed);
}

/// Records `size` bytes served by an arena allocation.
#[inline]
pub fn record_bytes_issued(size: usize) {
    ARENA_BYTES_ISSUED_LIFETIME.fetch_add(size as u64, Ordering::Relaxed);
}

/// A snapshot of the global arena counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArenaMemoryStats {
    /// Bytes currently reserved by arena blocks.
    pub reserved_bytes: usize,
    /// The peak number of reserved bytes.
    pub peak_reserved_bytes: u64,
    /// Blocks acquired over the process lifetime.
    pub blocks_acquired: u64,
    /// Blocks released over the process lifetime.
    pub blocks_released: u64,
    /// Blocks currently alive (`blocks_acquired - blocks_released`).
    pub live_blocks: i64,
    /// Bytes handed out over the process lifetime.
    pub bytes_issued_lifetime: u64,
    /// The share of the peak footprint currently reserved (`reserved / peak`).
    pub utilisation_of_peak: f64,
}

/// Takes a snapshot of all global arena counters.
pub fn get_arena_memory_stats() -> ArenaMemoryStats {
    let reserved = ARENA_RESERVED_BYTES.load(Ordering::Relaxed);
    let peak = PEAK_ARENA_RESERVED_BYTES.load(Ordering::Relaxed);
    let acquired = ARENA_BLOCKS_ACQUIRED.load(Ordering::Relaxed);
    let released = ARENA_BLOCKS_RELEASED.load(Ordering::Relaxed);

    ArenaMemoryStats {
        reserved_bytes: reserved,
        peak_reserved_bytes: peak,
        blocks_acquired: acquired,
        blocks_released: released,
        live_blocks: acquired as i64 - released as i64,
        bytes_issued_lifetime: ARENA_BYTES_ISSUED_LIFETIME.load(Ordering::Relaxed),
        utilisation_of_peak: if peak > 0 {
            reserved as f64 / peak as f64
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_accounting_moves_counters() {
        let before = get_arena_memory_stats();
        record_block_acquired(4096);
        record_bytes_issued(128);
        let during = get_arena_memory_stats();
        assert!(during.blocks_acquired > before.blocks_acquired);
        assert!(during.peak_reserved_bytes >= 4096);
        assert!(during.bytes_issued_lifetime >= before.bytes_issued_lifetime + 128);

        record_block_released(4096);
        let after = get_arena_memory_stats();
        assert!(after.blocks_released > before.blocks_released);
    }
}
