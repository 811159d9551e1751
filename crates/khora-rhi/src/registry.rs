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

//! Registry of live command lists, used for leak detection at shutdown.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// List identifiers are unique across every registry of the process, so a
/// token can be matched to its list by uid alone.
static NEXT_LIST_UID: AtomicU32 = AtomicU32::new(1);

/// Hands out list identifiers and tracks which registered lists are alive.
#[derive(Debug)]
pub struct ListRegistry {
    live: Mutex<BTreeSet<u32>>,
}

impl Default for ListRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            live: Mutex::new(BTreeSet::new()),
        }
    }

    /// Returns a new list identifier, never used in this process.
    pub fn next_uid(&self) -> u32 {
        let uid = NEXT_LIST_UID.fetch_add(1, Ordering::Relaxed);
        assert_ne!(uid, u32::MAX, "Command list identifiers exhausted");
        uid
    }

    /// Records `uid` as alive.
    pub fn register(&self, uid: u32) {
        let inserted = self.live.lock().unwrap().insert(uid);
        debug_assert!(inserted, "command list {uid} registered twice");
    }

    /// Records `uid` as gone.
    pub fn unregister(&self, uid: u32) {
        let removed = self.live.lock().unwrap().remove(&uid);
        debug_assert!(removed, "command list {uid} was not registered");
    }

    /// Replaces a registered identifier after a list reset.
    pub fn rename(&self, old_uid: u32, new_uid: u32) {
        let mut live = self.live.lock().unwrap();
        live.remove(&old_uid);
        live.insert(new_uid);
    }

    /// The number of registered lists alive.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Asserts that no registered list is alive.
    ///
    /// # Panics
    ///
    /// Panics with the identifiers of the leaked lists.
    pub fn check_no_outstanding(&self) {
        // Leaked lists unregister while the panic unwinds, so the lock is released first.
        let live = self.live.lock().unwrap().clone();
        assert!(
            live.is_empty(),
            "{} command list(s) still outstanding at shutdown: {:?}",
            live.len(),
            live
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uids_are_monotonic() {
        let registry = ListRegistry::new();
        let a = registry.next_uid();
        let b = registry.next_uid();
        assert!(b > a);
    }

    #[test]
    fn test_uids_are_unique_across_registries() {
        let first = ListRegistry::new();
        let second = ListRegistry::new();
        let a = first.next_uid();
        let b = second.next_uid();
        assert_ne!(a, b);
    }

    #[test]
    fn test_live_count_tracks_registration() {
        let registry = ListRegistry::new();
        registry.register(1);
        registry.register(2);
        assert_eq!(registry.live_count(), 2);
        registry.rename(2, 3);
        assert_eq!(registry.live_count(), 2);
        registry.unregister(1);
        registry.unregister(3);
        registry.check_no_outstanding();
    }

    #[test]
    #[should_panic(expected = "still outstanding at shutdown: {7}")]
    fn test_leak_is_reported() {
        let registry = ListRegistry::new();
        registry.register(7);
        registry.check_no_outstanding();
    }
}
