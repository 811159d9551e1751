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

//! Deferred construction tokens.
//!
//! A `build_*` call on a command list captures the creation arguments of a
//! device object in a work area allocated from the list's arena and returns a
//! token pointing at it. The object is only created when a command redeeming
//! the token first executes. A [`DeferredCell`] elects exactly one builder
//! through a compare-and-swap, so concurrent redemptions construct one object
//! and all observe the same instance.
//!
//! In bypass mode the object is built while recording and stored directly in
//! the token.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use khora_core::rhi::{
    BoundShaderStateDesc, BoundShaderStateId, UniformBufferId, UniformBufferLayout,
};

use crate::arena::ArenaBytes;

const EMPTY: u8 = 0;
const BUILDING: u8 = 1;
const READY: u8 = 2;

/// A single-assignment cell filled by the first caller of
/// [`get_or_build`](Self::get_or_build).
pub struct DeferredCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the value is written once by the thread winning the EMPTY -> BUILDING
// exchange and only read after READY is published with release ordering.
unsafe impl<T: Send + Sync> Sync for DeferredCell<T> {}
unsafe impl<T: Send> Send for DeferredCell<T> {}

impl<T: Copy> Default for DeferredCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DeferredCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredCell")
            .field("ready", &(self.state.load(Ordering::Acquire) == READY))
            .finish()
    }
}

/// Puts the cell back to EMPTY if the builder unwinds.
struct BuildGuard<'a> {
    state: &'a AtomicU8,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.state.store(EMPTY, Ordering::Release);
    }
}

impl<T: Copy> DeferredCell<T> {
    /// Creates an empty cell.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns the value if it has been published.
    pub fn get(&self) -> Option<T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY is only stored after the value was written.
            Some(unsafe { (*self.value.get()).assume_init() })
        } else {
            None
        }
    }

    /// Returns the value, building it with `build` if no other caller has.
    ///
    /// Exactly one caller runs `build`; concurrent callers wait for it to
    /// publish and return the same value.
    pub fn get_or_build(&self, build: impl FnOnce() -> T) -> T {
        loop {
            if let Some(value) = self.get() {
                return value;
            }
            if self
                .state
                .compare_exchange(EMPTY, BUILDING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let guard = BuildGuard { state: &self.state };
                let value = build();
                // SAFETY: winning the exchange grants exclusive write access.
                unsafe { (*self.value.get()).write(value) };
                std::mem::forget(guard);
                self.state.store(READY, Ordering::Release);
                return value;
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }
}

/// Bookkeeping common to every work area, placed first so work areas of any
/// kind can be chained for validation.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct TokenHeader {
    pub(crate) next: Option<NonNull<TokenHeader>>,
    pub(crate) list_uid: u32,
    pub(crate) use_count: AtomicU32,
    pub(crate) kind: &'static str,
}

/// Creation arguments and the lazily built object of one token.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct WorkArea<A, T> {
    pub(crate) header: TokenHeader,
    pub(crate) args: A,
    pub(crate) built: DeferredCell<T>,
}

/// A pointer to a work area carried by a recorded command.
pub(crate) struct WorkAreaRef<A, T>(pub(crate) NonNull<WorkArea<A, T>>);

impl<A, T> Clone for WorkAreaRef<A, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, T> Copy for WorkAreaRef<A, T> {}

// SAFETY: the work area lives in the arena of the list carrying the command
// and its mutable parts are atomics.
unsafe impl<A: Send + Sync, T: Send + Sync> Send for WorkAreaRef<A, T> {}

impl<A, T> WorkAreaRef<A, T> {
    /// # Safety
    ///
    /// The owning list's arena must not have been reset since the work area
    /// was allocated.
    pub(crate) unsafe fn get<'a>(&self) -> &'a WorkArea<A, T> {
        &*self.0.as_ptr()
    }
}

/// Arguments of a deferred uniform buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniformBufferArgs {
    pub(crate) contents: ArenaBytes,
    pub(crate) layout: UniformBufferLayout,
}

#[derive(Debug)]
pub(crate) enum TokenRepr<A, T> {
    Deferred {
        work_area: NonNull<WorkArea<A, T>>,
        list_uid: u32,
    },
    Built(T),
}

impl<A, T: Copy> Clone for TokenRepr<A, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, T: Copy> Copy for TokenRepr<A, T> {}

/// A bound shader state whose creation is deferred until first use.
///
/// Only valid on the list that built it, until that list is reset.
#[derive(Debug, Clone, Copy)]
pub struct LocalBoundShaderState {
    pub(crate) repr: TokenRepr<BoundShaderStateDesc, BoundShaderStateId>,
}

/// A single-draw uniform buffer whose creation is deferred until first use.
///
/// Only valid on the list that built it, until that list is reset.
#[derive(Debug, Clone, Copy)]
pub struct LocalUniformBuffer {
    pub(crate) repr: TokenRepr<UniformBufferArgs, UniformBufferId>,
}

impl LocalBoundShaderState {
    /// The object, if it was built in bypass mode.
    pub fn built(&self) -> Option<BoundShaderStateId> {
        match self.repr {
            TokenRepr::Built(id) => Some(id),
            TokenRepr::Deferred { .. } => None,
        }
    }
}

impl LocalUniformBuffer {
    /// The object, if it was built in bypass mode.
    pub fn built(&self) -> Option<UniformBufferId> {
        match self.repr {
            TokenRepr::Built(id) => Some(id),
            TokenRepr::Deferred { .. } => None,
        }
    }
}

/// Resolves a work area on the executing thread: builds the object on first
/// redemption and releases one use.
///
/// # Panics
///
/// Panics if the work area belongs to a list other than `list_uid`.
pub(crate) fn redeem<A, T: Copy>(
    work_area: &WorkArea<A, T>,
    list_uid: u32,
    build: impl FnOnce(&A) -> T,
) -> T {
    assert_eq!(
        work_area.header.list_uid, list_uid,
        "{} token redeemed on list {} but built on list {}",
        work_area.header.kind, list_uid, work_area.header.list_uid
    );
    let value = work_area.built.get_or_build(|| build(&work_area.args));
    work_area.header.use_count.fetch_sub(1, Ordering::AcqRel);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_cell_builds_once_sequentially() {
        let cell = DeferredCell::<u64>::new();
        let builds = AtomicUsize::new(0);
        assert_eq!(cell.get(), None);

        for _ in 0..3 {
            let value = cell.get_or_build(|| {
                builds.fetch_add(1, Ordering::SeqCst);
                77
            });
            assert_eq!(value, 77);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get(), Some(77));
    }

    #[test]
    fn test_concurrent_redemption_constructs_exactly_once() {
        const THREADS: usize = 8;
        let cell = Arc::new(DeferredCell::<u64>::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let cell = Arc::clone(&cell);
                let builds = Arc::clone(&builds);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cell.get_or_build(|| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        1000 + i as u64
                    })
                })
            })
            .collect();

        let observed: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(observed.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_cell_recovers_from_panicking_builder() {
        let cell = DeferredCell::<u32>::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cell.get_or_build(|| panic!("device lost"))
        }));
        assert!(result.is_err());
        assert_eq!(cell.get(), None);
        assert_eq!(cell.get_or_build(|| 5), 5);
    }

    fn work_area(list_uid: u32) -> WorkArea<u32, u64> {
        WorkArea {
            header: TokenHeader {
                next: None,
                list_uid,
                use_count: AtomicU32::new(2),
                kind: "Test",
            },
            args: 21,
            built: DeferredCell::new(),
        }
    }

    #[test]
    fn test_redeem_builds_from_args_and_releases_uses() {
        let area = work_area(3);
        assert_eq!(redeem(&area, 3, |args| *args as u64 * 2), 42);
        assert_eq!(redeem(&area, 3, |_| unreachable!()), 42);
        assert_eq!(area.header.use_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "redeemed on list 4 but built on list 3")]
    fn test_redeem_on_foreign_list_panics() {
        let area = work_area(3);
        redeem(&area, 4, |args| *args as u64);
    }
}
