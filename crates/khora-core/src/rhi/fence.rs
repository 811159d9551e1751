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

//! The cross-queue fence contract.
//!
//! A [`ComputeFence`] is written by exactly one command on one queue and may be
//! waited on by any number of commands on the other queue. Recording a write
//! marks the fence as *write enqueued*; recording a wait on a fence whose write
//! was never enqueued would hang the GPU and is rejected by the command lists.
//! At execution the writing queue signals the fence with the [`FenceId`] drawn
//! from its fence ring, and waiting queues block until that happens.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::error::FenceWaitError;

/// An opaque 64-bit fence identifier: the allocating generation in the high
/// half, the ring slot in the low half.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceId(pub u64);

impl FenceId {
    /// Packs a generation and a ring slot.
    pub const fn new(generation: u32, slot: u32) -> Self {
        Self(((generation as u64) << 32) | slot as u64)
    }

    /// The generation the fence was allocated in.
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The ring slot the fence occupies.
    pub const fn slot(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Debug for FenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FenceId(gen {}, slot {})", self.generation(), self.slot())
    }
}

#[derive(Debug)]
struct FenceInner {
    name: String,
    write_enqueued: AtomicBool,
    signaled: Mutex<Option<FenceId>>,
    cond: Condvar,
}

/// A named fence shared between the graphics and async compute queues.
///
/// Cloning yields another handle to the same fence.
#[derive(Debug, Clone)]
pub struct ComputeFence {
    inner: Arc<FenceInner>,
}

impl ComputeFence {
    /// Creates an unwritten, unsignaled fence.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(FenceInner {
                name: name.into(),
                write_enqueued: AtomicBool::new(false),
                signaled: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    /// The debug name of the fence.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Marks the fence as having a recorded write.
    ///
    /// Called at record time by the command that will signal it.
    pub fn write_fence(&self) {
        if self.inner.write_enqueued.swap(true, Ordering::AcqRel) {
            log::warn!(
                "ComputeFence '{}' written more than once before being reset.",
                self.inner.name
            );
        }
    }

    /// Returns `true` once a write has been recorded.
    pub fn is_write_enqueued(&self) -> bool {
        self.inner.write_enqueued.load(Ordering::Acquire)
    }

    /// Signals the fence. The value is set exactly once.
    ///
    /// # Panics
    ///
    /// Panics if the fence was already signaled.
    pub fn signal(&self, id: FenceId) {
        let mut signaled = self.inner.signaled.lock().unwrap();
        assert!(
            signaled.is_none(),
            "ComputeFence '{}' signaled twice (previous {:?}, new {:?})",
            self.inner.name,
            signaled,
            id
        );
        *signaled = Some(id);
        self.inner.cond.notify_all();
    }

    /// Returns the signaled id, if any, without blocking.
    pub fn signaled_id(&self) -> Option<FenceId> {
        *self.inner.signaled.lock().unwrap()
    }

    /// Returns `true` if the fence has been signaled.
    pub fn is_signaled(&self) -> bool {
        self.signaled_id().is_some()
    }

    /// Blocks until the fence is signaled.
    ///
    /// `None` waits without bound; `Some(timeout)` gives up after `timeout`.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<FenceId, FenceWaitError> {
        let start = Instant::now();
        let mut signaled = self.inner.signaled.lock().unwrap();
        loop {
            if let Some(id) = *signaled {
                return Ok(id);
            }
            match timeout {
                None => signaled = self.inner.cond.wait(signaled).unwrap(),
                Some(limit) => {
                    let elapsed = start.elapsed();
                    if elapsed >= limit {
                        return Err(FenceWaitError::Timeout {
                            fence: self.inner.name.clone(),
                            waited: elapsed,
                        });
                    }
                    signaled = self
                        .inner
                        .cond
                        .wait_timeout(signaled, limit - elapsed)
                        .unwrap()
                        .0;
                }
            }
        }
    }

    /// Clears both the recorded write and the signal so the fence can be
    /// reused in a later frame. No waiter may be pending.
    pub fn reset(&self) {
        self.inner.write_enqueued.store(false, Ordering::Release);
        *self.inner.signaled.lock().unwrap() = None;
    }

    /// Returns `true` if both handles refer to the same fence.
    pub fn ptr_eq(&self, other: &ComputeFence) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fence_id_packing() {
        let id = FenceId::new(7, 3);
        assert_eq!(id.generation(), 7);
        assert_eq!(id.slot(), 3);
        assert!(FenceId::new(8, 0) > id);
    }

    #[test]
    fn test_write_enqueued_flag() {
        let fence = ComputeFence::new("Test");
        assert!(!fence.is_write_enqueued());
        fence.write_fence();
        assert!(fence.is_write_enqueued());
        fence.reset();
        assert!(!fence.is_write_enqueued());
    }

    #[test]
    fn test_wait_returns_signaled_id() {
        let fence = ComputeFence::new("Test");
        fence.signal(FenceId::new(1, 0));
        assert_eq!(fence.wait(None), Ok(FenceId::new(1, 0)));
        assert_eq!(
            fence.wait(Some(Duration::from_millis(1))),
            Ok(FenceId::new(1, 0))
        );
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let fence = ComputeFence::new("Never");
        let result = fence.wait(Some(Duration::from_millis(20)));
        match result {
            Err(FenceWaitError::Timeout { fence, waited }) => {
                assert_eq!(fence, "Never");
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("Expected a timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_many_waiters_observe_single_signal() {
        let fence = ComputeFence::new("Shared");
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let fence = fence.clone();
                thread::spawn(move || fence.wait(None))
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        fence.signal(FenceId::new(2, 5));

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok(FenceId::new(2, 5)));
        }
    }

    #[test]
    #[should_panic(expected = "signaled twice")]
    fn test_double_signal_panics() {
        let fence = ComputeFence::new("Twice");
        fence.signal(FenceId::new(0, 0));
        fence.signal(FenceId::new(0, 1));
    }
}
