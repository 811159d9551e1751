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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use khora_core::rhi::{ComputeFence, ExecutorStats, FenceId, QueueKind, RhiCommandContext, RhiDevice};

use crate::fence_ring::FenceRing;

/// A hardware context shared between a queue's execution thread and the
/// lists recording against it in bypass mode.
pub(crate) type SharedContext = Arc<Mutex<Box<dyn RhiCommandContext>>>;

/// Counters updated while commands execute.
#[derive(Debug, Default)]
pub(crate) struct ExecutorCounters {
    pub(crate) lists_executed: AtomicU64,
    pub(crate) commands_executed: AtomicU64,
    pub(crate) bypass_lists: AtomicU64,
    pub(crate) parallel_batches: AtomicU64,
    pub(crate) parallel_contexts_submitted: AtomicU64,
    pub(crate) tokens_built: AtomicU64,
    pub(crate) fences_signaled: AtomicU64,
    pub(crate) frames_completed: AtomicU64,
    pub(crate) peak_list_memory_bytes: AtomicU64,
}

impl ExecutorCounters {
    pub(crate) fn snapshot(&self, live_lists: usize) -> ExecutorStats {
        ExecutorStats {
            live_lists,
            lists_executed: self.lists_executed.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            bypass_lists: self.bypass_lists.load(Ordering::Relaxed),
            parallel_batches: self.parallel_batches.load(Ordering::Relaxed),
            parallel_contexts_submitted: self.parallel_contexts_submitted.load(Ordering::Relaxed),
            tokens_built: self.tokens_built.load(Ordering::Relaxed),
            fences_signaled: self.fences_signaled.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            peak_list_memory_bytes: self.peak_list_memory_bytes.load(Ordering::Relaxed),
        }
    }
}

/// State shared by every queue of one executor while commands run.
#[derive(Debug)]
pub(crate) struct ExecutionServices {
    pub(crate) fence_ring: Mutex<FenceRing>,
    pub(crate) counters: ExecutorCounters,
    pub(crate) fence_wait_timeout: Option<Duration>,
    pub(crate) max_frames_in_flight: u32,
}

impl ExecutionServices {
    pub(crate) fn new(
        fence_ring_capacity: usize,
        fence_wait_timeout: Option<Duration>,
        max_frames_in_flight: u32,
    ) -> Self {
        Self {
            fence_ring: Mutex::new(FenceRing::new(fence_ring_capacity)),
            counters: ExecutorCounters::default(),
            fence_wait_timeout,
            max_frames_in_flight,
        }
    }

    /// Allocates a ring slot and signals `fence` with it.
    pub(crate) fn signal_fence(&self, fence: &ComputeFence) -> FenceId {
        let id = self.fence_ring.lock().unwrap().allocate();
        fence.signal(id);
        self.counters.fences_signaled.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Blocks until `fence` is signaled. A timeout is fatal: the queue would
    /// otherwise consume work that depends on results that never arrive.
    pub(crate) fn wait_fence(&self, fence: &ComputeFence) -> FenceId {
        match fence.wait(self.fence_wait_timeout) {
            Ok(id) => id,
            Err(err) => {
                log::error!("{err}");
                panic!("{err}");
            }
        }
    }

    /// Advances the fence generation at the end of a frame and retires the
    /// generations older than the frames allowed in flight.
    pub(crate) fn complete_frame(&self) {
        let mut ring = self.fence_ring.lock().unwrap();
        let generation = ring.advance_generation();
        ring.retire_through(generation.saturating_sub(self.max_frames_in_flight));
        self.counters.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Retires every generation before the current one once the queues are idle.
    pub(crate) fn retire_idle(&self) {
        let mut ring = self.fence_ring.lock().unwrap();
        let current = ring.current_generation();
        ring.retire_through(current.saturating_sub(1));
    }
}

/// Everything a command needs while it executes: the hardware context of the
/// queue it runs on, the device for deferred construction, and the services
/// shared with the other queue.
pub struct ExecuteContext<'a> {
    pub(crate) context: &'a mut dyn RhiCommandContext,
    pub(crate) device: &'a dyn RhiDevice,
    pub(crate) services: &'a ExecutionServices,
    pub(crate) queue: QueueKind,
    pub(crate) list_uid: u32,
}

impl<'a> ExecuteContext<'a> {
    pub(crate) fn new(
        context: &'a mut dyn RhiCommandContext,
        device: &'a dyn RhiDevice,
        services: &'a ExecutionServices,
        queue: QueueKind,
    ) -> Self {
        Self {
            context,
            device,
            services,
            queue,
            list_uid: 0,
        }
    }
}

impl std::fmt::Debug for ExecuteContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteContext")
            .field("queue", &self.queue)
            .field("list_uid", &self.list_uid)
            .finish_non_exhaustive()
    }
}
