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

//! The executor: owns the queues, the immediate list and everything lists
//! share, and moves recorded work to where it executes.

mod flush;
pub(crate) mod parallel;
mod queue;

pub use flush::FlushMode;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use khora_core::rhi::{ExecutorStats, QueueKind, RhiCommandContext, RhiDevice, RhiError, RhiSettings};

use crate::arena::ArenaPool;
use crate::command::commands::ExecuteSubList;
use crate::command::ExecutionServices;
use crate::list::{
    AsyncComputeCommandList, BypassTarget, CommandList, ImmediateCommandList, ListResources,
};
use crate::registry::ListRegistry;
use parallel::OutstandingTasks;
use queue::QueueTarget;

/// State shared by the executor, its immediate list and the lists it creates.
#[derive(Debug)]
pub(crate) struct ExecutorShared {
    pub(crate) settings: RhiSettings,
    pub(crate) device: Arc<dyn RhiDevice>,
    pub(crate) services: Arc<ExecutionServices>,
    pub(crate) registry: Arc<ListRegistry>,
    pub(crate) pool: Arc<ArenaPool>,
    pub(crate) tasks: Arc<OutstandingTasks>,
    bypass_requested: AtomicBool,
    bypass_latched: AtomicBool,
    graphics: QueueTarget,
    compute: Option<QueueTarget>,
}

impl ExecutorShared {
    /// The queue a list recorded for `queue` executes on. Without an async
    /// compute context, compute work runs on the graphics queue.
    fn target_for(&self, queue: QueueKind) -> &QueueTarget {
        match queue {
            QueueKind::Graphics => &self.graphics,
            QueueKind::AsyncCompute => self.compute.as_ref().unwrap_or(&self.graphics),
        }
    }

    pub(crate) fn new_list(&self, queue: QueueKind, registered: bool) -> CommandList {
        let bypass = self.bypass_latched.load(Ordering::Acquire).then(|| BypassTarget {
            context: Arc::clone(&self.target_for(queue).shared.context),
            services: Arc::clone(&self.services),
        });
        let resources = ListResources {
            registry: Arc::clone(&self.registry),
            pool: Arc::clone(&self.pool),
            device: Arc::clone(&self.device),
            enable_state_cache: self.settings.enable_state_cache,
        };
        CommandList::new(resources, queue, registered, bypass)
    }
}

/// Records, schedules and executes GPU commands against an [`RhiDevice`].
///
/// Any thread may create and record command lists. Submission goes through
/// the immediate list, which the render thread drives with
/// [`immediate`](Self::immediate) and [`flush`](Self::flush). Graphics lists
/// execute on a dedicated thread unless
/// [`RhiSettings::use_execution_thread`] is off, and async compute lists on
/// their own thread when an async compute context is available.
#[derive(Debug)]
pub struct RhiExecutor {
    shared: Arc<ExecutorShared>,
    immediate: Mutex<ImmediateCommandList>,
}

impl RhiExecutor {
    /// Creates an executor and starts its execution threads.
    ///
    /// # Errors
    ///
    /// Returns an error if `settings` are invalid or a thread cannot be spawned.
    pub fn new(
        device: Arc<dyn RhiDevice>,
        graphics_context: Box<dyn RhiCommandContext>,
        async_compute_context: Option<Box<dyn RhiCommandContext>>,
        settings: RhiSettings,
    ) -> Result<Self, RhiError> {
        settings.validate()?;

        let services = Arc::new(ExecutionServices::new(
            settings.fence_ring_capacity,
            settings.fence_wait_timeout_ms.map(Duration::from_millis),
            settings.max_frames_in_flight,
        ));
        let graphics = QueueTarget::new(
            QueueKind::Graphics,
            Arc::new(Mutex::new(graphics_context)),
            Arc::clone(&device),
            Arc::clone(&services),
            settings.use_execution_thread,
        )?;
        let compute = match async_compute_context {
            Some(context) => Some(QueueTarget::new(
                QueueKind::AsyncCompute,
                Arc::new(Mutex::new(context)),
                Arc::clone(&device),
                Arc::clone(&services),
                settings.use_async_compute_thread,
            )?),
            None => {
                log::info!("No async compute context: compute lists will run on the graphics queue.");
                None
            }
        };

        log::info!(
            "RHI executor created (execution thread: {}, async compute thread: {}, bypass: {}, translate width: {}).",
            graphics.is_threaded(),
            compute.as_ref().is_some_and(QueueTarget::is_threaded),
            settings.bypass,
            settings.parallel_translate_width
        );

        let shared = Arc::new(ExecutorShared {
            device,
            services,
            registry: Arc::new(ListRegistry::new()),
            pool: Arc::new(ArenaPool::new(settings.arena_block_size)),
            tasks: Arc::new(OutstandingTasks::default()),
            bypass_requested: AtomicBool::new(settings.bypass),
            bypass_latched: AtomicBool::new(settings.bypass),
            graphics,
            compute,
            settings,
        });
        let immediate = ImmediateCommandList::new(Arc::clone(&shared));
        Ok(Self {
            shared,
            immediate: Mutex::new(immediate),
        })
    }

    /// The settings the executor was created with.
    pub fn settings(&self) -> &RhiSettings {
        &self.shared.settings
    }

    /// Creates an empty graphics list. In bypass mode its commands execute as
    /// they are recorded.
    pub fn create_command_list(&self) -> CommandList {
        self.shared.new_list(QueueKind::Graphics, true)
    }

    /// Creates an empty list for the async compute queue.
    pub fn create_async_compute_list(&self) -> AsyncComputeCommandList {
        AsyncComputeCommandList::new(self.shared.new_list(QueueKind::AsyncCompute, true))
    }

    /// Locks the immediate list.
    pub fn immediate(&self) -> MutexGuard<'_, ImmediateCommandList> {
        self.immediate.lock().unwrap()
    }

    /// Queues `list` behind the immediate list's content and dispatches both.
    ///
    /// # Panics
    ///
    /// Panics if `list` has an open user-pointer draw.
    pub fn submit(&self, list: CommandList) {
        let mut immediate = self.immediate();
        immediate.queue_async_command_list_submit(list);
        immediate.immediate_flush(FlushMode::DispatchToExecutionContext);
    }

    /// Queues `lists` for parallel translation and dispatches them. See
    /// [`ImmediateCommandList::queue_parallel_submit`].
    pub fn submit_parallel(&self, lists: Vec<CommandList>, draw_hints: &[u32]) {
        let mut immediate = self.immediate();
        immediate.queue_parallel_submit(lists, draw_hints);
        immediate.immediate_flush(FlushMode::DispatchToExecutionContext);
    }

    /// Dispatches `list` to the async compute queue.
    ///
    /// # Panics
    ///
    /// Panics if `list` was already submitted.
    pub fn submit_async_compute(&self, list: AsyncComputeCommandList) {
        let mut list = list.into_inner();
        list.prepare_for_submit();
        if list.is_empty() {
            return;
        }
        match &self.shared.compute {
            Some(compute) => compute.dispatch(list),
            None => {
                let mut immediate = self.immediate();
                immediate.record(ExecuteSubList { list });
                immediate.immediate_flush(FlushMode::DispatchToExecutionContext);
            }
        }
    }

    /// Flushes the immediate list. See [`FlushMode`].
    pub fn flush(&self, mode: FlushMode) {
        self.immediate().immediate_flush(mode);
    }

    /// Requests bypass mode on or off. The change takes effect at the next
    /// [`latch_bypass`](Self::latch_bypass).
    pub fn set_bypass(&self, enabled: bool) {
        self.shared.bypass_requested.store(enabled, Ordering::Release);
    }

    /// Applies a pending bypass request. Switching drains both queues first
    /// so no deferred work overlaps work executed directly.
    ///
    /// Returns `true` if the mode changed. Lists created before the switch
    /// keep the mode they were created with.
    pub fn latch_bypass(&self) -> bool {
        let requested = self.shared.bypass_requested.load(Ordering::Acquire);
        if requested == self.shared.bypass_latched.load(Ordering::Acquire) {
            return false;
        }
        let mut immediate = self.immediate();
        immediate.immediate_flush(FlushMode::FullDrain);
        self.shared.bypass_latched.store(requested, Ordering::Release);
        drop(immediate.take_list());
        log::info!("RHI bypass {}.", if requested { "enabled" } else { "disabled" });
        true
    }

    /// Returns `true` if bypass is latched.
    pub fn is_bypass(&self) -> bool {
        self.shared.bypass_latched.load(Ordering::Acquire)
    }

    /// The number of command lists created by this executor and not yet retired.
    pub fn live_list_count(&self) -> usize {
        self.shared.registry.live_count()
    }

    /// A snapshot of the execution counters.
    pub fn stats(&self) -> ExecutorStats {
        self.shared
            .services
            .counters
            .snapshot(self.shared.registry.live_count())
    }

    /// Drains all work, stops the execution threads and checks for leaked lists.
    ///
    /// # Panics
    ///
    /// Panics if a command list created by this executor is still alive.
    pub fn shutdown(self) {
        log::info!("Shutting down RHI executor.");
        self.flush(FlushMode::FullDrain);
        self.shared.graphics.shutdown();
        if let Some(compute) = &self.shared.compute {
            compute.shutdown();
        }
        let stats = self.stats();
        log::info!(
            "RHI executor stopped after {} lists and {} commands.",
            stats.lists_executed,
            stats.commands_executed
        );
        self.shared.registry.check_no_outstanding();
    }
}
