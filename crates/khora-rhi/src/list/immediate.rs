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

//! The executor's own list, through which all submission flows.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use khora_core::rhi::{QueueKind, TextureId, ViewportId};

use super::CommandList;
use crate::command::commands::{
    BeginDrawingViewport, BeginFrame, BeginScene, EndDrawingViewport, EndFrame, EndScene,
    ExecuteSubList, WaitForAndSubmitParallel,
};
use crate::executor::parallel::{self, ParallelTranslateBatch};
use crate::executor::{ExecutorShared, FlushMode};

/// The graphics list owned by the executor.
///
/// Besides recording like any [`CommandList`] (it dereferences to one), it
/// carries the frame structure and queues other lists for execution in its
/// stream. Its content reaches the execution thread on
/// [`immediate_flush`](Self::immediate_flush).
pub struct ImmediateCommandList {
    list: CommandList,
    shared: Arc<ExecutorShared>,
}

impl std::fmt::Debug for ImmediateCommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ImmediateCommandList").field(&self.list).finish()
    }
}

impl Deref for ImmediateCommandList {
    type Target = CommandList;

    fn deref(&self) -> &CommandList {
        &self.list
    }
}

impl DerefMut for ImmediateCommandList {
    fn deref_mut(&mut self) -> &mut CommandList {
        &mut self.list
    }
}

impl ImmediateCommandList {
    pub(crate) fn new(shared: Arc<ExecutorShared>) -> Self {
        Self {
            list: shared.new_list(QueueKind::Graphics, false),
            shared,
        }
    }

    /// Swaps in a fresh list and returns the one recorded so far.
    pub(crate) fn take_list(&mut self) -> CommandList {
        let fresh = self.shared.new_list(QueueKind::Graphics, false);
        std::mem::replace(&mut self.list, fresh)
    }

    pub fn begin_frame(&mut self) {
        self.list.record(BeginFrame);
    }

    /// Ends the frame. Once executed, the fence generation advances and fence
    /// slots of frames older than the in-flight limit are retired.
    pub fn end_frame(&mut self) {
        self.list.record(EndFrame);
    }

    pub fn begin_scene(&mut self) {
        self.list.record(BeginScene);
    }

    pub fn end_scene(&mut self) {
        self.list.record(EndScene);
    }

    pub fn begin_drawing_viewport(&mut self, viewport: ViewportId, render_target: Option<TextureId>) {
        self.list.record(BeginDrawingViewport {
            viewport,
            render_target,
        });
    }

    pub fn end_drawing_viewport(&mut self, viewport: ViewportId, present: bool, lock_to_vsync: bool) {
        self.list.record(EndDrawingViewport {
            viewport,
            present,
            lock_to_vsync,
        });
    }

    /// Queues `list` to execute at this point of the immediate stream.
    ///
    /// # Panics
    ///
    /// Panics if `list` has an open user-pointer draw, or was recorded for
    /// the async compute queue.
    pub fn queue_async_command_list_submit(&mut self, mut list: CommandList) {
        assert_eq!(
            list.queue(),
            QueueKind::Graphics,
            "Command list {} was recorded for {:?}",
            list.uid(),
            list.queue()
        );
        list.prepare_for_submit();
        if list.is_empty() {
            return;
        }
        self.list.record(ExecuteSubList { list });
    }

    /// Queues `lists` to execute, in order, at this point of the immediate
    /// stream, translating them on worker threads when the batch is large
    /// enough.
    ///
    /// `draw_hints` holds the expected draw count of each list and may be
    /// empty when unknown. Chunks are balanced by these hints; the hardware
    /// contexts are always submitted in the order of `lists`.
    ///
    /// # Panics
    ///
    /// Panics if `draw_hints` is neither empty nor as long as `lists`.
    pub fn queue_parallel_submit(&mut self, mut lists: Vec<CommandList>, draw_hints: &[u32]) {
        assert!(
            draw_hints.is_empty() || draw_hints.len() == lists.len(),
            "{} draw hints given for {} command lists",
            draw_hints.len(),
            lists.len()
        );
        for list in &mut lists {
            assert_eq!(list.queue(), QueueKind::Graphics);
            list.prepare_for_submit();
        }

        let hints: Vec<u32> = if draw_hints.is_empty() {
            vec![0; lists.len()]
        } else {
            draw_hints.to_vec()
        };
        let total_draws: u64 = hints.iter().map(|&h| h as u64).sum();
        let settings = &self.shared.settings;
        let width = settings.parallel_translate_width.min(lists.len());

        if self.list.is_bypass()
            || width <= 1
            || total_draws < settings.min_draws_per_parallel_translate as u64
        {
            log::trace!(
                "Queuing {} command lists ({} hinted draws) for inline translation.",
                lists.len(),
                total_draws
            );
            for list in lists {
                if !list.is_empty() {
                    self.list.record(ExecuteSubList { list });
                }
            }
            return;
        }

        let ranges = parallel::partition(&hints, width);
        log::debug!(
            "Translating {} command lists ({} hinted draws) on {} workers.",
            lists.len(),
            total_draws,
            ranges.len()
        );
        let batch = ParallelTranslateBatch::spawn(&self.shared, lists, &ranges, QueueKind::Graphics);
        self.list.record(WaitForAndSubmitParallel { batch });
    }

    /// Flushes the immediate list as far as `mode` requires.
    ///
    /// # Panics
    ///
    /// Panics if a user-pointer draw is open on the immediate list.
    pub fn immediate_flush(&mut self, mode: FlushMode) {
        let shared = Arc::clone(&self.shared);
        shared.flush_immediate(self, mode);
    }
}
