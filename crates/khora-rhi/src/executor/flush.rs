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

//! Flushing the immediate list.

use super::ExecutorShared;
use crate::list::ImmediateCommandList;

/// How far [`ImmediateCommandList::immediate_flush`] goes.
///
/// From `DispatchToExecutionContext` on, each mode also performs everything
/// the weaker ones do. Dispatching never waits for parallel translate tasks:
/// the execution thread joins them when it reaches their batch, so only
/// `WaitForOutstandingTasksOnly` and the drains block on them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlushMode {
    /// Waits for the outstanding parallel translate tasks.
    WaitForOutstandingTasksOnly,
    /// Hands the immediate list's content to the graphics execution thread.
    DispatchToExecutionContext,
    /// Waits until the execution thread has picked up everything dispatched.
    WaitForDispatch,
    /// Waits until both queues have executed everything dispatched and every
    /// translate task has finished.
    FullDrain,
    /// Drains, then lets the device release deferred-deleted resources and
    /// frees idle command arenas.
    FullDrainAndReleaseResources,
}

impl ExecutorShared {
    pub(crate) fn flush_immediate(&self, immediate: &mut ImmediateCommandList, mode: FlushMode) {
        if mode == FlushMode::WaitForOutstandingTasksOnly {
            self.tasks.wait_all();
        }

        if mode >= FlushMode::DispatchToExecutionContext {
            assert!(
                !immediate.is_draw_up_pending(),
                "Immediate command list flushed with a begin_draw_primitive_up (Begin without End)"
            );
            if immediate.is_empty() {
                immediate.invalidate_state_cache();
            } else {
                let mut list = immediate.take_list();
                list.prepare_for_submit();
                self.graphics.dispatch(list);
            }
        }

        if mode >= FlushMode::WaitForDispatch {
            self.graphics.wait_for_dispatch();
        }

        if mode >= FlushMode::FullDrain {
            self.graphics.drain();
            if let Some(compute) = &self.compute {
                compute.drain();
            }
            self.tasks.wait_all();
            self.services.retire_idle();
        }

        if mode >= FlushMode::FullDrainAndReleaseResources {
            self.device.flush_resources();
            self.pool.trim();
        }

        log::trace!("Immediate flush ({:?}) done.", mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_modes_are_ordered_by_strength() {
        assert!(FlushMode::WaitForOutstandingTasksOnly < FlushMode::DispatchToExecutionContext);
        assert!(FlushMode::DispatchToExecutionContext < FlushMode::WaitForDispatch);
        assert!(FlushMode::WaitForDispatch < FlushMode::FullDrain);
        assert!(FlushMode::FullDrain < FlushMode::FullDrainAndReleaseResources);
    }
}
