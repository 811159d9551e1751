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

//! Execution statistics of the command system.

use serde::Serialize;

/// A snapshot of the executor's counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Command lists created and not yet dropped, excluding the immediate list.
    pub live_lists: usize,
    /// Command lists executed on any queue.
    pub lists_executed: u64,
    /// Individual commands executed on any queue.
    pub commands_executed: u64,
    /// Lists that recorded in bypass mode.
    pub bypass_lists: u64,
    /// Parallel batches submitted.
    pub parallel_batches: u64,
    /// Command contexts handed to the device by parallel batches.
    pub parallel_contexts_submitted: u64,
    /// Deferred tokens whose device object was built.
    pub tokens_built: u64,
    /// Compute fences signaled.
    pub fences_signaled: u64,
    /// Frames ended on the immediate list.
    pub frames_completed: u64,
    /// The largest arena footprint of a single executed list, in bytes.
    pub peak_list_memory_bytes: u64,
}

impl ExecutorStats {
    /// The average number of commands per executed list.
    pub fn average_commands_per_list(&self) -> f64 {
        if self.lists_executed == 0 {
            0.0
        } else {
            self.commands_executed as f64 / self.lists_executed as f64
        }
    }
}
