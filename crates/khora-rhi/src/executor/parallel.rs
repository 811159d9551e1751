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

//! Parallel translation of a batch of command lists.
//!
//! The batch is split into contiguous chunks. Each chunk is executed on a
//! worker thread into its own hardware context, and the immediate stream
//! submits the contexts in the original list order once all of them are done.

use std::ops::Range;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crossbeam_channel::Receiver;
use khora_core::rhi::{QueueKind, RhiCommandContext};

use super::ExecutorShared;
use crate::command::ExecuteContext;
use crate::list::CommandList;

/// Splits `hints.len()` lists into at most `width` contiguous, non-empty
/// chunks.
///
/// Chunks are balanced by the draw hints. Without any hint, lists are spread
/// evenly, the first chunks taking one extra list each when the count does
/// not divide.
pub(crate) fn partition(hints: &[u32], width: usize) -> Vec<Range<usize>> {
    let num_lists = hints.len();
    let num_chunks = width.min(num_lists);
    if num_chunks == 0 {
        return Vec::new();
    }

    let total: u64 = hints.iter().map(|&h| h as u64).sum();
    if total == 0 {
        let per_chunk = num_lists / num_chunks;
        let extra = num_lists - per_chunk * num_chunks;
        let mut start = 0;
        return (0..num_chunks)
            .map(|chunk| {
                let len = per_chunk + usize::from(chunk < extra);
                let range = start..start + len;
                start += len;
                range
            })
            .collect();
    }

    let mut ranges = Vec::with_capacity(num_chunks);
    let mut start = 0;
    let mut accumulated = 0u64;
    for (index, &hint) in hints.iter().enumerate() {
        accumulated += hint as u64;
        // Chunks still to open after the current one, and lists left for them.
        let chunks_left = num_chunks - ranges.len() - 1;
        let lists_left = num_lists - index - 1;
        if chunks_left == 0 {
            break;
        }
        let target = total * (ranges.len() as u64 + 1) / num_chunks as u64;
        if accumulated >= target || lists_left == chunks_left {
            ranges.push(start..index + 1);
            start = index + 1;
        }
    }
    ranges.push(start..num_lists);
    ranges
}

/// Counts translate tasks that have not finished yet.
#[derive(Debug, Default)]
pub(crate) struct OutstandingTasks {
    count: Mutex<usize>,
    cond: Condvar,
}

impl OutstandingTasks {
    /// Blocks until every task has finished.
    pub(crate) fn wait_all(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.cond.wait(count).unwrap();
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }
}

/// Holds one task open until dropped, including on unwind.
struct TaskGuard(Arc<OutstandingTasks>);

impl TaskGuard {
    fn begin(tasks: Arc<OutstandingTasks>) -> Self {
        *tasks.count.lock().unwrap() += 1;
        Self(tasks)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.0.cond.notify_all();
        }
    }
}

/// The translate tasks of one parallel submission, in list order.
#[derive(Debug)]
pub(crate) struct ParallelTranslateBatch {
    queue: QueueKind,
    chunks: Vec<Receiver<Box<dyn RhiCommandContext>>>,
}

impl ParallelTranslateBatch {
    /// Starts one translate task per range of `lists`.
    ///
    /// # Panics
    ///
    /// Panics if a worker thread cannot be spawned.
    pub(crate) fn spawn(
        shared: &ExecutorShared,
        lists: Vec<CommandList>,
        ranges: &[Range<usize>],
        queue: QueueKind,
    ) -> Self {
        let mut lists = lists.into_iter();
        let mut chunks = Vec::with_capacity(ranges.len());

        for (index, range) in ranges.iter().enumerate() {
            let chunk: Vec<CommandList> = lists.by_ref().take(range.len()).collect();
            let (sender, receiver) = crossbeam_channel::bounded(1);
            let device = Arc::clone(&shared.device);
            let services = Arc::clone(&shared.services);
            let task = TaskGuard::begin(Arc::clone(&shared.tasks));

            let spawned = thread::Builder::new()
                .name(format!("rhi-translate-{index}"))
                .spawn(move || {
                    let _task = task;
                    let mut context = device.create_command_context(queue);
                    {
                        let mut ctx = ExecuteContext::new(&mut *context, &*device, &services, queue);
                        for mut list in chunk {
                            list.execute(&mut ctx);
                        }
                    }
                    let _ = sender.send(context);
                });
            if let Err(e) = spawned {
                log::error!("Failed to spawn parallel translate task {}: {}", index, e);
                panic!("Failed to spawn parallel translate task {index}: {e}");
            }
            chunks.push(receiver);
        }

        shared
            .services
            .counters
            .parallel_batches
            .fetch_add(1, Ordering::Relaxed);
        Self { queue, chunks }
    }

    /// Waits for every task and submits their contexts in list order.
    ///
    /// # Panics
    ///
    /// Panics if a task terminated without producing its context.
    pub(crate) fn wait_and_submit(self, ctx: &mut ExecuteContext<'_>) {
        let mut contexts = Vec::with_capacity(self.chunks.len());
        for (index, chunk) in self.chunks.into_iter().enumerate() {
            match chunk.recv() {
                Ok(context) => contexts.push(context),
                Err(_) => panic!("Parallel translate task {index} terminated without a context"),
            }
        }
        let submitted = contexts.len();
        ctx.device.submit_command_contexts(self.queue, contexts);
        ctx.services
            .counters
            .parallel_contexts_submitted
            .fetch_add(submitted as u64, Ordering::Relaxed);
        log::trace!("Submitted {} parallel contexts on {:?}.", submitted, self.queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(ranges: &[Range<usize>], num_lists: usize) {
        let mut expected_start = 0;
        for range in ranges {
            assert_eq!(range.start, expected_start, "chunks must be contiguous");
            assert!(!range.is_empty(), "chunks must not be empty");
            expected_start = range.end;
        }
        assert_eq!(expected_start, num_lists);
    }

    #[test]
    fn test_uniform_split_gives_extra_lists_to_first_chunks() {
        let ranges = partition(&[0; 10], 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_width_is_capped_by_list_count() {
        let ranges = partition(&[0; 3], 8);
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_hints_balance_chunks() {
        let ranges = partition(&[100, 1, 1, 1, 1], 2);
        assert_eq!(ranges, vec![0..1, 1..5]);

        let ranges = partition(&[10, 10, 10, 10, 10, 10], 3);
        assert_eq!(ranges, vec![0..2, 2..4, 4..6]);
    }

    #[test]
    fn test_heavy_tail_keeps_every_chunk_non_empty() {
        let hints = [1, 1, 1, 1, 1000];
        let ranges = partition(&hints, 4);
        assert_eq!(ranges.len(), 4);
        assert_covers(&ranges, hints.len());
    }

    #[test]
    fn test_partition_properties() {
        for num_lists in 1..20usize {
            for width in 1..6usize {
                let hints: Vec<u32> = (0..num_lists).map(|i| (i * 7 % 5) as u32).collect();
                let ranges = partition(&hints, width);
                assert_eq!(ranges.len(), width.min(num_lists));
                assert_covers(&ranges, num_lists);
            }
        }
    }

    #[test]
    fn test_outstanding_tasks_wait() {
        let tasks = Arc::new(OutstandingTasks::default());
        let guard = TaskGuard::begin(Arc::clone(&tasks));
        assert_eq!(tasks.count(), 1);
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            drop(guard);
        });
        tasks.wait_all();
        assert_eq!(tasks.count(), 0);
        handle.join().unwrap();
    }
}
