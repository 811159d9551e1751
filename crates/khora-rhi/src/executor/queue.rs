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

//! Hardware queues and the threads executing their lists.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use khora_core::rhi::{QueueKind, RhiDevice, RhiError};

use crate::command::{ExecuteContext, ExecutionServices, SharedContext};
use crate::list::CommandList;

/// Work sent to a queue's execution thread.
enum QueueJob {
    Execute { list: CommandList, seq: u64 },
    Drain(Sender<()>),
}

/// Counts lists handed to a queue and lists its executor has picked up.
#[derive(Debug, Default)]
struct DispatchTracker {
    enqueued: AtomicU64,
    picked: Mutex<u64>,
    cond: Condvar,
    poisoned: AtomicBool,
}

impl DispatchTracker {
    fn enqueue(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn mark_picked(&self, seq: u64) {
        let mut picked = self.picked.lock().unwrap();
        *picked = (*picked).max(seq);
        self.cond.notify_all();
    }

    fn poison(&self) {
        let _picked = self.picked.lock().unwrap();
        self.poisoned.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    fn wait_for(&self, seq: u64, queue: QueueKind) {
        let mut picked = self.picked.lock().unwrap();
        while *picked < seq {
            assert!(
                !self.poisoned.load(Ordering::Acquire),
                "The {queue:?} execution thread terminated"
            );
            picked = self.cond.wait(picked).unwrap();
        }
    }
}

/// Marks the tracker as poisoned if the execution thread unwinds.
struct PoisonOnUnwind<'a>(&'a DispatchTracker);

impl Drop for PoisonOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.poison();
        }
    }
}

/// What executing a list on a queue needs, shared with its thread.
#[derive(Debug)]
pub(crate) struct QueueShared {
    pub(crate) kind: QueueKind,
    pub(crate) context: SharedContext,
    device: Arc<dyn RhiDevice>,
    services: Arc<ExecutionServices>,
    tracker: DispatchTracker,
}

impl QueueShared {
    fn execute(&self, mut list: CommandList) {
        let mut context = self.context.lock().unwrap();
        let mut ctx = ExecuteContext::new(&mut **context, &*self.device, &self.services, self.kind);
        list.execute(&mut ctx);
    }
}

#[derive(Debug)]
struct QueueWorker {
    sender: Mutex<Option<Sender<QueueJob>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

/// One hardware queue, executed either on its own thread or inline on the
/// dispatching thread.
#[derive(Debug)]
pub(crate) struct QueueTarget {
    pub(crate) shared: Arc<QueueShared>,
    worker: Option<QueueWorker>,
}

impl std::fmt::Debug for QueueJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueJob::Execute { list, seq } => f
                .debug_struct("Execute")
                .field("list", &list.uid())
                .field("seq", seq)
                .finish(),
            QueueJob::Drain(_) => f.write_str("Drain"),
        }
    }
}

impl QueueTarget {
    pub(crate) fn new(
        kind: QueueKind,
        context: SharedContext,
        device: Arc<dyn RhiDevice>,
        services: Arc<ExecutionServices>,
        threaded: bool,
    ) -> Result<Self, RhiError> {
        let shared = Arc::new(QueueShared {
            kind,
            context,
            device,
            services,
            tracker: DispatchTracker::default(),
        });
        let worker = if threaded {
            Some(Self::spawn_worker(Arc::clone(&shared))?)
        } else {
            None
        };
        Ok(Self { shared, worker })
    }

    fn spawn_worker(shared: Arc<QueueShared>) -> Result<QueueWorker, RhiError> {
        let (sender, receiver) = crossbeam_channel::unbounded::<QueueJob>();
        let name = match shared.kind {
            QueueKind::Graphics => "rhi-graphics",
            QueueKind::AsyncCompute => "rhi-async-compute",
        };
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(shared, receiver))
            .map_err(|e| RhiError::ExecutionThreadSpawn {
                name: name.to_string(),
                details: e.to_string(),
            })?;
        log::info!("RHI thread '{}' started.", name);
        Ok(QueueWorker {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Returns `true` if lists execute on a dedicated thread.
    pub(crate) fn is_threaded(&self) -> bool {
        self.worker.is_some()
    }

    /// Hands `list` to the queue. Inline queues execute it before returning.
    pub(crate) fn dispatch(&self, list: CommandList) {
        let seq = self.shared.tracker.enqueue();
        match &self.worker {
            Some(worker) => {
                let sender = worker.sender.lock().unwrap();
                let sent = sender
                    .as_ref()
                    .map(|s| s.send(QueueJob::Execute { list, seq }).is_ok())
                    .unwrap_or(false);
                assert!(sent, "The {:?} execution thread is not running", self.shared.kind);
            }
            None => {
                self.shared.execute(list);
                self.shared.tracker.mark_picked(seq);
            }
        }
    }

    /// Waits until the thread has picked up every list dispatched so far.
    pub(crate) fn wait_for_dispatch(&self) {
        let seq = self.shared.tracker.enqueued.load(Ordering::Acquire);
        self.shared.tracker.wait_for(seq, self.shared.kind);
    }

    /// Waits until every list dispatched so far has finished executing.
    pub(crate) fn drain(&self) {
        let Some(worker) = &self.worker else {
            return;
        };
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        {
            let sender = worker.sender.lock().unwrap();
            let Some(sender) = sender.as_ref() else {
                return;
            };
            assert!(
                sender.send(QueueJob::Drain(done_tx)).is_ok(),
                "The {:?} execution thread is not running",
                self.shared.kind
            );
        }
        assert!(
            done_rx.recv().is_ok(),
            "The {:?} execution thread terminated while draining",
            self.shared.kind
        );
    }

    /// Stops the thread once it has executed everything dispatched, and joins it.
    pub(crate) fn shutdown(&self) {
        let Some(worker) = &self.worker else {
            return;
        };
        drop(worker.sender.lock().unwrap().take());
        if let Some(handle) = worker.handle.lock().unwrap().take() {
            if handle.join().is_err() {
                log::error!("The {:?} execution thread panicked.", self.shared.kind);
            }
        }
    }
}

impl Drop for QueueTarget {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: Arc<QueueShared>, receiver: Receiver<QueueJob>) {
    let _poison = PoisonOnUnwind(&shared.tracker);
    for job in receiver.iter() {
        match job {
            QueueJob::Execute { list, seq } => {
                shared.tracker.mark_picked(seq);
                shared.execute(list);
            }
            QueueJob::Drain(done) => {
                let _ = done.send(());
            }
        }
    }
    log::info!("RHI {:?} thread stopped.", shared.kind);
}
