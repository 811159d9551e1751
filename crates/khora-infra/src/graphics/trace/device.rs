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

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use khora_core::rhi::*;

use super::call::RhiCall;
use super::context::TraceCommandContext;

/// The ordered log of calls that reached the hardware, tagged with their queue.
pub type CallLog = Arc<Mutex<Vec<(QueueKind, RhiCall)>>>;

/// A device that hands out ids instead of GPU objects and records every call
/// reaching the hardware in one ordered log.
#[derive(Debug, Default)]
pub struct TraceRhiDevice {
    log: CallLog,
    next_id: AtomicU64,
    bound_shader_states: Mutex<Vec<(BoundShaderStateId, BoundShaderStateDesc)>>,
    uniform_buffers: Mutex<HashMap<UniformBufferId, Vec<u8>>>,
    context_delays: Mutex<VecDeque<Duration>>,
    contexts_created: AtomicUsize,
    contexts_submitted: AtomicUsize,
    resource_flushes: AtomicUsize,
}

impl TraceRhiDevice {
    /// Creates a device with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next parallel contexts, in creation order, stall for the
    /// given durations on their first call.
    pub fn with_context_delays(self, delays: Vec<Duration>) -> Self {
        *self.context_delays.lock().unwrap() = delays.into();
        self
    }

    /// Creates the context a queue executes on. Its calls are logged directly.
    pub fn create_queue_context(&self, queue: QueueKind) -> Box<dyn RhiCommandContext> {
        Box::new(TraceCommandContext::direct(queue, Arc::clone(&self.log)))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Every logged call, in order.
    pub fn calls(&self) -> Vec<(QueueKind, RhiCall)> {
        self.log.lock().unwrap().clone()
    }

    /// The logged calls of one queue, in order.
    pub fn calls_on(&self, queue: QueueKind) -> Vec<RhiCall> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| *q == queue)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Empties the log.
    pub fn clear_calls(&self) {
        self.log.lock().unwrap().clear();
    }

    /// The number of bound shader states created.
    pub fn bound_shader_states_created(&self) -> usize {
        self.bound_shader_states.lock().unwrap().len()
    }

    /// The description a bound shader state was created from.
    pub fn bound_shader_state_desc(&self, id: BoundShaderStateId) -> Option<BoundShaderStateDesc> {
        self.bound_shader_states
            .lock()
            .unwrap()
            .iter()
            .find(|(created, _)| *created == id)
            .map(|(_, desc)| *desc)
    }

    /// The number of uniform buffers created.
    pub fn uniform_buffers_created(&self) -> usize {
        self.uniform_buffers.lock().unwrap().len()
    }

    /// The initial contents of a uniform buffer.
    pub fn uniform_buffer_contents(&self, id: UniformBufferId) -> Option<Vec<u8>> {
        self.uniform_buffers.lock().unwrap().get(&id).cloned()
    }

    /// The number of parallel contexts created.
    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    /// The number of parallel contexts submitted.
    pub fn contexts_submitted(&self) -> usize {
        self.contexts_submitted.load(Ordering::SeqCst)
    }

    /// The number of times deferred deletions were flushed.
    pub fn resource_flushes(&self) -> usize {
        self.resource_flushes.load(Ordering::SeqCst)
    }
}

impl RhiDevice for TraceRhiDevice {
    fn create_bound_shader_state(&self, desc: &BoundShaderStateDesc) -> BoundShaderStateId {
        let id = BoundShaderStateId(self.next_id());
        self.bound_shader_states.lock().unwrap().push((id, *desc));
        log::trace!("TraceRhiDevice: created {:?}.", id);
        id
    }

    fn create_uniform_buffer(
        &self,
        contents: &[u8],
        layout: &UniformBufferLayout,
        usage: UniformBufferUsage,
    ) -> UniformBufferId {
        let id = UniformBufferId(self.next_id());
        self.uniform_buffers
            .lock()
            .unwrap()
            .insert(id, contents.to_vec());
        log::trace!(
            "TraceRhiDevice: created {:?} '{}' ({} bytes, {:?}).",
            id,
            layout.name,
            contents.len(),
            usage
        );
        id
    }

    fn create_command_context(&self, queue: QueueKind) -> Box<dyn RhiCommandContext> {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        let delay = self.context_delays.lock().unwrap().pop_front();
        Box::new(TraceCommandContext::buffered(queue, delay))
    }

    fn submit_command_contexts(&self, queue: QueueKind, contexts: Vec<Box<dyn RhiCommandContext>>) {
        let mut log = self.log.lock().unwrap();
        for mut context in contexts {
            match context.as_any_mut().downcast_mut::<TraceCommandContext>() {
                Some(trace) => {
                    log.extend(trace.take_buffered().into_iter().map(|call| (queue, call)));
                    self.contexts_submitted.fetch_add(1, Ordering::SeqCst);
                }
                None => log::warn!("TraceRhiDevice: ignoring a foreign command context."),
            }
        }
    }

    fn flush_resources(&self) {
        self.resource_flushes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_context_logs_directly() {
        let device = TraceRhiDevice::new();
        let mut context = device.create_queue_context(QueueKind::Graphics);
        context.begin_frame();
        context.set_rasterizer_state(RasterizerStateId(3));
        assert_eq!(
            device.calls(),
            vec![
                (QueueKind::Graphics, RhiCall::BeginFrame),
                (QueueKind::Graphics, RhiCall::SetRasterizerState(RasterizerStateId(3))),
            ]
        );
    }

    #[test]
    fn test_parallel_context_reaches_log_on_submit() {
        let device = TraceRhiDevice::new();
        let mut first = device.create_command_context(QueueKind::Graphics);
        let mut second = device.create_command_context(QueueKind::Graphics);
        second.pop_event();
        first.begin_scene();
        assert!(device.calls().is_empty());

        device.submit_command_contexts(QueueKind::Graphics, vec![first, second]);
        assert_eq!(
            device.calls_on(QueueKind::Graphics),
            vec![RhiCall::BeginScene, RhiCall::PopEvent]
        );
        assert_eq!(device.contexts_created(), 2);
        assert_eq!(device.contexts_submitted(), 2);
    }

    #[test]
    fn test_created_objects_are_remembered() {
        let device = TraceRhiDevice::new();
        let layout = UniformBufferLayout {
            name: "View",
            constant_buffer_size: 4,
        };
        let buffer = device.create_uniform_buffer(&[1, 2, 3, 4], &layout, UniformBufferUsage::SingleDraw);
        let desc = BoundShaderStateDesc::default();
        let state = device.create_bound_shader_state(&desc);

        assert_ne!(buffer.0, state.0);
        assert_eq!(device.uniform_buffer_contents(buffer), Some(vec![1, 2, 3, 4]));
        assert_eq!(device.bound_shader_state_desc(state), Some(desc));
        assert_eq!(device.uniform_buffers_created(), 1);
        assert_eq!(device.bound_shader_states_created(), 1);
    }
}
