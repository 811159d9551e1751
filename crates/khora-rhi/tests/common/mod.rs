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

#![allow(dead_code)]

use std::sync::Arc;

use khora_core::rhi::{QueueKind, RhiSettings};
use khora_infra::{RhiCall, TraceRhiDevice};
use khora_rhi::RhiExecutor;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An executor over a trace device, without an async compute context.
pub fn graphics_only(settings: RhiSettings) -> (Arc<TraceRhiDevice>, RhiExecutor) {
    with_device(TraceRhiDevice::new(), settings, false)
}

/// An executor over a trace device with both queues.
pub fn with_async_compute(settings: RhiSettings) -> (Arc<TraceRhiDevice>, RhiExecutor) {
    with_device(TraceRhiDevice::new(), settings, true)
}

pub fn with_device(
    device: TraceRhiDevice,
    settings: RhiSettings,
    async_compute: bool,
) -> (Arc<TraceRhiDevice>, RhiExecutor) {
    init_logger();
    let device = Arc::new(device);
    let graphics = device.create_queue_context(QueueKind::Graphics);
    let compute = async_compute.then(|| device.create_queue_context(QueueKind::AsyncCompute));
    let executor = RhiExecutor::new(device.clone(), graphics, compute, settings)
        .expect("executor should start");
    (device, executor)
}

/// The graphics calls without the frame markers.
pub fn graphics_calls(device: &TraceRhiDevice) -> Vec<RhiCall> {
    device.calls_on(QueueKind::Graphics)
}

/// The names of the debug events pushed on the graphics queue, in order.
pub fn event_names(device: &TraceRhiDevice) -> Vec<String> {
    graphics_calls(device)
        .into_iter()
        .filter_map(|call| match call {
            RhiCall::PushEvent { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}
