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

mod common;

use khora_core::rhi::*;
use khora_infra::RhiCall;
use khora_rhi::{AsyncComputeCommandList, FlushMode, RhiExecutor};

use common::{graphics_only, with_async_compute};

fn compute_writing(executor: &RhiExecutor, fence: &ComputeFence) -> AsyncComputeCommandList {
    let mut list = executor.create_async_compute_list();
    list.set_compute_shader(ComputeShaderId(1));
    list.set_uav(0, UnorderedAccessViewId(5));
    list.dispatch_compute_shader(8, 1, 1);
    list.transition_uavs(
        TransitionAccess::Readable,
        TransitionPipeline::ComputeToGfx,
        &[UnorderedAccessViewId(5)],
        Some(fence),
    );
    list
}

#[test]
fn test_graphics_waits_for_async_compute_fence() {
    let (device, executor) = with_async_compute(RhiSettings::default());
    let fence = ComputeFence::new("Particles");

    let compute = compute_writing(&executor, &fence);
    let mut graphics = executor.create_command_list();
    graphics.wait_compute_fence(&fence);
    graphics.set_shader_resource_view(ShaderStage::Vertex, 0, ShaderResourceViewId(5));
    graphics.draw_primitive(PrimitiveType::TriangleList, 0, 2, 1);

    // Graphics work is dispatched before the compute work that unblocks it.
    executor.submit(graphics);
    executor.flush(FlushMode::WaitForDispatch);
    executor.submit_async_compute(compute);
    executor.flush(FlushMode::FullDrain);

    let calls = device.calls();
    let position = |expected: &dyn Fn(&(QueueKind, RhiCall)) -> bool| {
        calls.iter().position(expected).expect("call should be logged")
    };
    let transition = position(&|(q, c)| {
        *q == QueueKind::AsyncCompute && matches!(c, RhiCall::TransitionUavs { .. })
    });
    let wait = position(&|(q, c)| {
        *q == QueueKind::Graphics && *c == RhiCall::WaitComputeFence("Particles".to_string())
    });
    let draw = position(&|(q, c)| *q == QueueKind::Graphics && c.is_draw());
    assert!(transition < wait, "the wait must complete after the write");
    assert!(wait < draw);

    assert!(fence.is_signaled());
    assert_eq!(executor.stats().fences_signaled, 1);
    executor.shutdown();
}

#[test]
fn test_compute_lists_fall_back_to_graphics_queue() {
    let (device, executor) = graphics_only(RhiSettings::inline());
    let fence = ComputeFence::new("Fallback");

    executor.submit_async_compute(compute_writing(&executor, &fence));
    executor.flush(FlushMode::FullDrain);

    assert!(device.calls_on(QueueKind::AsyncCompute).is_empty());
    assert!(device
        .calls_on(QueueKind::Graphics)
        .contains(&RhiCall::DispatchComputeShader {
            group_x: 8,
            group_y: 1,
            group_z: 1,
        }));
    assert!(fence.is_signaled());
    executor.shutdown();
}

#[test]
fn test_fence_generation_follows_frames() {
    let (_device, executor) = with_async_compute(RhiSettings::inline());

    let first = ComputeFence::new("Frame1");
    executor.submit_async_compute(compute_writing(&executor, &first));
    {
        let mut immediate = executor.immediate();
        immediate.begin_frame();
        immediate.end_frame();
        immediate.immediate_flush(FlushMode::FullDrain);
    }
    let second = ComputeFence::new("Frame2");
    executor.submit_async_compute(compute_writing(&executor, &second));
    executor.flush(FlushMode::FullDrain);

    let first_id = first.signaled_id().expect("first fence signaled");
    let second_id = second.signaled_id().expect("second fence signaled");
    assert_eq!(first_id.generation(), 1);
    assert_eq!(second_id.generation(), 2);
    assert_ne!(first_id.slot(), second_id.slot());
    executor.shutdown();
}

#[test]
#[should_panic(expected = "FenceRing exhausted")]
fn test_fence_ring_rejects_reuse_within_a_frame() {
    let settings = RhiSettings {
        fence_ring_capacity: 2,
        ..RhiSettings::inline()
    };
    let (_device, executor) = with_async_compute(settings);

    for i in 0..3 {
        let fence = ComputeFence::new(format!("F{i}"));
        executor.submit_async_compute(compute_writing(&executor, &fence));
    }
}

#[test]
#[should_panic(expected = "waited on before being written")]
fn test_waiting_on_unwritten_fence_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let fence = ComputeFence::new("Never");

    let mut list = executor.create_command_list();
    list.wait_compute_fence(&fence);
}

#[test]
#[should_panic(expected = "Timed out")]
fn test_bounded_fence_wait_times_out() {
    let settings = RhiSettings {
        fence_wait_timeout_ms: Some(20),
        ..RhiSettings::inline()
    };
    let (_device, executor) = with_async_compute(settings);
    let fence = ComputeFence::new("Stalled");

    // The compute list records the write but is never submitted.
    let _compute = compute_writing(&executor, &fence);
    let mut graphics = executor.create_command_list();
    graphics.wait_compute_fence(&fence);
    executor.submit(graphics);
}

#[test]
#[should_panic(expected = "transition recorded on a")]
fn test_transition_must_start_on_the_list_queue() {
    let (_device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    list.transition_uavs(
        TransitionAccess::Writable,
        TransitionPipeline::ComputeToCompute,
        &[UnorderedAccessViewId(1)],
        None,
    );
}
