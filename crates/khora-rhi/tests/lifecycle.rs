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
use khora_rhi::{FlushMode, ListState, RhiExecutor};

use common::{graphics_calls, graphics_only};

#[test]
fn test_user_pointer_draw_copies_vertex_data() {
    let (device, executor) = graphics_only(RhiSettings::default());

    let mut list = executor.create_command_list();
    let vertices = list.begin_draw_primitive_up(PrimitiveType::TriangleList, 1, 3, 4);
    assert_eq!(vertices.len(), 12);
    vertices.copy_from_slice(&[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
    assert!(list.is_draw_up_pending());
    list.end_draw_primitive_up();
    assert!(!list.is_draw_up_pending());

    executor.submit(list);
    executor.flush(FlushMode::FullDrain);

    assert_eq!(
        graphics_calls(&device),
        vec![RhiCall::DrawPrimitiveUp {
            primitive: PrimitiveType::TriangleList,
            num_primitives: 1,
            vertex_data: vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0],
            vertex_stride: 4,
        }]
    );
    executor.shutdown();
}

#[test]
fn test_indexed_user_pointer_draw_sizes_both_buffers() {
    let (device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    let (vertices, indices) =
        list.begin_draw_indexed_primitive_up(PrimitiveType::TriangleList, 1, 3, 12, 2);
    assert_eq!(vertices.len(), 36);
    assert_eq!(indices.len(), 6);
    vertices.fill(7);
    indices.copy_from_slice(&[0, 0, 1, 0, 2, 0]);
    list.end_draw_indexed_primitive_up();

    executor.submit(list);
    executor.flush(FlushMode::FullDrain);

    match graphics_calls(&device).as_slice() {
        [RhiCall::DrawIndexedPrimitiveUp {
            num_vertices,
            num_primitives,
            index_data,
            index_stride,
            vertex_data,
            vertex_stride,
            ..
        }] => {
            assert_eq!((*num_vertices, *num_primitives), (3, 1));
            assert_eq!(index_data, &vec![0, 0, 1, 0, 2, 0]);
            assert_eq!(*index_stride, 2);
            assert_eq!(vertex_data, &vec![7; 36]);
            assert_eq!(*vertex_stride, 12);
        }
        other => panic!("unexpected calls: {other:?}"),
    }
    executor.shutdown();
}

#[test]
#[should_panic(expected = "without a matching begin_draw_primitive_up")]
fn test_end_without_begin_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.end_draw_primitive_up();
}

#[test]
#[should_panic(expected = "while another user-pointer draw is open")]
fn test_nested_user_pointer_draw_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.begin_draw_primitive_up(PrimitiveType::PointList, 1, 1, 4);
    list.begin_draw_primitive_up(PrimitiveType::PointList, 1, 1, 4);
}

#[test]
#[should_panic(expected = "Begin without End")]
fn test_submit_with_open_user_pointer_draw_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.begin_draw_primitive_up(PrimitiveType::PointList, 1, 1, 4);
    executor.submit(list);
}

#[test]
fn test_bypass_executes_while_recording() {
    let settings = RhiSettings {
        bypass: true,
        ..RhiSettings::default()
    };
    let (device, executor) = graphics_only(settings);
    assert!(executor.is_bypass());

    let mut list = executor.create_command_list();
    assert!(list.is_bypass());
    list.set_rasterizer_state(RasterizerStateId(4));
    list.draw_primitive(PrimitiveType::TriangleList, 0, 2, 1);

    assert_eq!(list.num_commands(), 0);
    assert_eq!(
        graphics_calls(&device),
        vec![
            RhiCall::SetRasterizerState(RasterizerStateId(4)),
            RhiCall::DrawPrimitive {
                primitive: PrimitiveType::TriangleList,
                base_vertex_index: 0,
                num_primitives: 2,
                num_instances: 1,
            },
        ]
    );

    executor.submit(list);
    executor.flush(FlushMode::FullDrain);
    assert_eq!(graphics_calls(&device).len(), 2);
    assert_eq!(executor.stats().bypass_lists, 2);
    executor.shutdown();
}

#[test]
fn test_bypass_latches_at_control_point() {
    let (device, executor) = graphics_only(RhiSettings::default());

    executor.set_bypass(true);
    let deferred = executor.create_command_list();
    assert!(!deferred.is_bypass(), "bypass takes effect when latched");
    drop(deferred);

    assert!(executor.latch_bypass());
    assert!(executor.is_bypass());
    assert!(!executor.latch_bypass(), "latching twice is a no-op");

    let mut list = executor.create_command_list();
    list.set_scissor_rect(false, IntRect::default());
    assert_eq!(graphics_calls(&device).len(), 1);
    drop(list);

    executor.set_bypass(false);
    assert!(executor.latch_bypass());
    assert!(!executor.create_command_list().is_bypass());
    executor.shutdown();
}

#[test]
fn test_list_lifecycle_states() {
    let (_device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    assert_eq!(list.state(), ListState::Recording);
    assert_eq!(list.queue(), QueueKind::Graphics);
    assert!(list.is_empty());

    list.set_viewport(Viewport::default());
    assert_eq!(list.num_commands(), 1);
    assert!(list.used_memory() > 0);

    let old_uid = list.uid();
    list.reset();
    assert_ne!(list.uid(), old_uid);
    assert!(list.is_empty());
    assert_eq!(list.state(), ListState::Recording);

    executor.submit(list);
    executor.shutdown();
}

#[test]
fn test_live_lists_are_tracked() {
    let (_device, executor) = graphics_only(RhiSettings::default());
    assert_eq!(executor.live_list_count(), 0);

    let mut first = executor.create_command_list();
    let second = executor.create_async_compute_list();
    assert_eq!(executor.live_list_count(), 2);

    first.reset();
    assert_eq!(executor.live_list_count(), 2);

    drop(second);
    first.set_viewport(Viewport::default());
    executor.submit(first);
    executor.flush(FlushMode::FullDrain);
    assert_eq!(executor.live_list_count(), 0);
    assert_eq!(executor.stats().live_lists, 0);
    executor.shutdown();
}

#[test]
#[should_panic(expected = "still outstanding at shutdown")]
fn test_leaked_list_is_reported_at_shutdown() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let _leaked = executor.create_command_list();
    executor.shutdown();
}

#[test]
fn test_release_resources_flushes_device() {
    let (device, executor) = graphics_only(RhiSettings::default());

    executor.flush(FlushMode::FullDrain);
    assert_eq!(device.resource_flushes(), 0);
    executor.flush(FlushMode::FullDrainAndReleaseResources);
    assert_eq!(device.resource_flushes(), 1);
    executor.shutdown();
}

#[test]
fn test_stats_count_executed_work() {
    let (_device, executor) = graphics_only(RhiSettings::default());

    for _ in 0..3 {
        let mut list = executor.create_command_list();
        list.set_viewport(Viewport::default());
        list.draw_primitive(PrimitiveType::PointList, 0, 4, 1);
        executor.submit(list);
    }
    executor.flush(FlushMode::FullDrain);

    let stats = executor.stats();
    // Each submit also executes the immediate list that carries it.
    assert_eq!(stats.lists_executed, 6);
    assert_eq!(stats.commands_executed, 9);
    assert!(stats.peak_list_memory_bytes > 0);
    executor.shutdown();
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "draw_primitive with 0 primitives")]
fn test_empty_draw_is_a_caller_error() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.draw_primitive(PrimitiveType::TriangleList, 0, 0, 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "begin_draw_primitive_up with 0 primitives")]
fn test_empty_user_pointer_draw_is_a_caller_error() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.begin_draw_primitive_up(PrimitiveType::TriangleList, 0, 3, 4);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "begin_draw_indexed_primitive_up with 0 primitives")]
fn test_empty_indexed_user_pointer_draw_is_a_caller_error() {
    let (_device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.begin_draw_indexed_primitive_up(PrimitiveType::TriangleList, 0, 3, 12, 2);
}

#[test]
#[cfg(not(debug_assertions))]
fn test_empty_user_pointer_draw_is_skipped() {
    let (device, executor) = graphics_only(RhiSettings::inline());
    let mut list = executor.create_command_list();
    list.begin_draw_primitive_up(PrimitiveType::TriangleList, 0, 3, 4);
    list.end_draw_primitive_up();
    assert_eq!(list.num_commands(), 0);

    executor.submit(list);
    executor.flush(FlushMode::FullDrain);
    assert!(!graphics_calls(&device)
        .iter()
        .any(|call| matches!(call, RhiCall::DrawPrimitiveUp { .. })));
    executor.shutdown();
}

#[test]
fn test_invalid_settings_are_rejected() {
    let device = std::sync::Arc::new(khora_infra::TraceRhiDevice::new());
    let settings = RhiSettings {
        max_frames_in_flight: 0,
        ..RhiSettings::default()
    };
    let result = RhiExecutor::new(
        device.clone(),
        device.create_queue_context(QueueKind::Graphics),
        None,
        settings,
    );
    assert!(matches!(
        result,
        Err(RhiError::Settings(SettingsError::Invalid {
            field: "max_frames_in_flight",
            ..
        }))
    ));
}
