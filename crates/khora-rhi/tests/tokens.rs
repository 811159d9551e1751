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
use khora_rhi::FlushMode;

use common::{graphics_calls, graphics_only};

fn shader_desc() -> BoundShaderStateDesc {
    BoundShaderStateDesc {
        vertex_declaration: VertexDeclarationId(1),
        vertex_shader: VertexShaderId(2),
        pixel_shader: Some(PixelShaderId(3)),
        ..Default::default()
    }
}

const VIEW_LAYOUT: UniformBufferLayout = UniformBufferLayout {
    name: "View",
    constant_buffer_size: 4,
};

#[test]
fn test_bound_shader_state_is_built_once_on_first_use() {
    let (device, executor) = graphics_only(RhiSettings::default());

    let mut list = executor.create_command_list();
    let token = list.build_local_bound_shader_state(shader_desc());
    list.set_local_bound_shader_state(token);
    list.draw_primitive(PrimitiveType::TriangleList, 0, 1, 1);
    list.set_local_bound_shader_state(token);
    list.draw_primitive(PrimitiveType::TriangleList, 3, 1, 1);
    assert_eq!(list.local_bound_shader_state_use_count(token), 2);
    assert_eq!(token.built(), None);
    assert_eq!(device.bound_shader_states_created(), 0);

    executor.submit(list);
    executor.flush(FlushMode::FullDrain);

    assert_eq!(device.bound_shader_states_created(), 1);
    let bound: Vec<BoundShaderStateId> = graphics_calls(&device)
        .into_iter()
        .filter_map(|call| match call {
            RhiCall::SetBoundShaderState(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(bound.len(), 2);
    assert_eq!(bound[0], bound[1]);
    assert_eq!(device.bound_shader_state_desc(bound[0]), Some(shader_desc()));
    assert_eq!(executor.stats().tokens_built, 1);
    executor.shutdown();
}

#[test]
fn test_uniform_buffer_contents_are_captured() {
    let (device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    let token = {
        let contents = vec![9u8, 8, 7, 6];
        list.build_local_uniform_buffer(&contents, VIEW_LAYOUT)
    };
    list.set_local_shader_uniform_buffer(ShaderStage::Vertex, 0, token);
    executor.submit(list);
    executor.flush(FlushMode::FullDrain);

    match graphics_calls(&device).as_slice() {
        [RhiCall::SetShaderUniformBuffer {
            stage: ShaderStage::Vertex,
            index: 0,
            buffer,
        }] => {
            assert_eq!(device.uniform_buffer_contents(*buffer), Some(vec![9, 8, 7, 6]));
        }
        other => panic!("unexpected calls: {other:?}"),
    }
    executor.shutdown();
}

#[test]
fn test_unused_token_is_not_built() {
    let (device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    let _unused = list.build_local_uniform_buffer(&[1, 2, 3, 4], VIEW_LAYOUT);
    list.draw_primitive(PrimitiveType::PointList, 0, 1, 1);
    executor.submit(list);
    executor.flush(FlushMode::FullDrain);

    assert_eq!(device.uniform_buffers_created(), 0);
    executor.shutdown();
}

#[test]
fn test_bypass_builds_tokens_immediately() {
    let settings = RhiSettings {
        bypass: true,
        ..RhiSettings::inline()
    };
    let (device, executor) = graphics_only(settings);

    let mut list = executor.create_command_list();
    let token = list.build_local_bound_shader_state(shader_desc());
    assert_eq!(device.bound_shader_states_created(), 1);
    let id = token.built().expect("bypass tokens are built eagerly");

    list.set_local_bound_shader_state(token);
    assert_eq!(graphics_calls(&device), vec![RhiCall::SetBoundShaderState(id)]);
    executor.submit(list);
    executor.shutdown();
}

#[test]
#[should_panic(expected = "used on command list")]
fn test_token_from_another_list_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());

    let mut owner = executor.create_command_list();
    let mut other = executor.create_command_list();
    let token = owner.build_local_bound_shader_state(shader_desc());
    other.set_local_bound_shader_state(token);
}

#[test]
#[should_panic(expected = "used on command list")]
fn test_token_is_invalid_after_reset() {
    let (_device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    let token = list.build_local_uniform_buffer(&[0; 4], VIEW_LAYOUT);
    list.reset();
    list.set_local_shader_uniform_buffer(ShaderStage::Pixel, 1, token);
}

#[test]
fn test_bypass_tokens_report_no_pending_uses() {
    let settings = RhiSettings {
        bypass: true,
        ..RhiSettings::inline()
    };
    let (_device, executor) = graphics_only(settings);

    let mut list = executor.create_command_list();
    let token = list.build_local_uniform_buffer(&[1, 2, 3, 4], VIEW_LAYOUT);
    list.set_local_shader_uniform_buffer(ShaderStage::Vertex, 0, token);
    assert_eq!(list.local_uniform_buffer_use_count(token), 0);
    executor.submit(list);
    executor.shutdown();
}

#[test]
#[should_panic(expected = "used on command list")]
fn test_use_count_of_token_from_before_reset_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());

    let mut list = executor.create_command_list();
    let token = list.build_local_uniform_buffer(&[0; 4], VIEW_LAYOUT);
    list.reset();
    list.update_vertex_buffer(VertexBufferId(1), 0, &[0xFF; 256]);
    list.local_uniform_buffer_use_count(token);
}

#[test]
#[should_panic(expected = "used on command list")]
fn test_use_count_of_token_from_dropped_list_is_rejected() {
    let (_device, executor) = graphics_only(RhiSettings::inline());

    let token = {
        let mut owner = executor.create_command_list();
        owner.build_local_bound_shader_state(shader_desc())
    };
    executor.flush(FlushMode::FullDrainAndReleaseResources);
    let other = executor.create_command_list();
    other.local_bound_shader_state_use_count(token);
}

#[test]
#[should_panic(expected = "used on command list")]
fn test_token_from_another_executor_is_rejected() {
    let (_first_device, first) = graphics_only(RhiSettings::inline());
    let (_second_device, second) = graphics_only(RhiSettings::inline());

    let mut owner = first.create_command_list();
    let mut other = second.create_command_list();
    let token = owner.build_local_bound_shader_state(shader_desc());
    other.set_local_bound_shader_state(token);
}
