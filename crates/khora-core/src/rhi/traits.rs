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

//! The hardware interface consumed by the command system.
//!
//! Back-ends implement [`RhiCommandContext`] once per queue (and once per
//! parallel translate task) and [`RhiDevice`] once per GPU. The command system
//! only ever calls a given context from one thread at a time, and may call the
//! same state setter redundantly.

use std::any::Any;
use std::fmt::Debug;

use super::fence::ComputeFence;
use super::handles::*;
use super::types::*;

/// A capability set with one entry point per command kind.
///
/// Every recorded command ends up as exactly one call on this trait, either
/// when its list executes or, in bypass mode, while it is recorded.
pub trait RhiCommandContext: Send + Debug {
    /// Binds a rasterizer state.
    fn set_rasterizer_state(&mut self, state: RasterizerStateId);

    /// Binds a depth-stencil state with its stencil reference value.
    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId, stencil_ref: u32);

    /// Binds a blend state with its constant blend factor.
    fn set_blend_state(&mut self, state: BlendStateId, blend_factor: LinearColor);

    /// Binds the vertex declaration and graphics shader stages.
    fn set_bound_shader_state(&mut self, state: BoundShaderStateId);

    /// Binds the compute shader used by subsequent dispatches.
    fn set_compute_shader(&mut self, shader: ComputeShaderId);

    /// Sets the viewport transform.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Enables or disables the scissor test with the given rectangle.
    fn set_scissor_rect(&mut self, enable: bool, rect: IntRect);

    /// Binds the output targets of subsequent draws.
    fn set_render_targets(&mut self, targets: &RenderTargetsInfo);

    /// Binds a texture to a shader stage slot.
    fn set_shader_texture(&mut self, stage: ShaderStage, index: u32, texture: TextureId);

    /// Binds a sampler to a shader stage slot.
    fn set_shader_sampler(&mut self, stage: ShaderStage, index: u32, sampler: SamplerStateId);

    /// Binds a uniform buffer to a shader stage slot.
    fn set_shader_uniform_buffer(&mut self, stage: ShaderStage, index: u32, buffer: UniformBufferId);

    /// Binds a shader resource view to a shader stage slot.
    fn set_shader_resource_view(
        &mut self,
        stage: ShaderStage,
        index: u32,
        srv: ShaderResourceViewId,
    );

    /// Binds an unordered access view to a compute slot.
    fn set_uav(&mut self, index: u32, uav: UnorderedAccessViewId);

    /// Writes loose constant data into a stage's global constant buffer.
    fn set_shader_parameter(&mut self, stage: ShaderStage, buffer_index: u32, base_index: u32, data: &[u8]);

    /// Binds a vertex stream.
    fn set_stream_source(&mut self, stream_index: u32, buffer: VertexBufferId, stride: u32, offset: u32);

    /// Draws non-indexed primitives from the bound streams.
    fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    );

    /// Draws indexed primitives.
    #[allow(clippy::too_many_arguments)]
    fn draw_indexed_primitive(
        &mut self,
        index_buffer: IndexBufferId,
        primitive: PrimitiveType,
        base_vertex_index: i32,
        first_instance: u32,
        num_vertices: u32,
        start_index: u32,
        num_primitives: u32,
        num_instances: u32,
    );

    /// Draws non-indexed primitives with arguments read from a GPU buffer.
    fn draw_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    );

    /// Draws indexed primitives with arguments read from a GPU buffer.
    fn draw_indexed_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        index_buffer: IndexBufferId,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    );

    /// Draws primitives from CPU-provided vertex data.
    fn draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    );

    /// Draws indexed primitives from CPU-provided vertex and index data.
    #[allow(clippy::too_many_arguments)]
    fn draw_indexed_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        min_vertex_index: u32,
        num_vertices: u32,
        num_primitives: u32,
        index_data: &[u8],
        index_stride: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    );

    /// Dispatches the bound compute shader.
    fn dispatch_compute_shader(&mut self, group_x: u32, group_y: u32, group_z: u32);

    /// Dispatches the bound compute shader with group counts read from a GPU buffer.
    fn dispatch_indirect_compute_shader(&mut self, argument_buffer: VertexBufferId, argument_offset: u32);

    /// Clears the bound targets.
    fn clear(&mut self, params: &ClearParams);

    /// Clears each bound color target to its own color.
    fn clear_mrt(
        &mut self,
        colors: &[LinearColor],
        depth: Option<f32>,
        stencil: Option<u32>,
        exclude_rect: IntRect,
    );

    /// Clears an unordered access view to the given raw values.
    fn clear_uav(&mut self, uav: UnorderedAccessViewId, values: [u32; 4]);

    /// Resolves or copies `source` into `dest`.
    fn copy_to_resolve_target(
        &mut self,
        source: TextureId,
        dest: TextureId,
        keep_original_surface: bool,
        params: &ResolveParams,
    );

    /// Uploads data into a vertex buffer at `offset`.
    fn update_vertex_buffer(&mut self, buffer: VertexBufferId, offset: u32, data: &[u8]);

    /// Transitions textures to a new access.
    fn transition_textures(&mut self, access: TransitionAccess, textures: &[TextureId]);

    /// Transitions unordered access views, optionally writing a fence once done.
    fn transition_uavs(
        &mut self,
        access: TransitionAccess,
        pipeline: TransitionPipeline,
        uavs: &[UnorderedAccessViewId],
        write_fence: Option<&ComputeFence>,
    );

    /// Makes the queue wait on a fence written by another queue.
    fn wait_compute_fence(&mut self, fence: &ComputeFence);

    /// Starts a render query.
    fn begin_render_query(&mut self, query: RenderQueryId);

    /// Ends a render query.
    fn end_render_query(&mut self, query: RenderQueryId);

    /// Opens a batch of occlusion queries.
    fn begin_occlusion_query_batch(&mut self);

    /// Closes the current batch of occlusion queries.
    fn end_occlusion_query_batch(&mut self);

    /// Hints that pending work should be handed to the GPU now.
    fn submit_commands_hint(&mut self);

    /// Marks the beginning of a scene.
    fn begin_scene(&mut self);

    /// Marks the end of a scene.
    fn end_scene(&mut self);

    /// Marks the beginning of a frame.
    fn begin_frame(&mut self);

    /// Marks the end of a frame.
    fn end_frame(&mut self);

    /// Starts drawing into a presentable viewport.
    fn begin_drawing_viewport(&mut self, viewport: ViewportId, render_target: Option<TextureId>);

    /// Finishes drawing into a viewport, optionally presenting it.
    fn end_drawing_viewport(&mut self, viewport: ViewportId, present: bool, lock_to_vsync: bool);

    /// Opens a named debug scope.
    fn push_event(&mut self, name: &str, color: LinearColor);

    /// Closes the innermost debug scope.
    fn pop_event(&mut self);

    /// Allows back-ends to recover their concrete context type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Device-level services: object creation and context management.
pub trait RhiDevice: Send + Sync + Debug {
    /// Creates a bound shader state. Called on the executing thread when a
    /// deferred token is first redeemed.
    fn create_bound_shader_state(&self, desc: &BoundShaderStateDesc) -> BoundShaderStateId;

    /// Creates a uniform buffer initialised with `contents`.
    fn create_uniform_buffer(
        &self,
        contents: &[u8],
        layout: &UniformBufferLayout,
        usage: UniformBufferUsage,
    ) -> UniformBufferId;

    /// Creates a command context recording into a new hardware command buffer
    /// for `queue`. Used by parallel translate tasks.
    fn create_command_context(&self, queue: QueueKind) -> Box<dyn RhiCommandContext>;

    /// Submits contexts created by [`create_command_context`](Self::create_command_context)
    /// to `queue`, in slice order.
    fn submit_command_contexts(&self, queue: QueueKind, contexts: Vec<Box<dyn RhiCommandContext>>);

    /// Releases objects whose deletion was deferred until the GPU went idle.
    fn flush_resources(&self);
}
