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

//! Concrete recorded commands, one per hardware entry point.

use khora_core::rhi::*;

use super::{ExecuteContext, RhiCommand};
use crate::arena::{ArenaBytes, ArenaSlice};
use crate::executor::parallel::ParallelTranslateBatch;
use crate::list::CommandList;
use crate::token::{self, UniformBufferArgs, WorkAreaRef};
use std::sync::atomic::Ordering;

// SAFETY (for every `as_slice` below): payloads live in the arena of the list
// being executed, which is only reset after its whole chain has run.

// --- State ---

pub(crate) struct SetRasterizerState {
    pub(crate) state: RasterizerStateId,
}

impl RhiCommand for SetRasterizerState {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_rasterizer_state(self.state);
    }
}

pub(crate) struct SetDepthStencilState {
    pub(crate) state: DepthStencilStateId,
    pub(crate) stencil_ref: u32,
}

impl RhiCommand for SetDepthStencilState {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_depth_stencil_state(self.state, self.stencil_ref);
    }
}

pub(crate) struct SetBlendState {
    pub(crate) state: BlendStateId,
    pub(crate) blend_factor: LinearColor,
}

impl RhiCommand for SetBlendState {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_blend_state(self.state, self.blend_factor);
    }
}

pub(crate) struct SetBoundShaderState {
    pub(crate) state: BoundShaderStateId,
}

impl RhiCommand for SetBoundShaderState {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_bound_shader_state(self.state);
    }
}

pub(crate) struct SetLocalBoundShaderState {
    pub(crate) work_area: WorkAreaRef<BoundShaderStateDesc, BoundShaderStateId>,
}

impl RhiCommand for SetLocalBoundShaderState {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let work_area = unsafe { self.work_area.get() };
        let device = ctx.device;
        let counters = &ctx.services.counters;
        let state = token::redeem(work_area, ctx.list_uid, |desc| {
            counters.tokens_built.fetch_add(1, Ordering::Relaxed);
            device.create_bound_shader_state(desc)
        });
        ctx.context.set_bound_shader_state(state);
    }
}

pub(crate) struct SetComputeShader {
    pub(crate) shader: ComputeShaderId,
}

impl RhiCommand for SetComputeShader {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_compute_shader(self.shader);
    }
}

pub(crate) struct SetViewport {
    pub(crate) viewport: Viewport,
}

impl RhiCommand for SetViewport {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_viewport(self.viewport);
    }
}

pub(crate) struct SetScissorRect {
    pub(crate) enable: bool,
    pub(crate) rect: IntRect,
}

impl RhiCommand for SetScissorRect {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_scissor_rect(self.enable, self.rect);
    }
}

pub(crate) struct SetRenderTargets {
    pub(crate) targets: RenderTargetsInfo,
}

impl RhiCommand for SetRenderTargets {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_render_targets(&self.targets);
    }
}

// --- Shader bindings ---

pub(crate) struct SetShaderTexture {
    pub(crate) stage: ShaderStage,
    pub(crate) index: u32,
    pub(crate) texture: TextureId,
}

impl RhiCommand for SetShaderTexture {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .set_shader_texture(self.stage, self.index, self.texture);
    }
}

pub(crate) struct SetShaderSampler {
    pub(crate) stage: ShaderStage,
    pub(crate) index: u32,
    pub(crate) sampler: SamplerStateId,
}

impl RhiCommand for SetShaderSampler {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .set_shader_sampler(self.stage, self.index, self.sampler);
    }
}

pub(crate) struct SetShaderUniformBuffer {
    pub(crate) stage: ShaderStage,
    pub(crate) index: u32,
    pub(crate) buffer: UniformBufferId,
}

impl RhiCommand for SetShaderUniformBuffer {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .set_shader_uniform_buffer(self.stage, self.index, self.buffer);
    }
}

pub(crate) struct SetLocalShaderUniformBuffer {
    pub(crate) stage: ShaderStage,
    pub(crate) index: u32,
    pub(crate) work_area: WorkAreaRef<UniformBufferArgs, UniformBufferId>,
}

impl RhiCommand for SetLocalShaderUniformBuffer {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let work_area = unsafe { self.work_area.get() };
        let device = ctx.device;
        let counters = &ctx.services.counters;
        let buffer = token::redeem(work_area, ctx.list_uid, |args| {
            counters.tokens_built.fetch_add(1, Ordering::Relaxed);
            // SAFETY: see the note at the top of this module.
            let contents = unsafe { args.contents.as_slice() };
            device.create_uniform_buffer(contents, &args.layout, UniformBufferUsage::SingleDraw)
        });
        ctx.context
            .set_shader_uniform_buffer(self.stage, self.index, buffer);
    }
}

pub(crate) struct SetShaderResourceView {
    pub(crate) stage: ShaderStage,
    pub(crate) index: u32,
    pub(crate) srv: ShaderResourceViewId,
}

impl RhiCommand for SetShaderResourceView {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .set_shader_resource_view(self.stage, self.index, self.srv);
    }
}

pub(crate) struct SetUav {
    pub(crate) index: u32,
    pub(crate) uav: UnorderedAccessViewId,
}

impl RhiCommand for SetUav {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.set_uav(self.index, self.uav);
    }
}

pub(crate) struct SetShaderParameter {
    pub(crate) stage: ShaderStage,
    pub(crate) buffer_index: u32,
    pub(crate) base_index: u32,
    pub(crate) data: ArenaBytes,
}

impl RhiCommand for SetShaderParameter {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let data = unsafe { self.data.as_slice() };
        ctx.context
            .set_shader_parameter(self.stage, self.buffer_index, self.base_index, data);
    }
}

pub(crate) struct SetStreamSource {
    pub(crate) stream_index: u32,
    pub(crate) buffer: VertexBufferId,
    pub(crate) stride: u32,
    pub(crate) offset: u32,
}

impl RhiCommand for SetStreamSource {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .set_stream_source(self.stream_index, self.buffer, self.stride, self.offset);
    }
}

// --- Draws and dispatches ---

pub(crate) struct DrawPrimitive {
    pub(crate) primitive: PrimitiveType,
    pub(crate) base_vertex_index: u32,
    pub(crate) num_primitives: u32,
    pub(crate) num_instances: u32,
}

impl RhiCommand for DrawPrimitive {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.draw_primitive(
            self.primitive,
            self.base_vertex_index,
            self.num_primitives,
            self.num_instances,
        );
    }
}

pub(crate) struct DrawIndexedPrimitive {
    pub(crate) index_buffer: IndexBufferId,
    pub(crate) primitive: PrimitiveType,
    pub(crate) base_vertex_index: i32,
    pub(crate) first_instance: u32,
    pub(crate) num_vertices: u32,
    pub(crate) start_index: u32,
    pub(crate) num_primitives: u32,
    pub(crate) num_instances: u32,
}

impl RhiCommand for DrawIndexedPrimitive {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.draw_indexed_primitive(
            self.index_buffer,
            self.primitive,
            self.base_vertex_index,
            self.first_instance,
            self.num_vertices,
            self.start_index,
            self.num_primitives,
            self.num_instances,
        );
    }
}

pub(crate) struct DrawPrimitiveIndirect {
    pub(crate) primitive: PrimitiveType,
    pub(crate) argument_buffer: VertexBufferId,
    pub(crate) argument_offset: u32,
}

impl RhiCommand for DrawPrimitiveIndirect {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .draw_primitive_indirect(self.primitive, self.argument_buffer, self.argument_offset);
    }
}

pub(crate) struct DrawIndexedPrimitiveIndirect {
    pub(crate) primitive: PrimitiveType,
    pub(crate) index_buffer: IndexBufferId,
    pub(crate) argument_buffer: VertexBufferId,
    pub(crate) argument_offset: u32,
}

impl RhiCommand for DrawIndexedPrimitiveIndirect {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.draw_indexed_primitive_indirect(
            self.primitive,
            self.index_buffer,
            self.argument_buffer,
            self.argument_offset,
        );
    }
}

pub(crate) struct DrawPrimitiveUp {
    pub(crate) primitive: PrimitiveType,
    pub(crate) num_primitives: u32,
    pub(crate) vertex_data: ArenaBytes,
    pub(crate) vertex_stride: u32,
}

impl RhiCommand for DrawPrimitiveUp {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let vertices = unsafe { self.vertex_data.as_slice() };
        ctx.context
            .draw_primitive_up(self.primitive, self.num_primitives, vertices, self.vertex_stride);
    }
}

pub(crate) struct DrawIndexedPrimitiveUp {
    pub(crate) primitive: PrimitiveType,
    pub(crate) min_vertex_index: u32,
    pub(crate) num_vertices: u32,
    pub(crate) num_primitives: u32,
    pub(crate) index_data: ArenaBytes,
    pub(crate) index_stride: u32,
    pub(crate) vertex_data: ArenaBytes,
    pub(crate) vertex_stride: u32,
}

impl RhiCommand for DrawIndexedPrimitiveUp {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let (indices, vertices) = unsafe { (self.index_data.as_slice(), self.vertex_data.as_slice()) };
        ctx.context.draw_indexed_primitive_up(
            self.primitive,
            self.min_vertex_index,
            self.num_vertices,
            self.num_primitives,
            indices,
            self.index_stride,
            vertices,
            self.vertex_stride,
        );
    }
}

pub(crate) struct DispatchComputeShader {
    pub(crate) group_x: u32,
    pub(crate) group_y: u32,
    pub(crate) group_z: u32,
}

impl RhiCommand for DispatchComputeShader {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .dispatch_compute_shader(self.group_x, self.group_y, self.group_z);
    }
}

pub(crate) struct DispatchIndirectComputeShader {
    pub(crate) argument_buffer: VertexBufferId,
    pub(crate) argument_offset: u32,
}

impl RhiCommand for DispatchIndirectComputeShader {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .dispatch_indirect_compute_shader(self.argument_buffer, self.argument_offset);
    }
}

// --- Clears and copies ---

pub(crate) struct Clear {
    pub(crate) params: ClearParams,
}

impl RhiCommand for Clear {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.clear(&self.params);
    }
}

pub(crate) struct ClearMrt {
    pub(crate) colors: ArenaSlice<LinearColor>,
    pub(crate) depth: Option<f32>,
    pub(crate) stencil: Option<u32>,
    pub(crate) exclude_rect: IntRect,
}

impl RhiCommand for ClearMrt {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let colors = unsafe { self.colors.as_slice() };
        ctx.context
            .clear_mrt(colors, self.depth, self.stencil, self.exclude_rect);
    }
}

pub(crate) struct ClearUav {
    pub(crate) uav: UnorderedAccessViewId,
    pub(crate) values: [u32; 4],
}

impl RhiCommand for ClearUav {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.clear_uav(self.uav, self.values);
    }
}

pub(crate) struct CopyToResolveTarget {
    pub(crate) source: TextureId,
    pub(crate) dest: TextureId,
    pub(crate) keep_original_surface: bool,
    pub(crate) params: ResolveParams,
}

impl RhiCommand for CopyToResolveTarget {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.copy_to_resolve_target(
            self.source,
            self.dest,
            self.keep_original_surface,
            &self.params,
        );
    }
}

pub(crate) struct UpdateVertexBuffer {
    pub(crate) buffer: VertexBufferId,
    pub(crate) offset: u32,
    pub(crate) data: ArenaBytes,
}

impl RhiCommand for UpdateVertexBuffer {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let data = unsafe { self.data.as_slice() };
        ctx.context.update_vertex_buffer(self.buffer, self.offset, data);
    }
}

// --- Transitions and fences ---

pub(crate) struct TransitionTextures {
    pub(crate) access: TransitionAccess,
    pub(crate) textures: ArenaSlice<TextureId>,
}

impl RhiCommand for TransitionTextures {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let textures = unsafe { self.textures.as_slice() };
        ctx.context.transition_textures(self.access, textures);
    }
}

pub(crate) struct TransitionUavs {
    pub(crate) access: TransitionAccess,
    pub(crate) pipeline: TransitionPipeline,
    pub(crate) uavs: ArenaSlice<UnorderedAccessViewId>,
    pub(crate) write_fence: Option<ComputeFence>,
}

impl RhiCommand for TransitionUavs {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let uavs = unsafe { self.uavs.as_slice() };
        ctx.context
            .transition_uavs(self.access, self.pipeline, uavs, self.write_fence.as_ref());
        if let Some(fence) = &self.write_fence {
            let id = ctx.services.signal_fence(fence);
            log::trace!("Signaled compute fence '{}' with {:?}.", fence.name(), id);
        }
    }
}

pub(crate) struct WaitComputeFence {
    pub(crate) fence: ComputeFence,
}

impl RhiCommand for WaitComputeFence {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.services.wait_fence(&self.fence);
        ctx.context.wait_compute_fence(&self.fence);
    }
}

// --- Queries and hints ---

pub(crate) struct BeginRenderQuery {
    pub(crate) query: RenderQueryId,
}

impl RhiCommand for BeginRenderQuery {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.begin_render_query(self.query);
    }
}

pub(crate) struct EndRenderQuery {
    pub(crate) query: RenderQueryId,
}

impl RhiCommand for EndRenderQuery {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.end_render_query(self.query);
    }
}

pub(crate) struct BeginOcclusionQueryBatch;

impl RhiCommand for BeginOcclusionQueryBatch {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.begin_occlusion_query_batch();
    }
}

pub(crate) struct EndOcclusionQueryBatch;

impl RhiCommand for EndOcclusionQueryBatch {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.end_occlusion_query_batch();
    }
}

pub(crate) struct SubmitCommandsHint;

impl RhiCommand for SubmitCommandsHint {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.submit_commands_hint();
    }
}

// --- Frame structure (immediate list only) ---

pub(crate) struct BeginScene;

impl RhiCommand for BeginScene {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.begin_scene();
    }
}

pub(crate) struct EndScene;

impl RhiCommand for EndScene {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.end_scene();
    }
}

pub(crate) struct BeginFrame;

impl RhiCommand for BeginFrame {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.begin_frame();
    }
}

pub(crate) struct EndFrame;

impl RhiCommand for EndFrame {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.end_frame();
        ctx.services.complete_frame();
    }
}

pub(crate) struct BeginDrawingViewport {
    pub(crate) viewport: ViewportId,
    pub(crate) render_target: Option<TextureId>,
}

impl RhiCommand for BeginDrawingViewport {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .begin_drawing_viewport(self.viewport, self.render_target);
    }
}

pub(crate) struct EndDrawingViewport {
    pub(crate) viewport: ViewportId,
    pub(crate) present: bool,
    pub(crate) lock_to_vsync: bool,
}

impl RhiCommand for EndDrawingViewport {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context
            .end_drawing_viewport(self.viewport, self.present, self.lock_to_vsync);
    }
}

// --- Debug markers ---

pub(crate) struct PushEvent {
    pub(crate) name: ArenaBytes,
    pub(crate) color: LinearColor,
}

impl RhiCommand for PushEvent {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        // SAFETY: see the note at the top of this module.
        let bytes = unsafe { self.name.as_slice() };
        let name = std::str::from_utf8(bytes).unwrap_or("<invalid event name>");
        ctx.context.push_event(name, self.color);
    }
}

pub(crate) struct PopEvent;

impl RhiCommand for PopEvent {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        ctx.context.pop_event();
    }
}

// --- Sub-lists ---

/// Executes a finished list in the stream of the list carrying this command.
pub(crate) struct ExecuteSubList {
    pub(crate) list: CommandList,
}

impl RhiCommand for ExecuteSubList {
    fn execute(mut self, ctx: &mut ExecuteContext<'_>) {
        self.list.execute(ctx);
    }
}

/// Waits for the translate tasks of a parallel batch and submits their
/// contexts in caller order.
pub(crate) struct WaitForAndSubmitParallel {
    pub(crate) batch: ParallelTranslateBatch,
}

impl RhiCommand for WaitForAndSubmitParallel {
    fn execute(self, ctx: &mut ExecuteContext<'_>) {
        self.batch.wait_and_submit(ctx);
    }
}
