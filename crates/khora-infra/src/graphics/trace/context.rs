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

use std::any::Any;
use std::thread;
use std::time::Duration;

use khora_core::rhi::*;

use super::call::RhiCall;
use super::device::CallLog;

#[derive(Debug)]
enum Sink {
    /// Calls reach the hardware log as they are made.
    Direct(CallLog),
    /// Calls wait in the context until the device submits it.
    Buffered(Vec<RhiCall>),
}

/// A command context that records every call it receives.
///
/// Queue contexts write straight into the device's call log. Contexts made
/// for parallel translation buffer their calls, which only reach the log when
/// [`RhiDevice::submit_command_contexts`] submits them, the same way a
/// command buffer only reaches the GPU when submitted.
#[derive(Debug)]
pub struct TraceCommandContext {
    queue: QueueKind,
    sink: Sink,
    first_call_delay: Option<Duration>,
}

impl TraceCommandContext {
    pub(crate) fn direct(queue: QueueKind, log: CallLog) -> Self {
        Self {
            queue,
            sink: Sink::Direct(log),
            first_call_delay: None,
        }
    }

    pub(crate) fn buffered(queue: QueueKind, first_call_delay: Option<Duration>) -> Self {
        Self {
            queue,
            sink: Sink::Buffered(Vec::new()),
            first_call_delay,
        }
    }

    /// The queue this context records for.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// Takes the calls buffered so far. Always empty for queue contexts.
    pub fn take_buffered(&mut self) -> Vec<RhiCall> {
        match &mut self.sink {
            Sink::Buffered(calls) => std::mem::take(calls),
            Sink::Direct(_) => Vec::new(),
        }
    }

    fn push(&mut self, call: RhiCall) {
        if let Some(delay) = self.first_call_delay.take() {
            thread::sleep(delay);
        }
        match &mut self.sink {
            Sink::Direct(log) => log.lock().unwrap().push((self.queue, call)),
            Sink::Buffered(calls) => calls.push(call),
        }
    }
}

impl RhiCommandContext for TraceCommandContext {
    fn set_rasterizer_state(&mut self, state: RasterizerStateId) {
        self.push(RhiCall::SetRasterizerState(state));
    }

    fn set_depth_stencil_state(&mut self, state: DepthStencilStateId, stencil_ref: u32) {
        self.push(RhiCall::SetDepthStencilState { state, stencil_ref });
    }

    fn set_blend_state(&mut self, state: BlendStateId, blend_factor: LinearColor) {
        self.push(RhiCall::SetBlendState {
            state,
            blend_factor,
        });
    }

    fn set_bound_shader_state(&mut self, state: BoundShaderStateId) {
        self.push(RhiCall::SetBoundShaderState(state));
    }

    fn set_compute_shader(&mut self, shader: ComputeShaderId) {
        self.push(RhiCall::SetComputeShader(shader));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.push(RhiCall::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, enable: bool, rect: IntRect) {
        self.push(RhiCall::SetScissorRect { enable, rect });
    }

    fn set_render_targets(&mut self, targets: &RenderTargetsInfo) {
        self.push(RhiCall::SetRenderTargets(*targets));
    }

    fn set_shader_texture(&mut self, stage: ShaderStage, index: u32, texture: TextureId) {
        self.push(RhiCall::SetShaderTexture {
            stage,
            index,
            texture,
        });
    }

    fn set_shader_sampler(&mut self, stage: ShaderStage, index: u32, sampler: SamplerStateId) {
        self.push(RhiCall::SetShaderSampler {
            stage,
            index,
            sampler,
        });
    }

    fn set_shader_uniform_buffer(&mut self, stage: ShaderStage, index: u32, buffer: UniformBufferId) {
        self.push(RhiCall::SetShaderUniformBuffer {
            stage,
            index,
            buffer,
        });
    }

    fn set_shader_resource_view(
        &mut self,
        stage: ShaderStage,
        index: u32,
        srv: ShaderResourceViewId,
    ) {
        self.push(RhiCall::SetShaderResourceView { stage, index, srv });
    }

    fn set_uav(&mut self, index: u32, uav: UnorderedAccessViewId) {
        self.push(RhiCall::SetUav { index, uav });
    }

    fn set_shader_parameter(&mut self, stage: ShaderStage, buffer_index: u32, base_index: u32, data: &[u8]) {
        self.push(RhiCall::SetShaderParameter {
            stage,
            buffer_index,
            base_index,
            data: data.to_vec(),
        });
    }

    fn set_stream_source(&mut self, stream_index: u32, buffer: VertexBufferId, stride: u32, offset: u32) {
        self.push(RhiCall::SetStreamSource {
            stream_index,
            buffer,
            stride,
            offset,
        });
    }

    fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        self.push(RhiCall::DrawPrimitive {
            primitive,
            base_vertex_index,
            num_primitives,
            num_instances,
        });
    }

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
    ) {
        self.push(RhiCall::DrawIndexedPrimitive {
            index_buffer,
            primitive,
            base_vertex_index,
            first_instance,
            num_vertices,
            start_index,
            num_primitives,
            num_instances,
        });
    }

    fn draw_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    ) {
        self.push(RhiCall::DrawPrimitiveIndirect {
            primitive,
            argument_buffer,
            argument_offset,
        });
    }

    fn draw_indexed_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        index_buffer: IndexBufferId,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    ) {
        self.push(RhiCall::DrawIndexedPrimitiveIndirect {
            primitive,
            index_buffer,
            argument_buffer,
            argument_offset,
        });
    }

    fn draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: &[u8],
        vertex_stride: u32,
    ) {
        self.push(RhiCall::DrawPrimitiveUp {
            primitive,
            num_primitives,
            vertex_data: vertex_data.to_vec(),
            vertex_stride,
        });
    }

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
    ) {
        self.push(RhiCall::DrawIndexedPrimitiveUp {
            primitive,
            min_vertex_index,
            num_vertices,
            num_primitives,
            index_data: index_data.to_vec(),
            index_stride,
            vertex_data: vertex_data.to_vec(),
            vertex_stride,
        });
    }

    fn dispatch_compute_shader(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        self.push(RhiCall::DispatchComputeShader {
            group_x,
            group_y,
            group_z,
        });
    }

    fn dispatch_indirect_compute_shader(&mut self, argument_buffer: VertexBufferId, argument_offset: u32) {
        self.push(RhiCall::DispatchIndirectComputeShader {
            argument_buffer,
            argument_offset,
        });
    }

    fn clear(&mut self, params: &ClearParams) {
        self.push(RhiCall::Clear(*params));
    }

    fn clear_mrt(
        &mut self,
        colors: &[LinearColor],
        depth: Option<f32>,
        stencil: Option<u32>,
        exclude_rect: IntRect,
    ) {
        self.push(RhiCall::ClearMrt {
            colors: colors.to_vec(),
            depth,
            stencil,
            exclude_rect,
        });
    }

    fn clear_uav(&mut self, uav: UnorderedAccessViewId, values: [u32; 4]) {
        self.push(RhiCall::ClearUav { uav, values });
    }

    fn copy_to_resolve_target(
        &mut self,
        source: TextureId,
        dest: TextureId,
        keep_original_surface: bool,
        params: &ResolveParams,
    ) {
        self.push(RhiCall::CopyToResolveTarget {
            source,
            dest,
            keep_original_surface,
            params: *params,
        });
    }

    fn update_vertex_buffer(&mut self, buffer: VertexBufferId, offset: u32, data: &[u8]) {
        self.push(RhiCall::UpdateVertexBuffer {
            buffer,
            offset,
            data: data.to_vec(),
        });
    }

    fn transition_textures(&mut self, access: TransitionAccess, textures: &[TextureId]) {
        self.push(RhiCall::TransitionTextures {
            access,
            textures: textures.to_vec(),
        });
    }

    fn transition_uavs(
        &mut self,
        access: TransitionAccess,
        pipeline: TransitionPipeline,
        uavs: &[UnorderedAccessViewId],
        write_fence: Option<&ComputeFence>,
    ) {
        self.push(RhiCall::TransitionUavs {
            access,
            pipeline,
            uavs: uavs.to_vec(),
            write_fence: write_fence.map(|f| f.name().to_string()),
        });
    }

    fn wait_compute_fence(&mut self, fence: &ComputeFence) {
        self.push(RhiCall::WaitComputeFence(fence.name().to_string()));
    }

    fn begin_render_query(&mut self, query: RenderQueryId) {
        self.push(RhiCall::BeginRenderQuery(query));
    }

    fn end_render_query(&mut self, query: RenderQueryId) {
        self.push(RhiCall::EndRenderQuery(query));
    }

    fn begin_occlusion_query_batch(&mut self) {
        self.push(RhiCall::BeginOcclusionQueryBatch);
    }

    fn end_occlusion_query_batch(&mut self) {
        self.push(RhiCall::EndOcclusionQueryBatch);
    }

    fn submit_commands_hint(&mut self) {
        self.push(RhiCall::SubmitCommandsHint);
    }

    fn begin_scene(&mut self) {
        self.push(RhiCall::BeginScene);
    }

    fn end_scene(&mut self) {
        self.push(RhiCall::EndScene);
    }

    fn begin_frame(&mut self) {
        self.push(RhiCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.push(RhiCall::EndFrame);
    }

    fn begin_drawing_viewport(&mut self, viewport: ViewportId, render_target: Option<TextureId>) {
        self.push(RhiCall::BeginDrawingViewport {
            viewport,
            render_target,
        });
    }

    fn end_drawing_viewport(&mut self, viewport: ViewportId, present: bool, lock_to_vsync: bool) {
        self.push(RhiCall::EndDrawingViewport {
            viewport,
            present,
            lock_to_vsync,
        });
    }

    fn push_event(&mut self, name: &str, color: LinearColor) {
        self.push(RhiCall::PushEvent {
            name: name.to_string(),
            color,
        });
    }

    fn pop_event(&mut self) {
        self.push(RhiCall::PopEvent);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
