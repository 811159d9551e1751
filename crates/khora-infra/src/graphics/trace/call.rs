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

//! One recorded hardware call, with its payload copied out.

use khora_core::rhi::*;

/// A call received by a [`TraceCommandContext`](super::TraceCommandContext).
///
/// Byte and slice arguments are copied, and fences are identified by name.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum RhiCall {
    SetRasterizerState(RasterizerStateId),
    SetDepthStencilState {
        state: DepthStencilStateId,
        stencil_ref: u32,
    },
    SetBlendState {
        state: BlendStateId,
        blend_factor: LinearColor,
    },
    SetBoundShaderState(BoundShaderStateId),
    SetComputeShader(ComputeShaderId),
    SetViewport(Viewport),
    SetScissorRect {
        enable: bool,
        rect: IntRect,
    },
    SetRenderTargets(RenderTargetsInfo),
    SetShaderTexture {
        stage: ShaderStage,
        index: u32,
        texture: TextureId,
    },
    SetShaderSampler {
        stage: ShaderStage,
        index: u32,
        sampler: SamplerStateId,
    },
    SetShaderUniformBuffer {
        stage: ShaderStage,
        index: u32,
        buffer: UniformBufferId,
    },
    SetShaderResourceView {
        stage: ShaderStage,
        index: u32,
        srv: ShaderResourceViewId,
    },
    SetUav {
        index: u32,
        uav: UnorderedAccessViewId,
    },
    SetShaderParameter {
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        data: Vec<u8>,
    },
    SetStreamSource {
        stream_index: u32,
        buffer: VertexBufferId,
        stride: u32,
        offset: u32,
    },
    DrawPrimitive {
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    },
    DrawIndexedPrimitive {
        index_buffer: IndexBufferId,
        primitive: PrimitiveType,
        base_vertex_index: i32,
        first_instance: u32,
        num_vertices: u32,
        start_index: u32,
        num_primitives: u32,
        num_instances: u32,
    },
    DrawPrimitiveIndirect {
        primitive: PrimitiveType,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    },
    DrawIndexedPrimitiveIndirect {
        primitive: PrimitiveType,
        index_buffer: IndexBufferId,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    },
    DrawPrimitiveUp {
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: Vec<u8>,
        vertex_stride: u32,
    },
    DrawIndexedPrimitiveUp {
        primitive: PrimitiveType,
        min_vertex_index: u32,
        num_vertices: u32,
        num_primitives: u32,
        index_data: Vec<u8>,
        index_stride: u32,
        vertex_data: Vec<u8>,
        vertex_stride: u32,
    },
    DispatchComputeShader {
        group_x: u32,
        group_y: u32,
        group_z: u32,
    },
    DispatchIndirectComputeShader {
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    },
    Clear(ClearParams),
    ClearMrt {
        colors: Vec<LinearColor>,
        depth: Option<f32>,
        stencil: Option<u32>,
        exclude_rect: IntRect,
    },
    ClearUav {
        uav: UnorderedAccessViewId,
        values: [u32; 4],
    },
    CopyToResolveTarget {
        source: TextureId,
        dest: TextureId,
        keep_original_surface: bool,
        params: ResolveParams,
    },
    UpdateVertexBuffer {
        buffer: VertexBufferId,
        offset: u32,
        data: Vec<u8>,
    },
    TransitionTextures {
        access: TransitionAccess,
        textures: Vec<TextureId>,
    },
    TransitionUavs {
        access: TransitionAccess,
        pipeline: TransitionPipeline,
        uavs: Vec<UnorderedAccessViewId>,
        write_fence: Option<String>,
    },
    WaitComputeFence(String),
    BeginRenderQuery(RenderQueryId),
    EndRenderQuery(RenderQueryId),
    BeginOcclusionQueryBatch,
    EndOcclusionQueryBatch,
    SubmitCommandsHint,
    BeginScene,
    EndScene,
    BeginFrame,
    EndFrame,
    BeginDrawingViewport {
        viewport: ViewportId,
        render_target: Option<TextureId>,
    },
    EndDrawingViewport {
        viewport: ViewportId,
        present: bool,
        lock_to_vsync: bool,
    },
    PushEvent {
        name: String,
        color: LinearColor,
    },
    PopEvent,
}

impl RhiCall {
    /// Returns `true` for every draw entry point.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RhiCall::DrawPrimitive { .. }
                | RhiCall::DrawIndexedPrimitive { .. }
                | RhiCall::DrawPrimitiveIndirect { .. }
                | RhiCall::DrawIndexedPrimitiveIndirect { .. }
                | RhiCall::DrawPrimitiveUp { .. }
                | RhiCall::DrawIndexedPrimitiveUp { .. }
        )
    }

    /// Returns `true` for pipeline state setters.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            RhiCall::SetRasterizerState(_)
                | RhiCall::SetDepthStencilState { .. }
                | RhiCall::SetBlendState { .. }
                | RhiCall::SetBoundShaderState(_)
                | RhiCall::SetComputeShader(_)
        )
    }
}
