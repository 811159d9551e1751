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

//! The recording API shared by graphics and immediate lists.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use khora_core::rhi::*;

use super::CommandList;
use crate::command::commands::*;
use crate::token::{
    DeferredCell, LocalBoundShaderState, LocalUniformBuffer, TokenHeader, TokenRepr,
    UniformBufferArgs, WorkArea, WorkAreaRef,
};

impl CommandList {
    // --- Pipeline state ---

    /// Sets the rasterizer state. Skipped if it matches the last one recorded.
    pub fn set_rasterizer_state(&mut self, state: RasterizerStateId) {
        debug_assert!(!state.is_null(), "set_rasterizer_state with a null state");
        if self.state_cache.update_rasterizer(state) {
            self.record(SetRasterizerState { state });
        }
    }

    /// Sets the depth-stencil state. Skipped if both the state and the
    /// reference value match the last ones recorded.
    pub fn set_depth_stencil_state(&mut self, state: DepthStencilStateId, stencil_ref: u32) {
        debug_assert!(!state.is_null(), "set_depth_stencil_state with a null state");
        if self.state_cache.update_depth_stencil(state, stencil_ref) {
            self.record(SetDepthStencilState { state, stencil_ref });
        }
    }

    /// Sets the blend state. Skipped if both the state and the blend factor
    /// match the last ones recorded.
    pub fn set_blend_state(&mut self, state: BlendStateId, blend_factor: LinearColor) {
        debug_assert!(!state.is_null(), "set_blend_state with a null state");
        if self.state_cache.update_blend(state, blend_factor) {
            self.record(SetBlendState {
                state,
                blend_factor,
            });
        }
    }

    /// Binds the shaders and vertex layout used by the following draws.
    pub fn set_bound_shader_state(&mut self, state: BoundShaderStateId) {
        debug_assert!(!state.is_null(), "set_bound_shader_state with a null state");
        self.record(SetBoundShaderState { state });
    }

    /// Binds the compute shader used by the following dispatches.
    pub fn set_compute_shader(&mut self, shader: ComputeShaderId) {
        debug_assert!(!shader.is_null(), "set_compute_shader with a null shader");
        self.record(SetComputeShader { shader });
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.record(SetViewport { viewport });
    }

    /// Enables or disables the scissor test and sets its rectangle.
    pub fn set_scissor_rect(&mut self, enable: bool, rect: IntRect) {
        self.record(SetScissorRect { enable, rect });
    }

    /// Binds color and depth targets for the following draws and clears.
    pub fn set_render_targets(&mut self, targets: RenderTargetsInfo) {
        self.record(SetRenderTargets { targets });
    }

    // --- Shader bindings ---

    /// Binds a texture to a slot of `stage`.
    pub fn set_shader_texture(&mut self, stage: ShaderStage, index: u32, texture: TextureId) {
        self.record(SetShaderTexture {
            stage,
            index,
            texture,
        });
    }

    /// Binds a sampler to a slot of `stage`.
    pub fn set_shader_sampler(&mut self, stage: ShaderStage, index: u32, sampler: SamplerStateId) {
        self.record(SetShaderSampler {
            stage,
            index,
            sampler,
        });
    }

    /// Binds a uniform buffer to a slot of `stage`.
    pub fn set_shader_uniform_buffer(
        &mut self,
        stage: ShaderStage,
        index: u32,
        buffer: UniformBufferId,
    ) {
        self.record(SetShaderUniformBuffer {
            stage,
            index,
            buffer,
        });
    }

    /// Binds a shader resource view to a slot of `stage`.
    pub fn set_shader_resource_view(
        &mut self,
        stage: ShaderStage,
        index: u32,
        srv: ShaderResourceViewId,
    ) {
        self.record(SetShaderResourceView { stage, index, srv });
    }

    /// Binds an unordered access view for compute work.
    pub fn set_uav(&mut self, index: u32, uav: UnorderedAccessViewId) {
        self.record(SetUav { index, uav });
    }

    /// Sets loose shader constants. `data` is copied into the list.
    pub fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        data: &[u8],
    ) {
        let data = self.arena.alloc_bytes(data);
        self.record(SetShaderParameter {
            stage,
            buffer_index,
            base_index,
            data,
        });
    }

    /// Sets loose shader constants from a plain-old-data value.
    pub fn set_shader_parameter_pod<T: bytemuck::Pod>(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &T,
    ) {
        self.set_shader_parameter(stage, buffer_index, base_index, bytemuck::bytes_of(value));
    }

    /// Binds a vertex buffer to an input stream.
    pub fn set_stream_source(
        &mut self,
        stream_index: u32,
        buffer: VertexBufferId,
        stride: u32,
        offset: u32,
    ) {
        self.record(SetStreamSource {
            stream_index,
            buffer,
            stride,
            offset,
        });
    }

    // --- Draws and dispatches ---

    /// Draws non-indexed primitives from the bound streams.
    ///
    /// A draw of zero primitives or zero instances is a caller error.
    pub fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        if !self.check_draw_counts("draw_primitive", num_primitives, num_instances) {
            return;
        }
        self.record(DrawPrimitive {
            primitive,
            base_vertex_index,
            num_primitives,
            num_instances,
        });
    }

    /// Draws indexed primitives.
    ///
    /// A draw of zero primitives or zero instances is a caller error.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_primitive(
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
        if !self.check_draw_counts("draw_indexed_primitive", num_primitives, num_instances) {
            return;
        }
        self.record(DrawIndexedPrimitive {
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

    /// Draws with arguments read from `argument_buffer` at execution.
    pub fn draw_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    ) {
        self.record(DrawPrimitiveIndirect {
            primitive,
            argument_buffer,
            argument_offset,
        });
    }

    /// Indexed variant of [`draw_primitive_indirect`](Self::draw_primitive_indirect).
    pub fn draw_indexed_primitive_indirect(
        &mut self,
        primitive: PrimitiveType,
        index_buffer: IndexBufferId,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    ) {
        self.record(DrawIndexedPrimitiveIndirect {
            primitive,
            index_buffer,
            argument_buffer,
            argument_offset,
        });
    }

    /// Dispatches the bound compute shader. An empty group count is a caller error.
    pub fn dispatch_compute_shader(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        let valid = group_x > 0 && group_y > 0 && group_z > 0;
        debug_assert!(valid, "dispatch_compute_shader with an empty group count");
        if !valid {
            log::warn!(
                "Skipping dispatch of {}x{}x{} groups on command list {}.",
                group_x,
                group_y,
                group_z,
                self.uid
            );
            return;
        }
        self.record(DispatchComputeShader {
            group_x,
            group_y,
            group_z,
        });
    }

    /// Dispatches with a group count read from `argument_buffer`.
    pub fn dispatch_indirect_compute_shader(
        &mut self,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    ) {
        self.record(DispatchIndirectComputeShader {
            argument_buffer,
            argument_offset,
        });
    }

    pub(super) fn check_draw_counts(
        &self,
        call: &str,
        num_primitives: u32,
        num_instances: u32,
    ) -> bool {
        let valid = num_primitives > 0 && num_instances > 0;
        debug_assert!(
            valid,
            "{call} with {num_primitives} primitives and {num_instances} instances"
        );
        if !valid {
            log::warn!(
                "Skipping {} of {} primitives and {} instances on command list {}.",
                call,
                num_primitives,
                num_instances,
                self.uid
            );
        }
        valid
    }

    // --- Clears and copies ---

    /// Clears the bound render targets. A clear that touches nothing is dropped.
    pub fn clear(&mut self, params: ClearParams) {
        if params.is_noop() {
            log::warn!("Ignoring a clear that touches nothing on command list {}.", self.uid);
            return;
        }
        self.record(Clear { params });
    }

    /// Clears several bound color targets at once. `colors` is copied into the list.
    pub fn clear_mrt(
        &mut self,
        colors: &[LinearColor],
        depth: Option<f32>,
        stencil: Option<u32>,
        exclude_rect: IntRect,
    ) {
        if colors.is_empty() && depth.is_none() && stencil.is_none() {
            log::warn!("Ignoring an empty clear_mrt on command list {}.", self.uid);
            return;
        }
        let colors = self.arena.alloc_slice_copy(colors);
        self.record(ClearMrt {
            colors,
            depth,
            stencil,
            exclude_rect,
        });
    }

    /// Fills an unordered access view with `values`.
    pub fn clear_uav(&mut self, uav: UnorderedAccessViewId, values: [u32; 4]) {
        self.record(ClearUav { uav, values });
    }

    /// Resolves `source` into `dest`.
    pub fn copy_to_resolve_target(
        &mut self,
        source: TextureId,
        dest: TextureId,
        keep_original_surface: bool,
        params: ResolveParams,
    ) {
        self.record(CopyToResolveTarget {
            source,
            dest,
            keep_original_surface,
            params,
        });
    }

    /// Uploads `data` into a vertex buffer when the command executes. The
    /// bytes are copied into the list.
    pub fn update_vertex_buffer(&mut self, buffer: VertexBufferId, offset: u32, data: &[u8]) {
        let data = self.arena.alloc_bytes(data);
        self.record(UpdateVertexBuffer {
            buffer,
            offset,
            data,
        });
    }

    // --- Transitions and fences ---

    /// Transitions `textures` to `access`. The slice is copied into the list.
    pub fn transition_textures(&mut self, access: TransitionAccess, textures: &[TextureId]) {
        if textures.is_empty() {
            log::warn!("Ignoring an empty texture transition on command list {}.", self.uid);
            return;
        }
        let textures = self.arena.alloc_slice_copy(textures);
        self.record(TransitionTextures { access, textures });
    }

    /// Transitions UAVs between pipelines, optionally writing `write_fence`
    /// once the transition has executed.
    ///
    /// The fence is marked as write-enqueued immediately, so lists recorded
    /// afterwards may wait on it.
    ///
    /// # Panics
    ///
    /// Panics if the source pipeline of `pipeline` is not this list's queue.
    pub fn transition_uavs(
        &mut self,
        access: TransitionAccess,
        pipeline: TransitionPipeline,
        uavs: &[UnorderedAccessViewId],
        write_fence: Option<&ComputeFence>,
    ) {
        assert_eq!(
            pipeline.source(),
            self.queue,
            "{:?} transition recorded on a {:?} command list",
            pipeline,
            self.queue
        );
        if let Some(fence) = write_fence {
            fence.write_fence();
        }
        let uavs = self.arena.alloc_slice_copy(uavs);
        self.record(TransitionUavs {
            access,
            pipeline,
            uavs,
            write_fence: write_fence.cloned(),
        });
    }

    /// Makes this queue wait until `fence` is signaled by the other queue.
    ///
    /// # Panics
    ///
    /// Panics if no transition writing `fence` has been recorded yet.
    pub fn wait_compute_fence(&mut self, fence: &ComputeFence) {
        assert!(
            fence.is_write_enqueued(),
            "ComputeFence '{}' waited on before being written. This would hang the GPU.",
            fence.name()
        );
        self.record(WaitComputeFence {
            fence: fence.clone(),
        });
    }

    // --- Queries and hints ---

    /// Starts a render query.
    pub fn begin_render_query(&mut self, query: RenderQueryId) {
        self.record(BeginRenderQuery { query });
    }

    /// Ends a render query started on this list.
    pub fn end_render_query(&mut self, query: RenderQueryId) {
        self.record(EndRenderQuery { query });
    }

    /// Opens a batch of occlusion queries.
    pub fn begin_occlusion_query_batch(&mut self) {
        self.record(BeginOcclusionQueryBatch);
    }

    /// Closes the current occlusion query batch.
    pub fn end_occlusion_query_batch(&mut self) {
        self.record(EndOcclusionQueryBatch);
    }

    /// Hints the backend to submit the work recorded so far to the GPU.
    pub fn submit_commands_hint(&mut self) {
        self.record(SubmitCommandsHint);
    }

    // --- Debug markers ---

    /// Opens a named debug event. The name is copied into the list.
    pub fn push_event(&mut self, name: &str, color: LinearColor) {
        let name = self.arena.alloc_bytes(name.as_bytes());
        self.record(PushEvent { name, color });
    }

    /// Closes the innermost debug event.
    pub fn pop_event(&mut self) {
        self.record(PopEvent);
    }

    // --- Deferred construction ---

    /// Captures the creation arguments of a bound shader state. The state is
    /// created by the first command redeeming the token.
    pub fn build_local_bound_shader_state(
        &mut self,
        desc: BoundShaderStateDesc,
    ) -> LocalBoundShaderState {
        if let Some(target) = &self.bypass {
            target
                .services
                .counters
                .tokens_built
                .fetch_add(1, Ordering::Relaxed);
            let id = self.resources.device.create_bound_shader_state(&desc);
            return LocalBoundShaderState {
                repr: TokenRepr::Built(id),
            };
        }
        let work_area = self.alloc_work_area("LocalBoundShaderState", desc);
        LocalBoundShaderState {
            repr: TokenRepr::Deferred {
                work_area,
                list_uid: self.uid,
            },
        }
    }

    /// Captures the contents of a single-draw uniform buffer. The bytes are
    /// copied into the list and the buffer is created by the first command
    /// redeeming the token.
    pub fn build_local_uniform_buffer(
        &mut self,
        contents: &[u8],
        layout: UniformBufferLayout,
    ) -> LocalUniformBuffer {
        if let Some(target) = &self.bypass {
            target
                .services
                .counters
                .tokens_built
                .fetch_add(1, Ordering::Relaxed);
            let id = self.resources.device.create_uniform_buffer(
                contents,
                &layout,
                UniformBufferUsage::SingleDraw,
            );
            return LocalUniformBuffer {
                repr: TokenRepr::Built(id),
            };
        }
        let contents = self.arena.alloc_bytes(contents);
        let work_area =
            self.alloc_work_area("LocalUniformBuffer", UniformBufferArgs { contents, layout });
        LocalUniformBuffer {
            repr: TokenRepr::Deferred {
                work_area,
                list_uid: self.uid,
            },
        }
    }

    /// Binds a bound shader state built on this list.
    ///
    /// # Panics
    ///
    /// Panics if the token was built on another list or before a reset.
    pub fn set_local_bound_shader_state(&mut self, token: LocalBoundShaderState) {
        match token.repr {
            TokenRepr::Built(state) => self.record(SetBoundShaderState { state }),
            TokenRepr::Deferred {
                work_area,
                list_uid,
            } => {
                self.claim_token("LocalBoundShaderState", list_uid, work_area);
                self.record(SetLocalBoundShaderState {
                    work_area: WorkAreaRef(work_area),
                });
            }
        }
    }

    /// Binds a uniform buffer built on this list.
    ///
    /// # Panics
    ///
    /// Panics if the token was built on another list or before a reset.
    pub fn set_local_shader_uniform_buffer(
        &mut self,
        stage: ShaderStage,
        index: u32,
        token: LocalUniformBuffer,
    ) {
        match token.repr {
            TokenRepr::Built(buffer) => self.record(SetShaderUniformBuffer {
                stage,
                index,
                buffer,
            }),
            TokenRepr::Deferred {
                work_area,
                list_uid,
            } => {
                self.claim_token("LocalUniformBuffer", list_uid, work_area);
                self.record(SetLocalShaderUniformBuffer {
                    stage,
                    index,
                    work_area: WorkAreaRef(work_area),
                });
            }
        }
    }

    fn alloc_work_area<A, T: Copy>(&mut self, kind: &'static str, args: A) -> NonNull<WorkArea<A, T>> {
        let work_area = self.arena.alloc(WorkArea {
            header: TokenHeader {
                next: None,
                list_uid: self.uid,
                use_count: AtomicU32::new(0),
                kind,
            },
            args,
            built: DeferredCell::new(),
        });
        self.link_token(work_area.cast::<TokenHeader>());
        work_area
    }

    /// The number of recorded commands redeeming `token` that have not
    /// executed yet. Tokens built in bypass mode report zero.
    ///
    /// # Panics
    ///
    /// Panics if the token was built on another list or before a reset.
    pub fn local_bound_shader_state_use_count(&self, token: LocalBoundShaderState) -> u32 {
        match token.repr {
            TokenRepr::Built(_) => 0,
            TokenRepr::Deferred {
                work_area,
                list_uid,
            } => self
                .token_header("LocalBoundShaderState", list_uid, work_area)
                .use_count
                .load(Ordering::Acquire),
        }
    }

    /// The number of recorded commands redeeming `token` that have not
    /// executed yet. Tokens built in bypass mode report zero.
    ///
    /// # Panics
    ///
    /// Panics if the token was built on another list or before a reset.
    pub fn local_uniform_buffer_use_count(&self, token: LocalUniformBuffer) -> u32 {
        match token.repr {
            TokenRepr::Built(_) => 0,
            TokenRepr::Deferred {
                work_area,
                list_uid,
            } => self
                .token_header("LocalUniformBuffer", list_uid, work_area)
                .use_count
                .load(Ordering::Acquire),
        }
    }

    fn claim_token<A, T>(&self, kind: &str, token_uid: u32, work_area: NonNull<WorkArea<A, T>>) {
        self.token_header(kind, token_uid, work_area)
            .use_count
            .fetch_add(1, Ordering::AcqRel);
    }

    /// Checks that a token belongs to this list in its current incarnation
    /// before touching its work area.
    fn token_header<A, T>(
        &self,
        kind: &str,
        token_uid: u32,
        work_area: NonNull<WorkArea<A, T>>,
    ) -> &TokenHeader {
        assert_eq!(
            token_uid, self.uid,
            "{} token used on command list {} but built on list {}",
            kind, self.uid, token_uid
        );
        // SAFETY: uids are never reused and change on reset, so a matching
        // token points into this list's live arena.
        unsafe { &(*work_area.as_ptr()).header }
    }
}
