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

//! Lists recorded for the async compute queue.

use khora_core::rhi::{
    ComputeFence, ComputeShaderId, LinearColor, QueueKind, SamplerStateId, ShaderResourceViewId,
    ShaderStage, TextureId, TransitionAccess, TransitionPipeline, UniformBufferId,
    UnorderedAccessViewId, VertexBufferId,
};

use super::CommandList;

/// A command list restricted to the operations the async compute queue
/// supports. Shader bindings always target the compute stage.
#[derive(Debug)]
pub struct AsyncComputeCommandList {
    list: CommandList,
}

impl AsyncComputeCommandList {
    pub(crate) fn new(list: CommandList) -> Self {
        debug_assert_eq!(list.queue(), QueueKind::AsyncCompute);
        Self { list }
    }

    pub(crate) fn into_inner(self) -> CommandList {
        self.list
    }

    /// The identifier of the underlying list.
    pub fn uid(&self) -> u32 {
        self.list.uid()
    }

    /// Whether commands run at record time instead of being deferred.
    pub fn is_bypass(&self) -> bool {
        self.list.is_bypass()
    }

    /// Commands recorded since the last reset.
    pub fn num_commands(&self) -> usize {
        self.list.num_commands()
    }

    /// Discards everything recorded. See [`CommandList::reset`].
    pub fn reset(&mut self) {
        self.list.reset();
    }

    /// Binds the compute shader for the following dispatches.
    pub fn set_compute_shader(&mut self, shader: ComputeShaderId) {
        self.list.set_compute_shader(shader);
    }

    /// Binds a texture to a compute slot.
    pub fn set_shader_texture(&mut self, index: u32, texture: TextureId) {
        self.list
            .set_shader_texture(ShaderStage::Compute, index, texture);
    }

    /// Binds a sampler to a compute slot.
    pub fn set_shader_sampler(&mut self, index: u32, sampler: SamplerStateId) {
        self.list
            .set_shader_sampler(ShaderStage::Compute, index, sampler);
    }

    /// Binds a uniform buffer to a compute slot.
    pub fn set_shader_uniform_buffer(&mut self, index: u32, buffer: UniformBufferId) {
        self.list
            .set_shader_uniform_buffer(ShaderStage::Compute, index, buffer);
    }

    /// Binds a shader resource view to a compute slot.
    pub fn set_shader_resource_view(&mut self, index: u32, srv: ShaderResourceViewId) {
        self.list
            .set_shader_resource_view(ShaderStage::Compute, index, srv);
    }

    /// Sets loose compute constants. `data` is copied into the list.
    pub fn set_shader_parameter(&mut self, buffer_index: u32, base_index: u32, data: &[u8]) {
        self.list
            .set_shader_parameter(ShaderStage::Compute, buffer_index, base_index, data);
    }

    /// Binds an unordered access view.
    pub fn set_uav(&mut self, index: u32, uav: UnorderedAccessViewId) {
        self.list.set_uav(index, uav);
    }

    /// See [`CommandList::dispatch_compute_shader`].
    pub fn dispatch_compute_shader(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        self.list.dispatch_compute_shader(group_x, group_y, group_z);
    }

    /// Dispatches with a group count read from `argument_buffer`.
    pub fn dispatch_indirect_compute_shader(
        &mut self,
        argument_buffer: VertexBufferId,
        argument_offset: u32,
    ) {
        self.list
            .dispatch_indirect_compute_shader(argument_buffer, argument_offset);
    }

    /// Fills an unordered access view with `values`.
    pub fn clear_uav(&mut self, uav: UnorderedAccessViewId, values: [u32; 4]) {
        self.list.clear_uav(uav, values);
    }

    /// See [`CommandList::transition_uavs`]. `pipeline` must start on the
    /// compute queue.
    pub fn transition_uavs(
        &mut self,
        access: TransitionAccess,
        pipeline: TransitionPipeline,
        uavs: &[UnorderedAccessViewId],
        write_fence: Option<&ComputeFence>,
    ) {
        self.list
            .transition_uavs(access, pipeline, uavs, write_fence);
    }

    /// See [`CommandList::wait_compute_fence`].
    pub fn wait_compute_fence(&mut self, fence: &ComputeFence) {
        self.list.wait_compute_fence(fence);
    }

    /// Opens a named debug event.
    pub fn push_event(&mut self, name: &str, color: LinearColor) {
        self.list.push_event(name, color);
    }

    /// Closes the innermost debug event.
    pub fn pop_event(&mut self) {
        self.list.pop_event();
    }

    /// Hints the backend to submit the work recorded so far.
    pub fn submit_commands_hint(&mut self) {
        self.list.submit_commands_hint();
    }
}
