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

//! Plain value types captured by recorded commands.
//!
//! Everything here is `Copy` so that a command can store its arguments inline
//! in the owning list's arena without running destructors.

use serde::{Deserialize, Serialize};

use super::handles::*;

/// The maximum number of color targets bound at once.
pub const MAX_SIMULTANEOUS_RENDER_TARGETS: usize = 8;

/// Identifies one of the two independent hardware queues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    /// The primary graphics queue.
    Graphics,
    /// The asynchronous compute queue.
    AsyncCompute,
}

/// The topology used to interpret a vertex stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Independent triangles, three vertices each.
    TriangleList,
    /// A strip of triangles sharing edges.
    TriangleStrip,
    /// Independent lines, two vertices each.
    LineList,
    /// Independent quads, four vertices each.
    QuadList,
    /// Independent points.
    PointList,
}

impl PrimitiveType {
    /// Returns the number of vertices needed to draw `num_primitives` primitives.
    pub const fn vertex_count(self, num_primitives: u32) -> u32 {
        match self {
            PrimitiveType::TriangleList => num_primitives * 3,
            PrimitiveType::TriangleStrip => num_primitives + 2,
            PrimitiveType::LineList => num_primitives * 2,
            PrimitiveType::QuadList => num_primitives * 4,
            PrimitiveType::PointList => num_primitives,
        }
    }
}

/// A programmable pipeline stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage.
    Vertex,
    /// Hull (tessellation control) shader stage.
    Hull,
    /// Domain (tessellation evaluation) shader stage.
    Domain,
    /// Pixel (fragment) shader stage.
    Pixel,
    /// Geometry shader stage.
    Geometry,
    /// Compute shader stage.
    Compute,
}

/// A linear-space RGBA color.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LinearColor {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl LinearColor {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new color from its components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// An integer rectangle in pixels. `max` is exclusive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct IntRect {
    /// Left edge.
    pub min_x: i32,
    /// Top edge.
    pub min_y: i32,
    /// Right edge (exclusive).
    pub max_x: i32,
    /// Bottom edge (exclusive).
    pub max_y: i32,
}

impl IntRect {
    /// Creates a rectangle from its edges.
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns `true` if the rectangle covers no pixel.
    pub const fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }
}

/// The viewport transform applied after clipping.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub min_x: u32,
    /// Top edge in pixels.
    pub min_y: u32,
    /// Near depth.
    pub min_z: f32,
    /// Right edge in pixels.
    pub max_x: u32,
    /// Bottom edge in pixels.
    pub max_y: u32,
    /// Far depth.
    pub max_z: f32,
}

/// A color target binding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetView {
    /// The texture written to.
    pub texture: TextureId,
    /// The mip level written to.
    pub mip_index: u32,
    /// The array slice written to, or `u32::MAX` for all slices.
    pub array_slice_index: u32,
}

impl RenderTargetView {
    /// Binds mip 0 of every slice of `texture`.
    pub const fn new(texture: TextureId) -> Self {
        Self {
            texture,
            mip_index: 0,
            array_slice_index: u32::MAX,
        }
    }
}

/// A depth-stencil target binding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DepthRenderTargetView {
    /// The depth-stencil texture.
    pub texture: TextureId,
    /// Whether depth writes are allowed.
    pub depth_write: bool,
    /// Whether stencil writes are allowed.
    pub stencil_write: bool,
}

/// The full set of output targets for subsequent draws.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetsInfo {
    /// Color targets; only the first `num_color_targets` entries are meaningful.
    pub color_targets: [Option<RenderTargetView>; MAX_SIMULTANEOUS_RENDER_TARGETS],
    /// Number of bound color targets.
    pub num_color_targets: u32,
    /// Optional depth-stencil target.
    pub depth_target: Option<DepthRenderTargetView>,
}

impl RenderTargetsInfo {
    /// Builds a target set from a slice of color targets and an optional depth target.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_SIMULTANEOUS_RENDER_TARGETS`] color targets are given.
    pub fn new(colors: &[RenderTargetView], depth: Option<DepthRenderTargetView>) -> Self {
        assert!(
            colors.len() <= MAX_SIMULTANEOUS_RENDER_TARGETS,
            "{} color targets exceed the limit of {}",
            colors.len(),
            MAX_SIMULTANEOUS_RENDER_TARGETS
        );
        let mut info = Self {
            num_color_targets: colors.len() as u32,
            depth_target: depth,
            ..Default::default()
        };
        for (slot, view) in info.color_targets.iter_mut().zip(colors) {
            *slot = Some(*view);
        }
        info
    }
}

/// Which aspects of the bound targets a clear touches.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ClearParams {
    /// Color to clear every bound color target to, if any.
    pub color: Option<LinearColor>,
    /// Depth value to clear to, if any.
    pub depth: Option<f32>,
    /// Stencil value to clear to, if any.
    pub stencil: Option<u32>,
    /// A rectangle left untouched by the clear.
    pub exclude_rect: IntRect,
}

impl ClearParams {
    /// Returns `true` if the clear would not touch anything.
    pub fn is_noop(&self) -> bool {
        self.color.is_none() && self.depth.is_none() && self.stencil.is_none()
    }
}

/// Parameters of a multisample resolve or copy between textures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResolveParams {
    /// Source region, or the whole surface.
    pub source_rect: Option<IntRect>,
    /// Destination region, or the whole surface.
    pub dest_rect: Option<IntRect>,
    /// Mip level to resolve.
    pub mip_index: u32,
    /// Array slice to resolve.
    pub array_slice: u32,
}

/// The access a resource is transitioned to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransitionAccess {
    /// Readable by shaders.
    Readable,
    /// Writable by shaders or as a target.
    Writable,
    /// Read/write with a barrier between accesses.
    RwBarrier,
    /// Read/write without a barrier.
    RwNoBarrier,
    /// Read/write barrier on individual sub-resources.
    RwSubResBarrier,
    /// Metadata (compression, fast clear) only.
    MetaData,
}

/// The queues on both sides of a resource transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransitionPipeline {
    /// Written on graphics, read on graphics.
    GfxToGfx,
    /// Written on graphics, read on async compute.
    GfxToCompute,
    /// Written on async compute, read on graphics.
    ComputeToGfx,
    /// Written on async compute, read on async compute.
    ComputeToCompute,
}

impl TransitionPipeline {
    /// The queue issuing the transition.
    pub const fn source(self) -> QueueKind {
        match self {
            TransitionPipeline::GfxToGfx | TransitionPipeline::GfxToCompute => QueueKind::Graphics,
            TransitionPipeline::ComputeToGfx | TransitionPipeline::ComputeToCompute => {
                QueueKind::AsyncCompute
            }
        }
    }

    /// The queue that must observe the transition.
    pub const fn destination(self) -> QueueKind {
        match self {
            TransitionPipeline::GfxToGfx | TransitionPipeline::ComputeToGfx => QueueKind::Graphics,
            TransitionPipeline::GfxToCompute | TransitionPipeline::ComputeToCompute => {
                QueueKind::AsyncCompute
            }
        }
    }

    /// Returns `true` if the transition crosses queues.
    pub const fn is_cross_queue(self) -> bool {
        !matches!(
            (self.source(), self.destination()),
            (QueueKind::Graphics, QueueKind::Graphics)
                | (QueueKind::AsyncCompute, QueueKind::AsyncCompute)
        )
    }
}

/// Describes the shader stages combined into a bound shader state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct BoundShaderStateDesc {
    /// The vertex input layout.
    pub vertex_declaration: VertexDeclarationId,
    /// The vertex shader. Required.
    pub vertex_shader: VertexShaderId,
    /// Optional hull shader.
    pub hull_shader: Option<HullShaderId>,
    /// Optional domain shader.
    pub domain_shader: Option<DomainShaderId>,
    /// Optional pixel shader.
    pub pixel_shader: Option<PixelShaderId>,
    /// Optional geometry shader.
    pub geometry_shader: Option<GeometryShaderId>,
}

/// How long a uniform buffer is expected to live.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformBufferUsage {
    /// Used by a single draw call.
    SingleDraw,
    /// Used within a single frame.
    SingleFrame,
    /// Persists across frames.
    MultiFrame,
}

/// The shape of a uniform buffer's contents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformBufferLayout {
    /// A label for debugging tools.
    pub name: &'static str,
    /// The size in bytes of the constant data.
    pub constant_buffer_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_per_topology() {
        assert_eq!(PrimitiveType::TriangleList.vertex_count(10), 30);
        assert_eq!(PrimitiveType::TriangleStrip.vertex_count(10), 12);
        assert_eq!(PrimitiveType::LineList.vertex_count(4), 8);
        assert_eq!(PrimitiveType::QuadList.vertex_count(2), 8);
        assert_eq!(PrimitiveType::PointList.vertex_count(7), 7);
    }

    #[test]
    fn test_transition_pipeline_queues() {
        assert!(TransitionPipeline::GfxToCompute.is_cross_queue());
        assert!(TransitionPipeline::ComputeToGfx.is_cross_queue());
        assert!(!TransitionPipeline::GfxToGfx.is_cross_queue());
        assert_eq!(
            TransitionPipeline::ComputeToGfx.source(),
            QueueKind::AsyncCompute
        );
        assert_eq!(
            TransitionPipeline::ComputeToGfx.destination(),
            QueueKind::Graphics
        );
    }

    #[test]
    fn test_render_targets_info_from_slice() {
        let a = RenderTargetView::new(TextureId(1));
        let b = RenderTargetView::new(TextureId(2));
        let info = RenderTargetsInfo::new(&[a, b], None);
        assert_eq!(info.num_color_targets, 2);
        assert_eq!(info.color_targets[1], Some(b));
        assert_eq!(info.color_targets[2], None);
    }

    #[test]
    fn test_clear_params_noop() {
        assert!(ClearParams::default().is_noop());
        let clear = ClearParams {
            depth: Some(1.0),
            ..Default::default()
        };
        assert!(!clear.is_noop());
    }
}
