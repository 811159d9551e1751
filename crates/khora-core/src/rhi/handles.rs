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

//! Opaque handles to device objects referenced by recorded commands.
//!
//! Handles are plain copyable identifiers handed out by an [`RhiDevice`]
//! implementation. The command system never owns the objects behind them: a
//! caller must keep an object alive until every list referencing it retires.
//!
//! The raw value `0` is reserved as the null handle.
//!
//! [`RhiDevice`]: crate::rhi::RhiDevice

macro_rules! rhi_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
            pub struct $name(pub u64);

            impl $name {
                /// The reserved null handle.
                pub const NULL: Self = Self(0);

                /// Returns `true` if this is the reserved null handle.
                #[inline]
                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

rhi_handle! {
    /// A compiled rasterizer state object.
    RasterizerStateId,
    /// A compiled depth-stencil state object.
    DepthStencilStateId,
    /// A compiled blend state object.
    BlendStateId,
    /// A sampler state object.
    SamplerStateId,
    /// A combination of vertex declaration and graphics shader stages.
    BoundShaderStateId,
    /// A vertex declaration describing the input layout.
    VertexDeclarationId,
    /// A vertex shader.
    VertexShaderId,
    /// A hull shader.
    HullShaderId,
    /// A domain shader.
    DomainShaderId,
    /// A pixel shader.
    PixelShaderId,
    /// A geometry shader.
    GeometryShaderId,
    /// A compute shader.
    ComputeShaderId,
    /// A texture of any dimension.
    TextureId,
    /// A vertex buffer. Also used as the argument buffer of indirect calls.
    VertexBufferId,
    /// An index buffer.
    IndexBufferId,
    /// A uniform (constant) buffer.
    UniformBufferId,
    /// A shader resource view.
    ShaderResourceViewId,
    /// An unordered access view.
    UnorderedAccessViewId,
    /// A render query (occlusion or timestamp).
    RenderQueryId,
    /// A presentable drawing viewport (swap chain).
    ViewportId,
}
