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

//! User-pointer draws: the caller writes vertex (and index) data straight
//! into list-owned memory between a `begin` and its matching `end`.

use khora_core::rhi::PrimitiveType;

use super::CommandList;
use crate::arena::ArenaBytes;
use crate::command::commands::{DrawIndexedPrimitiveUp, DrawPrimitiveUp};

/// A user-pointer draw opened by a `begin_draw_*_up` call.
#[derive(Debug)]
pub(crate) enum DrawUpWorkArea {
    Primitive {
        primitive: PrimitiveType,
        num_primitives: u32,
        vertex_data: ArenaBytes,
        vertex_stride: u32,
    },
    Indexed {
        primitive: PrimitiveType,
        num_primitives: u32,
        num_vertices: u32,
        vertex_data: ArenaBytes,
        vertex_stride: u32,
        index_data: ArenaBytes,
        index_stride: u32,
    },
}

impl CommandList {
    /// Opens a user-pointer draw and returns a zeroed buffer of
    /// `num_vertices * vertex_stride` bytes to fill with vertex data.
    /// A draw of zero primitives is a caller error and is not recorded.
    ///
    /// # Panics
    ///
    /// Panics if another user-pointer draw is still open.
    pub fn begin_draw_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        num_vertices: u32,
        vertex_stride: u32,
    ) -> &mut [u8] {
        self.assert_no_draw_up("begin_draw_primitive_up");
        self.check_draw_counts("begin_draw_primitive_up", num_primitives, 1);
        let mut vertex_data = self
            .arena
            .alloc_zeroed_bytes(num_vertices as usize * vertex_stride as usize);
        self.draw_up = Some(DrawUpWorkArea::Primitive {
            primitive,
            num_primitives,
            vertex_data,
            vertex_stride,
        });
        // SAFETY: the buffer lives in this list's arena, which is not reset
        // while the draw is open, and the borrow is tied to `self`.
        unsafe { vertex_data.as_mut_slice() }
    }

    /// Closes the draw opened by [`begin_draw_primitive_up`](Self::begin_draw_primitive_up)
    /// and records it.
    ///
    /// # Panics
    ///
    /// Panics if no non-indexed user-pointer draw is open.
    pub fn end_draw_primitive_up(&mut self) {
        match self.draw_up.take() {
            Some(DrawUpWorkArea::Primitive {
                primitive,
                num_primitives,
                vertex_data,
                vertex_stride,
            }) => {
                if num_primitives > 0 {
                    self.record(DrawPrimitiveUp {
                        primitive,
                        num_primitives,
                        vertex_data,
                        vertex_stride,
                    });
                }
            }
            other => panic!(
                "end_draw_primitive_up without a matching begin_draw_primitive_up on command list {} (open: {:?})",
                self.uid, other
            ),
        }
    }

    /// Opens an indexed user-pointer draw and returns zeroed vertex and index
    /// buffers to fill. A draw of zero primitives is a caller error and is
    /// not recorded.
    ///
    /// # Panics
    ///
    /// Panics if another user-pointer draw is still open.
    pub fn begin_draw_indexed_primitive_up(
        &mut self,
        primitive: PrimitiveType,
        num_primitives: u32,
        num_vertices: u32,
        vertex_stride: u32,
        index_stride: u32,
    ) -> (&mut [u8], &mut [u8]) {
        self.assert_no_draw_up("begin_draw_indexed_primitive_up");
        self.check_draw_counts("begin_draw_indexed_primitive_up", num_primitives, 1);
        let num_indices = primitive.vertex_count(num_primitives) as usize;
        let mut vertex_data = self
            .arena
            .alloc_zeroed_bytes(num_vertices as usize * vertex_stride as usize);
        let mut index_data = self
            .arena
            .alloc_zeroed_bytes(num_indices * index_stride as usize);
        self.draw_up = Some(DrawUpWorkArea::Indexed {
            primitive,
            num_primitives,
            num_vertices,
            vertex_data,
            vertex_stride,
            index_data,
            index_stride,
        });
        // SAFETY: as for `begin_draw_primitive_up`; the two buffers are
        // distinct allocations.
        unsafe { (vertex_data.as_mut_slice(), index_data.as_mut_slice()) }
    }

    /// Closes the draw opened by
    /// [`begin_draw_indexed_primitive_up`](Self::begin_draw_indexed_primitive_up)
    /// and records it.
    ///
    /// # Panics
    ///
    /// Panics if no indexed user-pointer draw is open.
    pub fn end_draw_indexed_primitive_up(&mut self) {
        match self.draw_up.take() {
            Some(DrawUpWorkArea::Indexed {
                primitive,
                num_primitives,
                num_vertices,
                vertex_data,
                vertex_stride,
                index_data,
                index_stride,
            }) => {
                if num_primitives > 0 {
                    self.record(DrawIndexedPrimitiveUp {
                        primitive,
                        min_vertex_index: 0,
                        num_vertices,
                        num_primitives,
                        index_data,
                        index_stride,
                        vertex_data,
                        vertex_stride,
                    });
                }
            }
            other => panic!(
                "end_draw_indexed_primitive_up without a matching begin_draw_indexed_primitive_up on command list {} (open: {:?})",
                self.uid, other
            ),
        }
    }

    /// Returns `true` while a user-pointer draw is open.
    pub fn is_draw_up_pending(&self) -> bool {
        self.draw_up.is_some()
    }

    fn assert_no_draw_up(&self, call: &str) {
        assert!(
            self.draw_up.is_none(),
            "{} on command list {} while another user-pointer draw is open",
            call,
            self.uid
        );
    }
}
