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

//! Suppression of identical consecutive pipeline states.
//!
//! Setting a state the hardware already holds is idempotent, so skipping the
//! repeat only saves command volume. The cache tracks what the *list* last
//! recorded; it must be invalidated whenever something else may have changed
//! the hardware state in between (another list executed on the same context).

use khora_core::rhi::{BlendStateId, DepthStencilStateId, LinearColor, RasterizerStateId};

/// The last rasterizer, depth-stencil and blend states recorded by a list.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateCache {
    enabled: bool,
    rasterizer: Option<RasterizerStateId>,
    depth_stencil: Option<(DepthStencilStateId, u32)>,
    blend: Option<(BlendStateId, LinearColor)>,
}

impl StateCache {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Default::default()
        }
    }

    /// Returns `true` if the state differs from the cached one and must be
    /// recorded. Always `true` when the cache is disabled.
    pub(crate) fn update_rasterizer(&mut self, state: RasterizerStateId) -> bool {
        Self::update(self.enabled, &mut self.rasterizer, state)
    }

    pub(crate) fn update_depth_stencil(&mut self, state: DepthStencilStateId, stencil_ref: u32) -> bool {
        Self::update(self.enabled, &mut self.depth_stencil, (state, stencil_ref))
    }

    pub(crate) fn update_blend(&mut self, state: BlendStateId, blend_factor: LinearColor) -> bool {
        Self::update(self.enabled, &mut self.blend, (state, blend_factor))
    }

    /// Forgets every cached state.
    pub(crate) fn invalidate(&mut self) {
        self.rasterizer = None;
        self.depth_stencil = None;
        self.blend = None;
    }

    fn update<S: PartialEq>(enabled: bool, slot: &mut Option<S>, state: S) -> bool {
        if !enabled {
            return true;
        }
        if slot.as_ref() == Some(&state) {
            return false;
        }
        *slot = Some(state);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_duplicates_are_suppressed() {
        let mut cache = StateCache::new(true);
        let r = RasterizerStateId(1);
        assert!(cache.update_rasterizer(r));
        assert!(!cache.update_rasterizer(r));
    }

    #[test]
    fn test_alternating_states_are_all_recorded() {
        let mut cache = StateCache::new(true);
        let r = RasterizerStateId(1);
        let s = RasterizerStateId(2);
        assert!(cache.update_rasterizer(r));
        assert!(cache.update_rasterizer(s));
        assert!(cache.update_rasterizer(r));
    }

    #[test]
    fn test_depth_stencil_compares_reference_value() {
        let mut cache = StateCache::new(true);
        let ds = DepthStencilStateId(4);
        assert!(cache.update_depth_stencil(ds, 0));
        assert!(!cache.update_depth_stencil(ds, 0));
        assert!(cache.update_depth_stencil(ds, 1));
    }

    #[test]
    fn test_disabled_cache_records_everything() {
        let mut cache = StateCache::new(false);
        let b = BlendStateId(3);
        assert!(cache.update_blend(b, LinearColor::WHITE));
        assert!(cache.update_blend(b, LinearColor::WHITE));
    }

    #[test]
    fn test_invalidate_forgets_states() {
        let mut cache = StateCache::new(true);
        let b = BlendStateId(3);
        assert!(cache.update_blend(b, LinearColor::WHITE));
        cache.invalidate();
        assert!(cache.update_blend(b, LinearColor::WHITE));
    }
}
