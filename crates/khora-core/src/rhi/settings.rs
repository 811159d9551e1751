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

//! Runtime configuration of the command recording and execution system.

use serde::{Deserialize, Serialize};

use super::error::SettingsError;

/// Configuration read by the executor at startup and at bypass control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhiSettings {
    /// Requested bypass mode. Takes effect at the next latch point.
    pub bypass: bool,
    /// Executes graphics lists on a dedicated thread instead of the submitting one.
    pub use_execution_thread: bool,
    /// Executes async compute lists on their own dedicated thread.
    pub use_async_compute_thread: bool,
    /// The maximum number of worker tasks used by a parallel translate.
    pub parallel_translate_width: usize,
    /// Below this many hinted draws a parallel batch is translated inline.
    pub min_draws_per_parallel_translate: u32,
    /// Suppresses identical consecutive pipeline states.
    pub enable_state_cache: bool,
    /// Size in bytes of each block a command arena grows by.
    pub arena_block_size: usize,
    /// Number of slots of the fence ring.
    pub fence_ring_capacity: usize,
    /// Frames the GPU may lag behind before fence slots are assumed retired.
    pub max_frames_in_flight: u32,
    /// Bound applied to fence waits during execution. `None` waits forever.
    pub fence_wait_timeout_ms: Option<u64>,
}

impl Default for RhiSettings {
    fn default() -> Self {
        Self {
            bypass: false,
            use_execution_thread: true,
            use_async_compute_thread: true,
            parallel_translate_width: 4,
            min_draws_per_parallel_translate: 64,
            enable_state_cache: true,
            arena_block_size: 64 * 1024,
            fence_ring_capacity: 64,
            max_frames_in_flight: 2,
            fence_wait_timeout_ms: None,
        }
    }
}

impl RhiSettings {
    /// Parses settings from a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every field is within its accepted range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.parallel_translate_width == 0 {
            return Err(SettingsError::Invalid {
                field: "parallel_translate_width",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.arena_block_size < 256 {
            return Err(SettingsError::Invalid {
                field: "arena_block_size",
                reason: format!("{} is below the 256 byte minimum", self.arena_block_size),
            });
        }
        if self.fence_ring_capacity == 0 || self.fence_ring_capacity > u32::MAX as usize {
            return Err(SettingsError::Invalid {
                field: "fence_ring_capacity",
                reason: format!("{} is out of range", self.fence_ring_capacity),
            });
        }
        if self.max_frames_in_flight == 0 {
            return Err(SettingsError::Invalid {
                field: "max_frames_in_flight",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Settings for fully inline, single-threaded execution.
    pub fn inline() -> Self {
        Self {
            use_execution_thread: false,
            use_async_compute_thread: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(RhiSettings::default().validate().is_ok());
        assert!(RhiSettings::inline().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = RhiSettings::from_json_str(r#"{ "bypass": true, "fence_wait_timeout_ms": 500 }"#)
            .expect("Valid settings should parse");
        assert!(settings.bypass);
        assert_eq!(settings.fence_wait_timeout_ms, Some(500));
        assert_eq!(
            settings.parallel_translate_width,
            RhiSettings::default().parallel_translate_width
        );
    }

    #[test]
    fn test_invalid_width_is_rejected() {
        let err = RhiSettings::from_json_str(r#"{ "parallel_translate_width": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                field: "parallel_translate_width",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = RhiSettings::from_json_str("{ bypass: ").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
