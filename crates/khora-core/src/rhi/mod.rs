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

//! Contracts of the deferred GPU command system.
//!
//! This module defines the vocabulary shared by command producers, the command
//! system in `khora-rhi`, and hardware back-ends in `khora-infra`: opaque
//! object handles, the value types recorded into commands, the
//! [`RhiCommandContext`] and [`RhiDevice`] traits a back-end implements, the
//! cross-queue [`ComputeFence`], and the system's settings and errors.

pub mod error;
pub mod fence;
pub mod handles;
pub mod settings;
pub mod stats;
pub mod traits;
pub mod types;

pub use self::error::{FenceWaitError, RhiError, SettingsError};
pub use self::fence::{ComputeFence, FenceId};
pub use self::handles::*;
pub use self::settings::RhiSettings;
pub use self::stats::ExecutorStats;
pub use self::traits::{RhiCommandContext, RhiDevice};
pub use self::types::*;
