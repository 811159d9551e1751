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

//! # Khora RHI
//!
//! Deferred recording and execution of GPU commands.
//!
//! Any thread records work into a [`CommandList`]: each call becomes a small
//! command object placed in the list's arena. Lists are submitted through
//! the [`RhiExecutor`], which executes them in recording order on the
//! graphics or async compute queue, optionally translating batches in
//! parallel into several hardware contexts. Device objects can be built
//! lazily through tokens ([`LocalBoundShaderState`], [`LocalUniformBuffer`]),
//! and [`ComputeFence`](khora_core::rhi::ComputeFence)s order work across queues.
//!
//! In bypass mode, commands skip recording and are applied to the hardware
//! context as they are issued.

pub mod arena;
mod command;
mod executor;
pub mod fence_ring;
mod list;
pub mod registry;
mod state_cache;
pub mod token;

pub use executor::{FlushMode, RhiExecutor};
pub use list::{AsyncComputeCommandList, CommandList, ImmediateCommandList, ListState};
pub use token::{LocalBoundShaderState, LocalUniformBuffer};

static_assertions::assert_impl_all!(CommandList: Send);
static_assertions::assert_impl_all!(AsyncComputeCommandList: Send);
static_assertions::assert_impl_all!(RhiExecutor: Send, Sync);
static_assertions::assert_not_impl_any!(LocalBoundShaderState: Send, Sync);
static_assertions::assert_not_impl_any!(LocalUniformBuffer: Send, Sync);
