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

//! Command lists: ordered, arena-backed streams of recorded commands.
//!
//! A [`CommandList`] is recorded by one thread, handed to the executor, and
//! executed exactly once in recording order. Lists created while bypass is
//! latched do not store anything: every command is applied to the queue's
//! hardware context as it is recorded.

mod compute;
mod draw_up;
mod immediate;
mod recording;

pub use compute::AsyncComputeCommandList;
pub use immediate::ImmediateCommandList;

pub(crate) use draw_up::DrawUpWorkArea;

use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use khora_core::rhi::{QueueKind, RhiDevice};

use crate::arena::{Arena, ArenaPool};
use crate::command::{CommandChain, ExecuteContext, ExecutionServices, RhiCommand, SharedContext};
use crate::registry::ListRegistry;
use crate::state_cache::StateCache;
use crate::token::TokenHeader;

/// The lifecycle of a command list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ListState {
    /// Commands may be appended.
    Recording,
    /// Handed to the executor, waiting for its turn.
    Submitted,
    /// Its commands are being applied to a hardware context.
    Executing,
    /// Every command has run. The arena is about to be recycled.
    Retired,
}

/// Executor-owned resources every list needs.
#[derive(Clone)]
pub(crate) struct ListResources {
    pub(crate) registry: Arc<ListRegistry>,
    pub(crate) pool: Arc<ArenaPool>,
    pub(crate) device: Arc<dyn RhiDevice>,
    pub(crate) enable_state_cache: bool,
}

/// Where a bypass list applies its commands.
#[derive(Clone)]
pub(crate) struct BypassTarget {
    pub(crate) context: SharedContext,
    pub(crate) services: Arc<ExecutionServices>,
}

/// An ordered sequence of recorded GPU commands.
///
/// Created by [`RhiExecutor::create_command_list`](crate::RhiExecutor::create_command_list)
/// and consumed by one of the executor's submission methods. Dropping a list
/// without submitting it discards its commands without executing them.
pub struct CommandList {
    uid: u32,
    queue: QueueKind,
    state: ListState,
    arena: Arena,
    chain: CommandChain,
    state_cache: StateCache,
    draw_up: Option<DrawUpWorkArea>,
    tokens: Option<NonNull<TokenHeader>>,
    bypass: Option<BypassTarget>,
    resources: ListResources,
    registered: bool,
}

// SAFETY: `tokens` only points into the list's own arena, which moves with it.
unsafe impl Send for CommandList {}

impl std::fmt::Debug for CommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("uid", &self.uid)
            .field("queue", &self.queue)
            .field("state", &self.state)
            .field("commands", &self.chain.len())
            .field("bypass", &self.bypass.is_some())
            .finish()
    }
}

impl CommandList {
    pub(crate) fn new(
        resources: ListResources,
        queue: QueueKind,
        registered: bool,
        bypass: Option<BypassTarget>,
    ) -> Self {
        let uid = resources.registry.next_uid();
        if registered {
            resources.registry.register(uid);
        }
        if let Some(target) = &bypass {
            target
                .services
                .counters
                .bypass_lists
                .fetch_add(1, Ordering::Relaxed);
        }
        Self {
            uid,
            queue,
            state: ListState::Recording,
            arena: resources.pool.acquire(),
            chain: CommandChain::default(),
            state_cache: StateCache::new(resources.enable_state_cache),
            draw_up: None,
            tokens: None,
            bypass,
            resources,
            registered,
        }
    }

    /// The identifier of this list. Changes on [`reset`](Self::reset).
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// The queue this list was created for.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ListState {
        self.state
    }

    /// Returns `true` if commands execute as they are recorded.
    pub fn is_bypass(&self) -> bool {
        self.bypass.is_some()
    }

    /// The number of commands waiting to execute.
    pub fn num_commands(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if no command is waiting to execute.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Bytes of arena memory used by the recorded commands and their payloads.
    pub fn used_memory(&self) -> usize {
        self.arena.used_memory()
    }

    /// Discards every recorded command and token and starts over with a new identifier.
    ///
    /// # Panics
    ///
    /// Panics if a `begin_draw_*_up` is pending.
    pub fn reset(&mut self) {
        assert!(
            self.draw_up.is_none(),
            "Command list {} reset between begin_draw_primitive_up and end_draw_primitive_up",
            self.uid
        );
        self.discard_commands();
        self.arena.reset();
        self.tokens = None;
        self.state_cache.invalidate();
        let uid = self.resources.registry.next_uid();
        if self.registered {
            self.resources.registry.rename(self.uid, uid);
        }
        self.uid = uid;
        self.state = ListState::Recording;
    }

    pub(crate) fn invalidate_state_cache(&mut self) {
        self.state_cache.invalidate();
    }

    /// Appends `command`, or applies it right away in bypass mode.
    pub(crate) fn record<C: RhiCommand>(&mut self, command: C) {
        assert_eq!(
            self.state,
            ListState::Recording,
            "Cannot record into command list {} in state {:?}",
            self.uid,
            self.state
        );
        match &self.bypass {
            Some(target) => {
                let mut context = target.context.lock().unwrap();
                let mut ctx = ExecuteContext::new(
                    &mut **context,
                    &*self.resources.device,
                    &target.services,
                    self.queue,
                );
                ctx.list_uid = self.uid;
                command.execute(&mut ctx);
                target
                    .services
                    .counters
                    .commands_executed
                    .fetch_add(1, Ordering::Relaxed);
                // A pending draw-UP still writes into arena memory.
                if self.draw_up.is_none() {
                    self.arena.reset();
                }
            }
            None => self.chain.push(&mut self.arena, command),
        }
    }

    /// Validates the list before it leaves the recording thread.
    ///
    /// # Panics
    ///
    /// Panics if a `begin_draw_*_up` was never ended, or if the list was
    /// already submitted.
    pub(crate) fn prepare_for_submit(&mut self) {
        assert!(
            self.draw_up.is_none(),
            "Command list {} submitted with a begin_draw_primitive_up (Begin without End)",
            self.uid
        );
        assert_eq!(
            self.state,
            ListState::Recording,
            "Command list {} submitted twice",
            self.uid
        );
        self.warn_unused_tokens();
        self.state = ListState::Submitted;
    }

    /// Applies every recorded command to `ctx` in recording order.
    pub(crate) fn execute(&mut self, ctx: &mut ExecuteContext<'_>) {
        self.state = ListState::Executing;
        let outer_uid = mem::replace(&mut ctx.list_uid, self.uid);
        // SAFETY: the arena is only reset by `reset` and `drop`, which cannot
        // run while the list is borrowed here.
        let executed = unsafe { self.chain.execute(ctx) };
        ctx.list_uid = outer_uid;

        let counters = &ctx.services.counters;
        counters.lists_executed.fetch_add(1, Ordering::Relaxed);
        counters
            .commands_executed
            .fetch_add(executed as u64, Ordering::Relaxed);
        counters
            .peak_list_memory_bytes
            .fetch_max(self.arena.used_memory() as u64, Ordering::Relaxed);
        log::trace!(
            "Executed command list {} ({} commands) on {:?}.",
            self.uid,
            executed,
            ctx.queue
        );
        self.state = ListState::Retired;
    }

    fn link_token(&mut self, header: NonNull<TokenHeader>) {
        // SAFETY: `header` was just allocated from this list's arena.
        unsafe { (*header.as_ptr()).next = self.tokens };
        self.tokens = Some(header);
    }

    fn warn_unused_tokens(&self) {
        let mut cursor = self.tokens;
        while let Some(header) = cursor {
            // SAFETY: token headers live in this list's arena, which has not
            // been reset since they were linked.
            let header = unsafe { header.as_ref() };
            if header.use_count.load(Ordering::Acquire) == 0 {
                log::warn!(
                    "{} token built on command list {} was never used.",
                    header.kind,
                    self.uid
                );
            }
            cursor = header.next;
        }
    }

    fn discard_commands(&mut self) {
        if !self.chain.is_empty() {
            log::debug!(
                "Discarding {} unexecuted commands of command list {}.",
                self.chain.len(),
                self.uid
            );
            // SAFETY: the arena has not been reset since the commands were pushed.
            unsafe { self.chain.destruct() };
        }
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        self.discard_commands();
        let arena = mem::replace(&mut self.arena, Arena::new(0));
        self.resources.pool.release(arena);
        if self.registered {
            self.resources.registry.unregister(self.uid);
        }
    }
}
