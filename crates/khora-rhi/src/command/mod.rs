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

//! The command object model.
//!
//! Every recorded command is a value implementing [`RhiCommand`], moved into
//! the owning list's arena behind a [`CommandHeader`]. The header stores the
//! link to the next node and a single function pointer that applies the
//! command to an [`ExecuteContext`] and then destructs it. Appending is O(1)
//! through the tail link, and executing costs one indirect call per command.

mod context;
pub(crate) mod commands;

pub(crate) use context::ExecuteContext;
pub(crate) use context::ExecutionServices;
pub(crate) use context::SharedContext;

use std::ptr::{self, NonNull};

use crate::arena::Arena;

/// A recorded operation.
///
/// `execute` consumes the command: running it is also what destructs it.
pub(crate) trait RhiCommand: Send + 'static {
    /// Applies the command to the hardware interface.
    fn execute(self, ctx: &mut ExecuteContext<'_>);
}

/// Applies then destructs a node's payload, or only destructs it when no
/// context is given (a list discarded unexecuted).
type ExecuteAndDestructFn = unsafe fn(NonNull<CommandHeader>, Option<&mut ExecuteContext<'_>>);

#[repr(C)]
pub(crate) struct CommandHeader {
    next: Option<NonNull<CommandHeader>>,
    execute_and_destruct: ExecuteAndDestructFn,
}

#[repr(C)]
struct CommandNode<C> {
    header: CommandHeader,
    command: C,
}

unsafe fn execute_and_destruct<C: RhiCommand>(
    header: NonNull<CommandHeader>,
    ctx: Option<&mut ExecuteContext<'_>>,
) {
    let node = header.cast::<CommandNode<C>>();
    // SAFETY: the header is the first field of a `CommandNode<C>` created by
    // `CommandChain::push::<C>`, and each node is consumed exactly once.
    let command = ptr::read(ptr::addr_of!((*node.as_ptr()).command));
    match ctx {
        Some(ctx) => command.execute(ctx),
        None => drop(command),
    }
}

/// An intrusive singly-linked list of commands living in an arena.
#[derive(Debug, Default)]
pub(crate) struct CommandChain {
    head: Option<NonNull<CommandHeader>>,
    tail: Option<NonNull<CommandHeader>>,
    len: usize,
}

// SAFETY: the nodes live in the arena of the list owning this chain and only
// hold `Send` payloads.
unsafe impl Send for CommandChain {}

impl std::fmt::Debug for CommandHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHeader")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl CommandChain {
    /// Constructs `command` in `arena` and links it at the tail.
    pub(crate) fn push<C: RhiCommand>(&mut self, arena: &mut Arena, command: C) {
        let node = arena.alloc(CommandNode {
            header: CommandHeader {
                next: None,
                execute_and_destruct: execute_and_destruct::<C>,
            },
            command,
        });
        let header = node.cast::<CommandHeader>();
        match self.tail {
            // SAFETY: `tail` points at a live node of this chain.
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(header) },
            None => self.head = Some(header),
        }
        self.tail = Some(header);
        self.len += 1;
    }

    /// The number of commands in the chain.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no command has been appended.
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Executes every command in append order, leaving the chain empty.
    ///
    /// # Safety
    ///
    /// The arena holding the nodes must not have been reset since they were pushed.
    pub(crate) unsafe fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> usize {
        let mut executed = 0;
        let mut cursor = self.take_head();
        while let Some(header) = cursor {
            cursor = (*header.as_ptr()).next;
            ((*header.as_ptr()).execute_and_destruct)(header, Some(&mut *ctx));
            executed += 1;
        }
        executed
    }

    /// Destructs every command without executing it, leaving the chain empty.
    ///
    /// # Safety
    ///
    /// Same as [`execute`](Self::execute).
    pub(crate) unsafe fn destruct(&mut self) {
        let mut cursor = self.take_head();
        while let Some(header) = cursor {
            cursor = (*header.as_ptr()).next;
            ((*header.as_ptr()).execute_and_destruct)(header, None);
        }
    }

    fn take_head(&mut self) -> Option<NonNull<CommandHeader>> {
        self.tail = None;
        self.len = 0;
        self.head.take()
    }
}
