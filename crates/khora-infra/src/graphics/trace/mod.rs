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

//! A recording back-end.
//!
//! [`TraceRhiDevice`] and [`TraceCommandContext`] implement the hardware
//! interface without a GPU: each call is captured as an [`RhiCall`] in a
//! single ordered log, which makes the sequence the hardware would receive
//! observable.

mod call;
mod context;
mod device;

pub use call::RhiCall;
pub use context::TraceCommandContext;
pub use device::{CallLog, TraceRhiDevice};
