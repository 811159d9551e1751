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

//! Recoverable errors of the command recording and execution system.
//!
//! Recording itself never fails recoverably: contract violations panic. The
//! errors below cover setup (settings, execution threads) and bounded waits.

use std::fmt;
use std::time::Duration;

/// An error raised while loading or validating [`RhiSettings`](super::RhiSettings).
#[derive(Debug)]
pub enum SettingsError {
    /// The settings document could not be parsed.
    Parse(String),
    /// A field holds a value outside of its accepted range.
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Parse(msg) => write!(f, "Failed to parse RHI settings: {msg}"),
            SettingsError::Invalid { field, reason } => {
                write!(f, "Invalid RHI setting '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// A bounded fence wait gave up before the fence was signaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceWaitError {
    /// The timeout elapsed.
    Timeout {
        /// The name of the fence that was waited on.
        fence: String,
        /// How long the caller waited.
        waited: Duration,
    },
}

impl fmt::Display for FenceWaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenceWaitError::Timeout { fence, waited } => write!(
                f,
                "Timed out after {}ms waiting for compute fence '{fence}'",
                waited.as_millis()
            ),
        }
    }
}

impl std::error::Error for FenceWaitError {}

/// A top-level error of the RHI command system.
#[derive(Debug)]
pub enum RhiError {
    /// The settings were rejected.
    Settings(SettingsError),
    /// A queue execution thread could not be started.
    ExecutionThreadSpawn {
        /// The name of the thread.
        name: String,
        /// The OS error message.
        details: String,
    },
    /// A fence wait failed.
    FenceWait(FenceWaitError),
}

impl fmt::Display for RhiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RhiError::Settings(err) => write!(f, "{err}"),
            RhiError::ExecutionThreadSpawn { name, details } => {
                write!(f, "Failed to spawn execution thread '{name}': {details}")
            }
            RhiError::FenceWait(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RhiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RhiError::Settings(err) => Some(err),
            RhiError::FenceWait(err) => Some(err),
            RhiError::ExecutionThreadSpawn { .. } => None,
        }
    }
}

impl From<SettingsError> for RhiError {
    fn from(err: SettingsError) -> Self {
        RhiError::Settings(err)
    }
}

impl From<FenceWaitError> for RhiError {
    fn from(err: FenceWaitError) -> Self {
        RhiError::FenceWait(err)
    }
}
