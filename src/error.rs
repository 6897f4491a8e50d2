// Copyright 2026 bgexec contributors
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

//! The closed taxonomy of error kinds this subsystem can produce.
//! Control operations return these as ordinary `Result`s;
//! `Supervisor::start` surfaces `CommandFailed` and `Aborted` as
//! `anyhow::Error`s that reject the call, downcastable out of the
//! `anyhow::Error` by callers that need to branch on kind.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `start` was called with an empty command string.
    MissingCommand,
    /// A stdin mode other than `"pipe"` was requested. PTY support is
    /// reserved by the interface but not implemented.
    UnsupportedStdinMode(String),
    /// The platform shell interpreter could not be located.
    ShellNotFound { searched: Vec<String> },
    /// A control operation referenced an id with no running or finished
    /// session.
    SessionNotFound(String),
    /// A management operation (`write_stdin`, `kill`) was attempted on a
    /// session still synchronously held by its originating `start` call.
    SessionNotBackgrounded(String),
    /// `write_stdin` or `kill` was attempted on a session that has
    /// already terminated.
    SessionExited(String),
    /// stdin is already closed, or the child never had a stdin pipe.
    StdinNotWritable(String),
    /// The child exited non-zero or was signalled.
    CommandFailed { aggregated: String, exit_code: Option<i32>, exit_signal: Option<String> },
    /// The call's abort token fired before the child exited naturally.
    Aborted { aggregated: String, exit_signal: Option<String> },
}

impl Error {
    /// A stable, lowercase tag naming the error kind, suitable for the
    /// "details" bag of a failed tool result.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::MissingCommand => "missing_command",
            Error::UnsupportedStdinMode(_) => "unsupported_stdin_mode",
            Error::ShellNotFound { .. } => "shell_not_found",
            Error::SessionNotFound(_) => "session_not_found",
            Error::SessionNotBackgrounded(_) => "session_not_backgrounded",
            Error::SessionExited(_) => "session_exited",
            Error::StdinNotWritable(_) => "stdin_not_writable",
            Error::CommandFailed { .. } => "command_failed",
            Error::Aborted { .. } => "aborted",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingCommand => write!(f, "command must not be empty"),
            Error::UnsupportedStdinMode(mode) => {
                write!(f, "unsupported stdin mode '{mode}', only 'pipe' is implemented")
            }
            Error::ShellNotFound { searched } => {
                write!(f, "no shell interpreter found, searched: {}", searched.join(", "))
            }
            Error::SessionNotFound(id) => write!(f, "no session with id '{id}'"),
            Error::SessionNotBackgrounded(id) => {
                write!(f, "session '{id}' has not yielded yet and is still held by its originating call")
            }
            Error::SessionExited(id) => write!(f, "session '{id}' has already exited"),
            Error::StdinNotWritable(id) => write!(f, "stdin for session '{id}' is not writable"),
            Error::CommandFailed { aggregated, exit_code, exit_signal } => {
                let reason = match (exit_signal, exit_code) {
                    (Some(sig), _) => format!("aborted by signal {sig}"),
                    (None, Some(code)) => format!("exited with code {code}"),
                    (None, None) => "exited".to_string(),
                };
                write!(f, "{aggregated}\n\nCommand {reason}")
            }
            Error::Aborted { aggregated, exit_signal } => {
                let sig = exit_signal.clone().unwrap_or_else(|| "SIGKILL".to_string());
                write!(f, "{aggregated}\n\nCommand aborted by signal {sig}")
            }
        }
    }
}

impl std::error::Error for Error {}
