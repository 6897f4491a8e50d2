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

//! The per-invocation session record: identity, handles, timing, the
//! output ring, the pending-drain queues `poll` consumes, and terminal
//! status. The Registry is the sole owner of every `Session` for its
//! entire lifetime; the `Supervisor` and control operations only ever
//! reach one through the Registry's lock, the way `daemon/server.rs`
//! never lets a `shell::Session` escape `Server.shells` by value.

use std::process::ChildStdin;
use std::time::SystemTime;

use serde_derive::Serialize;

use crate::ring::OutputRing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    Completed,
    Failed,
    Killed,
}

impl Status {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Status::Running)
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub command: String,
    pub cwd: Option<String>,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub pid: u32,
    /// Taken (set to `None`) once `write_stdin` closes it for EOF.
    pub stdin: Option<ChildStdin>,
    pub ring: OutputRing,
    /// Output appended since the last `poll`, not yet handed back.
    pub pending_stdout: Vec<String>,
    pub pending_stderr: Vec<String>,
    /// Set once the Supervisor's yield path has returned this session to
    /// the caller as `Running`; gates `write_stdin`/`kill`.
    pub backgrounded: bool,
    pub exited: bool,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
    pub status: Status,
}

impl Session {
    /// Returns and clears the output accumulated since the last drain.
    /// Does not touch the ring, which independently retains the full
    /// (capped) aggregate for `log`.
    pub fn drain(&mut self) -> (String, String) {
        let stdout = self.pending_stdout.join("");
        let stderr = self.pending_stderr.join("");
        self.pending_stdout.clear();
        self.pending_stderr.clear();
        (stdout, stderr)
    }

    /// Records terminal state. Idempotent: the first call wins, so a
    /// late OS exit notification arriving after an explicit `kill` can
    /// never clobber a `Killed` status back to `Failed`.
    pub fn mark_exited(&mut self, code: Option<i32>, signal: Option<String>, status: Status) {
        if self.exited {
            return;
        }
        self.exited = true;
        self.exit_code = code;
        self.exit_signal = signal;
        self.ended_at = Some(SystemTime::now());
        self.status = status;
    }

    pub fn truncated(&self) -> bool {
        self.ring.truncated()
    }
}
