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

use tracing::{info, warn};

use super::ShellConfig;
use crate::error::Error;

/// POSIX systems always have `sh`; we let `PATH` resolution find it
/// rather than hard-coding `/bin/sh`.
pub fn shell_config() -> Result<ShellConfig, Error> {
    Ok(ShellConfig { interpreter: "sh".to_string(), arg_prefix: vec!["-c".to_string()] })
}

/// Sends `SIGKILL` to the process group the child was placed in (see
/// `Command::process_group(0)` in `supervisor.rs`); falls back to the bare
/// pid if the group kill fails, e.g. because the child already reaped.
/// Never returns an error: a kill on an already-dead process (`ESRCH`)
/// is a no-op.
pub fn kill_process_tree(pid: i32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    info!(pid, "sending SIGKILL to process group");
    if let Err(e) = signal::kill(Pid::from_raw(-pid), Signal::SIGKILL) {
        warn!(pid, ?e, "group kill failed, falling back to single pid");
        let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
    }
}
