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

use std::env;
use std::path::Path;
use std::process::Command;

use tracing::{info, warn};

use super::ShellConfig;
use crate::error::Error;

/// Known locations for a POSIX-compatible shell on Windows. We don't
/// depend on `cmd.exe` semantics since the command strings this subsystem
/// runs are written against `sh -c`.
const CANDIDATE_SHELLS: &[&str] = &[
    r"C:\Program Files\Git\bin\bash.exe",
    r"C:\Program Files\Git\usr\bin\bash.exe",
    r"C:\Program Files (x86)\Git\bin\bash.exe",
];

pub fn shell_config() -> Result<ShellConfig, Error> {
    if let Ok(configured) = env::var("BGEXEC_SHELL") {
        if Path::new(&configured).exists() {
            return Ok(ShellConfig { interpreter: configured, arg_prefix: vec!["-c".to_string()] });
        }
    }
    for candidate in CANDIDATE_SHELLS {
        if Path::new(candidate).exists() {
            return Ok(ShellConfig { interpreter: (*candidate).to_string(), arg_prefix: vec!["-c".to_string()] });
        }
    }
    Err(Error::ShellNotFound { searched: CANDIDATE_SHELLS.iter().map(|s| s.to_string()).collect() })
}

/// There's no POSIX process-group signal on Windows, so we shell out to
/// `taskkill /T` to take the whole job tree down instead.
pub fn kill_process_tree(pid: i32) {
    info!(pid, "invoking taskkill /T /F");
    match Command::new("taskkill").args(["/PID", &pid.to_string(), "/T", "/F"]).output() {
        Ok(out) if !out.status.success() => {
            warn!(pid, status = ?out.status, "taskkill reported non-zero exit");
        }
        Err(e) => warn!(pid, ?e, "failed to spawn taskkill"),
        _ => {}
    }
}
