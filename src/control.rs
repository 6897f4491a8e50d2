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

//! `poll`, `write_stdin`, `kill`, `list`, `log` — the five control
//! operations, implemented as free functions over the global Registry.
//! None of them spawn threads or block on the child; each takes the
//! registry lock, mutates or reads, and releases it.

use std::io::Write;
use std::time::SystemTime;

use tracing::{info, instrument, warn};

use crate::error::Error;
use crate::registry;
use crate::session::Status;

#[derive(Debug, Clone)]
pub struct PollResult {
    pub status: Status,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
    pub text: String,
}

/// Drains whatever output has accumulated since the last poll. If the
/// session has already finished by the time this call takes the lock
/// (the common case: the waiter thread reacts to child exit on its own
/// and moves the session to `finished` immediately), the exit status is
/// folded into the same response instead of requiring one more poll
/// round — resolving the "does poll need a second call after exit"
/// open question in favour of immediate settlement.
#[instrument(skip_all, fields(session_id = %session_id))]
pub fn poll(session_id: &str) -> Result<PollResult, Error> {
    let mut reg = registry::global().lock().unwrap();
    if let Some(session) = reg.get_running_mut(session_id) {
        let (stdout, stderr) = session.drain();
        let body = join_nonempty(&[stdout.trim_end(), stderr.trim_end()]);
        let text = if body.is_empty() { "(no new output)\nProcess still running.".to_string() } else { format!("{body}\nProcess still running.") };
        return Ok(PollResult { status: Status::Running, exit_code: None, exit_signal: None, text });
    }
    if let Some(session) = reg.get_finished(session_id) {
        let tail = if session.ring.is_empty() { "(no output)".to_string() } else { session.ring.tail_default().to_string() };
        let suffix = exit_suffix(session.exit_code, &session.exit_signal);
        return Ok(PollResult {
            status: session.status,
            exit_code: session.exit_code,
            exit_signal: session.exit_signal.clone(),
            text: format!("{tail}\n{suffix}"),
        });
    }
    Err(Error::SessionNotFound(session_id.to_string()))
}

fn join_nonempty(parts: &[&str]) -> String {
    parts.iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join("\n")
}

fn exit_suffix(code: Option<i32>, signal: &Option<String>) -> String {
    match (code, signal) {
        (_, Some(sig)) => format!("Process exited with signal {sig}."),
        (Some(c), None) => format!("Process exited with code {c}."),
        (None, None) => "Process exited.".to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteStdinResult {
    pub bytes_written: usize,
}

#[instrument(skip(data), fields(session_id = %session_id, eof))]
pub fn write_stdin(session_id: &str, data: &[u8], eof: bool) -> Result<WriteStdinResult, Error> {
    let mut reg = registry::global().lock().unwrap();
    let session = match reg.get_running_mut(session_id) {
        Some(s) => s,
        None => {
            return Err(if reg.get_finished(session_id).is_some() {
                Error::SessionExited(session_id.to_string())
            } else {
                Error::SessionNotFound(session_id.to_string())
            });
        }
    };
    if !session.backgrounded {
        return Err(Error::SessionNotBackgrounded(session_id.to_string()));
    }
    let stdin = session.stdin.as_mut().ok_or_else(|| Error::StdinNotWritable(session_id.to_string()))?;
    stdin.write_all(data).map_err(|e| {
        warn!(session_id, ?e, "write to child stdin failed");
        Error::StdinNotWritable(session_id.to_string())
    })?;
    if eof {
        session.stdin = None; // dropping the handle closes the fd
        info!(session_id, "closed stdin for eof");
    }
    Ok(WriteStdinResult { bytes_written: data.len() })
}

#[instrument(fields(session_id = %session_id))]
pub fn kill(session_id: &str) -> Result<(), Error> {
    let mut reg = registry::global().lock().unwrap();
    let pid = match reg.get_running(session_id) {
        Some(s) if s.backgrounded => s.pid,
        Some(_) => return Err(Error::SessionNotBackgrounded(session_id.to_string())),
        None => {
            return Err(if reg.get_finished(session_id).is_some() {
                Error::SessionExited(session_id.to_string())
            } else {
                Error::SessionNotFound(session_id.to_string())
            });
        }
    };
    crate::platform::kill_process_tree(pid as i32);
    reg.mark_exited(session_id, None, Some("SIGKILL".to_string()), Status::Killed);
    info!(session_id, pid, "killed session");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ListEntry {
    pub id: String,
    pub status: Status,
    pub pid: Option<u32>,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub runtime_ms: u64,
    pub cwd: Option<String>,
    pub command_summary: String,
    pub tail: String,
    pub truncated: bool,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
}

/// Lists running sessions followed by finished ones, newest-started
/// first, optionally truncated to `limit` entries.
pub fn list(limit: Option<usize>) -> Vec<ListEntry> {
    let reg = registry::global().lock().unwrap();
    let mut entries: Vec<ListEntry> = reg
        .list_running()
        .into_iter()
        .map(|s| to_entry(s, true))
        .chain(reg.list_finished().into_iter().map(|s| to_entry(s, false)))
        .collect();
    entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

fn to_entry(session: &crate::session::Session, running: bool) -> ListEntry {
    let now = SystemTime::now();
    let runtime_ms = session.ended_at.unwrap_or(now).duration_since(session.started_at).unwrap_or_default().as_millis() as u64;
    ListEntry {
        id: session.id.clone(),
        status: session.status,
        pid: if running { Some(session.pid) } else { None },
        started_at: session.started_at,
        ended_at: session.ended_at,
        runtime_ms,
        cwd: session.cwd.clone(),
        command_summary: middle_ellipsis(&session.command, 120),
        tail: session.ring.tail(120).to_string(),
        truncated: session.ring.truncated(),
        exit_code: session.exit_code,
        exit_signal: session.exit_signal.clone(),
    }
}

fn middle_ellipsis(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let head = keep / 2;
    let tail = keep - head;
    let head_s: String = chars[..head].iter().collect();
    let tail_s: String = chars[chars.len() - tail..].iter().collect();
    format!("{head_s}...{tail_s}")
}

#[derive(Debug, Clone)]
pub struct LogResult {
    pub text: String,
    pub total_len: usize,
    pub truncated: bool,
    pub status: Status,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
}

/// Returns a slice of the full (capped) aggregated output, independent
/// of what `poll` has already drained. The ring is kept current as each
/// chunk streams in (see `supervisor::thread_reader`), so there's no
/// separate "flush pending into the ring" step here.
#[instrument(fields(session_id = %session_id, offset, limit))]
pub fn log(session_id: &str, offset: usize, limit: Option<usize>) -> Result<LogResult, Error> {
    let reg = registry::global().lock().unwrap();
    if let Some(session) = reg.get_running(session_id) {
        let total_len = session.ring.len();
        let text = slice_chars(session.ring.aggregated(), offset, limit);
        return Ok(LogResult { text, total_len, truncated: session.ring.truncated(), status: Status::Running, exit_code: None, exit_signal: None });
    }
    if let Some(session) = reg.get_finished(session_id) {
        let total_len = session.ring.len();
        let text = slice_chars(session.ring.aggregated(), offset, limit);
        return Ok(LogResult {
            text,
            total_len,
            truncated: session.ring.truncated(),
            status: session.status,
            exit_code: session.exit_code,
            exit_signal: session.exit_signal.clone(),
        });
    }
    Err(Error::SessionNotFound(session_id.to_string()))
}

fn slice_chars(s: &str, offset: usize, limit: Option<usize>) -> String {
    let chars: Vec<char> = s.chars().collect();
    if offset >= chars.len() {
        return String::new();
    }
    let end = match limit {
        Some(l) => (offset + l).min(chars.len()),
        None => chars.len(),
    };
    chars[offset..end].iter().collect()
}
