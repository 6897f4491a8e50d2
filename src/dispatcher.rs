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

//! The tool-call surface: `StartArgs`/`ProcessArgs` decode an agent
//! loop's JSON tool-call arguments, `dispatch_start`/`dispatch_process`
//! run the operation, and the result is wrapped in a `ToolResult`
//! envelope whose `details` field is a tagged enum (`ConnectHeader`-style)
//! rather than an untyped `serde_json::Map`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::control::{self, ListEntry, LogResult, PollResult};
use crate::error::Error;
use crate::events::EventSink;
use crate::session::Status;
use crate::supervisor::{self, Outcome, StartRequest};
use crate::tokens::CancelToken;

#[derive(Debug, Deserialize)]
pub struct StartArgs {
    pub command: String,
    pub workdir: Option<String>,
    pub env: Option<Vec<(String, String)>>,
    pub yield_ms: Option<u64>,
    pub stdin_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProcessArgs {
    List { limit: Option<usize> },
    Poll { session_id: String },
    Log { session_id: String, offset: Option<usize>, limit: Option<usize> },
    Write { session_id: String, data: String, eof: Option<bool> },
    Kill { session_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Details {
    Start(StartDetails),
    List { sessions: Vec<ListEntryDetails> },
    Poll(PollDetails),
    Log(LogDetails),
    Write { bytes_written: usize },
    Kill {},
    Error { kind: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartDetails {
    Running { session_id: String, pid: u32, started_at: String, tail: String },
    Completed { session_id: String, exit_code: i32, duration_ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntryDetails {
    pub id: String,
    pub status: String,
    pub pid: Option<u32>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub runtime_ms: u64,
    pub cwd: Option<String>,
    pub command_summary: String,
    pub tail: String,
    pub truncated: bool,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollDetails {
    pub status: String,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogDetails {
    pub total_len: usize,
    pub truncated: bool,
    pub status: String,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
}

/// What the dispatcher hands back to the agent loop for any tool call:
/// human-readable content for the transcript, a typed details bag for
/// programmatic consumers, and a status the caller can branch on
/// without re-parsing `content`.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: Vec<String>,
    pub details: Details,
    pub status: ToolStatus,
}

fn rfc3339(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339()
}

fn status_str(s: Status) -> String {
    match s {
        Status::Running => "running",
        Status::Completed => "completed",
        Status::Failed => "failed",
        Status::Killed => "killed",
    }
    .to_string()
}

/// The two cancellation sources a host can supply for a `start` call.
/// If only a hard-cancel source exists, it's bound to `abort_token` and
/// `yield_token` is left quiescent (never fires).
pub struct CancellationSources {
    pub hard_cancel: CancelToken,
    pub soft_yield: Option<CancelToken>,
}

pub fn bind_tokens(sources: CancellationSources) -> (CancelToken, CancelToken) {
    let yield_token = sources.soft_yield.unwrap_or_default();
    (sources.hard_cancel, yield_token)
}

/// Runs the Start tool. Unlike the Process tool's control operations,
/// `CommandFailed`/`Aborted` are not folded into a `status: "failed"`
/// result — they propagate as an `Err` that rejects the call. Binds the
/// host's cancellation source(s) via `bind_tokens` before handing off to
/// the Supervisor, so a host that only supplies a hard-cancel source
/// gets a quiescent (never-firing) yield token per §4.7.
pub fn dispatch_start(
    args: StartArgs,
    tool_call_id: String,
    cancellation: CancellationSources,
    event_sink: Arc<dyn EventSink + Send + Sync>,
) -> anyhow::Result<ToolResult> {
    let (abort_token, yield_token) = bind_tokens(cancellation);
    let req = StartRequest {
        command: args.command,
        workdir: args.workdir,
        env_overlay: args.env,
        yield_ms: args.yield_ms,
        stdin_mode: args.stdin_mode,
        tool_call_id,
        abort_token,
        yield_token,
        event_sink,
    };
    match supervisor::start(req)? {
        Outcome::Running { session_id, pid, started_at, tail } => Ok(ToolResult {
            content: vec![format!("Backgrounded as session {session_id} (pid {pid}).\n{tail}")],
            details: Details::Start(StartDetails::Running { session_id, pid, started_at: rfc3339(started_at), tail }),
            status: ToolStatus::Running,
        }),
        Outcome::Completed { session_id, exit_code, duration_ms, aggregated } => Ok(ToolResult {
            content: vec![aggregated],
            details: Details::Start(StartDetails::Completed { session_id, exit_code, duration_ms }),
            status: ToolStatus::Completed,
        }),
    }
}

/// Runs one action of the Process tool. Every error kind here surfaces
/// as a `status: "failed"` result rather than an `Err`, since these are
/// well-understood, expected outcomes (bad id, not backgrounded yet,
/// already exited) rather than call-level rejections.
pub fn dispatch_process(args: ProcessArgs) -> ToolResult {
    match args {
        ProcessArgs::List { limit } => {
            let entries = control::list(limit);
            let content = render_list(&entries);
            let sessions = entries.into_iter().map(to_list_details).collect();
            ToolResult { content: vec![content], details: Details::List { sessions }, status: ToolStatus::Completed }
        }
        ProcessArgs::Poll { session_id } => match control::poll(&session_id) {
            Ok(r) => poll_result(r),
            Err(e) => failed_result(e),
        },
        ProcessArgs::Log { session_id, offset, limit } => match control::log(&session_id, offset.unwrap_or(0), limit) {
            Ok(r) => log_result(r),
            Err(e) => failed_result(e),
        },
        ProcessArgs::Write { session_id, data, eof } => match control::write_stdin(&session_id, data.as_bytes(), eof.unwrap_or(false)) {
            Ok(r) => ToolResult {
                content: vec![format!("wrote {} bytes", r.bytes_written)],
                details: Details::Write { bytes_written: r.bytes_written },
                status: ToolStatus::Completed,
            },
            Err(e) => failed_result(e),
        },
        ProcessArgs::Kill { session_id } => match control::kill(&session_id) {
            Ok(()) => ToolResult { content: vec!["killed".to_string()], details: Details::Kill {}, status: ToolStatus::Completed },
            Err(e) => failed_result(e),
        },
    }
}

fn poll_result(r: PollResult) -> ToolResult {
    let status = if r.status.is_finished() { ToolStatus::Completed } else { ToolStatus::Running };
    ToolResult {
        content: vec![r.text],
        details: Details::Poll(PollDetails { status: status_str(r.status), exit_code: r.exit_code, exit_signal: r.exit_signal }),
        status,
    }
}

fn log_result(r: LogResult) -> ToolResult {
    let status = if r.status.is_finished() { ToolStatus::Completed } else { ToolStatus::Running };
    ToolResult {
        content: vec![r.text],
        details: Details::Log(LogDetails { total_len: r.total_len, truncated: r.truncated, status: status_str(r.status), exit_code: r.exit_code, exit_signal: r.exit_signal }),
        status,
    }
}

fn failed_result(e: Error) -> ToolResult {
    ToolResult { content: vec![e.to_string()], details: Details::Error { kind: e.kind_name().to_string(), message: e.to_string() }, status: ToolStatus::Failed }
}

fn to_list_details(e: ListEntry) -> ListEntryDetails {
    ListEntryDetails {
        id: e.id,
        status: status_str(e.status),
        pid: e.pid,
        started_at: rfc3339(e.started_at),
        ended_at: e.ended_at.map(rfc3339),
        runtime_ms: e.runtime_ms,
        cwd: e.cwd,
        command_summary: e.command_summary,
        tail: e.tail,
        truncated: e.truncated,
        exit_code: e.exit_code,
        exit_signal: e.exit_signal,
    }
}

fn render_list(entries: &[ListEntry]) -> String {
    if entries.is_empty() {
        return "(no sessions)".to_string();
    }
    entries
        .iter()
        .map(|e| format!("{}\t{}\t{}ms\t{}", e.id, status_str(e.status), e.runtime_ms, e.command_summary))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_hard_cancel_source_leaves_yield_token_quiescent() {
        let hard_cancel = CancelToken::new();
        let sources = CancellationSources { hard_cancel: hard_cancel.clone(), soft_yield: None };
        let (abort_token, yield_token) = bind_tokens(sources);

        hard_cancel.fire();
        assert!(abort_token.is_fired(), "the hard-cancel source must bind to the abort slot");
        assert!(!yield_token.is_fired(), "a host with no soft-yield source must get a yield token that never fires on its own");
    }

    #[test]
    fn both_sources_bind_to_independent_slots() {
        let hard_cancel = CancelToken::new();
        let soft_yield = CancelToken::new();
        let sources = CancellationSources { hard_cancel: hard_cancel.clone(), soft_yield: Some(soft_yield.clone()) };
        let (abort_token, yield_token) = bind_tokens(sources);

        soft_yield.fire();
        assert!(yield_token.is_fired(), "the soft-yield source must bind to the yield slot");
        assert!(!abort_token.is_fired(), "firing the yield source must never also fire the abort slot");
    }
}
