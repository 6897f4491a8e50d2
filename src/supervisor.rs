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

//! Spawns a child under the platform shell adapter, streams its stdout
//! and stderr into the Registry and the Event Channel, and races four
//! conditions — child exit, the yield timer, a cooperative yield token,
//! and a hard abort token — to decide whether `start` returns `Running`
//! or settles to a terminal `Outcome`. One OS thread per output stream
//! plus one "waiter" thread per session, in the spirit of a
//! reader-thread-per-stream plus a separate child-watcher; the race
//! itself uses `crossbeam_channel::select!` to race a timer channel
//! against a mailbox channel.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{info, instrument, warn};

use crate::config;
use crate::error::Error;
use crate::events::{Event, EventSink, Stream};
use crate::registry;
use crate::ring::OutputRing;
use crate::session::{Session, Status};
use crate::tokens::{AbortToken, YieldToken};

/// Arguments for a single `start` invocation.
pub struct StartRequest {
    pub command: String,
    pub workdir: Option<String>,
    pub env_overlay: Option<Vec<(String, String)>>,
    pub yield_ms: Option<u64>,
    pub stdin_mode: Option<String>,
    pub tool_call_id: String,
    pub abort_token: AbortToken,
    pub yield_token: YieldToken,
    pub event_sink: Arc<dyn EventSink + Send + Sync>,
}

/// What a `start` call settles to: either it yielded control with the
/// child still running, or the child reached a terminal state before
/// the yield window elapsed.
#[derive(Debug, Clone)]
pub enum Outcome {
    Running { session_id: String, pid: u32, started_at: SystemTime, tail: String },
    Completed { session_id: String, exit_code: i32, duration_ms: u64, aggregated: String },
}

/// Runs the six-step start algorithm and blocks the calling thread
/// until either outcome is reached.
#[instrument(skip_all, fields(command = %req.command))]
pub fn start(req: StartRequest) -> anyhow::Result<Outcome> {
    if req.command.trim().is_empty() {
        return Err(Error::MissingCommand.into());
    }
    let stdin_mode = req.stdin_mode.clone().unwrap_or_else(|| "pipe".to_string());
    if stdin_mode != "pipe" {
        return Err(Error::UnsupportedStdinMode(stdin_mode).into());
    }

    let shell = crate::platform::shell_config()?;
    let mut cmd = Command::new(&shell.interpreter);
    for arg in &shell.arg_prefix {
        cmd.arg(arg);
    }
    cmd.arg(&req.command);
    if let Some(dir) = &req.workdir {
        cmd.current_dir(dir);
    }
    if let Some(overlay) = &req.env_overlay {
        for (k, v) in overlay {
            cmd.env(k, v);
        }
    }
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| anyhow::anyhow!("spawning '{}': {e}", req.command))?;
    let pid = child.id();
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let stdin = child.stdin.take().expect("piped stdin");

    let id = registry::next_id();
    let started_at = SystemTime::now();
    let session = Session {
        id: id.clone(),
        command: req.command.clone(),
        cwd: req.workdir.clone(),
        started_at,
        ended_at: None,
        pid,
        stdin: Some(stdin),
        ring: OutputRing::new(config::max_output_chars()),
        pending_stdout: Vec::new(),
        pending_stderr: Vec::new(),
        backgrounded: false,
        exited: false,
        exit_code: None,
        exit_signal: None,
        status: Status::Running,
    };
    registry::global().lock().unwrap().add(session);
    info!(session_id = %id, pid, "spawned session");
    #[cfg(feature = "test_hooks")]
    crate::test_hooks::publish(&format!("session-spawned:{id}"));

    let (stdout_done_tx, stdout_done_rx) = crossbeam_channel::bounded::<()>(1);
    let (stderr_done_tx, stderr_done_rx) = crossbeam_channel::bounded::<()>(1);
    thread_reader(id.clone(), stdout, Stream::Stdout, req.event_sink.clone(), req.tool_call_id.clone(), stdout_done_tx);
    thread_reader(id.clone(), stderr, Stream::Stderr, req.event_sink.clone(), req.tool_call_id.clone(), stderr_done_tx);

    let (exit_tx, exit_rx) = crossbeam_channel::bounded::<()>(1);
    spawn_waiter(id.clone(), child, stdout_done_rx, stderr_done_rx, exit_tx);

    let yield_duration = Duration::from_millis(config::yield_ms(req.yield_ms));
    let yield_timer = crossbeam_channel::after(yield_duration);
    let abort_rx = req.abort_token.receiver();
    let yield_rx = req.yield_token.receiver();

    let mut aborted = false;
    loop {
        if aborted {
            // Once the abort token has fired, the call must settle only
            // through the child's real exit: a slow-to-die child (stuck
            // in uninterruptible I/O after SIGKILL, say) must not have a
            // yield timer or yield token race it to the finish and hand
            // back a spurious `Running` for a call that was explicitly
            // killed. `abort_rx` is harmless to keep selecting on here —
            // it already fired once and won't fire again.
            crossbeam_channel::select! {
                recv(exit_rx) -> _ => {
                    let reg = registry::global().lock().unwrap();
                    return finalize_outcome(&reg, &id, started_at, true);
                }
                recv(abort_rx) -> _ => {}
            }
            continue;
        }
        crossbeam_channel::select! {
            recv(exit_rx) -> _ => {
                let reg = registry::global().lock().unwrap();
                return finalize_outcome(&reg, &id, started_at, false);
            }
            recv(yield_timer) -> _ => {
                return Ok(do_yield(&id, req.tool_call_id.clone(), &req.event_sink, pid));
            }
            recv(yield_rx) -> _ => {
                return Ok(do_yield(&id, req.tool_call_id.clone(), &req.event_sink, pid));
            }
            recv(abort_rx) -> _ => {
                warn!(session_id = %id, "abort token fired, killing process tree");
                crate::platform::kill_process_tree(pid as i32);
                // Keep looping: the call only settles once the real exit
                // notification arrives, so the aggregated output and
                // final status reflect what actually happened. From here
                // on, only exit_rx can settle this call.
                aborted = true;
            }
        }
    }
}

fn do_yield(id: &str, tool_call_id: String, sink: &Arc<dyn EventSink + Send + Sync>, pid: u32) -> Outcome {
    let (started_at, tail) = {
        let mut reg = registry::global().lock().unwrap();
        reg.set_backgrounded(id);
        let session = reg.get_running(id).expect("session still running at yield time");
        (session.started_at, session.ring.tail_default().to_string())
    };
    info!(session_id = %id, "yielding, session backgrounded");
    sink.emit(Event::ExecutionProgress {
        tool_call_id,
        session_id: id.to_string(),
        pid: Some(pid),
        started_at,
        tail: Some(tail.clone()),
    });
    Outcome::Running { session_id: id.to_string(), pid, started_at, tail }
}

fn finalize_outcome(
    reg: &std::sync::MutexGuard<'_, registry::Registry>,
    id: &str,
    started_at: SystemTime,
    aborted: bool,
) -> anyhow::Result<Outcome> {
    let session = reg.get_finished(id).expect("session must be finished once exit_rx fires");
    let aggregated = session.ring.aggregated().to_string();
    let duration_ms = session.ended_at.unwrap_or_else(SystemTime::now).duration_since(started_at).unwrap_or_default().as_millis() as u64;

    match session.status {
        Status::Completed => {
            let exit_code = session.exit_code.unwrap_or(0);
            let aggregated = if aggregated.is_empty() { "(no output)".to_string() } else { aggregated };
            Ok(Outcome::Completed { session_id: id.to_string(), exit_code, duration_ms, aggregated })
        }
        Status::Failed | Status::Killed if aborted => Err(Error::Aborted { aggregated, exit_signal: session.exit_signal.clone() }.into()),
        Status::Failed | Status::Killed => {
            Err(Error::CommandFailed { aggregated, exit_code: session.exit_code, exit_signal: session.exit_signal.clone() }.into())
        }
        Status::Running => unreachable!("finalize_outcome called on a still-running session"),
    }
}

fn thread_reader(
    id: String,
    mut pipe: impl Read + Send + 'static,
    stream: Stream,
    sink: Arc<dyn EventSink + Send + Sync>,
    tool_call_id: String,
    done_tx: crossbeam_channel::Sender<()>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut leftover: Vec<u8> = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = decode_utf8_chunk(&mut leftover, &buf[..n]);
                    if chunk.is_empty() {
                        continue;
                    }
                    {
                        let mut reg = registry::global().lock().unwrap();
                        if let Some(session) = reg.get_running_mut(&id) {
                            session.ring.append(&chunk);
                            match stream {
                                Stream::Stdout => session.pending_stdout.push(chunk.clone()),
                                Stream::Stderr => session.pending_stderr.push(chunk.clone()),
                            }
                        }
                    }
                    sink.emit(Event::ExecutionOutput { tool_call_id: tool_call_id.clone(), stream, chunk });
                }
                Err(e) => {
                    warn!(session_id = %id, ?e, "reading child output stream");
                    break;
                }
            }
        }
        let _ = done_tx.send(());
    })
}

fn spawn_waiter(
    id: String,
    mut child: std::process::Child,
    stdout_done_rx: crossbeam_channel::Receiver<()>,
    stderr_done_rx: crossbeam_channel::Receiver<()>,
    exit_tx: crossbeam_channel::Sender<()>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let wait_result = child.wait();
        // Make sure every byte the reader threads already read has been
        // folded into the ring before we settle the session, so a caller
        // that observes the terminal status also sees the full output.
        let _ = stdout_done_rx.recv();
        let _ = stderr_done_rx.recv();

        let (code, signal) = match &wait_result {
            Ok(exit_status) => {
                #[cfg(unix)]
                let signal = {
                    use std::os::unix::process::ExitStatusExt;
                    exit_status.signal().map(signal_name)
                };
                #[cfg(not(unix))]
                let signal: Option<String> = None;
                (exit_status.code(), signal)
            }
            Err(e) => {
                warn!(session_id = %id, ?e, "waiting on child process");
                (None, None)
            }
        };
        let status = if signal.is_some() || code != Some(0) { Status::Failed } else { Status::Completed };

        let mut reg = registry::global().lock().unwrap();
        reg.mark_exited(&id, code, signal, status);
        drop(reg);
        info!(session_id = %id, ?code, "session finalized");
        #[cfg(feature = "test_hooks")]
        crate::test_hooks::publish(&format!("session-exited:{id}"));
        let _ = exit_tx.send(());
    })
}

#[cfg(unix)]
fn signal_name(sig: i32) -> String {
    match sig {
        libc::SIGHUP => "SIGHUP".to_string(),
        libc::SIGINT => "SIGINT".to_string(),
        libc::SIGQUIT => "SIGQUIT".to_string(),
        libc::SIGKILL => "SIGKILL".to_string(),
        libc::SIGTERM => "SIGTERM".to_string(),
        libc::SIGSEGV => "SIGSEGV".to_string(),
        libc::SIGABRT => "SIGABRT".to_string(),
        other => format!("signal {other}"),
    }
}

/// Buffers incomplete trailing UTF-8 sequences across reads so a chunk
/// handed to the ring and the event sink is always well-formed, even
/// when a multi-byte character straddles an 8 KiB read boundary. A
/// genuinely invalid byte (not just a truncated tail) is replaced with
/// U+FFFD rather than buffered forever.
fn decode_utf8_chunk(leftover: &mut Vec<u8>, new_bytes: &[u8]) -> String {
    leftover.extend_from_slice(new_bytes);
    match std::str::from_utf8(leftover) {
        Ok(s) => {
            let s = s.to_string();
            leftover.clear();
            s
        }
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let mut out = String::from_utf8_lossy(&leftover[..valid_up_to]).into_owned();
            let mut remainder = leftover[valid_up_to..].to_vec();
            if let Some(bad_len) = e.error_len() {
                out.push(std::char::REPLACEMENT_CHARACTER);
                remainder.drain(..bad_len);
            }
            *leftover = remainder;
            out
        }
    }
}
