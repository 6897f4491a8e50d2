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

//! A thin demo binary that exercises `bgexec` manually from a terminal,
//! calling straight into the library the way any CLI front-end would —
//! except this subsystem has no daemon to dial, so "start a session,
//! then issue control operations against it" collapses into one REPL
//! loop inside a single process instead of separate `attach`/`kill`/
//! `list` invocations talking to a long-lived server over a socket.

use std::io::{self, BufRead, Write as _};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use bgexec::dispatcher::{self, CancellationSources, ProcessArgs, StartArgs};
use bgexec::events::{Event, EventSink, Stream};
use bgexec::tokens::CancelToken;

#[derive(Parser, Debug)]
#[clap(author, about = "Run a shell command under bgexec and poke at it interactively.")]
struct Args {
    /// The command line to hand to the host shell.
    command: String,

    #[clap(long, help = "working directory for the child process")]
    workdir: Option<String>,

    #[clap(long, help = "how long to wait before yielding control, in milliseconds")]
    yield_ms: Option<u64>,

    #[clap(short, long, action = clap::ArgAction::Count, help = "show more in logs, may be provided multiple times")]
    verbose: u8,
}

/// Prints streamed chunks straight to the terminal as they arrive, the
/// way a real agent host would forward them into its own UI.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: Event) {
        match event {
            Event::ExecutionOutput { stream, chunk, .. } => match stream {
                Stream::Stdout => {
                    print!("{chunk}");
                    let _ = io::stdout().flush();
                }
                Stream::Stderr => {
                    eprint!("{chunk}");
                }
            },
            Event::ExecutionProgress { session_id, pid, .. } => {
                println!("\n[bgexec] yielded: session={session_id} pid={pid:?}, still running in the background");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    bgexec::init_logging(args.verbose);

    // This REPL has no separate soft-yield UI control (no Ctrl-C handler
    // either, for that matter) — just the one hard-cancel source bound to
    // `abort_token`, with `yield_token` left quiescent by `bind_tokens`.
    let cancellation = CancellationSources { hard_cancel: CancelToken::new(), soft_yield: None };
    let start_args = StartArgs { command: args.command, workdir: args.workdir, env: None, yield_ms: args.yield_ms, stdin_mode: None };

    let result = dispatcher::dispatch_start(start_args, "cli-0".to_string(), cancellation, Arc::new(StdoutSink)).context("starting command")?;

    let session_id = match result.details {
        bgexec::dispatcher::Details::Start(bgexec::dispatcher::StartDetails::Completed { session_id, exit_code, duration_ms }) => {
            println!("\n[bgexec] completed: exit_code={exit_code} duration_ms={duration_ms}");
            session_id
        }
        bgexec::dispatcher::Details::Start(bgexec::dispatcher::StartDetails::Running { session_id, .. }) => session_id,
        _ => unreachable!("dispatch_start only ever returns Details::Start"),
    };

    println!("[bgexec] session id: {session_id}");
    println!("[bgexec] commands: poll | write <text> | log [offset] [limit] | list | kill | quit");

    repl(&session_id)
}

fn repl(session_id: &str) -> anyhow::Result<()> {
    let stdin = io::stdin();
    loop {
        print!("bgexec> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        let process_args = match cmd {
            "quit" | "exit" => return Ok(()),
            "poll" => ProcessArgs::Poll { session_id: session_id.to_string() },
            "kill" => ProcessArgs::Kill { session_id: session_id.to_string() },
            "list" => ProcessArgs::List { limit: None },
            "write" => ProcessArgs::Write { session_id: session_id.to_string(), data: format!("{rest}\n"), eof: Some(false) },
            "log" => {
                let mut nums = rest.split_whitespace();
                let offset = nums.next().and_then(|s| s.parse().ok());
                let limit = nums.next().and_then(|s| s.parse().ok());
                ProcessArgs::Log { session_id: session_id.to_string(), offset, limit }
            }
            "" => continue,
            other => {
                println!("unrecognized command: {other}");
                continue;
            }
        };

        let result = dispatcher::dispatch_process(process_args);
        for block in result.content {
            println!("{block}");
        }
    }
}
