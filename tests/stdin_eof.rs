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

//! End-to-end: writing to a backgrounded session's stdin with `eof=true`
//! lets a reader like `cat` see EOF and exit.

mod support;

use bgexec::control;
use bgexec::dispatcher::{self, Details, StartArgs, StartDetails};
use bgexec::session::Status;

use support::{fresh_cancellation, wait_until, CollectingSink};

#[test]
#[ntest::timeout(5_000)]
fn write_stdin_with_eof_reaches_completion() {
    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let args = StartArgs { command: "cat".to_string(), workdir: None, env: None, yield_ms: Some(30), stdin_mode: None };
    let result = dispatcher::dispatch_start(args, "t".to_string(), cancellation, sink).expect("start should not reject");

    let session_id = match result.details {
        Details::Start(StartDetails::Running { session_id, .. }) => session_id,
        other => panic!("expected Running, got {other:?}"),
    };

    let written = control::write_stdin(&session_id, b"hi\n", true).expect("write should succeed on a backgrounded session");
    assert_eq!(written.bytes_written, 3);

    assert!(wait_until(|| {
        control::poll(&session_id).map(|p| p.status == Status::Completed).unwrap_or(false)
    }));

    let logged = control::log(&session_id, 0, None).unwrap();
    assert!(logged.text.contains("hi"));
}

#[test]
#[ntest::timeout(5_000)]
fn write_stdin_before_backgrounded_is_rejected() {
    // A session that completes before ever yielding is never backgrounded,
    // so a caller that (incorrectly) tries to write to it afterwards gets
    // SessionNotBackgrounded rather than a silent no-op or a deadlock.
    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let args = StartArgs { command: "printf done".to_string(), workdir: None, env: None, yield_ms: Some(60_000), stdin_mode: None };
    let result = dispatcher::dispatch_start(args, "t".to_string(), cancellation, sink).expect("start should not reject");
    let session_id = match result.details {
        Details::Start(StartDetails::Completed { session_id, .. }) => session_id,
        other => panic!("expected immediate completion, got {other:?}"),
    };

    let err = control::write_stdin(&session_id, b"x", false).unwrap_err();
    assert!(matches!(err, bgexec::Error::SessionExited(_)));
}
