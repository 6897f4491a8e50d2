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

//! End-to-end: a command that outruns its yield window streams output,
//! yields, then is polled to completion.

mod support;

use std::time::Duration;

use assert_matches::assert_matches;

use bgexec::control;
use bgexec::dispatcher::{self, Details, ProcessArgs, StartArgs, StartDetails};
use bgexec::session::Status;

use support::{fresh_cancellation, subscribe_events, wait_for_event, wait_until, CollectingSink};

#[test]
#[ntest::timeout(10_000)]
fn streams_then_polls_to_completion() {
    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let events = subscribe_events();

    let args = StartArgs {
        command: "printf hello && sleep 2 && printf world".to_string(),
        workdir: None,
        env: None,
        yield_ms: Some(50),
        stdin_mode: None,
    };
    let result = dispatcher::dispatch_start(args, "t1".to_string(), cancellation, sink.clone()).expect("start should not reject");

    let session_id = match result.details {
        Details::Start(StartDetails::Running { session_id, .. }) => session_id,
        other => panic!("expected Running outcome for a long command, got {other:?}"),
    };

    assert!(wait_until(|| sink.stdout_contains("hello")), "expected a streamed chunk containing 'hello'");
    assert_eq!(sink.progress_count(), 1, "exactly one progress event per yielding session");

    assert!(
        wait_for_event(&events, &format!("session-exited:{session_id}"), Duration::from_secs(5)),
        "expected the session to finish and publish session-exited"
    );

    let polled = control::poll(&session_id).expect("session should still be known");
    assert_eq!(polled.status, Status::Completed);
    assert!(polled.text.contains("helloworld"));

    // log() independently returns the full aggregated output regardless of
    // what poll() already drained.
    let logged = control::log(&session_id, 0, None).expect("log should succeed on a finished session");
    assert_matches!(logged.status, Status::Completed);
}

#[test]
#[ntest::timeout(5_000)]
fn completes_without_ever_yielding_emits_no_progress_event() {
    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let args = StartArgs { command: "printf quick".to_string(), workdir: None, env: None, yield_ms: Some(60_000), stdin_mode: None };

    let result = dispatcher::dispatch_start(args, "t2".to_string(), cancellation, sink.clone()).expect("start should not reject");

    match result.details {
        Details::Start(StartDetails::Completed { exit_code, .. }) => assert_eq!(exit_code, 0),
        other => panic!("expected immediate completion, got {other:?}"),
    }
    assert_eq!(sink.progress_count(), 0, "a session that never yields emits zero progress events");
}

#[test]
#[ntest::timeout(5_000)]
fn process_tool_poll_action_matches_control_poll() {
    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let args = StartArgs { command: "sleep 1".to_string(), workdir: None, env: None, yield_ms: Some(20), stdin_mode: None };
    let result = dispatcher::dispatch_start(args, "t3".to_string(), cancellation, sink).expect("start should not reject");
    let session_id = match result.details {
        Details::Start(StartDetails::Running { session_id, .. }) => session_id,
        other => panic!("expected Running, got {other:?}"),
    };

    let polled = dispatcher::dispatch_process(ProcessArgs::Poll { session_id });
    assert!(polled.content[0].contains("still running") || polled.content[0].contains("exited"));
}

#[test]
#[ntest::timeout(5_000)]
fn honors_workdir_in_a_scratch_directory() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let canonical = scratch.path().canonicalize().expect("canonicalize scratch dir");

    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let args = StartArgs { command: "pwd".to_string(), workdir: Some(scratch.path().display().to_string()), env: None, yield_ms: Some(60_000), stdin_mode: None };
    let result = dispatcher::dispatch_start(args, "t4".to_string(), cancellation, sink).expect("start should not reject");

    match result.details {
        Details::Start(StartDetails::Completed { exit_code, .. }) => assert_eq!(exit_code, 0),
        other => panic!("expected immediate completion, got {other:?}"),
    }
    assert_eq!(result.content[0].trim(), canonical.display().to_string(), "child must run with cwd set to the requested workdir");
}
