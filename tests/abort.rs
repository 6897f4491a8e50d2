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

//! End-to-end: firing the abort token before the yield window elapses
//! kills the child and rejects the `start` call; it must never resolve
//! as `Completed`.

mod support;

use std::thread;
use std::time::Duration;

use bgexec::dispatcher::{self, CancellationSources, StartArgs};
use bgexec::tokens::CancelToken;

use support::CollectingSink;

#[test]
#[ntest::timeout(10_000)]
fn abort_before_yield_rejects_the_call() {
    let sink = CollectingSink::new();
    let abort = CancelToken::new();
    let yield_token = CancelToken::new();
    let abort_clone = abort.clone();

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        abort_clone.fire();
    });

    let args = StartArgs { command: "sleep 5".to_string(), workdir: None, env: None, yield_ms: Some(1_000), stdin_mode: None };
    let cancellation = CancellationSources { hard_cancel: abort, soft_yield: Some(yield_token) };
    let err = dispatcher::dispatch_start(args, "t".to_string(), cancellation, sink).expect_err("an aborted call must reject, never complete");

    let message = err.to_string();
    assert!(
        message.contains("aborted") || message.contains("SIGKILL") || message.contains("signal"),
        "expected the error to name the abort reason, got: {message}"
    );
}

#[test]
#[ntest::timeout(10_000)]
fn yield_firing_moments_after_abort_does_not_override_it() {
    // Regression test: once the abort token fires, a yield token firing
    // shortly afterward (but before the killed child's exit notification
    // arrives) must never win the race and hand back a spurious
    // `Running` outcome for a call that was already aborted.
    let sink = CollectingSink::new();
    let abort = CancelToken::new();
    let yield_token = CancelToken::new();
    let abort_clone = abort.clone();
    let yield_clone = yield_token.clone();

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        abort_clone.fire();
        thread::sleep(Duration::from_millis(30));
        yield_clone.fire();
    });

    let args = StartArgs { command: "sleep 2".to_string(), workdir: None, env: None, yield_ms: Some(60_000), stdin_mode: None };
    let cancellation = CancellationSources { hard_cancel: abort, soft_yield: Some(yield_token) };
    let result = dispatcher::dispatch_start(args, "t".to_string(), cancellation, sink);
    assert!(result.is_err(), "a yield firing after abort must never override it, got: {result:?}");
}
