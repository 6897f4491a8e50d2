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

//! End-to-end: a finished session is gone from the registry once evicted,
//! after which control operations report `SessionNotFound`. Kept in its
//! own test binary since `job_ttl_clamps_below_the_floor` sets a
//! process-wide environment variable.

mod support;

use bgexec::control;
use bgexec::error::Error;
use bgexec::dispatcher::{self, Details, StartArgs, StartDetails};

use support::{fresh_cancellation, wait_until, CollectingSink};

#[test]
fn job_ttl_clamps_below_the_floor() {
    std::env::set_var("BASH_JOB_TTL_MS", "1");
    assert_eq!(bgexec::config::job_ttl(), std::time::Duration::from_millis(60_000));
}

#[test]
#[ntest::timeout(10_000)]
fn evicted_session_is_unknown_to_every_control_operation() {
    let sink = CollectingSink::new();
    let cancellation = fresh_cancellation();
    let args = StartArgs { command: "printf done".to_string(), workdir: None, env: None, yield_ms: Some(60_000), stdin_mode: None };
    let result = dispatcher::dispatch_start(args, "t".to_string(), cancellation, sink).expect("start should not reject");
    let session_id = match result.details {
        Details::Start(StartDetails::Completed { session_id, .. }) => session_id,
        other => panic!("expected immediate completion, got {other:?}"),
    };

    // The real TTL floor is 60s, too slow to wait out in a test; call the
    // same `evict` primitive the sweeper uses once a session is past it.
    bgexec::registry::global().lock().unwrap().evict(&session_id);

    assert!(wait_until(|| matches!(control::poll(&session_id), Err(Error::SessionNotFound(_)))));
    assert!(control::list(None).iter().all(|e| e.id != session_id));
}
