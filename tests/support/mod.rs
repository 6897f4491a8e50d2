// This module is shared by several test files, each of which is compiled
// into its own binary by cargo.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bgexec::dispatcher::CancellationSources;
use bgexec::events::{Event, EventSink};
use bgexec::test_hooks;
use bgexec::tokens::CancelToken;

/// An `EventSink` that records every event it receives, for assertions
/// about ordering and content without racing a real terminal.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn stdout_contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| matches!(e, Event::ExecutionOutput { stream: bgexec::events::Stream::Stdout, chunk, .. } if chunk.contains(needle)))
    }

    pub fn progress_count(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, Event::ExecutionProgress { .. })).count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Fresh, never-firing cancellation sources for tests that don't care
/// about abort/yield behavior, routed through `dispatcher::bind_tokens`
/// the same way a real host's two independent sources would be.
pub fn fresh_cancellation() -> CancellationSources {
    CancellationSources { hard_cancel: CancelToken::new(), soft_yield: Some(CancelToken::new()) }
}

/// Blocks until `event` is published on the `test_hooks` broadcast, up to
/// `timeout`. Subscribe before starting the action that's expected to
/// fire it — subscribing after the event already went out means missing it.
pub fn wait_for_event(rx: &crossbeam_channel::Receiver<String>, event: &str, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            return false;
        }
        match rx.recv_timeout(remaining) {
            Ok(received) if received == event => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
}

/// Subscribes to the `test_hooks` broadcast.
pub fn subscribe_events() -> crossbeam_channel::Receiver<String> {
    test_hooks::subscribe()
}

/// Polls `pred` with exponential backoff until it returns true or the
/// budget runs out, instead of a single fixed sleep that's either too
/// short (flaky) or too long (slow).
pub fn wait_until<P>(mut pred: P) -> bool
where
    P: FnMut() -> bool,
{
    let mut sleep_dur = Duration::from_millis(20);
    for _ in 0..12 {
        if pred() {
            return true;
        }
        std::thread::sleep(sleep_dur);
        sleep_dur *= 2;
    }
    false
}
