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

//! Internal test instrumentation, gated behind the `test_hooks` feature.
//! Some comparable systems broadcast named events over a Unix socket so
//! a separate test-client process can synchronize with a daemon it
//! doesn't share memory with; this subsystem has no daemon/client split
//! and tests run in the same process as the code under test, so the
//! broadcast is a plain in-process `crossbeam-channel` instead.

use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};
use lazy_static::lazy_static;

lazy_static! {
    static ref WAITERS: Mutex<Vec<Sender<String>>> = Mutex::new(Vec::new());
}

/// Registers a new waiter and returns its receiving end. Call before the
/// action you're waiting on — subscribing after the event already fired
/// means missing it.
pub fn subscribe() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    WAITERS.lock().unwrap().push(tx);
    rx
}

/// Broadcasts `event` to every currently registered waiter. Dead waiters
/// (their `Receiver` dropped) are pruned opportunistically.
pub fn publish(event: &str) {
    let mut waiters = WAITERS.lock().unwrap();
    waiters.retain(|tx| tx.send(event.to_string()).is_ok());
}

/// Fires `event` when dropped, so a block of code can guarantee an
/// event fires on every exit path (including early `return`s and
/// panics during unwinding).
pub struct ScopedEvent {
    event: String,
}

impl ScopedEvent {
    pub fn new(event: impl Into<String>) -> Self {
        ScopedEvent { event: event.into() }
    }
}

impl Drop for ScopedEvent {
    fn drop(&mut self) {
        publish(&self.event);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn subscribe_then_publish_delivers_event() {
        let rx = subscribe();
        publish("session-spawned");
        assert_eq!(rx.recv_timeout(Duration::from_millis(100)).unwrap(), "session-spawned");
    }

    #[test]
    fn scoped_event_fires_on_drop() {
        let rx = subscribe();
        {
            let _scope = ScopedEvent::new("session-swept");
        }
        assert_eq!(rx.recv_timeout(Duration::from_millis(100)).unwrap(), "session-swept");
    }
}
