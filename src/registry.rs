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

//! The process-wide session table: two partitions (`running`,
//! `finished`) behind a single mutex, plus a TTL sweeper thread that
//! evicts finished sessions once they've sat around longer than
//! `BASH_JOB_TTL_MS`. The sweeper keeps a min-heap of reap-at instants
//! raced against a mailbox channel via `crossbeam_channel::select!`.
//! Session ids are never reused here, so there's no need for a
//! generation counter to stop a stale heap entry from reaping a reborn
//! session of the same name — instead the reap instant is re-derived
//! from the live `ended_at` field when the heap entry pops, so an entry
//! for a session already evicted by hand is a harmless no-op.

use std::cmp;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};
use std::time::{Duration, Instant, SystemTime};

use lazy_static::lazy_static;
use tracing::{info, span, warn, Level};

use crate::config;
use crate::session::{Session, Status};

pub struct Registry {
    running: HashMap<String, Session>,
    finished: HashMap<String, Session>,
    reap_tx: crossbeam_channel::Sender<(String, Instant)>,
}

impl Registry {
    fn new(reap_tx: crossbeam_channel::Sender<(String, Instant)>) -> Self {
        Registry { running: HashMap::new(), finished: HashMap::new(), reap_tx }
    }

    pub fn add(&mut self, session: Session) {
        self.running.insert(session.id.clone(), session);
    }

    pub fn get_running(&self, id: &str) -> Option<&Session> {
        self.running.get(id)
    }

    pub fn get_running_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.running.get_mut(id)
    }

    pub fn get_finished(&self, id: &str) -> Option<&Session> {
        self.finished.get(id)
    }

    pub fn list_running(&self) -> Vec<&Session> {
        self.running.values().collect()
    }

    pub fn list_finished(&self) -> Vec<&Session> {
        self.finished.values().collect()
    }

    pub fn set_backgrounded(&mut self, id: &str) {
        if let Some(session) = self.running.get_mut(id) {
            session.backgrounded = true;
        }
    }

    /// Writes terminal state. The first transition moves the session
    /// from `running` to `finished` and schedules it with the sweeper;
    /// later calls (e.g. a delayed exit notification after an explicit
    /// `kill`) only reach `Session::mark_exited`'s own idempotence guard.
    pub fn mark_exited(&mut self, id: &str, code: Option<i32>, signal: Option<String>, status: Status) {
        if let Some(mut session) = self.running.remove(id) {
            session.mark_exited(code, signal, status);
            let reap_at = Instant::now() + config::job_ttl();
            if self.reap_tx.send((id.to_string(), reap_at)).is_err() {
                warn!(id, "sweeper mailbox closed, finished session will never be swept");
            }
            self.finished.insert(id.to_string(), session);
        } else if let Some(session) = self.finished.get_mut(id) {
            session.mark_exited(code, signal, status);
        }
    }

    /// Removes a session from whichever partition it's in, regardless of
    /// TTL. Used by the sweeper and available for callers that want to
    /// forget a session immediately.
    pub fn evict(&mut self, id: &str) {
        self.running.remove(id);
        self.finished.remove(id);
    }
}

lazy_static! {
    static ref NEXT_ID: AtomicU64 = AtomicU64::new(1);
    static ref REGISTRY: (Mutex<Registry>, crossbeam_channel::Receiver<(String, Instant)>) = {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Mutex::new(Registry::new(tx)), rx)
    };
}

static SWEEPER_INIT: Once = Once::new();

/// Returns the process-wide registry, spawning the background TTL
/// sweeper thread on first access.
pub fn global() -> &'static Mutex<Registry> {
    SWEEPER_INIT.call_once(|| {
        let reap_rx = REGISTRY.1.clone();
        std::thread::spawn(move || sweeper_loop(reap_rx));
    });
    &REGISTRY.0
}

/// A fresh, opaque, human-debuggable session id (`"bg-<n>"`), numbered
/// with a simple monotonic counter rather than a random UUID so logs
/// and `list` ordering stay stable and easy to read.
pub fn next_id() -> String {
    format!("bg-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn sweeper_loop(new_sess: crossbeam_channel::Receiver<(String, Instant)>) {
    let _span = span!(Level::INFO, "registry_sweeper").entered();
    let mut heap: BinaryHeap<Reapable> = BinaryHeap::new();

    loop {
        while heap.is_empty() {
            match new_sess.recv() {
                Ok((id, reap_at)) => {
                    info!(id, "scheduling session for ttl sweep");
                    heap.push(Reapable { id, reap_at });
                }
                Err(crossbeam_channel::RecvError) => return,
            }
        }

        let wake_at = heap.peek().expect("non-empty heap has a peek").reap_at;

        crossbeam_channel::select! {
            recv(new_sess) -> msg => {
                match msg {
                    Ok((id, reap_at)) => {
                        info!(id, "scheduling session for ttl sweep");
                        heap.push(Reapable { id, reap_at });
                    }
                    Err(crossbeam_channel::RecvError) => return,
                }
            }
            recv(crossbeam_channel::at(wake_at)) -> _ => {
                let reapable = heap.pop().expect("there to be an entry in a non-empty heap");
                let mut registry = global().lock().unwrap();
                let still_due = registry
                    .get_finished(&reapable.id)
                    .and_then(|s| s.ended_at)
                    .map(|ended| SystemTime::now().duration_since(ended).unwrap_or_default() >= config::job_ttl())
                    .unwrap_or(false);
                if still_due {
                    info!(id = %reapable.id, "sweeping finished session past ttl");
                    registry.evict(&reapable.id);
                    #[cfg(feature = "test_hooks")]
                    crate::test_hooks::publish(&format!("session-swept:{}", reapable.id));
                }
            }
        }
    }
}

/// A record in the sweeper's min-heap, ordered soonest-reap-first.
#[derive(Debug)]
struct Reapable {
    id: String,
    reap_at: Instant,
}

impl cmp::PartialEq for Reapable {
    fn eq(&self, rhs: &Reapable) -> bool {
        self.reap_at == rhs.reap_at
    }
}
impl cmp::Eq for Reapable {}

impl cmp::PartialOrd for Reapable {
    fn partial_cmp(&self, other: &Reapable) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Reapable {
    fn cmp(&self, other: &Reapable) -> cmp::Ordering {
        other.reap_at.cmp(&self.reap_at) // flipped: BinaryHeap is a max-heap
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ring::OutputRing;

    fn blank_session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            command: "true".to_string(),
            cwd: None,
            started_at: SystemTime::now(),
            ended_at: None,
            pid: 1,
            stdin: None,
            ring: OutputRing::new(1000),
            pending_stdout: Vec::new(),
            pending_stderr: Vec::new(),
            backgrounded: false,
            exited: false,
            exit_code: None,
            exit_signal: None,
            status: Status::Running,
        }
    }

    #[test]
    fn mark_exited_moves_session_to_finished() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = Registry::new(tx);
        reg.add(blank_session("bg-1"));
        reg.mark_exited("bg-1", Some(0), None, Status::Completed);
        assert!(reg.get_running("bg-1").is_none());
        assert_eq!(reg.get_finished("bg-1").unwrap().status, Status::Completed);
    }

    #[test]
    fn mark_exited_does_not_clobber_killed_with_later_failed() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = Registry::new(tx);
        reg.add(blank_session("bg-1"));
        reg.mark_exited("bg-1", None, Some("SIGKILL".to_string()), Status::Killed);
        reg.mark_exited("bg-1", Some(137), None, Status::Failed);
        assert_eq!(reg.get_finished("bg-1").unwrap().status, Status::Killed);
    }

    #[test]
    fn next_id_is_monotonic_and_prefixed() {
        let a = next_id();
        let b = next_id();
        assert!(a.starts_with("bg-"));
        assert!(b.starts_with("bg-"));
        assert_ne!(a, b);
    }
}
