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

//! Cancellation signals used to interrupt a running `Supervisor::start`
//! call from outside its thread. An abort token means "kill the child and
//! fail the call"; a yield token means "return a running status now,
//! leave the child alive". They're deliberately two distinct types of
//! signal rather than one flag with a reason code, the same way child-exit
//! notification and client-disconnect bookkeeping stay as separate
//! condition-guarded signals instead of folding into one.
//!
//! Backed by a bounded(1) channel rather than a `Mutex`+`Condvar` pair so
//! the firing can be raced directly inside a `crossbeam_channel::select!`
//! alongside the child-exit and yield-timer arms in `supervisor.rs`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug)]
struct Inner {
    fired: AtomicBool,
    tx: Sender<()>,
    rx: Receiver<()>,
}

/// A one-shot cancellation signal. Cloning shares the same underlying
/// signal; firing any clone wakes every waiter.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<Inner>);

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        CancelToken(Arc::new(Inner { fired: AtomicBool::new(false), tx, rx }))
    }

    /// Idempotent: firing an already-fired token is a no-op.
    pub fn fire(&self) {
        if !self.0.fired.swap(true, Ordering::SeqCst) {
            let _ = self.0.tx.try_send(());
        }
    }

    pub fn is_fired(&self) -> bool {
        self.0.fired.load(Ordering::SeqCst)
    }

    /// A receiver that becomes ready exactly once, the moment `fire` is
    /// called. Intended for use as a `select!` arm.
    pub fn receiver(&self) -> Receiver<()> {
        self.0.rx.clone()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Kills the child and fails the call.
pub type AbortToken = CancelToken;
/// Returns the call as `Running` without touching the child.
pub type YieldToken = CancelToken;
