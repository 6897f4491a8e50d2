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

//! The outbound contract through which streaming chunks and progress
//! notifications reach the agent's event stream. The supervisor never
//! touches a UI directly — it only publishes into whatever `EventSink`
//! trait object the caller hands it (`Box<dyn EventSink + Send + Sync>`),
//! the same indirection any long-lived process uses to keep its core
//! logic from depending on a specific UI.

use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// A chunk of live output, emitted as soon as a reader thread decodes
    /// it — before the caller has necessarily polled for it.
    ExecutionOutput { tool_call_id: String, stream: Stream, chunk: String },
    /// Emitted exactly once per `start` call, the moment it yields
    /// control back to the caller with the child still running.
    ExecutionProgress {
        tool_call_id: String,
        session_id: String,
        pid: Option<u32>,
        started_at: SystemTime,
        tail: Option<String>,
    },
}

/// Sinks are expected to be cheap/non-blocking from the supervisor's
/// point of view (buffered channel, lock-free queue, etc). Emission
/// failures are the sink's own problem to swallow-and-log; the
/// supervisor never lets a sink error affect process supervision.
pub trait EventSink {
    fn emit(&self, event: Event);
}

/// The default sink for hosts that don't care about streaming, and for
/// tests that only assert on control-operation results.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: Event) {}
}
