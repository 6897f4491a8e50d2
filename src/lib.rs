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

//! `bgexec` is the streaming background-process execution subsystem carved
//! out of a terminal coding agent: it runs shell commands under a
//! supervisor, streams their stdout/stderr live, yields control back to the
//! caller after a bounded wait, and lets later calls poll, feed stdin to,
//! kill, list, and fetch logs from the same command without blocking the
//! agent's reasoning loop or touching disk.
//!
//! The crate is organized leaf-first, the way a reader would trace a
//! request through it:
//!
//! - [`platform`] resolves the host shell and the process-tree kill
//!   primitive.
//! - [`ring`] is the bounded output buffer every session streams into.
//! - [`session`] is the per-invocation record the rest of the crate shares.
//! - [`registry`] is the process-wide session table plus its TTL sweeper.
//! - [`supervisor`] spawns children and runs the yield/complete/fail race.
//! - [`control`] implements `poll`, `write_stdin`, `kill`, `list`, `log`.
//! - [`dispatcher`] is the tool-call surface an agent loop calls into.
//! - [`events`] is the streaming sink contract the supervisor publishes into.
//! - [`tokens`] are the abort/yield cancellation signals threaded through
//!   a `start` call.
//! - [`config`] resolves the environment-driven tuning knobs.
//! - [`error`] is the closed error taxonomy shared by every fallible op.

pub mod config;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod platform;
pub mod registry;
pub mod ring;
pub mod session;
pub mod supervisor;
#[cfg(feature = "test_hooks")]
pub mod test_hooks;
pub mod tokens;

pub use error::Error;
pub use events::{Event, EventSink, NoopEventSink, Stream};
pub use session::{Session, Status};
pub use tokens::{AbortToken, CancelToken, YieldToken};

/// Installs a process-wide `tracing` subscriber for host binaries that
/// haven't already set one up. This subsystem has no long-lived daemon
/// of its own to hold a runtime-adjustable handle open for, so
/// `verbosity` is fixed at startup; a host embedding this crate that
/// already manages its own subscriber should skip this call entirely.
///
/// `verbosity` follows the conventional `-v`/`-vv` CLI scale: 0 is
/// `INFO`, 1 is `DEBUG`, 2+ is `TRACE`.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    // Best-effort: a host that already installed a subscriber (e.g. the
    // surrounding agent binary) wins; we never panic over a double-init.
    let _ = tracing_subscriber::fmt().with_max_level(level).with_target(false).try_init();
}
