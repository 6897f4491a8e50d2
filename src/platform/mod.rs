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

//! Resolves the command interpreter and the recursive process-tree kill
//! primitive for the host OS, keeping the cross-platform differences out
//! of the supervisor proper behind a handful of free functions rather
//! than scattering `cfg` attributes through the call sites.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{kill_process_tree, shell_config};
#[cfg(windows)]
pub use windows::{kill_process_tree, shell_config};

/// The interpreter binary and the argv prefix used to invoke it with a
/// single composed command string as the final argument.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub interpreter: String,
    pub arg_prefix: Vec<String>,
}
