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

//! Environment-variable driven tuning knobs. No config file: this
//! subsystem has no persistent state and nothing here needs hot-reload,
//! unlike a long-lived daemon that needs to pick up edits to an
//! on-disk config file without restarting.

use std::env;
use std::time::Duration;

const YIELD_MS_DEFAULT: u64 = 60_000;
const YIELD_MS_MIN: u64 = 1_000;
const YIELD_MS_MAX: u64 = 120_000;

const MAX_OUTPUT_CHARS_DEFAULT: usize = 30_000;
const MAX_OUTPUT_CHARS_MIN: usize = 1_000;
const MAX_OUTPUT_CHARS_MAX: usize = 150_000;

const JOB_TTL_MS_DEFAULT: u64 = 1_800_000;
const JOB_TTL_MS_MIN: u64 = 60_000;
const JOB_TTL_MS_MAX: u64 = 10_800_000;

/// Resolves the per-call yield window: an explicit `requested` value
/// wins over `BASH_YIELD_MS`, which wins over the built-in default; the
/// result is always clamped to `[1s, 120s]`.
pub fn yield_ms(requested: Option<u64>) -> u64 {
    let env_default = env::var("BASH_YIELD_MS").ok().and_then(|s| s.parse().ok());
    requested.or(env_default).unwrap_or(YIELD_MS_DEFAULT).clamp(YIELD_MS_MIN, YIELD_MS_MAX)
}

/// Resolves the per-session output ring cap, in characters.
pub fn max_output_chars() -> usize {
    let env_default: Option<usize> = env::var("BASH_MAX_OUTPUT_CHARS").ok().and_then(|s| s.parse().ok());
    env_default.unwrap_or(MAX_OUTPUT_CHARS_DEFAULT).clamp(MAX_OUTPUT_CHARS_MIN, MAX_OUTPUT_CHARS_MAX)
}

/// How long a finished session survives in the registry before the
/// sweeper evicts it.
pub fn job_ttl() -> Duration {
    let ms: u64 = env::var("BASH_JOB_TTL_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(JOB_TTL_MS_DEFAULT);
    Duration::from_millis(ms.clamp(JOB_TTL_MS_MIN, JOB_TTL_MS_MAX))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn yield_ms_clamps_requested_value() {
        assert_eq!(yield_ms(Some(500)), YIELD_MS_MIN);
        assert_eq!(yield_ms(Some(999_999)), YIELD_MS_MAX);
        assert_eq!(yield_ms(Some(5_000)), 5_000);
    }

    #[test]
    fn yield_ms_falls_back_to_default_without_request_or_env() {
        assert_eq!(yield_ms(None), YIELD_MS_DEFAULT);
    }
}
