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

//! A bounded, suffix-preserving character buffer. Every chunk of child
//! output is appended here as it arrives; once the buffer would exceed
//! its cap, the oldest characters are dropped so the tail is always what
//! survives — a streaming agent cares about what just happened, not what
//! scrolled off the top an hour ago.

/// Characters kept for the "backgrounded" progress snapshot and for
/// `poll`'s final-exit suffix, independent of a session's configured cap.
const DEFAULT_TAIL_CHARS: usize = 2048;

#[derive(Debug)]
pub struct OutputRing {
    cap: usize,
    buf: String,
    truncated: bool,
}

impl OutputRing {
    pub fn new(cap: usize) -> Self {
        OutputRing { cap, buf: String::new(), truncated: false }
    }

    /// Appends `chunk`, dropping leading characters if the buffer would
    /// otherwise exceed `cap`. `truncated` latches permanently once set.
    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.buf.push_str(chunk);
        self.trim_to_cap();
    }

    fn trim_to_cap(&mut self) {
        let total_chars = self.buf.chars().count();
        if total_chars <= self.cap {
            return;
        }
        self.truncated = true;
        let drop_chars = total_chars - self.cap;
        let byte_idx = self.buf.char_indices().nth(drop_chars).map(|(i, _)| i).unwrap_or(self.buf.len());
        self.buf.drain(..byte_idx);
    }

    /// The full retained buffer (already capped to `cap` characters).
    pub fn aggregated(&self) -> &str {
        &self.buf
    }

    /// The last `n` characters of the retained buffer.
    pub fn tail(&self, n: usize) -> &str {
        let total = self.buf.chars().count();
        if n >= total {
            return &self.buf;
        }
        let drop = total - n;
        let byte_idx = self.buf.char_indices().nth(drop).map(|(i, _)| i).unwrap_or(0);
        &self.buf[byte_idx..]
    }

    pub fn tail_default(&self) -> &str {
        self.tail(DEFAULT_TAIL_CHARS)
    }

    pub fn len(&self) -> usize {
        self.buf.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True once any append has dropped characters from the front.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}
