// src/exec/output.rs

//! Bounded capture of a run's combined stdout/stderr.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared reference to one run's output. Cheap to clone; subscribers may keep
/// it after the run is over.
pub type OutputRef = Arc<OutputBuffer>;

/// Line buffer holding at most `limit_bytes` of output.
///
/// Every line is charged its length plus one byte for its newline, so
/// [`text`](Self::text) never grows past the limit. When a new line would
/// exceed it, the oldest lines are evicted: the end of a build/test log
/// (failure summary) is what a user needs to see. A single line longer than
/// the limit keeps only its tail.
pub struct OutputBuffer {
    limit_bytes: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    lines: VecDeque<String>,
    bytes: usize,
    dropped_bytes: usize,
    closed: bool,
}

impl OutputBuffer {
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit_bytes: limit_bytes.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn shared(limit_bytes: usize) -> OutputRef {
        Arc::new(Self::new(limit_bytes))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking reader thread must not make the output unreadable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one line (without its trailing newline).
    ///
    /// Lines pushed after [`close`](Self::close) are ignored.
    pub fn push_line(&self, line: impl Into<String>) {
        let mut line = line.into();
        let mut inner = self.lock();
        if inner.closed {
            return;
        }

        let max_line = self.limit_bytes - 1;
        if line.len() > max_line {
            let mut cut = line.len() - max_line;
            while !line.is_char_boundary(cut) {
                cut += 1;
            }
            inner.dropped_bytes += cut;
            line.drain(..cut);
        }

        let cost = line.len() + 1;
        while inner.bytes + cost > self.limit_bytes {
            match inner.lines.pop_front() {
                Some(old) => {
                    inner.bytes -= old.len() + 1;
                    inner.dropped_bytes += old.len() + 1;
                }
                None => break,
            }
        }

        inner.bytes += cost;
        inner.lines.push_back(line);
    }

    /// Mark the buffer as finished: the run that owns it has ended.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn limit_bytes(&self) -> usize {
        self.limit_bytes
    }

    /// Bytes currently retained, one newline per line included.
    pub fn len_bytes(&self) -> usize {
        self.lock().bytes
    }

    /// Bytes evicted so far to stay within the limit.
    pub fn dropped_bytes(&self) -> usize {
        self.lock().dropped_bytes
    }

    pub fn line_count(&self) -> usize {
        self.lock().lines.len()
    }

    /// Snapshot of the retained lines, oldest first.
    ///
    /// The returned iterator is detached from the buffer: lines pushed later
    /// are not observed by it.
    pub fn lines(&self) -> std::vec::IntoIter<String> {
        self.lock().lines.iter().cloned().collect::<Vec<_>>().into_iter()
    }

    /// The last `n` retained lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let inner = self.lock();
        let skip = inner.lines.len().saturating_sub(n);
        inner.lines.iter().skip(skip).cloned().collect()
    }

    /// Retained output joined with newlines.
    pub fn text(&self) -> String {
        let inner = self.lock();
        let mut out = String::with_capacity(inner.bytes);
        for line in &inner.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("OutputBuffer")
            .field("limit_bytes", &self.limit_bytes)
            .field("lines", &inner.lines.len())
            .field("bytes", &inner.bytes)
            .field("dropped_bytes", &inner.dropped_bytes)
            .field("closed", &inner.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_lines_in_order_under_limit() {
        let buf = OutputBuffer::new(100);
        buf.push_line("running 2 tests");
        buf.push_line("test a ... ok");
        assert_eq!(
            buf.lines().collect::<Vec<_>>(),
            vec!["running 2 tests", "test a ... ok"]
        );
        assert_eq!(buf.text(), "running 2 tests\ntest a ... ok\n");
        assert_eq!(buf.dropped_bytes(), 0);
    }

    #[test]
    fn evicts_oldest_lines_when_full() {
        let buf = OutputBuffer::new(10);
        buf.push_line("aaaa");
        buf.push_line("bbbb");
        buf.push_line("cccc");
        assert_eq!(buf.lines().collect::<Vec<_>>(), vec!["bbbb", "cccc"]);
        assert_eq!(buf.len_bytes(), 10);
        assert_eq!(buf.dropped_bytes(), 5);
    }

    #[test]
    fn oversized_line_keeps_its_tail() {
        let buf = OutputBuffer::new(5);
        buf.push_line("abcdefgh");
        assert_eq!(buf.lines().collect::<Vec<_>>(), vec!["efgh"]);
        assert_eq!(buf.dropped_bytes(), 4);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let buf = OutputBuffer::new(3);
        buf.push_line("ééé");
        let kept = buf.lines().next().unwrap();
        assert!(kept.len() < 3);
        assert!(kept.chars().all(|c| c == 'é'));
    }

    #[test]
    fn text_never_exceeds_the_limit() {
        for limit in [1, 2, 7, 16, 64] {
            let buf = OutputBuffer::new(limit);
            for i in 0..50 {
                buf.push_line("x".repeat(i % 9));
                assert_eq!(buf.text().len(), buf.len_bytes());
                assert!(buf.text().len() <= limit, "limit {limit}: {:?}", buf);
            }
        }
    }

    #[test]
    fn closed_buffer_ignores_new_lines() {
        let buf = OutputBuffer::new(100);
        buf.push_line("before");
        buf.close();
        buf.push_line("after");
        assert!(buf.is_closed());
        assert_eq!(buf.tail(5), vec!["before"]);
    }

    #[test]
    fn lines_iterator_is_a_snapshot() {
        let buf = OutputBuffer::new(100);
        buf.push_line("one");
        let it = buf.lines();
        buf.push_line("two");
        assert_eq!(it.collect::<Vec<_>>(), vec!["one"]);
        assert_eq!(buf.line_count(), 2);
    }
}
