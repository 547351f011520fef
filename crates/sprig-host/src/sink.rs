//! Output sink abstraction.
//!
//! The sink is the seam to the presentation surface: an append-only
//! stream of decoded text. The host pushes each syscall's gathered
//! bytes through it as they arrive; there is no buffering beyond one
//! call and no flush protocol.

use std::io::Write;

use parking_lot::Mutex;

/// An append-only text destination for guest output.
///
/// Implementations must tolerate being called repeatedly during a run
/// and must not reorder appends.
pub trait OutputSink: Send + Sync {
    /// Append a chunk of decoded guest output.
    fn append(&self, text: &str);
}

/// A sink that accumulates output in memory.
///
/// Used by tests and by embedders that want to collect a run's output
/// before presenting it.
#[derive(Default)]
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    /// Create an empty buffer sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of everything appended so far.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    /// Total bytes appended so far.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl OutputSink for BufferSink {
    fn append(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }
}

/// A sink that forwards output to the process's stdout immediately.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn append(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        // Guest output is best-effort once the process's stdout is gone.
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sink_appends_in_order() {
        let sink = BufferSink::new();
        sink.append("hello ");
        sink.append("world");

        assert_eq!(sink.contents(), "hello world");
        assert_eq!(sink.len(), 11);
    }

    #[test]
    fn test_buffer_sink_empty() {
        let sink = BufferSink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.contents(), "");
    }
}
