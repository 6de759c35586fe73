//! Server-sent-event line framing.
//!
//! SSE events can be split across TCP chunks, so a remainder buffer is
//! carried forward; only complete `\n`-terminated lines are surfaced.

/// Accumulates raw bytes and yields complete SSE lines.
#[derive(Debug, Default)]
pub(crate) struct SseLineBuffer {
    buf: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes; returns every complete line (without the
    /// trailing `\n`, with any `\r` stripped).  Bytes after the last newline
    /// stay buffered for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut lines = Vec::new();
        while let Some(nl_pos) = self.buf.find('\n') {
            let line = self.buf[..nl_pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=nl_pos);
            lines.push(line);
        }
        lines
    }

    /// Extract the payload of a `data: ` line; `None` for comments, blank
    /// separators, and event-name lines.
    pub fn data_payload(line: &str) -> Option<&str> {
        let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
        let data = data.trim();
        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
