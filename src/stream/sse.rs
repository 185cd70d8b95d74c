//! Incremental Server-Sent-Events decoder.
//!
//! Frames arrive as arbitrary byte chunks from the HTTP body; this decoder
//! buffers partial lines across chunks and yields complete frames. Only the
//! `event` and `data` fields matter to us; `id`, `retry`, and comment lines
//! are consumed and ignored.

/// One dispatched SSE frame: optional event name plus joined data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    #[cfg(test)]
    pub fn named(event: &str, data: &str) -> Self {
        Self {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }
}

#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed one chunk, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(frame) = self.flush() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }

    /// Blank line: dispatch the buffered frame, if it carries any data.
    fn flush(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.drain(..).collect::<Vec<_>>().join("\n");
        Some(SseFrame { event, data })
    }
}
