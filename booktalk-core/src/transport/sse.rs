//! Incremental server-sent-event framing
//!
//! Chunks arriving off the wire do not respect event boundaries, so the
//! parser buffers bytes and emits complete frames as they close. Only the
//! parts of the SSE grammar the assistant server uses are implemented:
//! `event:` and `data:` fields, blank-line dispatch, multi-line data joined
//! with newlines. Comment lines (`:`) and unknown fields are skipped.

/// One complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; empty string if the server sent none
    pub event: String,
    /// Data payload, multi-line data joined with `\n`
    pub data: String,
}

/// Incremental SSE parser. Feed it raw chunks, collect finished frames.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    event: String,
    data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of bytes, returning every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.take_frame() {
                    frames.push(frame);
                }
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = value.trim_start().to_string();
            } else if let Some(value) = line.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value.trim_start());
            }
            // Comments and unknown fields fall through
        }
        frames
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.event.is_empty() && self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: std::mem::take(&mut self.event),
            data: std::mem::take(&mut self.data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut parser = SseParser::new();
        let frames = parser.push(b"event: status\ndata: {\"status\": \"Thinking...\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "status");
        assert_eq!(frames[0].data, "{\"status\": \"Thinking...\"}");
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: comp").is_empty());
        assert!(parser.push(b"lete\ndata: {\"te").is_empty());
        let frames = parser.push(b"xt\": \"hi\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "complete");
        assert_eq!(frames[0].data, "{\"text\": \"hi\"}");
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut parser = SseParser::new();
        let frames = parser.push(
            b"event: status\ndata: {\"status\": \"a\"}\n\nevent: status\ndata: {\"status\": \"b\"}\n\n",
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data, "{\"status\": \"b\"}");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let frames = parser.push(b"event: complete\ndata: line1\ndata: line2\n\n");
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = SseParser::new();
        let frames = parser.push(b"event: status\r\ndata: x\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "status");
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_blank_lines_without_fields_emit_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"\n\n\n").is_empty());
        assert!(parser.push(b": keepalive comment\n\n").is_empty());
    }
}
