//! Incremental `text/event-stream` decoder.
//!
//! Used on both ends of a stream: reading OpenAI's streamed completions and
//! reading our own content endpoint from the client. Only `data:` fields are
//! surfaced; comment lines (keep-alives) and other fields are dropped.

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed raw bytes; returns the data payload of every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(event) = self.line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_events_across_chunk_boundaries() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: {\"type\":\"pas").is_empty());
        let out = d.push(b"sage_start\"}\n\ndata: [DONE]\n\n");
        assert_eq!(out, vec!["{\"type\":\"passage_start\"}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut d = SseDecoder::default();
        let out = d.push(b": keep-alive\n\nevent: message\nid: 7\ndata: x\n\n");
        assert_eq!(out, vec!["x".to_string()]);
    }

    #[test]
    fn joins_multi_line_data_and_handles_crlf() {
        let mut d = SseDecoder::default();
        let out = d.push(b"data: a\r\ndata:b\r\n\r\n");
        assert_eq!(out, vec!["a\nb".to_string()]);
    }

    #[test]
    fn multibyte_text_split_mid_character() {
        let mut d = SseDecoder::default();
        let bytes = "data: Größe\n\n".as_bytes();
        let (a, b) = bytes.split_at(9);
        assert!(d.push(a).is_empty());
        assert_eq!(d.push(b), vec!["Größe".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: tail").is_empty());
        assert_eq!(d.finish(), Some("tail".to_string()));
        assert_eq!(d.finish(), None);
    }
}
