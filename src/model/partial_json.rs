//! Tolerant parsing of JSON text that is still being written.
//!
//! `parse_partial` turns a prefix such as `{"title": "Rising Se` into the
//! value it would be if the writer stopped right there (`{"title": "Rising Se"}`).
//! When the prefix ends somewhere that cannot be closed directly (inside a key,
//! after a colon, mid-literal) the text is cut back to the last position where
//! it can be, so the result never contains half a key.

use serde_json::Value;

use crate::error::ModelError;

pub fn parse_partial(text: &str) -> Option<Value> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let text = &text[start..];
    if let Ok(v) = serde_json::from_str(text) {
        return Some(v);
    }

    let bytes = text.as_bytes();
    let mut closers: Vec<u8> = Vec::new();
    // (cut index, closers needed after cutting there)
    let mut cuts: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut in_string = false;
    let mut pending_escape: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => {
                    let len = if bytes.get(i + 1) == Some(&b'u') { 6 } else { 2 };
                    if i + len > bytes.len() {
                        pending_escape = Some(i);
                        break;
                    }
                    i += len;
                    continue;
                }
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' | b'[' => {
                    closers.push(if b == b'{' { b'}' } else { b']' });
                    cuts.push((i + 1, closers.clone()));
                }
                b'}' | b']' => {
                    closers.pop();
                    if closers.is_empty() {
                        // Top-level value done; anything after it is noise.
                        return serde_json::from_str(&text[..=i]).ok();
                    }
                }
                b',' => cuts.push((i, closers.clone())),
                _ => {}
            }
        }
        i += 1;
    }

    let head = match pending_escape {
        Some(p) => &text[..p],
        None => text,
    };
    let mut candidate = head.to_string();
    if in_string {
        candidate.push('"');
    }
    if let Some(v) = close_and_parse(candidate, &closers) {
        return Some(v);
    }

    cuts.iter()
        .rev()
        .find_map(|(at, closers)| close_and_parse(text[..*at].to_string(), closers))
}

fn close_and_parse(mut candidate: String, closers: &[u8]) -> Option<Value> {
    for c in closers.iter().rev() {
        candidate.push(char::from(*c));
    }
    serde_json::from_str(&candidate).ok()
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Accumulates streamed text and reports each new distinct partial value.
#[derive(Debug, Default)]
pub struct PartialTracker {
    buffer: String,
    last: Option<Value>,
}

impl PartialTracker {
    pub fn push(&mut self, delta: &str) -> Option<Value> {
        self.buffer.push_str(delta);
        let value = parse_partial(&self.buffer)?;
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        self.last = Some(value.clone());
        Some(value)
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Strict parse of everything received.
    pub fn finish(&self) -> Result<Value, ModelError> {
        let body = strip_code_fence(&self.buffer);
        if body.is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(serde_json::from_str(body)?)
    }
}
