use crate::events::StreamEvent;
use crate::interpret::interpret_payload;

/// Literal payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Payload candidates drained from one `feed` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBatch {
    pub payloads: Vec<String>,
    /// Set once the sentinel is seen; nothing after it is decoded.
    pub done: bool,
}

/// Incremental line splitter for event-stream bodies.
///
/// Bytes are buffered until a newline arrives, so neither a frame nor a
/// multi-byte character is ever split by a chunk boundary.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    /// Feed arbitrary bytes and drain every complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> FrameBatch {
        let mut batch = FrameBatch {
            payloads: Vec::new(),
            done: self.done,
        };
        if self.done {
            return batch;
        }

        self.buffer.extend_from_slice(bytes);
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if self.push_line(&line, &mut batch) {
                break;
            }
        }

        batch
    }

    /// Flush a trailing unterminated line once the body has closed.
    pub fn finish(&mut self) -> FrameBatch {
        let mut batch = FrameBatch {
            payloads: Vec::new(),
            done: self.done,
        };
        if !self.done {
            let line = std::mem::take(&mut self.buffer);
            self.push_line(&line, &mut batch);
            self.mark_done(&mut batch);
        }
        batch
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    /// Returns true when the sentinel ended the stream.
    fn push_line(&mut self, raw: &[u8], batch: &mut FrameBatch) -> bool {
        let line = String::from_utf8_lossy(raw);
        let Some(payload) = extract_payload(&line) else {
            return false;
        };

        if payload == DONE_SENTINEL {
            self.mark_done(batch);
            return true;
        }

        batch.payloads.push(payload.to_owned());
        false
    }

    fn mark_done(&mut self, batch: &mut FrameBatch) {
        self.done = true;
        self.buffer.clear();
        batch.done = true;
    }
}

/// Strips keep-alives and every repeated `data:` marker from one line.
fn extract_payload(line: &str) -> Option<&str> {
    let mut payload = line.trim();
    if payload.is_empty() || payload.starts_with(':') {
        return None;
    }

    // Some upstream proxies double-prefix lines (`data: data: {...}`).
    while let Some(rest) = payload.strip_prefix(DATA_PREFIX) {
        payload = rest.trim_start();
    }

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Events drained from one `feed` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub events: Vec<StreamEvent>,
    pub done: bool,
}

/// Frame decoder chained with the payload interpreter.
///
/// When the stream terminates, the batch ends with exactly one
/// [`StreamEvent::Done`].
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    frames: FrameDecoder,
    done_emitted: bool,
}

impl EventStreamDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> DecodedBatch {
        let frames = self.frames.feed(bytes);
        self.interpret(frames)
    }

    pub fn finish(&mut self) -> DecodedBatch {
        let frames = self.frames.finish();
        self.interpret(frames)
    }

    /// Decode a complete body in one shot.
    pub fn decode_all(input: &[u8]) -> Vec<StreamEvent> {
        let mut decoder = Self::default();
        let mut events = decoder.feed(input).events;
        events.extend(decoder.finish().events);
        events
    }

    fn interpret(&mut self, frames: FrameBatch) -> DecodedBatch {
        let mut events: Vec<StreamEvent> = frames
            .payloads
            .iter()
            .flat_map(|payload| interpret_payload(payload))
            .collect();

        if frames.done && !self.done_emitted {
            self.done_emitted = true;
            events.push(StreamEvent::Done);
        }

        DecodedBatch {
            events,
            done: frames.done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_payload, FrameDecoder};

    #[test]
    fn feed_retains_partial_line_until_newline() {
        let mut decoder = FrameDecoder::default();

        let first = decoder.feed(b"data: {\"a\":");
        assert!(first.payloads.is_empty());
        assert!(!decoder.is_empty_buffer());

        let second = decoder.feed(b"1}\n");
        assert_eq!(second.payloads, vec!["{\"a\":1}".to_string()]);
        assert!(decoder.is_empty_buffer());
    }

    #[test]
    fn extract_payload_strips_repeated_markers() {
        assert_eq!(extract_payload("data: data: {}"), Some("{}"));
        assert_eq!(extract_payload("data:data:{}"), Some("{}"));
        assert_eq!(extract_payload("  data: {}  "), Some("{}"));
    }

    #[test]
    fn extract_payload_discards_keep_alives() {
        assert_eq!(extract_payload(""), None);
        assert_eq!(extract_payload("   "), None);
        assert_eq!(extract_payload(": ping"), None);
        assert_eq!(extract_payload("data:"), None);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.feed(b"data: {\"x\":true}").payloads.is_empty());

        let batch = decoder.finish();
        assert_eq!(batch.payloads, vec!["{\"x\":true}".to_string()]);
        assert!(batch.done);
    }

    #[test]
    fn feed_after_done_yields_nothing() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.feed(b"data: [DONE]\n").done);

        let batch = decoder.feed(b"data: {\"late\":1}\n");
        assert!(batch.payloads.is_empty());
        assert!(batch.done);
    }
}
