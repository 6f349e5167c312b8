use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    /// A line of the stream is not valid UTF-8.
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
///
/// Lines end with `\n` or `\r\n`. Comment lines and fields other than
/// `data` are skipped, and an event carrying several `data` lines yields
/// them joined by `\n`. Bytes are buffered until a whole line is
/// available, so multi-byte characters may straddle chunk boundaries.
pub struct Sse {
    buf: Vec<u8>,
    data: Option<String>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            data: None,
            chunks,
        }
    }

    /// Returns the next event's data, or `None` when the stream ends.
    ///
    /// An event left unterminated at the end of the stream is dropped.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            while let Some(line) = self.take_line()? {
                if line.is_empty() {
                    // Events without any `data` line are not dispatched.
                    if let Some(data) = self.data.take() {
                        return Ok(Some(data));
                    }
                    continue;
                }
                self.process_line(&line);
            }

            let chunk =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?;
            let Some(chunk) = chunk else {
                return Ok(None);
            };
            self.buf.extend_from_slice(&chunk);
        }
    }

    fn take_line(&mut self) -> Result<Option<String>, Error> {
        let Some(eol_idx) = self.buf.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let mut line: Vec<u8> = self.buf.drain(..=eol_idx).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line)
            .map(Some)
            .map_err(|_| Error::InvalidPayload)
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            trace!("sse comment: {line}");
            return;
        }
        let (name, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        if name != "data" {
            trace!("ignoring sse field `{name}`");
            return;
        }
        match &mut self.data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        let chunks = chunks.iter().copied().map(Bytes::from_static);
        Sse::new(Chunks::from_vec_deque(chunks.collect()))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&[b"data: hello\n\n", b"data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_across_chunks() {
        let mut sse = sse_from(&[b"data:", b" hello\n", b"\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);

        // "75°F" with the degree sign split between two chunks.
        let mut sse = sse_from(&[b"data: 75\xc2", b"\xb0F\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "75°F");
    }

    #[tokio::test]
    async fn test_data_with_colons() {
        let mut sse = sse_from(&[
            b"data: {\"arguments\": \"{\\\"location\\\": \\\"Paris\\\"}\"}\n\n",
        ]);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            r#"{"arguments": "{\"location\": \"Paris\"}"}"#
        );
    }

    #[tokio::test]
    async fn test_comments_and_other_fields() {
        let mut sse = sse_from(&[
            b": keep-alive\r\n\r\n",
            b"event: message\r\nid: 7\r\ndata: first\r\ndata: second\r\n\r\n",
            b"data: [DONE]\n\n",
        ]);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            "first\nsecond"
        );
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "[DONE]");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_from(&[b"data: \xff\xfe\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        // Lines without a `data` field never produce an event.
        let mut sse = sse_from(&[b"xxxxxx\n\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        // Unterminated events are dropped at the end of the stream.
        let mut sse = sse_from(&[b"data: hello\n", b"data: bye\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
