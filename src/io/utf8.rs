//! Incremental UTF-8 decoding of byte-chunk readables.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, ErrorKind, Result};
use crate::stream::{Iteration, Readable};
use crate::tracing_compat::trace;

/// Charset reported by [`Utf8Decoder`].
pub const UTF_8: &str = "utf-8";

/// Decodes a readable of byte chunks into a readable of strings.
pub fn decode_utf8<S>(source: S) -> Utf8Decoder<S>
where
    S: Readable,
    S::Item: AsRef<[u8]>,
{
    Utf8Decoder::new(source)
}

/// Readable for [`decode_utf8`].
///
/// A multi-byte sequence split across chunk boundaries is held back until
/// the rest arrives, so every emitted string is complete. Chunks that
/// complete no character produce no output. Each emitted string keeps the
/// index of the chunk that completed it.
#[must_use = "readables do nothing unless polled"]
pub struct Utf8Decoder<S> {
    source: S,
    pending: Vec<u8>,
    finished: bool,
}

impl<S> Utf8Decoder<S> {
    /// Wraps a byte-chunk readable.
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: Vec::new(),
            finished: false,
        }
    }

    /// Bytes of an incomplete sequence waiting for the next chunk.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn invalid(&mut self, detail: &str) -> Error {
        self.finished = true;
        self.pending.clear();
        Error::new(ErrorKind::InvalidData).with_message(detail.to_string())
    }

    /// Appends `chunk` and splits off the longest valid prefix.
    fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(chunk);
        let checked = std::str::from_utf8(&self.pending).map(|_| ());
        match checked {
            Ok(_) => {
                let bytes = std::mem::take(&mut self.pending);
                String::from_utf8(bytes).map_err(|_| self.invalid("invalid UTF-8 sequence"))
            }
            Err(e) if e.error_len().is_none() => {
                let tail = self.pending.split_off(e.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                String::from_utf8(head).map_err(|_| self.invalid("invalid UTF-8 sequence"))
            }
            Err(e) => {
                let detail = format!("invalid UTF-8 sequence at byte {}", e.valid_up_to());
                Err(self.invalid(&detail))
            }
        }
    }
}

impl<S> Readable for Utf8Decoder<S>
where
    S: Readable + Unpin,
    S::Item: AsRef<[u8]>,
{
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Iteration<String>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(Ok(Iteration::done()));
        }
        loop {
            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Ok(Iteration::Next { value, index })) => {
                    let text = match this.decode(value.as_ref()) {
                        Ok(text) => text,
                        Err(e) => return Poll::Ready(Err(e)),
                    };
                    if text.is_empty() {
                        trace!(pending = this.pending.len(), "utf-8 decoder waiting for more");
                        continue;
                    }
                    return Poll::Ready(Ok(Iteration::Next { value: text, index }));
                }
                Poll::Ready(Ok(Iteration::Done(value))) => {
                    if let Some(value) = value {
                        this.pending.extend_from_slice(value.as_ref());
                    }
                    if this.pending.is_empty() {
                        this.finished = true;
                        return Poll::Ready(Ok(Iteration::done()));
                    }
                    let rest = std::mem::take(&mut this.pending);
                    this.finished = true;
                    return Poll::Ready(match String::from_utf8(rest) {
                        Ok(text) => Ok(Iteration::done_with(text)),
                        Err(_) => Err(Error::new(ErrorKind::InvalidData)
                            .with_message("input ended inside a UTF-8 sequence")),
                    });
                }
                Poll::Ready(Err(e)) => {
                    this.finished = true;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn charset(&self) -> Option<&str> {
        Some(UTF_8)
    }
}

impl<S: fmt::Debug> fmt::Debug for Utf8Decoder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utf8Decoder")
            .field("source", &self.source)
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ReadableExt, Reader};
    use crate::test_utils::{block_on, init_test};

    #[test]
    fn joins_sequences_split_across_chunks() {
        init_test("joins_sequences_split_across_chunks");
        let bytes = "añb€".as_bytes();
        // Split inside both the two-byte 'ñ' and the three-byte '€'.
        let chunks = vec![
            bytes[..2].to_vec(),
            bytes[2..5].to_vec(),
            bytes[5..6].to_vec(),
            bytes[6..].to_vec(),
        ];
        let decoded = block_on(decode_utf8(Reader::from_vec(chunks)).all(0)).expect("decode");
        let parts: Vec<String> = decoded.into_iter().flatten().collect();
        crate::assert_with_log!(parts.concat() == "añb€", "decoded text", "añb€", parts.concat());
        crate::test_complete!("joins_sequences_split_across_chunks");
    }

    #[test]
    fn reports_utf8_charset_and_joins_as_text() {
        init_test("reports_utf8_charset_and_joins_as_text");
        let decoder = decode_utf8(Reader::from_vec(vec![b"ab".to_vec(), b"cd".to_vec()]));
        assert_eq!(decoder.charset(), Some(UTF_8));
        let joined = block_on(decoder.join("-")).expect("join");
        assert_eq!(joined.as_text(), Some("ab-cd"));
        crate::test_complete!("reports_utf8_charset_and_joins_as_text");
    }

    #[test]
    fn rejects_invalid_bytes() {
        init_test("rejects_invalid_bytes");
        let mut decoder = decode_utf8(Reader::from_vec(vec![vec![b'o', b'k', 0xff]]));
        let err = block_on(decoder.next()).expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(block_on(decoder.next()).expect("done").is_done());
        crate::test_complete!("rejects_invalid_bytes");
    }

    #[test]
    fn truncated_sequence_at_end_fails() {
        init_test("truncated_sequence_at_end_fails");
        let euro = "€".as_bytes();
        let mut decoder = decode_utf8(Reader::from_vec(vec![euro[..2].to_vec()]));
        let err = block_on(decoder.next()).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        crate::test_complete!("truncated_sequence_at_end_fails");
    }
}
