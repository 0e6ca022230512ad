//! Read / join: drain a stream of chunks into one value.
//!
//! The source's [`charset`](super::Readable::charset) decides the shape of
//! the result: a charset-tagged stream joins into text, anything else joins
//! into bytes. Text is decoded as UTF-8.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};

use super::{Iteration, Readable};
use crate::error::{Error, ErrorKind, Result};
use crate::tracing_compat::debug;

/// Result of [`read`](super::ReadableExt::read) and
/// [`join`](super::ReadableExt::join).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Joined {
    /// Chunks of a charset-tagged stream, concatenated as text.
    Text(String),
    /// Chunks of an untagged stream, concatenated byte for byte.
    Bytes(Bytes),
}

impl Joined {
    /// Returns the text, if this is a text result.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    /// Returns the raw bytes of either form.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Converts into bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Converts into text, decoding bytes as UTF-8.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Bytes(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
                Error::new(ErrorKind::InvalidData)
                    .with_message("joined bytes are not valid UTF-8")
                    .with_source(e)
            }),
        }
    }
}

/// Future for the [`read`](super::ReadableExt::read) and
/// [`join`](super::ReadableExt::join) methods.
#[must_use = "futures do nothing unless polled"]
pub struct Join<S: Readable> {
    source: S,
    chunks: Vec<S::Item>,
    delimiter: Option<String>,
    completed: bool,
}

impl<S: Readable> Join<S> {
    pub(crate) fn new(source: S, delimiter: Option<String>) -> Self {
        Self {
            source,
            chunks: Vec::new(),
            delimiter,
            completed: false,
        }
    }
}

impl<S: Readable + Unpin> Unpin for Join<S> {}

fn concat<T: AsRef<[u8]>>(chunks: &[T], delimiter: &[u8]) -> BytesMut {
    let len = chunks.iter().map(|c| c.as_ref().len()).sum::<usize>()
        + delimiter.len() * chunks.len().saturating_sub(1);
    let mut out = BytesMut::with_capacity(len);
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(delimiter);
        }
        out.extend_from_slice(chunk.as_ref());
    }
    out
}

impl<S> Future for Join<S>
where
    S: Readable + Unpin,
    S::Item: AsRef<[u8]>,
{
    type Output = Result<Joined>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.completed {
            return Poll::Ready(Err(Error::internal("join polled after completion")));
        }
        loop {
            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Ok(Iteration::Next { value, .. })) => this.chunks.push(value),
                Poll::Ready(Ok(Iteration::Done(_))) => break,
                Poll::Ready(Err(e)) => {
                    this.completed = true;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        this.completed = true;
        let chunks = std::mem::take(&mut this.chunks);
        let delimiter = this.delimiter.as_deref().unwrap_or("").as_bytes();
        let joined = concat(&chunks, delimiter);
        debug!(chunks = chunks.len(), bytes = joined.len(), "join completed");

        if this.source.charset().is_some() {
            let text = String::from_utf8(joined.to_vec()).map_err(|e| {
                Error::new(ErrorKind::InvalidData)
                    .with_message("text chunks are not valid UTF-8")
                    .with_source(e)
            });
            return Poll::Ready(text.map(Joined::Text));
        }
        Poll::Ready(Ok(Joined::Bytes(joined.freeze())))
    }
}

impl<S: Readable + fmt::Debug> fmt::Debug for Join<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("source", &self.source)
            .field("chunks", &self.chunks.len())
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{buffer_stream, ReadableExt, Reader};
    use crate::test_utils::{block_on, init_test};

    #[test]
    fn binary_chunks_concatenate() {
        init_test("binary_chunks_concatenate");
        let chunks = vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")];
        let joined = block_on(Reader::from_vec(chunks.clone()).read()).expect("read");
        crate::assert_with_log!(
            joined == Joined::Bytes(Bytes::from_static(b"abcd")),
            "concatenated",
            "abcd",
            joined
        );

        let joined = block_on(Reader::from_vec(chunks).join(",")).expect("join");
        assert_eq!(joined.as_bytes(), b"ab,cd");
        crate::test_complete!("binary_chunks_concatenate");
    }

    #[test]
    fn charset_chunks_join_as_text() {
        init_test("charset_chunks_join_as_text");
        let joined = block_on(
            Reader::from_vec(vec!["ab".to_string(), "cd".to_string()])
                .with_charset("utf-8")
                .read(),
        )
        .expect("read");
        assert_eq!(joined.as_text(), Some("abcd"));

        let joined = block_on(
            Reader::from_vec(vec!["x", "y", "z"])
                .with_charset("utf-8")
                .join(", "),
        )
        .expect("join");
        assert_eq!(joined.into_text().expect("text"), "x, y, z");
        crate::test_complete!("charset_chunks_join_as_text");
    }

    #[test]
    fn invalid_text_is_rejected() {
        init_test("invalid_text_is_rejected");
        let err = block_on(
            Reader::from_vec(vec![vec![0xffu8, 0xfe]])
                .with_charset("utf-8")
                .read(),
        )
        .expect_err("invalid utf-8");
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        crate::test_complete!("invalid_text_is_rejected");
    }

    #[test]
    fn empty_and_failing_sources() {
        init_test("empty_and_failing_sources");
        let joined = block_on(Reader::<Vec<u8>>::from_vec(vec![]).join("-")).expect("empty");
        assert!(joined.as_bytes().is_empty());
        assert_eq!(joined.into_bytes(), Bytes::new());

        let (tx, rx) = buffer_stream::<Vec<u8>>();
        let _ = tx.push_value(b"partial".to_vec());
        let _ = tx.push_error(Error::msg("cut off"));
        let err = block_on(rx.read()).expect_err("source failed");
        assert_eq!(err.message(), Some("cut off"));
        crate::test_complete!("empty_and_failing_sources");
    }
}
