//! Readable over a blocking [`std::io::Read`].

use std::fmt;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};

use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::stream::{Iteration, Readable};
use crate::tracing_compat::{debug, trace};

/// Reads a [`Read`] implementation as a sequence of [`Bytes`] chunks.
///
/// Each poll performs one read of at most `chunk_size` bytes. End of input
/// terminates the sequence; an I/O failure is reported once and the reader
/// stays done afterwards. `Interrupted` reads are retried.
///
/// Chunks carry no index.
///
/// # Example
///
/// ```ignore
/// use sluice::io::ChunkReader;
/// use sluice::ReadableExt;
///
/// let file = std::fs::File::open("notes.txt")?;
/// let text = ChunkReader::new(file).with_charset("utf-8").read().await?;
/// ```
#[must_use = "readables do nothing unless polled"]
pub struct ChunkReader<R> {
    inner: R,
    chunk_size: usize,
    charset: Option<String>,
    read: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Creates a reader using the chunk size from [`StreamConfig::default`].
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, &StreamConfig::default())
    }

    /// Creates a reader using the chunk size from `config`.
    pub fn with_config(inner: R, config: &StreamConfig) -> Self {
        Self::with_chunk_size(inner, config.chunk_size)
    }

    /// Creates a reader producing chunks of at most `chunk_size` bytes.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
            charset: None,
            read: 0,
            done: false,
        }
    }

    /// Tags the chunks as text in the given charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Total bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    /// Consumes the adapter, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_chunk(&mut self) -> io::Result<Bytes> {
        let mut buf = BytesMut::zeroed(self.chunk_size);
        loop {
            match self.inner.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf.freeze());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: Read + Unpin> Readable for ChunkReader<R> {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<Iteration<Bytes>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(Ok(Iteration::done()));
        }
        match this.read_chunk() {
            Ok(chunk) if chunk.is_empty() => {
                this.done = true;
                debug!(bytes = this.read, "chunk reader reached end of input");
                Poll::Ready(Ok(Iteration::done()))
            }
            Ok(chunk) => {
                this.read += chunk.len() as u64;
                trace!(len = chunk.len(), "chunk reader read");
                Poll::Ready(Ok(Iteration::value(chunk)))
            }
            Err(e) => {
                this.done = true;
                Poll::Ready(Err(Error::from(e)))
            }
        }
    }

    fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }
}

impl<R> fmt::Debug for ChunkReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkReader")
            .field("chunk_size", &self.chunk_size)
            .field("charset", &self.charset)
            .field("read", &self.read)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stream::{Joined, ReadableExt};
    use crate::test_utils::{block_on, init_test};

    /// Fails with `Interrupted` once, then yields the data, then a hard error.
    struct Flaky {
        data: &'static [u8],
        interrupted: bool,
        served: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "again"));
            }
            if !self.served {
                self.served = true;
                let n = self.data.len().min(buf.len());
                buf[..n].copy_from_slice(&self.data[..n]);
                return Ok(n);
            }
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn splits_into_chunks() {
        init_test("splits_into_chunks");
        let mut reader = ChunkReader::with_chunk_size(&b"abcdefg"[..], 3);
        let mut chunks = Vec::new();
        loop {
            match block_on(reader.next()).expect("read") {
                Iteration::Next { value, index } => {
                    assert!(index.is_none());
                    chunks.push(value);
                }
                Iteration::Done(_) => break,
            }
        }
        crate::assert_with_log!(chunks.len() == 3, "chunk count", 3usize, chunks.len());
        assert_eq!(chunks[2], Bytes::from_static(b"g"));
        assert_eq!(reader.bytes_read(), 7);
        assert!(block_on(reader.next()).expect("done").is_done());
        crate::test_complete!("splits_into_chunks");
    }

    #[test]
    fn config_sets_chunk_size() {
        init_test("config_sets_chunk_size");
        let config = StreamConfig {
            chunk_size: 2,
            ..StreamConfig::default()
        };
        let reader = ChunkReader::with_config(&b"abcd"[..], &config);
        let all = block_on(reader.all(0)).expect("collect");
        assert_eq!(all.len(), 2);
        crate::test_complete!("config_sets_chunk_size");
    }

    #[test]
    fn charset_tagged_input_reads_as_text() {
        init_test("charset_tagged_input_reads_as_text");
        let reader = ChunkReader::with_chunk_size("héllo wörld".as_bytes(), 4).with_charset("utf-8");
        let joined = block_on(reader.read()).expect("read");
        assert_eq!(joined, Joined::Text("héllo wörld".to_string()));
        crate::test_complete!("charset_tagged_input_reads_as_text");
    }

    #[test]
    fn retries_interrupted_then_reports_failure() {
        init_test("retries_interrupted_then_reports_failure");
        let mut reader = ChunkReader::new(Flaky {
            data: b"payload",
            interrupted: false,
            served: false,
        });
        let first = block_on(reader.next()).expect("interrupted is retried");
        assert_eq!(first, Iteration::value(Bytes::from_static(b"payload")));
        let err = block_on(reader.next()).expect_err("broken pipe");
        crate::assert_with_log!(err.kind() == ErrorKind::Io, "io kind", ErrorKind::Io, err.kind());
        assert!(block_on(reader.next()).expect("stays done").is_done());
        crate::test_complete!("retries_interrupted_then_reports_failure");
    }
}
