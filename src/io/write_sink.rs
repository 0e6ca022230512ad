//! Sink over a blocking [`std::io::Write`].

use std::future::{ready, Ready};
use std::io::Write;

use crate::error::{Error, Result, ResultExt};
use crate::stream::Sink;
use crate::tracing_compat::{debug, trace};

/// Writes byte-like values into a [`Write`] implementation.
///
/// Every write completes before its acknowledgement is returned, so the
/// acknowledgement is always ready. [`close`](Sink::close) flushes;
/// [`abort`](Sink::abort) flushes what was written and marks the sink closed
/// without reporting the producer's failure a second time.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
    written: u64,
    closed: bool,
}

impl<W: Write> WriteSink<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            closed: false,
        }
    }

    /// Total bytes written.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Whether the sink has been closed or aborted.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consumes the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::stream_closed());
        }
        self.inner.write_all(bytes).context("writing chunk")?;
        self.written += bytes.len() as u64;
        trace!(len = bytes.len(), total = self.written, "write sink wrote");
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::stream_closed());
        }
        self.closed = true;
        self.inner.flush().context("flushing sink")?;
        debug!(total = self.written, "write sink closed");
        Ok(())
    }
}

impl<T: AsRef<[u8]>, W: Write> Sink<T> for WriteSink<W> {
    type Ack = Ready<Result<()>>;

    fn write(&mut self, value: T) -> Self::Ack {
        ready(self.write_bytes(value.as_ref()))
    }

    fn close(&mut self) -> Self::Ack {
        ready(self.finish())
    }

    fn abort(&mut self, error: Error) -> Self::Ack {
        debug!(error = %error, "write sink aborted");
        drop(error);
        ready(self.finish())
    }
}
