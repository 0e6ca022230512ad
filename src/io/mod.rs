//! Adapters between `std::io` and readables of byte chunks.
//!
//! - [`ChunkReader`]: a [`Read`](std::io::Read) as a readable of
//!   [`Bytes`](bytes::Bytes) chunks
//! - [`Utf8Decoder`]: byte chunks to text, safe across chunk boundaries
//! - [`WriteSink`]: a [`Write`](std::io::Write) as a [`Sink`](crate::Sink)
//!   target for [`copy`](crate::ReadableExt::copy)
//!
//! The wrapped readers and writers are blocking; each poll performs at most
//! one read or write call.

mod chunk_reader;
mod utf8;
mod write_sink;

pub use chunk_reader::ChunkReader;
pub use utf8::{decode_utf8, Utf8Decoder, UTF_8};
pub use write_sink::WriteSink;
