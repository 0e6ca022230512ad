//! Adapters that turn ordinary producers into a [`Readable`].
//!
//! | Producer                          | Constructor              | Index          |
//! |-----------------------------------|--------------------------|----------------|
//! | `Vec<T>`                          | [`Reader::from_vec`]     | position       |
//! | `Vec<Option<T>>` with holes       | [`Reader::from_sparse`]  | position       |
//! | any `IntoIterator`                | [`Reader::from_iterator`]| none           |
//! | push-style `for_each(write)`      | [`Reader::from_push`]    | as written     |
//! | another [`Readable`]              | [`Reader::from_readable`]| as produced    |

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::buffer_stream::{buffer_stream, BufferStream};
use super::{Iteration, Readable};
use crate::error::Result;

enum Source<T> {
    Indexed {
        items: std::vec::IntoIter<T>,
        next: usize,
    },
    Sparse(std::iter::Enumerate<std::vec::IntoIter<Option<T>>>),
    Iter(Box<dyn Iterator<Item = T> + Send>),
    Buffered(BufferStream<T>),
    Dyn(Pin<Box<dyn Readable<Item = T> + Send>>),
}

/// A [`Readable`] over an in-memory or push-style producer.
#[must_use = "readables do nothing unless polled"]
pub struct Reader<T> {
    source: Source<T>,
    charset: Option<String>,
}

impl<T> Reader<T> {
    fn with_source(source: Source<T>) -> Self {
        Self {
            source,
            charset: None,
        }
    }

    /// Reads a vector in order; each element's index is its position.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self::with_source(Source::Indexed {
            items: items.into_iter(),
            next: 0,
        })
    }

    /// Reads a vector with holes: `None` positions are skipped and the
    /// remaining elements keep their positions as indices.
    pub fn from_sparse(items: Vec<Option<T>>) -> Self {
        Self::with_source(Source::Sparse(items.into_iter().enumerate()))
    }

    /// Reads any iterator; elements carry no index.
    pub fn from_iterator<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::with_source(Source::Iter(Box::new(iter.into_iter())))
    }

    /// Adapts a push-style producer.
    ///
    /// `push` is called once with a writer accepting `(value, index)`; an
    /// index of `None` takes the next automatic position. The stream ends
    /// when `push` returns, with the returned error if it fails.
    pub fn from_push<F>(push: F) -> Self
    where
        F: FnOnce(&mut dyn FnMut(T, Option<usize>)) -> Result<()>,
    {
        let (writer, reader) = buffer_stream();
        let mut write = |value: T, index: Option<usize>| {
            let _ack = match index {
                Some(index) => writer.push_value_at(value, index),
                None => writer.push_value(value),
            };
        };
        let _ack = match push(&mut write) {
            Ok(()) => writer.push_end(None),
            Err(e) => writer.push_error(e),
        };
        Self::with_source(Source::Buffered(reader))
    }

    /// Wraps another readable.
    pub fn from_readable<R>(readable: R) -> Self
    where
        R: Readable<Item = T> + Send + 'static,
    {
        let charset = readable.charset().map(str::to_string);
        Self {
            source: Source::Dyn(Box::pin(readable)),
            charset,
        }
    }

    /// Tags the produced chunks as text in the given charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }
}

impl<T> Unpin for Reader<T> {}

impl<T> Readable for Reader<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Iteration<T>>> {
        let this = self.get_mut();
        match &mut this.source {
            Source::Indexed { items, next } => Poll::Ready(Ok(match items.next() {
                Some(value) => {
                    let index = *next;
                    *next += 1;
                    Iteration::indexed(value, index)
                }
                None => Iteration::done(),
            })),
            Source::Sparse(items) => Poll::Ready(Ok(items
                .find_map(|(index, slot)| slot.map(|value| Iteration::indexed(value, index)))
                .unwrap_or_else(Iteration::done))),
            Source::Iter(items) => Poll::Ready(Ok(items
                .next()
                .map_or_else(Iteration::done, Iteration::value))),
            Source::Buffered(stream) => Pin::new(stream).poll_next(cx),
            Source::Dyn(readable) => readable.as_mut().poll_next(cx),
        }
    }

    fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }
}

impl<T> From<Vec<T>> for Reader<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> FromIterator<T> for Reader<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.source {
            Source::Indexed { .. } => "vec",
            Source::Sparse(_) => "sparse",
            Source::Iter(_) => "iterator",
            Source::Buffered(_) => "push",
            Source::Dyn(_) => "readable",
        };
        f.debug_struct("Reader")
            .field("source", &kind)
            .field("charset", &self.charset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stream::ReadableExt;
    use crate::test_utils::{block_on, init_test};

    fn drain<R: Readable + Unpin>(mut readable: R) -> Vec<Iteration<R::Item>> {
        let mut out = Vec::new();
        loop {
            let item = block_on(readable.next()).expect("no error");
            let done = item.is_done();
            out.push(item);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn vec_positions_become_indices() {
        init_test("vec_positions_become_indices");
        let items = drain(Reader::from(vec!["one", "two"]));
        assert_eq!(
            items,
            vec![
                Iteration::indexed("one", 0),
                Iteration::indexed("two", 1),
                Iteration::done()
            ]
        );
        crate::test_complete!("vec_positions_become_indices");
    }

    #[test]
    fn sparse_skips_holes() {
        init_test("sparse_skips_holes");
        let items = drain(Reader::from_sparse(vec![Some(1), None, Some(2), None, Some(3)]));
        let indices: Vec<_> = items.iter().filter_map(Iteration::index).collect();
        crate::assert_with_log!(indices == vec![0, 2, 4], "indices", vec![0, 2, 4], indices);
        crate::test_complete!("sparse_skips_holes");
    }

    #[test]
    fn iterator_has_no_index() {
        init_test("iterator_has_no_index");
        let items = drain(Reader::from_iterator(0..3));
        assert_eq!(
            items,
            vec![
                Iteration::value(0),
                Iteration::value(1),
                Iteration::value(2),
                Iteration::done()
            ]
        );
        crate::test_complete!("iterator_has_no_index");
    }

    #[test]
    fn push_source_closes_when_done() {
        init_test("push_source_closes_when_done");
        let reader = Reader::from_push(|write| {
            write("a", None);
            write("c", Some(2));
            Ok(())
        });
        let items = drain(reader);
        assert_eq!(
            items,
            vec![
                Iteration::indexed("a", 0),
                Iteration::indexed("c", 2),
                Iteration::done()
            ]
        );
        crate::test_complete!("push_source_closes_when_done");
    }

    #[test]
    fn push_source_failure_terminates() {
        init_test("push_source_failure_terminates");
        let mut reader = Reader::from_push(|write| {
            write(1, None);
            Err(Error::msg("producer failed"))
        });
        assert!(block_on(reader.next()).is_ok());
        let err = block_on(reader.next()).expect_err("failure");
        assert_eq!(err.message(), Some("producer failed"));
        crate::test_complete!("push_source_failure_terminates");
    }

    #[test]
    fn wraps_other_readables_and_collects() {
        init_test("wraps_other_readables_and_collects");
        let inner = Reader::from_vec(vec![1, 2]).with_charset("ascii");
        let outer = Reader::from_readable(inner);
        assert_eq!(outer.charset(), Some("ascii"));
        let total = block_on(outer.reduce(
            |a: i32, b, _| std::future::ready(Ok(a + b)),
            None,
            1,
        ));
        assert_eq!(total.expect("sum"), 3);

        let collected: Reader<u8> = (1..=3).collect();
        assert_eq!(drain(collected).len(), 4);
        crate::test_complete!("wraps_other_readables_and_collects");
    }
}
