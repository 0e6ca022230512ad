//! One step of an asynchronous sequence.
//!
//! On the wire an iteration is the object `{ "value": .., "done": .., "index": .. }`:
//!
//! ```text
//! {"value": 7, "done": false, "index": 0}   one element at position 0
//! {"value": "x", "done": false}             one element, naturally ordered
//! {"value": 10, "done": true}               end of sequence, return value 10
//! {"done": true}                            end of sequence, no return value
//! ```
//!
//! Failure is not an iteration: it travels as the `Err` side of
//! `Result<Iteration<T>>`.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// One step of a sequence: an element or the end of the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iteration<T> {
    /// One available element.
    Next {
        /// The element.
        value: T,
        /// Stable position, when the source has one.
        index: Option<usize>,
    },
    /// Clean termination, carrying the sequence's optional return value.
    Done(Option<T>),
}

impl<T> Iteration<T> {
    /// An element without positional identity.
    #[must_use]
    pub const fn value(value: T) -> Self {
        Self::Next { value, index: None }
    }

    /// An element at a stable position.
    #[must_use]
    pub const fn indexed(value: T, index: usize) -> Self {
        Self::Next {
            value,
            index: Some(index),
        }
    }

    /// Termination without a return value.
    #[must_use]
    pub const fn done() -> Self {
        Self::Done(None)
    }

    /// Termination with a return value.
    #[must_use]
    pub const fn done_with(value: T) -> Self {
        Self::Done(Some(value))
    }

    /// Returns true for the terminal iteration.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Returns the element or return value, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Next { value, .. } => Some(value),
            Self::Done(value) => value.as_ref(),
        }
    }

    /// Returns the element index; always `None` for the terminal iteration.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Next { index, .. } => *index,
            Self::Done(_) => None,
        }
    }

    /// Consumes the iteration, returning the element or return value.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Next { value, .. } => Some(value),
            Self::Done(value) => value,
        }
    }

    /// Transforms the carried value, keeping index and termination.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Iteration<U> {
        match self {
            Self::Next { value, index } => Iteration::Next {
                value: f(value),
                index,
            },
            Self::Done(value) => Iteration::Done(value.map(f)),
        }
    }
}

impl<T: Serialize> Serialize for Iteration<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Iteration", 3)?;
        match self {
            Self::Next { value, index } => {
                state.serialize_field("value", value)?;
                state.serialize_field("done", &false)?;
                match index {
                    Some(index) => state.serialize_field("index", index)?,
                    None => state.skip_field("index")?,
                }
            }
            Self::Done(value) => {
                match value {
                    Some(value) => state.serialize_field("value", value)?,
                    None => state.skip_field("value")?,
                }
                state.serialize_field("done", &true)?;
                state.skip_field("index")?;
            }
        }
        state.end()
    }
}

#[derive(serde::Deserialize)]
#[serde(rename = "Iteration")]
struct IterationRepr<T> {
    #[serde(default = "Option::default")]
    value: Option<T>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    index: Option<usize>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Iteration<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = IterationRepr::<T>::deserialize(deserializer)?;
        if repr.done {
            return Ok(Self::Done(repr.value));
        }
        match repr.value {
            Some(value) => Ok(Self::Next {
                value,
                index: repr.index,
            }),
            None => Err(de::Error::custom(
                "non-terminal iteration requires a value",
            )),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Iteration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next {
                value,
                index: Some(index),
            } => write!(f, "[{index}] {value}"),
            Self::Next { value, index: None } => write!(f, "{value}"),
            Self::Done(Some(value)) => write!(f, "done({value})"),
            Self::Done(None) => write!(f, "done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test;

    #[test]
    fn constructors_and_accessors() {
        init_test("constructors_and_accessors");
        let it = Iteration::indexed("a", 2);
        assert!(!it.is_done());
        assert_eq!(it.index(), Some(2));
        assert_eq!(it.as_value(), Some(&"a"));

        let end: Iteration<i32> = Iteration::done_with(10);
        assert!(end.is_done());
        assert_eq!(end.index(), None);
        assert_eq!(end.into_value(), Some(10));

        let mapped = Iteration::value(3).map(|n| n * 2);
        assert_eq!(mapped, Iteration::Next { value: 6, index: None });
        crate::test_complete!("constructors_and_accessors");
    }

    #[test]
    fn wire_shape_matches_protocol() {
        init_test("wire_shape_matches_protocol");
        let json = serde_json::to_value(Iteration::indexed(7, 0)).expect("serialize");
        assert_eq!(json, serde_json::json!({"value": 7, "done": false, "index": 0}));

        let json = serde_json::to_value(Iteration::value("x")).expect("serialize");
        assert_eq!(json, serde_json::json!({"value": "x", "done": false}));

        let json = serde_json::to_value(Iteration::done_with(10)).expect("serialize");
        assert_eq!(json, serde_json::json!({"value": 10, "done": true}));

        let json = serde_json::to_value(Iteration::<i32>::done()).expect("serialize");
        assert_eq!(json, serde_json::json!({"done": true}));
        crate::test_complete!("wire_shape_matches_protocol");
    }

    #[test]
    fn parses_protocol_objects() {
        init_test("parses_protocol_objects");
        let it: Iteration<i32> =
            serde_json::from_str(r#"{"value": 1, "index": 4}"#).expect("parse");
        assert_eq!(it, Iteration::indexed(1, 4));

        let it: Iteration<i32> = serde_json::from_str(r#"{"done": true}"#).expect("parse");
        assert_eq!(it, Iteration::done());

        let err = serde_json::from_str::<Iteration<i32>>(r#"{"done": false}"#)
            .expect_err("value required");
        assert!(err.to_string().contains("requires a value"));
        crate::test_complete!("parses_protocol_objects");
    }

    #[test]
    fn display_forms() {
        init_test("display_forms");
        assert_eq!(Iteration::indexed(5, 1).to_string(), "[1] 5");
        assert_eq!(Iteration::<i32>::done().to_string(), "done");
        crate::test_complete!("display_forms");
    }
}
