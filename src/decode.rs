//! Reading collatable data back out.
//!
//! [`CollatableReader`] is a cursor over an encoded buffer. It can materialize whole values, or
//! walk arrays and dictionaries item by item without building anything. The free functions
//! [`read_next`], [`read_number`], and [`read_all`] are thin, stateless wrappers over it that
//! report failure as [`CollatableType::Error`] or `None` instead of an [`Error`].

use std::borrow::Cow;

use log::debug;

use crate::element::{Element, Parser};
use crate::error::{Error, Result};
use crate::{CollatableType, Number, Value, MAX_DEPTH};

/// A pull-style reader over collatable bytes.
///
/// The reader tracks which arrays and dictionaries are open, so it catches an end marker with
/// nothing to close, a dictionary that ends between a key and its value, and nesting past its
/// depth limit. Once it hits malformed data it stays failed: every later read returns an error.
///
/// ```
/// use collatable::{Collatable, CollatableReader, CollatableType};
///
/// let mut key = Collatable::new();
/// key.begin_array().add_str("user").add_number(42).end_array();
///
/// let mut reader = key.reader();
/// assert!(reader.begin_array());
/// assert_eq!(reader.read_string().as_deref(), Some("user"));
/// assert_eq!(reader.read_number(), Some(42));
/// assert!(reader.end_sequence());
/// assert!(reader.at_end());
/// ```
#[derive(Clone, Debug)]
pub struct CollatableReader<'a> {
    parser: Parser<'a>,
    failed: bool,
}

impl<'a> CollatableReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_max_depth(data, MAX_DEPTH)
    }

    /// Create a reader that fails once more than `max_depth` arrays & dictionaries are open.
    pub fn with_max_depth(data: &'a [u8], max_depth: usize) -> Self {
        Self {
            parser: Parser::with_max_depth(data, max_depth),
            failed: false,
        }
    }

    /// The bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.parser.remaining()
    }

    pub fn at_end(&self) -> bool {
        self.parser.remaining().is_empty()
    }

    pub fn depth(&self) -> usize {
        self.parser.depth()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The tag of the next item, without consuming it. Returns `Error` if the reader has failed
    /// or has no data left.
    pub fn peek_tag(&self) -> CollatableType {
        if self.failed {
            return CollatableType::Error;
        }
        self.parser.peek_tag().unwrap_or(CollatableType::Error)
    }

    fn fail(&mut self, err: Error) -> Error {
        self.failed = true;
        err
    }

    fn next_elem(&mut self) -> Result<Element<'a>> {
        if self.failed {
            return Err(Error::BadEncode(
                "Reader already failed on earlier data".to_string(),
            ));
        }
        match self.parser.next() {
            Some(Ok(elem)) => Ok(elem),
            Some(Err(err)) => Err(self.fail(err)),
            None => Err(self.fail(Error::LengthTooShort {
                step: "read next item",
                actual: 0,
                expected: 1,
            })),
        }
    }

    // Build a value out of an element that was just read, pulling in the contents of arrays and
    // dictionaries.
    fn materialize(&mut self, elem: Element<'a>) -> Result<Value> {
        Ok(match elem {
            Element::Null => Value::Null,
            Element::Bool(v) => Value::Bool(v),
            Element::Number(v) => Value::Number(v),
            Element::Str(v) => Value::String(v.into_owned()),
            Element::Array => {
                let mut array = Vec::new();
                loop {
                    match self.next_elem()? {
                        Element::EndSequence => break,
                        elem => array.push(self.materialize(elem)?),
                    }
                }
                Value::Array(array)
            }
            Element::Dictionary => {
                let mut dict = Vec::new();
                loop {
                    let key = match self.next_elem()? {
                        Element::EndSequence => break,
                        elem => self.materialize(elem)?,
                    };
                    let elem = self.next_elem()?;
                    dict.push((key, self.materialize(elem)?));
                }
                Value::Dictionary(dict)
            }
            Element::EndSequence => {
                return Err(self.fail(Error::BadEncode(
                    "Expected a value, found the end of a sequence".to_string(),
                )))
            }
        })
    }

    /// Read the next item.
    ///
    /// Scalars come back with their value. An array or dictionary comes back fully materialized
    /// if `recurse` is set; otherwise only its tag is returned and the reader is left positioned
    /// on its first item. An end marker returns `(EndSequence, None)`.
    pub fn try_read_next(&mut self, recurse: bool) -> Result<(CollatableType, Option<Value>)> {
        let elem = self.next_elem()?;
        let tag = elem.tag();
        let value = match elem {
            Element::Array | Element::Dictionary if !recurse => None,
            Element::EndSequence => None,
            elem => Some(self.materialize(elem)?),
        };
        Ok((tag, value))
    }

    /// Like [`try_read_next`][Self::try_read_next], but reports failure as
    /// `(CollatableType::Error, None)`.
    pub fn read_next(&mut self, recurse: bool) -> (CollatableType, Option<Value>) {
        match self.try_read_next(recurse) {
            Ok(next) => next,
            Err(err) => {
                debug!("Collatable read failed: {}", err);
                (CollatableType::Error, None)
            }
        }
    }

    /// Read one complete value. Fails on an end marker.
    pub fn read_value(&mut self) -> Result<Value> {
        let elem = self.next_elem()?;
        self.materialize(elem)
    }

    // Take the next element only if `accept` likes it. Malformed data is left in place for the
    // next real read to report.
    fn take_if<T, F>(&mut self, accept: F) -> Option<T>
    where
        F: FnOnce(&Element<'a>) -> Option<T>,
    {
        if self.failed {
            return None;
        }
        self.parser.next_if(accept)
    }

    /// Read a number if it's an integer that fits in an `i64`. Otherwise, nothing is consumed.
    pub fn read_number(&mut self) -> Option<i64> {
        self.take_if(|elem| match elem {
            Element::Number(n) => n.as_i64(),
            _ => None,
        })
    }

    /// Read any number, as a float. Nothing is consumed if the next item isn't a number.
    pub fn read_double(&mut self) -> Option<f64> {
        self.take_if(|elem| match elem {
            Element::Number(n) => Some(n.as_f64()),
            _ => None,
        })
    }

    /// Read any number exactly.
    pub fn read_exact_number(&mut self) -> Option<Number> {
        self.take_if(|elem| match elem {
            Element::Number(n) => Some(*n),
            _ => None,
        })
    }

    /// Read a string, borrowing from the input where possible. Nothing is consumed if the next
    /// item isn't a string.
    pub fn read_string(&mut self) -> Option<Cow<'a, str>> {
        self.take_if(|elem| match elem {
            Element::Str(s) => Some(s.clone()),
            _ => None,
        })
    }

    /// Enter an array. Returns false, consuming nothing, if the next item isn't an array.
    pub fn begin_array(&mut self) -> bool {
        self.take_if(|elem| matches!(elem, Element::Array).then(|| ()))
            .is_some()
    }

    /// Enter a dictionary. Returns false, consuming nothing, if the next item isn't a dictionary.
    pub fn begin_dictionary(&mut self) -> bool {
        self.take_if(|elem| matches!(elem, Element::Dictionary).then(|| ()))
            .is_some()
    }

    /// Leave the innermost array or dictionary. Returns false, consuming nothing, if the next
    /// item isn't the end marker that closes it.
    pub fn end_sequence(&mut self) -> bool {
        self.take_if(|elem| matches!(elem, Element::EndSequence).then(|| ()))
            .is_some()
    }

    /// Step over the next value, including everything inside it if it's an array or dictionary.
    pub fn skip_value(&mut self) -> Result<()> {
        let start = self.depth();
        match self.next_elem()? {
            Element::EndSequence => {
                return Err(self.fail(Error::BadEncode(
                    "Expected a value to skip, found the end of a sequence".to_string(),
                )))
            }
            Element::Array | Element::Dictionary => (),
            _ => return Ok(()),
        }
        while self.depth() > start {
            self.next_elem()?;
        }
        Ok(())
    }
}

/// Walks the raw elements, without materializing anything.
impl<'a> std::iter::Iterator for CollatableReader<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.parser.next()?;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Read the next item from a byte cursor, advancing it past what was read.
///
/// This behaves like [`CollatableReader::read_next`] but keeps no state between calls, so the
/// caller is responsible for matching up array & dictionary starts with their end markers. An end
/// marker is always accepted and returned as `(EndSequence, None)`. On malformed data, this
/// returns `(Error, None)` and leaves `input` where it was.
pub fn read_next(input: &mut &[u8], recurse: bool) -> (CollatableType, Option<Value>) {
    if let Some((&0, rest)) = input.split_first() {
        *input = rest;
        return (CollatableType::EndSequence, None);
    }
    let mut reader = CollatableReader::new(*input);
    let next = reader.read_next(recurse);
    if next.0 != CollatableType::Error {
        *input = reader.remaining();
    }
    next
}

/// Read an integer from a byte cursor, advancing it only if the next item is an integer that fits
/// in an `i64`.
pub fn read_number(input: &mut &[u8]) -> Option<i64> {
    let (&tag, mut data) = input.split_first()?;
    if CollatableType::from_u8(tag) != CollatableType::Number {
        return None;
    }
    let n = match Number::decode_ordered(&mut data) {
        Ok(n) => n.as_i64()?,
        Err(err) => {
            debug!("Collatable number read failed: {}", err);
            return None;
        }
    };
    *input = data;
    Some(n)
}

/// Decode the first complete value in `input`. Anything after it is ignored.
///
/// Returns `None` for malformed data, or if the first item is an end marker.
pub fn read_all(input: &[u8]) -> Option<Value> {
    let mut cursor = input;
    read_next(&mut cursor, true).1
}
