//! Writing collatable data.
//!
//! The free functions append single items to a byte vector, and can be mixed freely: a key made
//! of an array holding a string and a number can be written with [`begin_array`],
//! [`encode_str`], [`encode_number`], and [`end_array`], and it comes out identical to
//! [`encode`] run on the equivalent [`Value`]. [`Collatable`] wraps the same operations around an
//! owned buffer.

use std::fmt;

use crate::decode::CollatableReader;
use crate::element::{serialize_elem, Element};
use crate::{Number, Value};

/// Append the full encoding of a value, depth-first.
pub fn encode(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => encode_null(buf),
        Value::Bool(v) => encode_bool(buf, *v),
        Value::Number(v) => encode_number(buf, *v),
        Value::String(v) => encode_str(buf, v),
        Value::Array(v) => {
            begin_array(buf);
            for item in v {
                encode(item, buf);
            }
            end_array(buf);
        }
        Value::Dictionary(v) => {
            begin_dictionary(buf);
            for (key, item) in v {
                encode(key, buf);
                encode(item, buf);
            }
            end_dictionary(buf);
        }
    }
}

pub fn encode_null(buf: &mut Vec<u8>) {
    serialize_elem(buf, Element::Null)
}

pub fn encode_bool(buf: &mut Vec<u8>, v: bool) {
    serialize_elem(buf, Element::Bool(v))
}

pub fn encode_number(buf: &mut Vec<u8>, v: Number) {
    serialize_elem(buf, Element::Number(v))
}

pub fn encode_str(buf: &mut Vec<u8>, v: &str) {
    serialize_elem(buf, Element::Str(v.into()))
}

/// Open an array. Everything appended until the matching [`end_array`] is an array item.
pub fn begin_array(buf: &mut Vec<u8>) {
    serialize_elem(buf, Element::Array)
}

pub fn end_array(buf: &mut Vec<u8>) {
    serialize_elem(buf, Element::EndSequence)
}

/// Open a dictionary. Until the matching [`end_dictionary`], items must alternate between a key
/// and its value. Keys are usually strings, but any value works.
pub fn begin_dictionary(buf: &mut Vec<u8>) {
    serialize_elem(buf, Element::Dictionary)
}

pub fn end_dictionary(buf: &mut Vec<u8>) {
    serialize_elem(buf, Element::EndSequence)
}

/// An owned, growable collatable encoding, suitable as an index key.
///
/// Comparing two `Collatable`s compares their bytes, which is the same as comparing the values
/// they hold.
///
/// ```
/// use collatable::Collatable;
///
/// let mut low = Collatable::new();
/// low.begin_array().add_str("user").add_number(7).end_array();
/// let mut high = Collatable::new();
/// high.begin_array().add_str("user").add_number(42).end_array();
/// assert!(low < high);
/// assert_eq!(high.to_string(), r#"["user",42]"#);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Collatable {
    buf: Vec<u8>,
}

impl Collatable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn add_null(&mut self) -> &mut Self {
        encode_null(&mut self.buf);
        self
    }

    pub fn add_bool(&mut self, v: bool) -> &mut Self {
        encode_bool(&mut self.buf, v);
        self
    }

    pub fn add_number<N: Into<Number>>(&mut self, v: N) -> &mut Self {
        encode_number(&mut self.buf, v.into());
        self
    }

    pub fn add_str(&mut self, v: &str) -> &mut Self {
        encode_str(&mut self.buf, v);
        self
    }

    pub fn add_value(&mut self, v: &Value) -> &mut Self {
        encode(v, &mut self.buf);
        self
    }

    pub fn begin_array(&mut self) -> &mut Self {
        begin_array(&mut self.buf);
        self
    }

    pub fn end_array(&mut self) -> &mut Self {
        end_array(&mut self.buf);
        self
    }

    pub fn begin_dictionary(&mut self) -> &mut Self {
        begin_dictionary(&mut self.buf);
        self
    }

    pub fn end_dictionary(&mut self) -> &mut Self {
        end_dictionary(&mut self.buf);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Start reading back the encoded items.
    pub fn reader(&self) -> CollatableReader<'_> {
        CollatableReader::new(&self.buf)
    }

    /// Decode the first item. Fails on an empty or malformed buffer.
    pub fn to_value(&self) -> Option<Value> {
        crate::decode::read_all(&self.buf)
    }
}

impl From<Vec<u8>> for Collatable {
    fn from(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl From<&Value> for Collatable {
    fn from(v: &Value) -> Self {
        let mut c = Collatable::new();
        c.add_value(v);
        c
    }
}

impl AsRef<[u8]> for Collatable {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

/// Renders each top-level item as JSON text, separated by commas. Undecodable bytes are shown
/// as hex.
impl fmt::Display for Collatable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reader = self.reader();
        let mut first = true;
        while !reader.at_end() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            let rest = reader.remaining();
            match reader.read_value() {
                Ok(v) => write!(f, "{}", v)?,
                Err(_) => {
                    f.write_str("<")?;
                    for b in rest {
                        write!(f, "{:02x}", b)?;
                    }
                    return f.write_str(">");
                }
            }
        }
        Ok(())
    }
}
