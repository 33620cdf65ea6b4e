use std::borrow::Cow;

use serde::de::Unexpected;

use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::{CollatableType, Number, MAX_DEPTH};

/// Terminates every encoded string.
const STRING_TERMINATOR: u8 = 0x00;
/// Introduces an escaped 0x00 or 0x01 inside a string.
const STRING_ESCAPE: u8 = 0x01;
const ESCAPED_ZERO: u8 = 0x01;
const ESCAPED_ONE: u8 = 0x02;

/// A single item in a collatable stream.
///
/// Arrays and dictionaries don't carry their contents: an `Array` or `Dictionary` element opens
/// a sequence, and the matching `EndSequence` element closes it.
#[derive(Clone, Debug, PartialEq)]
pub enum Element<'a> {
    Null,
    Bool(bool),
    Number(Number),
    Str(Cow<'a, str>),
    Array,
    Dictionary,
    EndSequence,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'static str {
        self.tag().name()
    }

    /// The tag this element is written with.
    pub fn tag(&self) -> CollatableType {
        match self {
            Element::Null => CollatableType::Null,
            Element::Bool(false) => CollatableType::False,
            Element::Bool(true) => CollatableType::True,
            Element::Number(_) => CollatableType::Number,
            Element::Str(_) => CollatableType::String,
            Element::Array => CollatableType::Array,
            Element::Dictionary => CollatableType::Dictionary,
            Element::EndSequence => CollatableType::EndSequence,
        }
    }

    pub fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Element::Null => Unexpected::Unit,
            Element::Bool(v) => Unexpected::Bool(*v),
            Element::Number(v) => {
                if let Some(v) = v.as_u64() {
                    Unexpected::Unsigned(v)
                } else if let Some(v) = v.as_i64() {
                    Unexpected::Signed(v)
                } else {
                    Unexpected::Float(v.as_f64())
                }
            }
            Element::Str(v) => Unexpected::Str(v),
            Element::Array => Unexpected::Seq,
            Element::Dictionary => Unexpected::Map,
            Element::EndSequence => Unexpected::Other("end of sequence"),
        }
    }
}

/// Append a string's escaped bytes and terminator.
///
/// 0x00 becomes 0x01 0x01 and 0x01 becomes 0x01 0x02. Every other byte is copied. The mapping
/// keeps bytewise order, and since no escaped byte is 0x00, the terminator sorts before any
/// continuation of the string.
pub(crate) fn write_str(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.reserve(bytes.len() + 1);
    for &b in bytes {
        match b {
            STRING_TERMINATOR => buf.extend_from_slice(&[STRING_ESCAPE, ESCAPED_ZERO]),
            STRING_ESCAPE => buf.extend_from_slice(&[STRING_ESCAPE, ESCAPED_ONE]),
            _ => buf.push(b),
        }
    }
    buf.push(STRING_TERMINATOR);
}

fn unescape(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter();
    while let Some(&b) = iter.next() {
        if b != STRING_ESCAPE {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(&ESCAPED_ZERO) => out.push(0x00),
            Some(&ESCAPED_ONE) => out.push(0x01),
            Some(&other) => {
                return Err(Error::BadEncode(format!(
                    "Got string escape followed by 0x{:02x}",
                    other
                )))
            }
            None => {
                return Err(Error::BadEncode(
                    "String ends in the middle of an escape".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

/// Serialize an element onto a byte vector. Doesn't check if Array & Dictionary structures make
/// sense, just writes elements out.
pub fn serialize_elem(buf: &mut Vec<u8>, elem: Element) {
    use self::Element::*;
    buf.push(elem.tag().into());
    match elem {
        Number(v) => v.encode_ordered(buf),
        Str(v) => write_str(buf, &v),
        Null | Bool(_) | Array | Dictionary | EndSequence => (),
    }
}

#[derive(Clone, Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    depth_tracking: DepthTracker,
    errored: bool,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Parser<'a> {
        Self::with_max_depth(data, MAX_DEPTH)
    }

    pub fn with_max_depth(data: &'a [u8], max_depth: usize) -> Parser<'a> {
        Self {
            data,
            depth_tracking: DepthTracker::new(max_depth),
            errored: false,
        }
    }

    /// Look at the tag of the next element without consuming anything.
    pub fn peek_tag(&self) -> Option<CollatableType> {
        self.data.first().map(|n| CollatableType::from_u8(*n))
    }

    /// The bytes that haven't been parsed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }

    /// Number of arrays & dictionaries entered but not yet closed.
    pub fn depth(&self) -> usize {
        self.depth_tracking.depth()
    }

    pub fn errored(&self) -> bool {
        self.errored
    }

    /// Decode the element at the front of the data without consuming it. Returns the element and
    /// the data after it.
    fn decode_next(&self) -> Option<Result<(Element<'a>, &'a [u8])>> {
        let (&tag, mut data) = self.data.split_first()?;
        Some(decode_element(tag, &mut data).map(|elem| (elem, data)))
    }

    /// Consume the next element only if `accept` maps it to something. Malformed data, an element
    /// that `accept` turns down, or one that would unbalance the open sequences all leave the
    /// parser exactly as it was.
    pub fn next_if<T, F>(&mut self, accept: F) -> Option<T>
    where
        F: FnOnce(&Element<'a>) -> Option<T>,
    {
        if self.errored {
            return None;
        }
        let (elem, rest) = self.decode_next()?.ok()?;
        let out = accept(&elem)?;
        self.depth_tracking.update_elem(&elem).ok()?;
        self.data = rest;
        Some(out)
    }
}

fn parse_str<'a>(data: &mut &'a [u8]) -> Result<Cow<'a, str>> {
    let end = data
        .iter()
        .position(|&b| b == STRING_TERMINATOR)
        .ok_or(Error::LengthTooShort {
            step: "find string terminator",
            actual: data.len(),
            expected: data.len() + 1,
        })?;
    let (raw, rest) = data.split_at(end);
    *data = &rest[1..];
    if raw.contains(&STRING_ESCAPE) {
        let bytes = unescape(raw)?;
        let string = String::from_utf8(bytes).map_err(|e| Error::BadEncode(format!("{}", e)))?;
        Ok(Cow::Owned(string))
    } else {
        let string = std::str::from_utf8(raw).map_err(|e| Error::BadEncode(format!("{}", e)))?;
        Ok(Cow::Borrowed(string))
    }
}

// Given a retrieved tag, try to turn it into the next element, moving through the data. Doesn't
// look at whether the element fits the open sequences.
fn decode_element<'a>(tag: u8, data: &mut &'a [u8]) -> Result<Element<'a>> {
    Ok(match CollatableType::from_u8(tag) {
        CollatableType::EndSequence => Element::EndSequence,
        CollatableType::Null => Element::Null,
        CollatableType::False => Element::Bool(false),
        CollatableType::True => Element::Bool(true),
        CollatableType::Number => Element::Number(Number::decode_ordered(data)?),
        CollatableType::String => Element::Str(parse_str(data)?),
        CollatableType::Array => Element::Array,
        CollatableType::Dictionary => Element::Dictionary,
        CollatableType::Error => {
            return Err(Error::BadEncode(format!(
                "Unrecognized tag byte 0x{:02x}",
                tag
            )))
        }
    })
}

impl<'a> std::iter::Iterator for Parser<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        let result = self.decode_next()?.and_then(|(elem, rest)| {
            self.depth_tracking.update_elem(&elem)?;
            self.data = rest;
            Ok(elem)
        });
        if result.is_err() {
            self.errored = true;
        }
        Some(result)
    }
}
