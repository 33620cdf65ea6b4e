//! Collatable is an order-preserving binary encoding for JSON-compatible values.
//!
//! Two encoded values compare with a plain byte-wise `memcmp` in exactly the same order as the
//! values themselves, which makes them usable directly as keys in a sorted store. The collation
//! order is:
//!
//! `null < false < true < numbers < strings < arrays < dictionaries`
//!
//! Numbers compare by numeric value, strings by their UTF-8 bytes, and arrays and dictionaries
//! element by element, with a strict prefix sorting first.
//!
//! Every item starts with a one-byte tag:
//!
//! | Tag | Item        |
//! |-----|-------------|
//! | 0   | End of an array or dictionary |
//! | 1   | Null        |
//! | 2   | False       |
//! | 3   | True        |
//! | 4   | Number      |
//! | 5   | String      |
//! | 6   | Array       |
//! | 7   | Dictionary  |
//!
//! Arrays and dictionaries hold their children directly after the tag, followed by an end byte.
//! Dictionary children alternate key then value, in the order they were written. Strings are
//! escaped so that their terminator sorts below any content byte. Numbers carry a sign class, a
//! biased exponent, and the mantissa bits, all inverted for negative numbers.
//!
//! Values can be built incrementally with [`Collatable`], from a [`Value`] tree with [`encode`],
//! or from any `Serialize` type with [`to_vec`]. They are read back with [`CollatableReader`],
//! the stateless [`read_next`]/[`read_all`] calls, or [`from_slice`].
//!
//! ```
//! use collatable::{read_all, Collatable, Value};
//!
//! let mut low = Collatable::new();
//! low.begin_array().add_str("user").add_number(7).end_array();
//! let mut high = Collatable::new();
//! high.begin_array().add_str("user").add_number(42).end_array();
//!
//! assert!(low.as_bytes() < high.as_bytes());
//! let value = read_all(high.as_bytes()).unwrap();
//! assert_eq!(value, Value::from(vec![Value::from("user"), Value::from(42)]));
//! ```
//!
//! The crate also carries [`Document`], the in-memory record a storage engine returns for a key,
//! and the [`varint`] codec it packs its bookkeeping fields with.

mod de;
mod decode;
mod depth_tracking;
mod document;
pub mod element;
mod encode;
mod error;
mod number;
mod ser;
mod tag;
mod value;
pub mod varint;

pub use de::from_slice;
pub use decode::{read_all, read_next, read_number, CollatableReader};
pub use document::{Document, INTEGER_BODY_LEN};
pub use encode::{
    begin_array, begin_dictionary, encode, encode_bool, encode_null, encode_number, encode_str,
    end_array, end_dictionary, Collatable,
};
pub use error::{Error, Result};
pub use number::Number;
pub use ser::to_vec;
pub use tag::CollatableType;
pub use value::Value;

/// Default limit on how deeply arrays and dictionaries may nest when reading or serializing.
pub const MAX_DEPTH: usize = 100;
