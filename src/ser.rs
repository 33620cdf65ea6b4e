//! Serialization.
//!
//! Anything implementing `Serialize` can be written straight to collatable bytes with [`to_vec`],
//! with no intermediate [`Value`][crate::Value]. Types are mapped as:
//!
//! - Unit, unit structs, and `None` - Null
//! - Integers & floats - Number. Floats must be finite.
//! - `char` & strings - String
//! - Byte arrays - Array of Numbers, one per byte
//! - Sequences, tuples, & tuple structs - Array
//! - Maps & structs - Dictionary, with pairs in the order they are serialized. Map keys may be
//!     any serializable value.
//!
//! Enum variants, when mapped, are:
//! - Unit - Just the variant name as a string
//! - Newtype - Dictionary with one pair. Key is variant name, content is the value
//! - Tuple - Dictionary with one pair. Key is variant name, content is the tuple as an array
//! - Struct - Dictionary with one pair. Key is variant name, content is the struct

use serde::ser::*;

use crate::depth_tracking::DepthTracker;
use crate::element::*;
use crate::error::{Error, Result};
use crate::{Number, MAX_DEPTH};

/// Serialize a value into a new byte vector.
///
/// For any [`Value`][crate::Value], this produces exactly the bytes that
/// [`encode`][crate::encode::encode] does.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut se = CollatableSerializer::default();
    value.serialize(&mut se)?;
    Ok(se.buf)
}

struct CollatableSerializer {
    depth_tracking: DepthTracker,
    buf: Vec<u8>,
}

impl Default for CollatableSerializer {
    fn default() -> Self {
        Self::with_params(MAX_DEPTH)
    }
}

impl CollatableSerializer {
    fn with_params(max_depth: usize) -> Self {
        CollatableSerializer {
            depth_tracking: DepthTracker::new(max_depth),
            buf: Vec::new(),
        }
    }

    fn encode_element(&mut self, elem: Element) -> Result<()> {
        self.depth_tracking.update_elem(&elem)?;
        serialize_elem(&mut self.buf, elem);
        Ok(())
    }

    fn encode_float(&mut self, v: f64) -> Result<()> {
        let n = Number::from_f64(v).ok_or_else(|| {
            Error::Unsupported(format!("{} is not a finite number", v))
        })?;
        self.encode_element(Element::Number(n))
    }

    /// Close `count` open sequences.
    fn end_sequences(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.encode_element(Element::EndSequence)?;
        }
        Ok(())
    }
}

impl<'a> Serializer for &'a mut CollatableSerializer {
    type Ok = ();
    type Error = crate::error::Error;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = SeqSerializer<'a>;
    type SerializeStructVariant = SeqSerializer<'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.encode_element(Element::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.encode_element(Element::Number(Number::from(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.encode_element(Element::Number(Number::from(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.encode_float(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.encode_float(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut tmp = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut tmp))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.encode_element(Element::Str(v.into()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.encode_element(Element::Array)?;
        for b in v {
            self.encode_element(Element::Number(Number::from(*b)))?;
        }
        self.encode_element(Element::EndSequence)
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.encode_element(Element::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.encode_element(Element::Dictionary)?;
        self.encode_element(Element::Str(variant.into()))?;
        value.serialize(&mut *self)?;
        self.encode_element(Element::EndSequence)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.encode_element(Element::Array)?;
        Ok(SeqSerializer::new(self, 1))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        self.encode_element(Element::Array)?;
        Ok(SeqSerializer::new(self, 1))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        // Tuple structs usually just discard the name
        self.encode_element(Element::Array)?;
        Ok(SeqSerializer::new(self, 1))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.encode_element(Element::Dictionary)?;
        self.encode_element(Element::Str(variant.into()))?;
        self.encode_element(Element::Array)?;
        Ok(SeqSerializer::new(self, 2))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.encode_element(Element::Dictionary)?;
        Ok(MapSerializer { se: self })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.encode_element(Element::Dictionary)?;
        Ok(SeqSerializer::new(self, 1))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.encode_element(Element::Dictionary)?;
        self.encode_element(Element::Str(variant.into()))?;
        self.encode_element(Element::Dictionary)?;
        Ok(SeqSerializer::new(self, 2))
    }
}

/// Writes the items of an array or the fields of a struct.
///
/// Sequences need no length up front, so every compound type shares this: items are written as
/// they arrive, and `end` closes however many sequences were opened for it. That's one for plain
/// sequences and structs, and two for variants, which also open the wrapping dictionary.
struct SeqSerializer<'a> {
    se: &'a mut CollatableSerializer,
    open: usize,
}

impl<'a> SeqSerializer<'a> {
    fn new(se: &'a mut CollatableSerializer, open: usize) -> Self {
        Self { se, open }
    }

    fn field<T: Serialize + ?Sized>(&mut self, field: &'static str, value: &T) -> Result<()> {
        self.se.encode_element(Element::Str(field.into()))?;
        value.serialize(&mut *self.se)
    }

    fn finish(self) -> Result<()> {
        self.se.end_sequences(self.open)
    }
}

impl<'a> SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<()> {
        self.field(field, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> SerializeStructVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<()> {
        self.field(field, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Writes dictionary pairs. Keys go through the same serializer as values, so any collatable
/// value can be a key.
struct MapSerializer<'a> {
    se: &'a mut CollatableSerializer,
}

impl<'a> SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.se)
    }

    fn end(self) -> Result<()> {
        self.se.end_sequences(1)
    }
}
