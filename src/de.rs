//! Deserialization.
//!
//! [`from_slice`] reads anything written by [`to_vec`][crate::ser::to_vec] (or by the encoder)
//! back into a `Deserialize` type. Strings without escaped bytes are borrowed from the input, so
//! `&str` fields work as long as the text holds no 0x00 or 0x01 bytes.

use serde::de::Error as DeError;
use serde::de::*;

use crate::{
    element::*,
    error::{Error, Result},
    CollatableType, MAX_DEPTH,
};

/// Deserialize a complete value from `buf`. Fails if anything is left over afterwards.
pub fn from_slice<'de, T: Deserialize<'de>>(buf: &'de [u8]) -> Result<T> {
    let mut de = CollatableDeserializer::new(buf, MAX_DEPTH);
    let value = T::deserialize(&mut de)?;
    let trailing = de.parser.remaining().len();
    if trailing > 0 {
        return Err(Error::BadEncode(format!(
            "{} bytes of trailing data after the value",
            trailing
        )));
    }
    Ok(value)
}

struct CollatableDeserializer<'a> {
    parser: Parser<'a>,
}

impl<'a> CollatableDeserializer<'a> {
    fn new(buf: &'a [u8], max_depth: usize) -> Self {
        Self {
            parser: Parser::with_max_depth(buf, max_depth),
        }
    }

    fn peek_tag(&self) -> Result<CollatableType> {
        self.parser
            .peek_tag()
            .ok_or_else(|| Error::SerdeFail("missing next value".to_string()))
    }

    fn next_elem(&mut self) -> Result<Element<'a>> {
        self.parser
            .next()
            .ok_or_else(|| Error::SerdeFail("missing next value".to_string()))?
    }

    /// Consume the end marker closing the current sequence, failing if there's anything else.
    fn expect_end(&mut self, what: &str) -> Result<()> {
        match self.next_elem()? {
            Element::EndSequence => Ok(()),
            elem => Err(Error::SerdeFail(format!(
                "expected the end of {}, found {}",
                what,
                elem.name()
            ))),
        }
    }
}

impl<'de, 'a> serde::Deserializer<'de> for &'a mut CollatableDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let elem = self.next_elem()?;
        match elem {
            Element::Null => visitor.visit_unit(),
            Element::Bool(v) => visitor.visit_bool(v),
            Element::Number(v) => {
                if let Some(v) = v.as_u64() {
                    visitor.visit_u64(v)
                } else if let Some(v) = v.as_i64() {
                    visitor.visit_i64(v)
                } else {
                    visitor.visit_f64(v.as_f64())
                }
            }
            Element::Str(std::borrow::Cow::Borrowed(v)) => visitor.visit_borrowed_str(v),
            Element::Str(std::borrow::Cow::Owned(v)) => visitor.visit_string(v),
            Element::Array => {
                let mut access = SeqAccess::new(self);
                let value = visitor.visit_seq(&mut access)?;
                access.finish()?;
                Ok(value)
            }
            Element::Dictionary => {
                let mut access = MapAccess::new(self);
                let value = visitor.visit_map(&mut access)?;
                access.finish()?;
                Ok(value)
            }
            Element::EndSequence => Err(Error::invalid_type(elem.unexpected(), &visitor)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.peek_tag()? == CollatableType::Null {
            self.next_elem()?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(EnumAccess::new(self))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str
        string bytes byte_buf unit unit_struct newtype_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct EnumAccess<'a, 'de> {
    de: &'a mut CollatableDeserializer<'de>,
    has_value: bool,
}

impl<'a, 'de> EnumAccess<'a, 'de> {
    fn new(de: &'a mut CollatableDeserializer<'de>) -> Self {
        Self {
            de,
            has_value: false,
        }
    }
}

impl<'a, 'de> serde::de::EnumAccess<'de> for EnumAccess<'a, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(mut self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let val = match self.de.peek_tag()? {
            CollatableType::Dictionary => {
                self.de.next_elem()?;
                if self.de.peek_tag()? != CollatableType::String {
                    return Err(Error::SerdeFail(
                        "expected a variant name as the dictionary key".to_string(),
                    ));
                }
                self.has_value = true;
                seed.deserialize(&mut *self.de)?
            }
            CollatableType::String => {
                self.has_value = false;
                seed.deserialize(&mut *self.de)?
            }
            _ => {
                return Err(Error::SerdeFail(
                    "expected a single-pair dictionary or a string".to_string(),
                ))
            }
        };
        Ok((val, self))
    }
}

impl<'a, 'de> serde::de::VariantAccess<'de> for EnumAccess<'a, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.has_value {
            Err(Error::SerdeFail(
                "invalid type: non-unit variant, expected unit variant".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        if self.has_value {
            let value = seed.deserialize(&mut *self.de)?;
            self.de.expect_end("an enum variant")?;
            Ok(value)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected newtype variant".to_string(),
            ))
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            let value = serde::Deserializer::deserialize_map(&mut *self.de, visitor)?;
            self.de.expect_end("an enum variant")?;
            Ok(value)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected struct variant".to_string(),
            ))
        }
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.has_value {
            let value = serde::Deserializer::deserialize_tuple(&mut *self.de, len, visitor)?;
            self.de.expect_end("an enum variant")?;
            Ok(value)
        } else {
            Err(Error::SerdeFail(
                "invalid type: unit variant, expected tuple variant".to_string(),
            ))
        }
    }
}

/// Hands out array items until the end marker shows up.
struct SeqAccess<'a, 'de> {
    de: &'a mut CollatableDeserializer<'de>,
    done: bool,
}

impl<'a, 'de> SeqAccess<'a, 'de> {
    fn new(de: &'a mut CollatableDeserializer<'de>) -> Self {
        Self { de, done: false }
    }

    /// Make sure the visitor didn't stop short of the end of the array.
    fn finish(self) -> Result<()> {
        if self.done {
            Ok(())
        } else {
            self.de.expect_end("an array")
        }
    }
}

impl<'a, 'de> serde::de::SeqAccess<'de> for SeqAccess<'a, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.done {
            return Ok(None);
        }
        if self.de.peek_tag()? == CollatableType::EndSequence {
            self.de.next_elem()?;
            self.done = true;
            return Ok(None);
        }
        Ok(Some(seed.deserialize(&mut *self.de)?))
    }
}

/// Hands out dictionary pairs until the end marker shows up.
struct MapAccess<'a, 'de> {
    de: &'a mut CollatableDeserializer<'de>,
    done: bool,
}

impl<'a, 'de> MapAccess<'a, 'de> {
    fn new(de: &'a mut CollatableDeserializer<'de>) -> Self {
        Self { de, done: false }
    }

    fn finish(self) -> Result<()> {
        if self.done {
            Ok(())
        } else {
            self.de.expect_end("a dictionary")
        }
    }
}

impl<'a, 'de> serde::de::MapAccess<'de> for MapAccess<'a, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if self.done {
            return Ok(None);
        }
        match self.de.peek_tag()? {
            CollatableType::EndSequence => {
                self.de.next_elem()?;
                self.done = true;
                Ok(None)
            }
            _ => Ok(Some(seed.deserialize(&mut *self.de)?)),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::{encode, Collatable};
    use crate::ser::to_vec;
    use crate::Value;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    fn json(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        id: u32,
        score: f64,
        tags: Vec<String>,
        parent: Option<u64>,
        shape: Shape,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Point(i32, i32),
        Rect { w: u8, h: u8 },
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Borrowed<'a> {
        key: &'a str,
    }

    #[test]
    fn roundtrip_struct() {
        let shapes = [
            Shape::Empty,
            Shape::Circle(0.5),
            Shape::Point(-3, 9),
            Shape::Rect { w: 1, h: 200 },
        ];
        for (i, shape) in shapes.into_iter().enumerate() {
            let rec = Record {
                name: format!("record {}", i),
                id: i as u32,
                score: -1.25,
                tags: vec!["x".into(), "\0y".into()],
                parent: if i % 2 == 0 { None } else { Some(i as u64) },
                shape,
            };
            let buf = to_vec(&rec).unwrap();
            let out: Record = from_slice(&buf).unwrap();
            assert_eq!(out, rec);
        }
    }

    #[test]
    fn roundtrip_value() {
        let val = json(r#"{"b":[1,2.5,-3],"a":{"n":null,"t":true},"s":"é\u0001"}"#);
        let buf = to_vec(&val).unwrap();
        let out: Value = from_slice(&buf).unwrap();
        assert_eq!(out, val);
    }

    #[test]
    fn borrowed_str() {
        let buf = to_vec(&json(r#"{"key":"plain"}"#)).unwrap();
        let out: Borrowed = from_slice(&buf).unwrap();
        assert_eq!(out.key, "plain");
    }

    #[test]
    fn map_and_bytes() {
        let mut map = BTreeMap::new();
        map.insert("one".to_string(), serde_bytes::ByteBuf::from(vec![1u8, 2, 3]));
        let buf = to_vec(&map).unwrap();
        let out: BTreeMap<String, serde_bytes::ByteBuf> = from_slice(&buf).unwrap();
        assert_eq!(out, map);
    }

    #[test]
    fn numbers_convert() {
        let buf = to_vec(&7u8).unwrap();
        assert_eq!(from_slice::<i64>(&buf).unwrap(), 7);
        assert_eq!(from_slice::<f32>(&buf).unwrap(), 7.0);
        let buf = to_vec(&2.5).unwrap();
        assert!(from_slice::<i64>(&buf).is_err());
        let buf = to_vec(&300).unwrap();
        assert!(from_slice::<u8>(&buf).is_err());
    }

    #[test]
    fn trailing_data() {
        let mut buf = to_vec(&1).unwrap();
        buf.push(0x01);
        assert!(matches!(from_slice::<u32>(&buf), Err(Error::BadEncode(_))));
    }

    #[test]
    fn extra_tuple_items() {
        let buf = to_vec(&(1, 2, 3)).unwrap();
        assert!(from_slice::<(i32, i32)>(&buf).is_err());
        assert_eq!(from_slice::<(i32, i32, i32)>(&buf).unwrap(), (1, 2, 3));
    }

    #[test]
    fn unbalanced() {
        let mut c = Collatable::new();
        c.begin_array().add_number(1);
        assert!(from_slice::<Vec<i32>>(c.as_bytes()).is_err());
        assert!(from_slice::<Value>(&[0x00]).is_err());
        assert!(from_slice::<Value>(&[]).is_err());
    }

    #[test]
    fn non_string_key() {
        let buf = [0x07, 0x04, 0x02, 0x01, 0x00];
        assert!(from_slice::<BTreeMap<String, Value>>(&buf).is_err());
        let map = from_slice::<BTreeMap<u32, Value>>(&buf).unwrap();
        assert_eq!(map.get(&0), Some(&Value::Null));

        let mut keyed = BTreeMap::new();
        keyed.insert((String::from("user"), 42u64), -1i32);
        let buf = to_vec(&keyed).unwrap();
        assert_eq!(from_slice::<BTreeMap<(String, u64), i32>>(&buf).unwrap(), keyed);
        assert_eq!(
            from_slice::<Value>(&buf).unwrap(),
            Value::Dictionary(vec![(
                Value::from(vec![Value::from("user"), Value::from(42)]),
                Value::from(-1)
            )])
        );
    }

    #[test]
    fn enum_with_extra_pair() {
        let mut buf = Vec::new();
        encode(&json(r#"{"Circle":1,"Empty":null}"#), &mut buf);
        assert!(from_slice::<Shape>(&buf).is_err());
        let mut buf = Vec::new();
        encode(&json(r#"{"Circle":1}"#), &mut buf);
        assert_eq!(from_slice::<Shape>(&buf).unwrap(), Shape::Circle(1.0));
    }

    #[test]
    fn unknown_fields_skipped() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Small {
            b: bool,
        }
        let buf = to_vec(&json(r#"{"extra":[1,{"x":[]}],"b":true}"#)).unwrap();
        assert_eq!(from_slice::<Small>(&buf).unwrap(), Small { b: true });
    }
}
