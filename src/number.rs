use std::cmp::{self, Ordering};
use std::convert::TryFrom;
use std::fmt::{self, Debug, Display};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug)]
pub(crate) enum NumPriv {
    /// Always non-less than zero.
    PosInt(u64),
    /// Always less than zero.
    NegInt(i64),
    /// Always finite, and never an integer that fits in `PosInt` or `NegInt`.
    Float(f64),
}

/// A collatable number, whether integer or floating-point.
///
/// Numbers are kept in a canonical form: a float holding an integral value that fits in an `i64`
/// or `u64` is stored as that integer, so `Number::from(2.0)` and `Number::from(2)` are the same
/// number and encode to the same bytes. NaN and the infinities have no representation.
///
/// A `Value` that contains a number can be constructed using the `From` trait.
#[derive(Copy, Clone)]
pub struct Number {
    n: NumPriv,
}

const CLASS_NEGATIVE: u8 = 0x01;
const CLASS_ZERO: u8 = 0x02;
const CLASS_POSITIVE: u8 = 0x03;

// Binary exponents run from -1074 (smallest subnormal) to 1023 (largest finite f64).
const EXPONENT_BIAS: i32 = 1100;
const MIN_EXPONENT: i32 = -1074;
const MAX_EXPONENT: i32 = 1023;

/// Encoded length of a non-zero number's payload after the class byte.
const MAGNITUDE_LEN: usize = 10;

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

impl Number {
    /// Make a number from a float. Returns `None` for NaN or infinite values.
    pub fn from_f64(f: f64) -> Option<Number> {
        if !f.is_finite() {
            return None;
        }
        let n = if f.fract() == 0.0 && f >= 0.0 && f < TWO_POW_64 {
            NumPriv::PosInt(f as u64)
        } else if f.fract() == 0.0 && f < 0.0 && f >= -TWO_POW_63 {
            NumPriv::NegInt(f as i64)
        } else {
            NumPriv::Float(f)
        };
        Some(Number { n })
    }

    /// Returns `true` if the number is an integer representable as `i64`.
    #[inline]
    pub fn is_i64(&self) -> bool {
        match self.n {
            NumPriv::PosInt(n) => n <= i64::MAX as u64,
            NumPriv::NegInt(_) => true,
            NumPriv::Float(_) => false,
        }
    }

    /// Returns `true` if the number is an integer representable as `u64`.
    #[inline]
    pub fn is_u64(&self) -> bool {
        matches!(self.n, NumPriv::PosInt(_))
    }

    /// Returns `true` if the number is not an integer within the 64-bit integer range.
    #[inline]
    pub fn is_f64(&self) -> bool {
        matches!(self.n, NumPriv::Float(_))
    }

    /// Returns the number represented as `i64` if possible, or else `None`.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self.n {
            NumPriv::PosInt(n) => i64::try_from(n).ok(),
            NumPriv::NegInt(n) => Some(n),
            NumPriv::Float(_) => None,
        }
    }

    /// Returns the number represented as `u64` if possible, or else `None`.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self.n {
            NumPriv::PosInt(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the number as an `f64`. Integers past 2^53 lose precision.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self.n {
            NumPriv::PosInt(n) => n as f64,
            NumPriv::NegInt(n) => n as f64,
            NumPriv::Float(f) => f,
        }
    }

    /// Split a non-zero number into sign, binary exponent, and the 64 bits following the leading
    /// one of its magnitude. Returns `None` for zero.
    fn split(&self) -> Option<(bool, i32, u64)> {
        match self.n {
            NumPriv::PosInt(0) => None,
            NumPriv::PosInt(m) => {
                let (top, frac) = normalize(m);
                Some((false, top as i32, frac))
            }
            NumPriv::NegInt(n) => {
                let (top, frac) = normalize(n.unsigned_abs());
                Some((true, top as i32, frac))
            }
            NumPriv::Float(f) => {
                let bits = f.to_bits();
                let negative = (bits >> 63) == 1;
                let biased = ((bits >> 52) & 0x7FF) as i32;
                let mantissa = bits & ((1u64 << 52) - 1);
                if biased == 0 {
                    // Subnormal: the leading one sits somewhere inside the mantissa
                    let (top, frac) = normalize(mantissa);
                    Some((negative, top as i32 + MIN_EXPONENT, frac))
                } else {
                    Some((negative, biased - 1023, mantissa << 12))
                }
            }
        }
    }

    /// Rebuild a number from its sign, exponent, and fraction, rejecting anything that isn't the
    /// canonical encoding of some number.
    fn from_parts(negative: bool, exp: i32, frac: u64) -> Result<Number> {
        if (0..=63).contains(&exp) {
            let integral = if exp == 0 { frac == 0 } else { frac << exp == 0 };
            if integral {
                let magnitude = if exp == 0 {
                    1
                } else {
                    (1u64 << exp) | (frac >> (64 - exp))
                };
                if !negative {
                    return Ok(Number {
                        n: NumPriv::PosInt(magnitude),
                    });
                }
                if magnitude <= 1u64 << 63 {
                    return Ok(Number {
                        n: NumPriv::NegInt(0i64.wrapping_sub(magnitude as i64)),
                    });
                }
            }
        }

        let bits = if (-1022..=MAX_EXPONENT).contains(&exp) {
            if frac & 0xFFF != 0 {
                return Err(Error::BadEncode(
                    "Number has more precision than a 64-bit float".to_string(),
                ));
            }
            (((exp + 1023) as u64) << 52) | (frac >> 12)
        } else if (MIN_EXPONENT..-1022).contains(&exp) {
            let kept = (exp - MIN_EXPONENT) as u32;
            if kept == 0 {
                if frac != 0 {
                    return Err(Error::BadEncode(
                        "Number has more precision than a 64-bit float".to_string(),
                    ));
                }
                1
            } else {
                if frac << kept != 0 {
                    return Err(Error::BadEncode(
                        "Number has more precision than a 64-bit float".to_string(),
                    ));
                }
                (1u64 << kept) | (frac >> (64 - kept))
            }
        } else {
            return Err(Error::BadEncode(format!(
                "Number exponent {} is out of range",
                exp
            )));
        };
        let bits = if negative { bits | (1u64 << 63) } else { bits };
        Ok(Number {
            n: NumPriv::Float(f64::from_bits(bits)),
        })
    }

    /// Append the order-preserving form of this number.
    ///
    /// Layout: a class byte (negative, zero, positive), then for non-zero numbers a big-endian
    /// biased exponent (2 bytes) and fraction (8 bytes). Negative numbers have both inverted, so
    /// larger magnitudes sort first.
    pub(crate) fn encode_ordered(&self, buf: &mut Vec<u8>) {
        match self.split() {
            None => buf.push(CLASS_ZERO),
            Some((negative, exp, frac)) => {
                let mut exp = (exp + EXPONENT_BIAS) as u16;
                let mut frac = frac;
                if negative {
                    exp = !exp;
                    frac = !frac;
                    buf.push(CLASS_NEGATIVE);
                } else {
                    buf.push(CLASS_POSITIVE);
                }
                buf.extend_from_slice(&exp.to_be_bytes());
                buf.extend_from_slice(&frac.to_be_bytes());
            }
        }
    }

    /// Read a number written by [`encode_ordered`][Number::encode_ordered], advancing `data`.
    pub(crate) fn decode_ordered(data: &mut &[u8]) -> Result<Number> {
        let class = data.read_u8().map_err(|_| Error::LengthTooShort {
            step: "decode number class",
            actual: 0,
            expected: 1,
        })?;
        let negative = match class {
            CLASS_ZERO => return Ok(Number::default()),
            CLASS_NEGATIVE => true,
            CLASS_POSITIVE => false,
            _ => {
                return Err(Error::BadEncode(format!(
                    "Unrecognized number class 0x{:02x}",
                    class
                )))
            }
        };
        if data.len() < MAGNITUDE_LEN {
            return Err(Error::LengthTooShort {
                step: "decode number magnitude",
                actual: data.len(),
                expected: MAGNITUDE_LEN,
            });
        }
        let mut exp = data.read_u16::<BigEndian>().map_err(|_| Error::LengthTooShort {
            step: "decode number exponent",
            actual: data.len(),
            expected: 2,
        })?;
        let mut frac = data.read_u64::<BigEndian>().map_err(|_| Error::LengthTooShort {
            step: "decode number fraction",
            actual: data.len(),
            expected: 8,
        })?;
        if negative {
            exp = !exp;
            frac = !frac;
        }
        Number::from_parts(negative, exp as i32 - EXPONENT_BIAS, frac)
    }
}

/// Position of the leading one, and the bits after it shifted up to the top of a `u64`.
fn normalize(m: u64) -> (u32, u64) {
    let top = 63 - m.leading_zeros();
    let rest = m ^ (1u64 << top);
    let frac = if top == 0 { 0 } else { rest << (64 - top) };
    (top, frac)
}

/// Compare a finite float against an integer without losing precision on either side.
fn cmp_float_int(f: f64, i: i128) -> Ordering {
    if f >= TWO_POW_64 {
        return Ordering::Greater;
    }
    if f < -TWO_POW_63 {
        return Ordering::Less;
    }
    let floor = f.floor();
    match (floor as i128).cmp(&i) {
        Ordering::Equal if f > floor => Ordering::Greater,
        ord => ord,
    }
}

impl std::default::Default for Number {
    fn default() -> Self {
        Self {
            n: NumPriv::PosInt(0),
        }
    }
}

impl cmp::Ord for Number {
    fn cmp(&self, other: &Number) -> Ordering {
        use self::NumPriv::*;
        match (self.n, other.n) {
            (PosInt(lhs), PosInt(rhs)) => lhs.cmp(&rhs),
            (NegInt(lhs), NegInt(rhs)) => lhs.cmp(&rhs),
            (NegInt(_), PosInt(_)) => Ordering::Less,
            (PosInt(_), NegInt(_)) => Ordering::Greater,
            (Float(lhs), Float(rhs)) => lhs.total_cmp(&rhs),
            (Float(lhs), PosInt(rhs)) => cmp_float_int(lhs, rhs as i128),
            (Float(lhs), NegInt(rhs)) => cmp_float_int(lhs, rhs as i128),
            (PosInt(lhs), Float(rhs)) => cmp_float_int(rhs, lhs as i128).reverse(),
            (NegInt(lhs), Float(rhs)) => cmp_float_int(rhs, lhs as i128).reverse(),
        }
    }
}

impl cmp::PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl cmp::Eq for Number {}

impl Debug for Number {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        Debug::fmt(&self.n, fmt)
    }
}

impl Display for Number {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self.n {
            NumPriv::PosInt(v) => Display::fmt(&v, fmt),
            NumPriv::NegInt(v) => Display::fmt(&v, fmt),
            NumPriv::Float(v) => Display::fmt(&v, fmt),
        }
    }
}

macro_rules! impl_from_unsigned {
    ($t: ty) => {
        impl From<$t> for Number {
            fn from(n: $t) -> Self {
                Number {
                    n: NumPriv::PosInt(n as u64),
                }
            }
        }
    };
}

macro_rules! impl_from_signed {
    ($t: ty) => {
        impl From<$t> for Number {
            fn from(n: $t) -> Self {
                if n < 0 {
                    Number {
                        n: NumPriv::NegInt(n as i64),
                    }
                } else {
                    Number {
                        n: NumPriv::PosInt(n as u64),
                    }
                }
            }
        }
    };
}

impl_from_unsigned!(u8);
impl_from_unsigned!(u16);
impl_from_unsigned!(u32);
impl_from_unsigned!(u64);
impl_from_unsigned!(usize);
impl_from_signed!(i8);
impl_from_signed!(i16);
impl_from_signed!(i32);
impl_from_signed!(i64);
impl_from_signed!(isize);

impl TryFrom<f64> for Number {
    type Error = f64;
    fn try_from(f: f64) -> Result<Self, Self::Error> {
        Number::from_f64(f).ok_or(f)
    }
}

macro_rules! impl_try_from {
    ($t: ty) => {
        impl TryFrom<Number> for $t {
            type Error = Number;
            fn try_from(v: Number) -> Result<Self, Self::Error> {
                match v.n {
                    NumPriv::PosInt(n) => TryFrom::try_from(n).map_err(|_| v),
                    NumPriv::NegInt(n) => TryFrom::try_from(n).map_err(|_| v),
                    NumPriv::Float(_) => Err(v),
                }
            }
        }
    };
}

impl_try_from!(u8);
impl_try_from!(u16);
impl_try_from!(u32);
impl_try_from!(u64);
impl_try_from!(usize);
impl_try_from!(i8);
impl_try_from!(i16);
impl_try_from!(i32);
impl_try_from!(i64);
impl_try_from!(isize);

use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.n {
            NumPriv::PosInt(v) => serializer.serialize_u64(v),
            NumPriv::NegInt(v) => serializer.serialize_i64(v),
            NumPriv::Float(v) => serializer.serialize_f64(v),
        }
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NumVisitor;
        impl<'de> serde::de::Visitor<'de> for NumVisitor {
            type Value = Number;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
                write!(fmt, "a finite number")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Number::from(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Number::from(v))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Number::from_f64(v)
                    .ok_or_else(|| E::custom(format!("{} is not a finite number", v)))
            }
        }

        deserializer.deserialize_any(NumVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn enc(n: Number) -> Vec<u8> {
        let mut buf = Vec::new();
        n.encode_ordered(&mut buf);
        buf
    }

    fn f(v: f64) -> Number {
        Number::from_f64(v).unwrap()
    }

    /// Numbers in strictly ascending order.
    fn ascending() -> Vec<Number> {
        vec![
            f(-f64::MAX),
            f(-1.0e300),
            f(-18446744073709551616.0 * 4.0),
            f(-9223372036854777856.0),
            Number::from(i64::MIN),
            Number::from(i64::MIN + 1),
            Number::from(-4096),
            f(-2.5),
            Number::from(-2),
            f(-1.5),
            Number::from(-1),
            f(-0.5),
            f(-f64::MIN_POSITIVE),
            f(-5e-324),
            Number::from(0),
            f(5e-324),
            f(1e-320),
            f(f64::MIN_POSITIVE),
            f(1e-10),
            f(0.5),
            Number::from(1),
            f(1.5),
            Number::from(2),
            f(2.5),
            Number::from(127),
            Number::from(128),
            Number::from(1u64 << 53),
            Number::from((1u64 << 53) + 1),
            Number::from(i64::MAX),
            Number::from(1u64 << 63),
            Number::from(u64::MAX - 1),
            Number::from(u64::MAX),
            f(18446744073709551616.0),
            f(1.0e300),
            f(f64::MAX),
        ]
    }

    #[test]
    fn canonical_floats() {
        assert_eq!(f(2.0), Number::from(2));
        assert!(f(2.0).is_u64());
        assert_eq!(f(-0.0), Number::from(0));
        assert_eq!(f(-3.0).as_i64(), Some(-3));
        assert_eq!(f(-9223372036854775808.0), Number::from(i64::MIN));
        assert!(f(18446744073709551616.0).is_f64());
        assert_eq!(enc(f(2.0)), enc(Number::from(2u8)));
        assert!(Number::from_f64(f64::NAN).is_none());
        assert!(Number::from_f64(f64::INFINITY).is_none());
        assert!(Number::from_f64(f64::NEG_INFINITY).is_none());
    }

    #[test]
    fn ord() {
        let nums = ascending();
        for pair in nums.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should be less than {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn encoding_preserves_order() {
        let nums = ascending();
        for pair in nums.windows(2) {
            assert!(
                enc(pair[0]) < enc(pair[1]),
                "Encoding of {:?} should sort before {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn roundtrip() {
        for case in ascending() {
            let buf = enc(case);
            let mut data = &buf[..];
            let out = Number::decode_ordered(&mut data).unwrap();
            assert!(data.is_empty());
            assert_eq!(out, case);
            assert_eq!(out.is_f64(), case.is_f64());
            assert_eq!(out.as_f64().to_bits(), case.as_f64().to_bits());
        }
    }

    #[test]
    fn known_bytes() {
        assert_eq!(enc(Number::from(0)), &[0x02]);
        assert_eq!(
            enc(Number::from(1)),
            &[0x03, 0x04, 0x4c, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            enc(Number::from(-1)),
            &[0x01, 0xfb, 0xb3, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            enc(f(1.5)),
            &[0x03, 0x04, 0x4c, 0x80, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn not_enough_bytes() {
        let buf = enc(Number::from(300));
        for cut in 0..buf.len() {
            let mut data = &buf[..cut];
            assert!(Number::decode_ordered(&mut data).is_err(), "Cut at {}", cut);
        }
    }

    #[test]
    fn bad_class() {
        let mut data: &[u8] = &[0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(Number::decode_ordered(&mut data).is_err());
    }

    #[test]
    fn too_precise() {
        // 1 + 2^-60 can't be a float, and isn't an integer either
        let mut buf = vec![0x03, 0x04, 0x4c];
        buf.extend_from_slice(&(1u64 << 4).to_be_bytes());
        let mut data = &buf[..];
        assert!(Number::decode_ordered(&mut data).is_err());
    }

    #[test]
    fn exponent_out_of_range() {
        let mut buf = vec![0x03];
        buf.extend_from_slice(&((1024 + EXPONENT_BIAS) as u16).to_be_bytes());
        buf.extend_from_slice(&0u64.to_be_bytes());
        let mut data = &buf[..];
        assert!(Number::decode_ordered(&mut data).is_err());
    }

    #[test]
    fn try_from() {
        assert_eq!(u8::try_from(Number::from(200)), Ok(200u8));
        assert!(u8::try_from(Number::from(300)).is_err());
        assert!(i32::try_from(f(0.5)).is_err());
        assert_eq!(i64::try_from(Number::from(-7)), Ok(-7));
    }
}
