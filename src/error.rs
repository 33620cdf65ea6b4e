use std::fmt;

use serde::{de, ser};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Basic collatable encoding failure: an unknown tag, a bad string escape, invalid UTF-8, a
    /// non-canonical number, or sequence markers that don't balance.
    BadEncode(String),
    /// Data ended before an item was complete.
    LengthTooShort {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// Decoding hit the configured nesting limit.
    ParseLimit(String),
    /// A value that has no collatable representation was handed to the encoder, like a NaN or an
    /// infinity.
    Unsupported(String),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::BadEncode(ref err) => write!(f, "Basic data encoding failure: {}", err),
            Error::LengthTooShort {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected data length {}, but got {} on step [{}]",
                expected, actual, step
            ),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::Unsupported(ref err) => write!(f, "Can't encode value: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let err = Error::LengthTooShort {
            step: "decode number magnitude",
            actual: 3,
            expected: 10,
        };
        assert_eq!(
            err.to_string(),
            "Expected data length 10, but got 3 on step [decode number magnitude]"
        );
        assert_eq!(
            Error::BadEncode("unrecognized tag 0x09".into()).to_string(),
            "Basic data encoding failure: unrecognized tag 0x09"
        );
    }

    #[test]
    fn serde_custom() {
        let err = <Error as de::Error>::custom("missing field `id`");
        assert_eq!(err, Error::SerdeFail("missing field `id`".into()));
    }
}
