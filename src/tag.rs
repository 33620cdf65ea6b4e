/// Leading tag byte of every collatable item.
///
/// The numeric values are part of the format: tags are compared first when two encodings are
/// compared bytewise, so their order is what puts nulls before booleans before numbers, and so
/// on. `EndSequence` is the smallest tag so a shorter array sorts ahead of a longer one it
/// prefixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollatableType {
    EndSequence,
    Null,
    False,
    True,
    Number,
    String,
    Array,
    Dictionary,
    /// Returned by the decoder on malformed input. Never written.
    Error,
}

impl CollatableType {
    /// Construct a tag from a single byte. Unassigned bytes map to [`CollatableType::Error`].
    pub fn from_u8(n: u8) -> CollatableType {
        match n {
            0 => CollatableType::EndSequence,
            1 => CollatableType::Null,
            2 => CollatableType::False,
            3 => CollatableType::True,
            4 => CollatableType::Number,
            5 => CollatableType::String,
            6 => CollatableType::Array,
            7 => CollatableType::Dictionary,
            _ => CollatableType::Error,
        }
    }

    /// Converts a tag into its single-byte representation.
    pub fn into_u8(self) -> u8 {
        match self {
            CollatableType::EndSequence => 0,
            CollatableType::Null => 1,
            CollatableType::False => 2,
            CollatableType::True => 3,
            CollatableType::Number => 4,
            CollatableType::String => 5,
            CollatableType::Array => 6,
            CollatableType::Dictionary => 7,
            CollatableType::Error => 255,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CollatableType::EndSequence => "EndSequence",
            CollatableType::Null => "Null",
            CollatableType::False => "False",
            CollatableType::True => "True",
            CollatableType::Number => "Number",
            CollatableType::String => "String",
            CollatableType::Array => "Array",
            CollatableType::Dictionary => "Dictionary",
            CollatableType::Error => "Error",
        }
    }
}

impl From<u8> for CollatableType {
    fn from(val: u8) -> CollatableType {
        CollatableType::from_u8(val)
    }
}

impl From<CollatableType> for u8 {
    fn from(val: CollatableType) -> u8 {
        val.into_u8()
    }
}
