//! Literal values carried by constant instructions.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIs, EnumTryAs};

/// Literal payload of a [`Const`](crate::instruction::InstKind::Const) instruction.
///
/// Two distinct constant instructions may carry equal literals; they remain
/// distinct graph nodes. Comparing literals is what
/// [`Program::get_string_member`](crate::program::Program::get_string_member)
/// relies on.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(ConstKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),

    /// Internal marker for values standing in for something not built yet.
    ///
    /// Never equal to a string literal, so placeholders cannot be mistaken
    /// for member keys.
    Placeholder(String),
}

impl ConstValue {
    /// The string literal, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ConstValue {
    fn from(value: &str) -> Self {
        ConstValue::Str(value.to_string())
    }
}

impl From<String> for ConstValue {
    fn from(value: String) -> Self {
        ConstValue::Str(value)
    }
}

impl From<i64> for ConstValue {
    fn from(value: i64) -> Self {
        ConstValue::Int(value)
    }
}

impl From<bool> for ConstValue {
    fn from(value: bool) -> Self {
        ConstValue::Bool(value)
    }
}

impl From<f64> for ConstValue {
    fn from(value: f64) -> Self {
        ConstValue::Float(value)
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(i) => write!(f, "{}", i),
            ConstValue::Float(x) => write!(f, "{:?}", x),
            ConstValue::Str(s) => write!(f, "{:?}", s),
            ConstValue::Bytes(bytes) => {
                write!(f, "b\"")?;
                for byte in bytes {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, "\"")
            }
            ConstValue::Placeholder(label) => write!(f, "<{}>", label),
        }
    }
}
