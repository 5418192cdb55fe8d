//! Record values and their tagged encoding.
//!
//! A value is written as a one-byte tag, followed by the raw double only for
//! `ValueTag::Normal`. Special values and a handful of very common constants
//! therefore cost a single byte.

use crate::error::{Error, Result};
use crate::stream::{StreamReader, StreamWriter};

/// Field layout of a variable or equation record.
pub const LEVEL: usize = 0;
/// Marginal field index.
pub const MARGINAL: usize = 1;
/// Lower bound field index.
pub const LOWER: usize = 2;
/// Upper bound field index.
pub const UPPER: usize = 3;
/// Scale field index.
pub const SCALE: usize = 4;

/// Configurable doubles that carry a special meaning.
///
/// Each one must have a distinct bit pattern, otherwise a tag could not be
/// mapped back to a single value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialValues {
    /// Undefined
    pub undef: f64,
    /// Not available
    pub na: f64,
    /// Plus infinity
    pub pos_inf: f64,
    /// Minus infinity
    pub neg_inf: f64,
    /// Explicit epsilon (a "zero that is present")
    pub eps: f64,
}

impl Default for SpecialValues {
    fn default() -> Self {
        Self {
            undef: 1.0e300,
            na: 2.0e300,
            pos_inf: f64::INFINITY,
            neg_inf: f64::NEG_INFINITY,
            eps: 4.0e300,
        }
    }
}

impl SpecialValues {
    fn as_array(&self) -> [(ValueTag, f64); 5] {
        [
            (ValueTag::Undef, self.undef),
            (ValueTag::Na, self.na),
            (ValueTag::PosInf, self.pos_inf),
            (ValueTag::NegInf, self.neg_inf),
            (ValueTag::Eps, self.eps),
        ]
    }

    /// Rejects tables in which two entries share a bit pattern.
    pub fn validate(&self) -> Result<()> {
        let entries = self.as_array();
        for (i, (tag_a, a)) in entries.iter().enumerate() {
            for (tag_b, b) in &entries[i + 1..] {
                if a.to_bits() == b.to_bits() {
                    return Err(Error::validation(format!(
                        "special values {:?} and {:?} are both {}",
                        tag_a, tag_b, a
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the tag `value` is stored under.
    pub fn classify(&self, value: f64) -> ValueTag {
        let bits = value.to_bits();
        for (tag, special) in self.as_array() {
            if special.to_bits() == bits {
                return tag;
            }
        }
        if value.is_nan() {
            return ValueTag::Na;
        }
        // Bit comparisons keep -0.0 out of the Zero tag.
        match bits {
            b if b == 0.0f64.to_bits() => ValueTag::Zero,
            b if b == 1.0f64.to_bits() => ValueTag::One,
            b if b == (-1.0f64).to_bits() => ValueTag::MinusOne,
            b if b == 0.5f64.to_bits() => ValueTag::Half,
            b if b == 2.0f64.to_bits() => ValueTag::Two,
            _ => ValueTag::Normal,
        }
    }

    /// Returns the double a tag stands for; `None` for `ValueTag::Normal`.
    pub fn resolve(&self, tag: ValueTag) -> Option<f64> {
        match tag {
            ValueTag::Undef => Some(self.undef),
            ValueTag::Na => Some(self.na),
            ValueTag::PosInf => Some(self.pos_inf),
            ValueTag::NegInf => Some(self.neg_inf),
            ValueTag::Eps => Some(self.eps),
            ValueTag::Zero => Some(0.0),
            ValueTag::One => Some(1.0),
            ValueTag::MinusOne => Some(-1.0),
            ValueTag::Half => Some(0.5),
            ValueTag::Two => Some(2.0),
            ValueTag::Normal => None,
        }
    }

    /// Returns true if `value` is one of the configured special values.
    pub fn is_special(&self, value: f64) -> bool {
        matches!(
            self.classify(value),
            ValueTag::Undef | ValueTag::Na | ValueTag::PosInf | ValueTag::NegInf | ValueTag::Eps
        )
    }

    /// Write one value.
    pub fn write_value(&self, writer: &mut StreamWriter, value: f64) -> Result<()> {
        let tag = self.classify(value);
        writer.write_u8(tag as u8)?;
        if tag == ValueTag::Normal {
            writer.write_f64(value)?;
        }
        Ok(())
    }

    /// Read one value.
    pub fn read_value(&self, reader: &mut StreamReader) -> Result<f64> {
        let raw = reader.read_u8()?;
        let tag = ValueTag::from_u8(raw)
            .ok_or_else(|| Error::corruption(format!("unknown value tag {}", raw)))?;
        match self.resolve(tag) {
            Some(value) => Ok(value),
            None => reader.read_f64(),
        }
    }
}

/// One-byte tags of the value encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    /// Undefined
    Undef = 0,
    /// Not available
    Na = 1,
    /// Plus infinity
    PosInf = 2,
    /// Minus infinity
    NegInf = 3,
    /// Epsilon
    Eps = 4,
    /// 0.0
    Zero = 5,
    /// 1.0
    One = 6,
    /// -1.0
    MinusOne = 7,
    /// 0.5
    Half = 8,
    /// 2.0
    Two = 9,
    /// Followed by the raw double
    Normal = 10,
}

impl ValueTag {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => ValueTag::Undef,
            1 => ValueTag::Na,
            2 => ValueTag::PosInf,
            3 => ValueTag::NegInf,
            4 => ValueTag::Eps,
            5 => ValueTag::Zero,
            6 => ValueTag::One,
            7 => ValueTag::MinusOne,
            8 => ValueTag::Half,
            9 => ValueTag::Two,
            10 => ValueTag::Normal,
            _ => return None,
        })
    }
}
