//! The enums decoded from (and encoded into) SEG-Y binary headers.
//!
//! Codes that may only take certain values on the wire are represented by
//! enums with fixed numerical values; an unrecognised code returns an error
//! rather than a guess.
use num::FromPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::*;

/// From bytes 3225-3226 (25-26) of the binary header.
///
/// Only the two formats this library transcodes are listed; every other
/// SEG-Y code is rejected on read, and writes always emit `Float32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleFormatCode {
    IbmFloat32 = 1,
    Float32 = 5,
}

impl std::fmt::Display for SampleFormatCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl SampleFormatCode {
    pub fn new(source: u16) -> Result<Self, ParseisError> {
        SampleFormatCode::from_u16(source).ok_or(ParseisError::UnsupportedFormat { code: source })
    }
}
