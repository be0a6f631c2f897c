// Copyright (C) 2024 by GiGa infosystems
//! Big-endian field access and the sample float codecs.
//!
//! Everything SEG-Y stores is big-endian on disk. The helpers here slice a
//! field out of (or into) a header buffer, and convert trace samples between
//! the on-disk IBM/IEEE encodings and host `f32`.
use crate::enums::SampleFormatCode;
use crate::errors::*;

use ibmfloat::F32;
use std::array::TryFromSliceError;
use std::convert::TryInto;

pub type SampleConverter = fn(&[u8]) -> Result<f32, TryFromSliceError>;

/// This function chooses the converter for the binary trace data.
///
/// The converter should be chosen once per file for efficiency.
/// ```
/// # use parseis_core::number_encoding::converter_for;
/// # use parseis_core::enums::SampleFormatCode;
/// let bytes_to_f32 = converter_for(SampleFormatCode::Float32);
///
/// let bytes = 42.0f32.to_be_bytes();
/// let nmbr = bytes_to_f32(&bytes[..]).unwrap();
/// assert_eq!(nmbr, 42.);
/// ```
pub fn converter_for(format: SampleFormatCode) -> SampleConverter {
    match format {
        SampleFormatCode::IbmFloat32 => {
            fn x(input: &[u8]) -> Result<f32, TryFromSliceError> {
                Ok(f32::from(F32::from_be_bytes(input.try_into()?)))
            }
            x
        }
        SampleFormatCode::Float32 => {
            fn x(input: &[u8]) -> Result<f32, TryFromSliceError> {
                Ok(f32::from_be_bytes(input.try_into()?))
            }
            x
        }
    }
}

/// Decode a 4-byte IBM-370 single precision float.
pub fn ibm_to_ieee(bytes: [u8; 4]) -> f32 {
    f32::from(F32::from_be_bytes(bytes))
}

/// Encode an IEEE `f32` as a 4-byte IBM-370 single precision float.
///
/// The IBM format is sign (1 bit), base-16 exponent (7 bits, bias 64) and a
/// 24-bit fraction. Mantissa bits that do not survive the base-16 alignment
/// are truncated toward zero. Zero and IEEE denormals encode as signed zero;
/// infinities and NaN saturate at the largest IBM magnitude.
pub fn ieee_to_ibm(value: f32) -> [u8; 4] {
    let bits = value.to_bits();
    let sign = ((bits >> 31) as u8) << 7;
    let exp2 = ((bits >> 23) & 0xff) as i32;
    let frac = bits & 0x007f_ffff;

    if exp2 == 0 {
        return [sign, 0, 0, 0];
    }
    if exp2 == 0xff {
        return [sign | 0x7f, 0xff, 0xff, 0xff];
    }

    // value = (mantissa / 2^24) * 2^e with the fraction in [1/2, 1).
    let mantissa = frac | 0x0080_0000;
    let e = exp2 - 126;

    // The base-2 exponent must become a multiple of 4 for the base-16
    // field; the remainder is absorbed by shifting the mantissa down.
    let e16 = (e + 3).div_euclid(4);
    let shift = (4 * e16 - e) as u32;
    let m = mantissa >> shift;

    let exp_field = e16 + 64;
    if exp_field < 0 {
        return [sign, 0, 0, 0];
    }
    if exp_field > 127 {
        return [sign | 0x7f, 0xff, 0xff, 0xff];
    }

    [
        sign | exp_field as u8,
        (m >> 16) as u8,
        (m >> 8) as u8,
        m as u8,
    ]
}

pub fn read_i16_be(buf: &[u8], at: usize) -> Result<i16, ParseisError> {
    let bytes = buf.get(at..at + 2).ok_or(ParseisError::BitConversion {
        msg: format!("short buffer reading an i16 at byte {}", at),
    })?;
    Ok(i16::from_be_bytes(bytes.try_into()?))
}

pub fn read_i32_be(buf: &[u8], at: usize) -> Result<i32, ParseisError> {
    let bytes = buf.get(at..at + 4).ok_or(ParseisError::BitConversion {
        msg: format!("short buffer reading an i32 at byte {}", at),
    })?;
    Ok(i32::from_be_bytes(bytes.try_into()?))
}

pub fn write_i16_be(buf: &mut [u8], at: usize, value: i16) -> Result<(), ParseisError> {
    let slot = buf.get_mut(at..at + 2).ok_or(ParseisError::BitConversion {
        msg: format!("short buffer writing an i16 at byte {}", at),
    })?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub fn write_i32_be(buf: &mut [u8], at: usize, value: i32) -> Result<(), ParseisError> {
    let slot = buf.get_mut(at..at + 4).ok_or(ParseisError::BitConversion {
        msg: format!("short buffer writing an i32 at byte {}", at),
    })?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}
