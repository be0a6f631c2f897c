// Copyright (C) 2024 by GiGa infosystems
//! The SEG-Y wire format: byte positions, size formulas and the
//! marshalling between header buffers and metadata tables.
//!
//! A rev1 file is a 3600-byte reel header followed by fixed-length traces of
//! `240 + 4 * ns` bytes each. All fields are big-endian.
use crate::errors::*;
use crate::metadata::TraceMetadata;
use crate::number_encoding::{read_i16_be, read_i32_be, write_i16_be, write_i32_be};
use crate::rules::RuleEntry;
use crate::{REEL_HEADER_LEN, TRACE_HEADER_LEN};

use fnv::FnvHashMap;

/// 0-based byte positions of the binary reel header fields of interest.
pub mod binary_header_byte {
    pub const SAMPLE_INTERVAL: usize = 3216;
    pub const NUM_SAMPLE: usize = 3220;
    pub const FORMAT: usize = 3224;
    pub const UNITS: usize = 3254;
    pub const SEGY_FORMAT: usize = 3500;
    pub const FIXED_TRACE: usize = 3502;
    pub const EXTENSIONS: usize = 3504;
}

/// 1-based start positions of the standard trace header fields, as the
/// SEG-Y rev1 document numbers them.
pub mod trace_header_byte {
    pub const LINE_TRACE_NUM: usize = 1;
    pub const FILE_TRACE_NUM: usize = 5;
    pub const FIELD_RECORD_NUM: usize = 9;
    pub const ENSEMBLE_NUM: usize = 21;
    pub const OFFSET: usize = 37;
    pub const COORDINATE_SCALAR: usize = 71;
    pub const SOURCE_X: usize = 73;
    pub const SOURCE_Y: usize = 77;
    pub const RECEIVER_X: usize = 81;
    pub const RECEIVER_Y: usize = 85;
    pub const NS: usize = 115;
    pub const SAMPLE_INTERVAL: usize = 117;
    pub const CDP_X: usize = 181;
    pub const CDP_Y: usize = 185;
    pub const INLINE: usize = 189;
    pub const CROSSLINE: usize = 193;
    pub const TIME_SCALAR: usize = 215;
    pub const SOURCE_MEASUREMENT: usize = 225;
}

/// Seconds per on-disk sample interval unit: the binary header stores the
/// interval in microseconds.
pub const SAMPLE_INTERVAL_FACTOR: f64 = 1.0e-6;

/// The bytes of one trace's sample payload.
pub fn trace_data_size(ns: usize) -> usize {
    ns * std::mem::size_of::<f32>()
}

/// The bytes of one whole trace, header included.
pub fn trace_size(ns: usize) -> usize {
    TRACE_HEADER_LEN + trace_data_size(ns)
}

/// The bytes of a whole file of `nt` traces.
pub fn file_size(nt: usize, ns: usize) -> usize {
    REEL_HEADER_LEN + nt * trace_size(ns)
}

/// The number of whole traces a file of `size` bytes holds.
pub fn trace_count(size: u64, ns: usize) -> usize {
    ((size as usize).saturating_sub(REEL_HEADER_LEN)) / trace_size(ns)
}

/// The per-batch scalar for a run of values sharing one scalar field.
///
/// A positive scalar multiplies the stored mantissa on read, a negative one
/// divides. Any value too large for a raw int32 forces the smallest
/// magnitude-reducing scalar that fits every value; otherwise fractional
/// batches take the most precise dividing scalar every value tolerates, and
/// purely integral batches settle at 1. Batches mixing very large and very
/// small magnitudes lose precision on the small side.
pub(crate) fn batch_scalar<I: Iterator<Item = f64>>(values: I) -> i16 {
    let mut max_abs: f64 = 0.0;
    let mut all_integral = true;
    for v in values {
        if !v.is_finite() {
            continue;
        }
        let a = v.abs();
        if a > max_abs {
            max_abs = a;
        }
        if v.fract() != 0.0 {
            all_integral = false;
        }
    }

    const LIMIT: f64 = i32::MAX as f64;
    if max_abs > LIMIT {
        for p in 1..=4u32 {
            if max_abs / 10f64.powi(p as i32) <= LIMIT {
                return 10i16.pow(p);
            }
        }
        return 10_000;
    }
    if all_integral {
        return 1;
    }
    for p in (1..=4u32).rev() {
        if max_abs * 10f64.powi(p as i32) <= LIMIT {
            return -(10i16.pow(p));
        }
    }
    1
}

fn apply_scalar(mantissa: i32, scalar: i16) -> f64 {
    match scalar {
        s if s > 0 => mantissa as f64 * s as f64,
        s if s < 0 => mantissa as f64 / -(s as f64),
        _ => mantissa as f64,
    }
}

fn quantise(value: f64, scalar: i16) -> i32 {
    let scaled = match scalar {
        s if s > 0 => value / s as f64,
        s if s < 0 => value * -(s as f64),
        _ => value,
    };
    scaled.round() as i32
}

/// Encode `rows` table rows into header slots of `out`.
///
/// Slot `i` starts at `i * (240 + row_stride)`; a nonzero `row_stride`
/// leaves room for the sample payload when whole traces are assembled in
/// one buffer. Rows `[skip, skip + rows)` of the table are consumed.
///
/// A copy rule blits the buffered header first, then the interpreted rules
/// overwrite their fields. Scaled floats share one scalar per batch per
/// scalar location.
pub fn insert_trace_metadata(
    rows: usize,
    prm: &TraceMetadata,
    out: &mut [u8],
    row_stride: usize,
    skip: usize,
) -> Result<(), ParseisError> {
    if rows == 0 {
        return Ok(());
    }
    let slot = TRACE_HEADER_LEN + row_stride;
    let keys = prm.rules().keys_in_order();

    // One shared scalar per scalar location, derived over the whole batch
    // of every float rule pointing at it.
    let mut scalars: FnvHashMap<usize, i16> = FnvHashMap::default();
    for &key in &keys {
        if let Some(&RuleEntry::SegyFloat { scalar_loc, .. }) = prm.rules().get_entry(key) {
            scalars.entry(scalar_loc).or_insert(0);
        }
    }
    let locs: Vec<usize> = scalars.keys().copied().collect();
    for loc in locs {
        let mut batch = Vec::new();
        for &key in &keys {
            if let Some(&RuleEntry::SegyFloat { scalar_loc, .. }) = prm.rules().get_entry(key) {
                if scalar_loc == loc {
                    for r in 0..rows {
                        batch.push(prm.get_floating_point(r + skip, key)?);
                    }
                }
            }
        }
        scalars.insert(loc, batch_scalar(batch.into_iter()));
    }

    for r in 0..rows {
        let header = &mut out[r * slot..r * slot + TRACE_HEADER_LEN];

        if prm.rules().has_copy() {
            header.copy_from_slice(prm.copy_header(r + skip)?);
        }
        for (&loc, &scalar) in scalars.iter() {
            write_i16_be(header, loc - 1, scalar)?;
        }
        for &key in &keys {
            match prm.rules().get_entry(key) {
                Some(&RuleEntry::Long { loc }) => {
                    let v = prm.get_integer(r + skip, key)?;
                    write_i32_be(
                        header,
                        loc - 1,
                        v.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                    )?;
                }
                Some(&RuleEntry::Short { loc }) => {
                    let v = prm.get_integer(r + skip, key)?;
                    write_i16_be(
                        header,
                        loc - 1,
                        v.clamp(i16::MIN as i64, i16::MAX as i64) as i16,
                    )?;
                }
                Some(&RuleEntry::SegyFloat { loc, scalar_loc }) => {
                    let v = prm.get_floating_point(r + skip, key)?;
                    write_i32_be(header, loc - 1, quantise(v, scalars[&scalar_loc]))?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Decode `rows` header slots of `input` into table rows.
///
/// The inverse of [`insert_trace_metadata`]; each float rule reads its
/// shared scalar from the slot before scaling its mantissa.
pub fn extract_trace_metadata(
    rows: usize,
    input: &[u8],
    prm: &mut TraceMetadata,
    row_stride: usize,
    skip: usize,
) -> Result<(), ParseisError> {
    if rows == 0 {
        return Ok(());
    }
    let slot = TRACE_HEADER_LEN + row_stride;
    let keys = prm.rules().keys_in_order();

    for r in 0..rows {
        let header = &input[r * slot..r * slot + TRACE_HEADER_LEN];

        for &key in &keys {
            match prm.rules().get_entry(key).copied() {
                Some(RuleEntry::Long { loc }) => {
                    let v = read_i32_be(header, loc - 1)? as i64;
                    prm.set_integer(r + skip, key, v)?;
                }
                Some(RuleEntry::Short { loc }) => {
                    let v = read_i16_be(header, loc - 1)? as i64;
                    prm.set_integer(r + skip, key, v)?;
                }
                Some(RuleEntry::SegyFloat { loc, scalar_loc }) => {
                    let scalar = read_i16_be(header, scalar_loc - 1)?;
                    let mantissa = read_i32_be(header, loc - 1)?;
                    prm.set_floating_point(r + skip, key, apply_scalar(mantissa, scalar))?;
                }
                Some(RuleEntry::Copy) => {
                    let dst = (r + skip) * TRACE_HEADER_LEN;
                    prm.copy[dst..dst + TRACE_HEADER_LEN].copy_from_slice(header);
                }
                _ => {}
            }
        }
    }
    Ok(())
}
