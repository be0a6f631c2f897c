//! The parallel SEG-Y input engine.
//!
//! An [`InputSegy`] is a collective handle over one SEG-Y file: opening it
//! reads and caches the reel fields (`ns`, `nt`, sample interval, number
//! format, text header) on every rank, after which traces and their header
//! metadata can be read per-trace at random, in contiguous batches, at
//! irregular strictly-sorted indices, or at arbitrary repeated indices.
//!
//! Every read is collective. A rank whose batches are exhausted while its
//! peers still have work must keep participating with zero-sized calls;
//! see the batch balancing described in `parseis-comm`.
extern crate parseis_comm;
extern crate parseis_core;

#[cfg(test)]
mod tests;

use std::path::Path;

use parseis_comm::{Communicator, FileMode, ParallelFile};
use parseis_core::number_encoding::{converter_for, read_i16_be};
use parseis_core::segy::{
    self, binary_header_byte, trace_data_size, trace_size, SAMPLE_INTERVAL_FACTOR,
};
use parseis_core::text_encoding::decode_reel_text;
use parseis_core::{
    ParseisError, SampleFormatCode, Status, TraceKey, TraceMetadata, REEL_HEADER_LEN,
    TEXT_HEADER_LEN, TRACE_HEADER_LEN,
};

/// Which trace indices a read addresses.
enum Offsets<'a> {
    Contiguous(usize),
    Scattered(&'a [usize]),
}

impl Offsets<'_> {
    fn nth(&self, i: usize) -> usize {
        match self {
            Offsets::Contiguous(start) => start + i,
            Offsets::Scattered(list) => list[i],
        }
    }
}

/// A SEG-Y file opened for reading.
pub struct InputSegy<'c> {
    file: ParallelFile<'c>,
    name: String,
    ns: usize,
    nt: usize,
    sample_interval: f64,
    number_format: SampleFormatCode,
    text: String,
}

impl<'c> InputSegy<'c> {
    /// Collectively open `path` and read the reel header.
    ///
    /// Files shorter than the 3600-byte reel, sample counts that do not
    /// fit the int16 field and unsupported number formats are fatal.
    pub fn open<P: AsRef<Path>>(
        comm: &'c Communicator,
        path: P,
    ) -> Result<Self, ParseisError> {
        let name = path.as_ref().display().to_string();
        let file = ParallelFile::open(comm, path, FileMode::Read)?;

        let size = file.get_file_size()?;
        if size < REEL_HEADER_LEN as u64 {
            comm.report().add(
                Status::Error,
                format!("{} is {} bytes, too short to be SEG-Y", name, size),
            );
            return Err(ParseisError::FileTooShort { size });
        }

        let mut reel = vec![0u8; REEL_HEADER_LEN];
        file.read(0, &mut reel)?;

        let ns_raw = read_i16_be(&reel, binary_header_byte::NUM_SAMPLE)?;
        if ns_raw < 0 {
            comm.report().add(
                Status::Error,
                format!("{} declares a negative sample count {}", name, ns_raw),
            );
            return Err(ParseisError::InvalidHeader {
                msg: format!("negative sample count {}", ns_raw),
            });
        }
        let ns = ns_raw as usize;

        let interval_raw = read_i16_be(&reel, binary_header_byte::SAMPLE_INTERVAL)?;
        let format_raw = read_i16_be(&reel, binary_header_byte::FORMAT)?;
        let number_format = match SampleFormatCode::new(format_raw as u16) {
            Ok(format) => format,
            Err(e) => {
                comm.report().add(
                    Status::Error,
                    format!("{} uses sample format code {}", name, format_raw),
                );
                return Err(e);
            }
        };

        Ok(InputSegy {
            name,
            ns,
            nt: segy::trace_count(size, ns),
            sample_interval: SAMPLE_INTERVAL_FACTOR * f64::from(interval_raw),
            number_format,
            text: decode_reel_text(&reel[..TEXT_HEADER_LEN]),
            file,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// The number of traces in the file.
    pub fn read_nt(&self) -> usize {
        self.nt
    }

    /// The number of samples per trace.
    pub fn read_ns(&self) -> usize {
        self.ns
    }

    /// The sample interval in seconds.
    pub fn read_sample_interval(&self) -> f64 {
        self.sample_interval
    }

    /// The reel text header, decoded to ASCII.
    pub fn read_text(&self) -> &str {
        &self.text
    }

    pub fn number_format(&self) -> SampleFormatCode {
        self.number_format
    }

    pub fn communicator(&self) -> &Communicator {
        self.file.communicator()
    }

    /// Read `count` trace-header slots starting at trace `offset` into
    /// rows `[skip, skip + count)` of `prm`.
    pub fn read_metadata(
        &self,
        offset: usize,
        count: usize,
        prm: &mut TraceMetadata,
        skip: usize,
    ) -> Result<(), ParseisError> {
        let count = self.clamp(offset, count);
        self.read_impl(Offsets::Contiguous(offset), count, None, Some(prm), skip)
    }

    /// Read trace headers at arbitrary, ascending trace indices.
    pub fn read_metadata_non_contiguous(
        &self,
        offsets: &[usize],
        prm: &mut TraceMetadata,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.read_impl(Offsets::Scattered(offsets), offsets.len(), None, Some(prm), skip)
    }

    /// A zero-sized collective participation for a rank whose batches are
    /// exhausted.
    pub fn read_metadata_null(&self, prm: &mut TraceMetadata) -> Result<(), ParseisError> {
        self.read_metadata(0, 0, prm, 0)
    }

    /// Read `count` traces' samples (and, optionally, their metadata)
    /// starting at trace `offset`.
    ///
    /// `trc` receives `count * ns` samples decoded to host `f32` per the
    /// file's number format.
    pub fn read_trace(
        &self,
        offset: usize,
        count: usize,
        trc: &mut [f32],
        prm: Option<&mut TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        let count = self.clamp(offset, count);
        self.read_impl(Offsets::Contiguous(offset), count, Some(trc), prm, skip)
    }

    /// Read traces at arbitrary, ascending trace indices.
    pub fn read_trace_non_contiguous(
        &self,
        offsets: &[usize],
        trc: &mut [f32],
        prm: Option<&mut TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.read_impl(Offsets::Scattered(offsets), offsets.len(), Some(trc), prm, skip)
    }

    /// Read traces at indices that may repeat and arrive in any order.
    ///
    /// The indices are sorted and de-duplicated, one ascending read is
    /// issued, and the decoded traces are scattered back to the requested
    /// order; duplicate indices all receive the same decoded trace.
    pub fn read_non_monotonic(
        &self,
        offsets: &[usize],
        trc: &mut [f32],
        mut prm: Option<&mut TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        let idx = sorted_index(offsets);
        let mut nodups = Vec::with_capacity(offsets.len());
        for (j, &at) in idx.iter().enumerate() {
            if j == 0 || offsets[idx[j - 1]] != offsets[at] {
                nodups.push(offsets[at]);
            }
        }

        let mut sprm = prm
            .as_ref()
            .map(|p| TraceMetadata::new(p.rules().clone(), nodups.len()));
        let mut strc = vec![0f32; self.ns * nodups.len()];

        self.read_trace_non_contiguous(&nodups, &mut strc, sprm.as_mut(), 0)?;

        if let (Some(prm), Some(sprm)) = (prm.as_mut(), sprm.as_ref()) {
            let mut n = 0;
            for (j, &at) in idx.iter().enumerate() {
                if j != 0 && offsets[idx[j - 1]] != offsets[at] {
                    n += 1;
                }
                prm.copy_entries(skip + at, sprm, n)?;
            }
        }

        let mut n = 0;
        for (j, &at) in idx.iter().enumerate() {
            if j != 0 && offsets[idx[j - 1]] != offsets[at] {
                n += 1;
            }
            trc[at * self.ns..(at + 1) * self.ns]
                .copy_from_slice(&strc[n * self.ns..(n + 1) * self.ns]);
        }
        Ok(())
    }

    /// Clamp a contiguous request against `nt`, warning when nothing of it
    /// remains.
    fn clamp(&self, offset: usize, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        if offset >= self.nt {
            self.file.communicator().report().add(
                Status::Warning,
                format!(
                    "Read of {} at trace {} is past the last trace; zero traces read",
                    self.name, offset
                ),
            );
            return 0;
        }
        std::cmp::min(count, self.nt - offset)
    }

    /// One collective read: headers, samples or whole traces depending on
    /// which outputs the caller wants. Exactly one underlying file call is
    /// issued regardless of `count`, so call sequences stay balanced.
    fn read_impl(
        &self,
        offsets: Offsets,
        count: usize,
        trc: Option<&mut [f32]>,
        prm: Option<&mut TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        let tsz = trace_size(self.ns);
        let dsz = trace_data_size(self.ns);

        match (trc, prm) {
            (Some(trc), Some(prm)) => {
                let mut buf = vec![0u8; tsz * count];
                self.read_blocks(&offsets, count, 0, tsz, &mut buf)?;
                segy::extract_trace_metadata(count, &buf, prm, dsz, skip)?;
                self.set_local_trace_numbers(prm, &offsets, count, skip)?;
                self.decode_samples(&buf, tsz, TRACE_HEADER_LEN, count, trc)?;
            }
            (Some(trc), None) => {
                let mut buf = vec![0u8; dsz * count];
                self.read_blocks(&offsets, count, TRACE_HEADER_LEN, dsz, &mut buf)?;
                self.decode_samples(&buf, dsz, 0, count, trc)?;
            }
            (None, Some(prm)) => {
                let mut buf = vec![0u8; TRACE_HEADER_LEN * count];
                self.read_blocks(&offsets, count, 0, TRACE_HEADER_LEN, &mut buf)?;
                segy::extract_trace_metadata(count, &buf, prm, 0, skip)?;
                self.set_local_trace_numbers(prm, &offsets, count, skip)?;
            }
            (None, None) => {
                self.read_blocks(&offsets, 0, 0, TRACE_HEADER_LEN, &mut [])?;
            }
        }
        Ok(())
    }

    /// Issue the one underlying collective file call for a read.
    fn read_blocks(
        &self,
        offsets: &Offsets,
        count: usize,
        within_trace: usize,
        block: usize,
        buf: &mut [u8],
    ) -> Result<(), ParseisError> {
        let tsz = trace_size(self.ns);
        match offsets {
            Offsets::Contiguous(start) => self.file.read_noncontiguous(
                (REEL_HEADER_LEN + start * tsz + within_trace) as u64,
                block,
                tsz,
                count,
                buf,
            ),
            Offsets::Scattered(list) => {
                let at: Vec<u64> = list
                    .iter()
                    .take(count)
                    .map(|&t| (REEL_HEADER_LEN + t * tsz + within_trace) as u64)
                    .collect();
                self.file.read_noncontiguous_irregular(block, &at, buf)
            }
        }
    }

    fn set_local_trace_numbers(
        &self,
        prm: &mut TraceMetadata,
        offsets: &Offsets,
        count: usize,
        skip: usize,
    ) -> Result<(), ParseisError> {
        if prm.rules().get_entry(TraceKey::Ltn).is_none() {
            return Ok(());
        }
        for i in 0..count {
            prm.set_index(skip + i, TraceKey::Ltn, offsets.nth(i))?;
        }
        Ok(())
    }

    fn decode_samples(
        &self,
        buf: &[u8],
        slot: usize,
        at: usize,
        count: usize,
        trc: &mut [f32],
    ) -> Result<(), ParseisError> {
        let convert = converter_for(self.number_format);
        for i in 0..count {
            let data = &buf[i * slot + at..i * slot + at + trace_data_size(self.ns)];
            for j in 0..self.ns {
                trc[i * self.ns + j] = convert(&data[j * 4..(j + 1) * 4])?;
            }
        }
        Ok(())
    }
}

/// The indices of `list` in ascending order of value, ties kept stable.
fn sorted_index(list: &[usize]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..list.len()).collect();
    idx.sort_by_key(|&i| list[i]);
    idx
}
