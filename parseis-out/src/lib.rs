// Copyright (C) 2024 by GiGa infosystems
//! The parallel SEG-Y output engine.
//!
//! An [`OutputSegy`] is a collective handle over a file being written.
//! Trace payloads and header metadata are written per-trace at explicit
//! global positions; the reel header is deferred until [`OutputSegy::close`],
//! by which time `ns`, the sample interval and the trace count are known.
//! The trace count each rank saw is reconciled by a max reduction, so ranks
//! that wrote fewer traces than their peers need no special handling.
//!
//! Writers always emit IEEE samples, regardless of what they read.
//!
//! `close` is collective and mandatory: the reel only reaches the disk
//! there. Dropping an unclosed output logs an error and leaves a headerless
//! file behind.
extern crate log;
extern crate parseis_comm;
extern crate parseis_core;

#[cfg(test)]
mod integration_tests;

use std::path::Path;

use parseis_comm::{Communicator, FileMode, ParallelFile};
use parseis_core::number_encoding::write_i16_be;
use parseis_core::segy::{
    self, binary_header_byte, trace_data_size, trace_size, SAMPLE_INTERVAL_FACTOR,
};
use parseis_core::text_encoding::layout_reel_text;
use parseis_core::{
    ParseisError, Status, TraceMetadata, REEL_HEADER_LEN, TEXT_HEADER_LEN, TRACE_HEADER_LEN,
};

/// A SEG-Y file being written.
pub struct OutputSegy<'c> {
    file: ParallelFile<'c>,
    name: String,
    ns: usize,
    nt: usize,
    sample_interval: f64,
    text: String,
    ns_set: bool,
    closed: bool,
}

impl<'c> OutputSegy<'c> {
    /// Collectively create (or truncate) `path` for writing.
    pub fn create<P: AsRef<Path>>(
        comm: &'c Communicator,
        path: P,
    ) -> Result<Self, ParseisError> {
        let name = path.as_ref().display().to_string();
        let file = ParallelFile::open(comm, path, FileMode::Write)?;
        Ok(OutputSegy {
            file,
            name,
            ns: 0,
            nt: 0,
            sample_interval: 0.0,
            text: String::new(),
            ns_set: false,
            closed: false,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn communicator(&self) -> &Communicator {
        self.file.communicator()
    }

    /// Set the reel text. The first 3200 bytes of `text` are written as
    /// ASCII, right-padded with spaces.
    pub fn write_text<T: Into<String>>(&mut self, text: T) {
        self.text = text.into();
    }

    /// Set the number of samples per trace.
    pub fn write_ns(&mut self, ns: usize) -> Result<(), ParseisError> {
        if ns > i16::MAX as usize {
            self.file
                .communicator()
                .report()
                .add(Status::Error, format!("Ns value {} is too large for SEG-Y", ns));
            return Err(ParseisError::NsOutOfRange { ns });
        }
        self.ns = ns;
        self.ns_set = true;
        Ok(())
    }

    /// Set the trace count explicitly. Writes past it still extend it.
    pub fn write_nt(&mut self, nt: usize) {
        self.nt = nt;
    }

    /// Set the sample interval, in seconds.
    pub fn write_sample_interval(&mut self, sample_interval: f64) -> Result<(), ParseisError> {
        if !sample_interval.is_normal() {
            self.file.communicator().report().add(
                Status::Error,
                format!("The SEG-Y interval {} is not normal", sample_interval),
            );
            return Err(ParseisError::BadSampleInterval {
                interval: sample_interval,
            });
        }
        self.sample_interval = sample_interval;
        Ok(())
    }

    /// Write `count` traces' samples (and, optionally, their metadata)
    /// starting at global trace `offset`. Rows `[skip, skip + count)` of
    /// the table are consumed.
    pub fn write_trace(
        &mut self,
        offset: usize,
        count: usize,
        trc: &[f32],
        prm: Option<&TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.write_impl(offset, count, Some(trc), prm, skip)?;
        self.nt = std::cmp::max(self.nt, offset + count);
        Ok(())
    }

    /// Write trace headers only.
    pub fn write_metadata(
        &mut self,
        offset: usize,
        count: usize,
        prm: &TraceMetadata,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.write_impl(offset, count, None, Some(prm), skip)?;
        self.nt = std::cmp::max(self.nt, offset + count);
        Ok(())
    }

    /// Write traces at arbitrary global positions.
    pub fn write_trace_non_contiguous(
        &mut self,
        offsets: &[usize],
        trc: &[f32],
        prm: Option<&TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.write_scattered(offsets, Some(trc), prm, skip)?;
        if let Some(&last) = offsets.iter().max() {
            self.nt = std::cmp::max(self.nt, last + 1);
        }
        Ok(())
    }

    /// Write trace headers at arbitrary global positions.
    pub fn write_metadata_non_contiguous(
        &mut self,
        offsets: &[usize],
        prm: &TraceMetadata,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.write_scattered(offsets, None, Some(prm), skip)?;
        if let Some(&last) = offsets.iter().max() {
            self.nt = std::cmp::max(self.nt, last + 1);
        }
        Ok(())
    }

    /// A zero-sized collective participation for a rank whose batches are
    /// exhausted.
    pub fn write_null(&mut self) -> Result<(), ParseisError> {
        self.write_impl(0, 0, None, None, 0)
    }

    fn warn_unset_ns(&self, count: usize) {
        if !self.ns_set && count > 0 {
            self.file.communicator().report().add(
                Status::Warning,
                format!(
                    "Writing {} before the number of samples per trace was set; the output is probably erroneous",
                    self.name
                ),
            );
        }
    }

    /// Assemble the on-disk bytes for `count` trace slots.
    fn marshal(
        &self,
        count: usize,
        trc: Option<&[f32]>,
        prm: Option<&TraceMetadata>,
        skip: usize,
    ) -> Result<(Vec<u8>, usize, usize), ParseisError> {
        let tsz = trace_size(self.ns);
        let dsz = trace_data_size(self.ns);

        // (block size, byte offset of the block inside its trace)
        let (block, within) = match (trc.is_some(), prm.is_some()) {
            (true, true) => (tsz, 0),
            (true, false) => (dsz, TRACE_HEADER_LEN),
            (false, true) => (TRACE_HEADER_LEN, 0),
            (false, false) => (TRACE_HEADER_LEN, 0),
        };

        let mut buf = vec![0u8; block * count];
        if let Some(prm) = prm {
            let row_stride = if trc.is_some() { dsz } else { 0 };
            segy::insert_trace_metadata(count, prm, &mut buf, row_stride, skip)?;
        }
        if let Some(trc) = trc {
            let at = if prm.is_some() { TRACE_HEADER_LEN } else { 0 };
            for i in 0..count {
                for j in 0..self.ns {
                    let sample = trc[i * self.ns + j].to_be_bytes();
                    let slot = i * block + at + 4 * j;
                    buf[slot..slot + 4].copy_from_slice(&sample);
                }
            }
        }
        Ok((buf, block, within))
    }

    fn write_impl(
        &mut self,
        offset: usize,
        count: usize,
        trc: Option<&[f32]>,
        prm: Option<&TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.warn_unset_ns(count);
        let tsz = trace_size(self.ns);
        let (buf, block, within) = self.marshal(count, trc, prm, skip)?;
        self.file.write_noncontiguous(
            (REEL_HEADER_LEN + offset * tsz + within) as u64,
            block,
            tsz,
            count,
            &buf,
        )
    }

    fn write_scattered(
        &mut self,
        offsets: &[usize],
        trc: Option<&[f32]>,
        prm: Option<&TraceMetadata>,
        skip: usize,
    ) -> Result<(), ParseisError> {
        self.warn_unset_ns(offsets.len());
        let tsz = trace_size(self.ns);
        let (buf, block, within) = self.marshal(offsets.len(), trc, prm, skip)?;
        let at: Vec<u64> = offsets
            .iter()
            .map(|&t| (REEL_HEADER_LEN + t * tsz + within) as u64)
            .collect();
        self.file.write_noncontiguous_irregular(block, &at, &buf)
    }

    /// Collectively finish the file: reconcile `nt` across the ranks, size
    /// the file, and write the reel header (rank 0 builds the image, every
    /// other rank participates with a zero-sized write).
    pub fn close(mut self) -> Result<(), ParseisError> {
        self.closed = true;

        self.nt = self.file.communicator().max(self.nt);
        self.file
            .set_file_size(segy::file_size(self.nt, self.ns) as u64)?;

        if self.file.communicator().rank() == 0 {
            let reel = self.reel_image()?;
            self.file.write(0, &reel)
        } else {
            self.file.write(0, &[])
        }
    }

    /// The canonical 3600-byte reel: ASCII text, IEEE samples, rev1,
    /// fixed-length traces, no extensions.
    fn reel_image(&self) -> Result<Vec<u8>, ParseisError> {
        let mut reel = vec![0u8; REEL_HEADER_LEN];
        layout_reel_text(&self.text, &mut reel[..TEXT_HEADER_LEN]);

        let interval = (self.sample_interval / SAMPLE_INTERVAL_FACTOR).round();
        write_i16_be(
            &mut reel,
            binary_header_byte::SAMPLE_INTERVAL,
            interval.clamp(0.0, i16::MAX as f64) as i16,
        )?;
        write_i16_be(&mut reel, binary_header_byte::NUM_SAMPLE, self.ns as i16)?;
        write_i16_be(&mut reel, binary_header_byte::FORMAT, 5)?;
        write_i16_be(&mut reel, binary_header_byte::UNITS, 1)?;
        write_i16_be(&mut reel, binary_header_byte::SEGY_FORMAT, 0x0100)?;
        write_i16_be(&mut reel, binary_header_byte::FIXED_TRACE, 1)?;
        write_i16_be(&mut reel, binary_header_byte::EXTENSIONS, 0)?;
        Ok(reel)
    }
}

impl Drop for OutputSegy<'_> {
    fn drop(&mut self) {
        if !self.closed && !std::thread::panicking() {
            log::error!(
                "Output SEG-Y {} was dropped without close(); no reel header was written",
                self.name
            );
        }
    }
}
