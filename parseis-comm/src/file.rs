// Copyright (C) 2024 by GiGa infosystems
//! Collective binary file I/O.
//!
//! Every rank holds its own descriptor on the same path and reads or
//! writes at explicit offsets. Each operation is collective: it begins
//! with a group barrier, so a rank with nothing to transfer must still
//! call with an empty buffer. Ranks writing disjoint byte ranges in the
//! same collective are safe; overlapping writes are undefined.
//!
//! Transfers are split into [`MAX_IO_CHUNK`]-byte pieces; the split is a
//! pure function of the request so every rank splits identically.
//!
//! I/O errors are fatal: they are recorded in the group report and
//! surfaced again at the next `assert_ok`.
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use parseis_core::{ParseisError, Status};

use crate::communicator::Communicator;

/// The per-call cap a single transport operation may carry.
pub const MAX_IO_CHUNK: usize = i32::MAX as usize;

/// The access mode of a [`ParallelFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    ReadWrite,
}

/// A handle over one path, collective over a communicator.
pub struct ParallelFile<'c> {
    comm: &'c Communicator,
    file: File,
    name: String,
}

impl<'c> ParallelFile<'c> {
    /// Collectively open `path`. `Write` truncates, `ReadWrite` creates
    /// without truncating, `Read` requires the file to exist.
    pub fn open<P: AsRef<Path>>(
        comm: &'c Communicator,
        path: P,
        mode: FileMode,
    ) -> Result<Self, ParseisError> {
        let name = path.as_ref().display().to_string();

        // Rank 0 creates (and, for Write, truncates) before anyone else
        // touches the path.
        let first = if comm.rank() == 0 {
            Some(Self::open_local(path.as_ref(), mode, true))
        } else {
            None
        };
        let created = comm.all(first.as_ref().map(|r| r.is_ok()).unwrap_or(true));
        if !created {
            comm.report()
                .add(Status::Error, format!("Could not open {}", name));
            return Err(Self::first_error(first, &name));
        }

        let local = match first {
            Some(result) => result,
            None => Self::open_local(path.as_ref(), mode, false),
        };
        let all_open = comm.all(local.is_ok());
        match (all_open, local) {
            (true, Ok(file)) => Ok(ParallelFile { comm, file, name }),
            (_, local) => {
                comm.report()
                    .add(Status::Error, format!("Could not open {}", name));
                Err(Self::first_error(Some(local), &name))
            }
        }
    }

    fn open_local(path: &Path, mode: FileMode, creator: bool) -> Result<File, std::io::Error> {
        let mut options = OpenOptions::new();
        match mode {
            FileMode::Read => {
                options.read(true);
            }
            FileMode::Write => {
                options.read(true).write(true);
                if creator {
                    options.create(true).truncate(true);
                }
            }
            FileMode::ReadWrite => {
                options.read(true).write(true);
                if creator {
                    options.create(true);
                }
            }
        }
        options.open(path)
    }

    fn first_error(
        local: Option<Result<File, std::io::Error>>,
        name: &str,
    ) -> ParseisError {
        match local {
            Some(Err(e)) => ParseisError::StdIoError(e),
            _ => ParseisError::StdIoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("a peer rank failed to open {}", name),
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn communicator(&self) -> &Communicator {
        self.comm
    }

    /// The file size, agreed across the group.
    pub fn get_file_size(&self) -> Result<u64, ParseisError> {
        let local = self.file.metadata().map(|m| m.len());
        let size = self.comm.max(*local.as_ref().unwrap_or(&0));
        match local {
            Ok(_) => Ok(size),
            Err(e) => {
                self.fatal(format!("Could not stat {}: {}", self.name, e));
                Err(e.into())
            }
        }
    }

    /// Truncate or extend the file to `size` bytes.
    pub fn set_file_size(&self, size: u64) -> Result<(), ParseisError> {
        self.comm.barrier();
        let result = if self.comm.rank() == 0 {
            self.file.set_len(size)
        } else {
            Ok(())
        };
        self.comm.barrier();
        result.map_err(|e| {
            self.fatal(format!("Could not resize {}: {}", self.name, e));
            e.into()
        })
    }

    /// Contiguous read of `buf.len()` bytes at `offset`.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), ParseisError> {
        self.comm.barrier();
        self.read_span(offset, buf)
    }

    /// Contiguous write of `data` at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), ParseisError> {
        self.comm.barrier();
        self.write_span(offset, data)
    }

    /// Read `count` blocks of `block` bytes whose starts are `stride`
    /// bytes apart, packed contiguously into `buf`.
    pub fn read_noncontiguous(
        &self,
        offset: u64,
        block: usize,
        stride: usize,
        count: usize,
        buf: &mut [u8],
    ) -> Result<(), ParseisError> {
        assert!(buf.len() >= block * count);
        self.comm.barrier();
        if block == stride {
            return self.read_span(offset, &mut buf[..block * count]);
        }
        for i in 0..count {
            self.read_span(
                offset + (i * stride) as u64,
                &mut buf[i * block..(i + 1) * block],
            )?;
        }
        Ok(())
    }

    /// The scatter counterpart of [`Self::read_noncontiguous`].
    pub fn write_noncontiguous(
        &self,
        offset: u64,
        block: usize,
        stride: usize,
        count: usize,
        data: &[u8],
    ) -> Result<(), ParseisError> {
        assert!(data.len() >= block * count);
        self.comm.barrier();
        if block == stride {
            return self.write_span(offset, &data[..block * count]);
        }
        for i in 0..count {
            self.write_span(offset + (i * stride) as u64, &data[i * block..(i + 1) * block])?;
        }
        Ok(())
    }

    /// Gather `offsets.len()` blocks of `block` bytes from explicit
    /// offsets, packed contiguously into `buf`.
    pub fn read_noncontiguous_irregular(
        &self,
        block: usize,
        offsets: &[u64],
        buf: &mut [u8],
    ) -> Result<(), ParseisError> {
        assert!(buf.len() >= block * offsets.len());
        self.comm.barrier();
        for (i, &at) in offsets.iter().enumerate() {
            self.read_span(at, &mut buf[i * block..(i + 1) * block])?;
        }
        Ok(())
    }

    /// The scatter counterpart of [`Self::read_noncontiguous_irregular`].
    pub fn write_noncontiguous_irregular(
        &self,
        block: usize,
        offsets: &[u64],
        data: &[u8],
    ) -> Result<(), ParseisError> {
        assert!(data.len() >= block * offsets.len());
        self.comm.barrier();
        for (i, &at) in offsets.iter().enumerate() {
            self.write_span(at, &data[i * block..(i + 1) * block])?;
        }
        Ok(())
    }

    fn fatal(&self, message: String) {
        self.comm.report().add(Status::Error, message);
    }

    /// Non-collective contiguous read. A read past the end of the file
    /// zero-fills the tail and records a warning.
    fn read_span(&self, offset: u64, buf: &mut [u8]) -> Result<(), ParseisError> {
        let mut done = 0;
        while done < buf.len() {
            let want = std::cmp::min(MAX_IO_CHUNK, buf.len() - done);
            let read = self
                .file
                .read_at(&mut buf[done..done + want], offset + done as u64)
                .map_err(|e| {
                    self.fatal(format!("Read of {} failed: {}", self.name, e));
                    ParseisError::StdIoError(e)
                })?;
            if read == 0 {
                self.comm.report().add(
                    Status::Warning,
                    format!(
                        "Read of {} past end of file at byte {}",
                        self.name,
                        offset + done as u64
                    ),
                );
                for slot in buf[done..].iter_mut() {
                    *slot = 0;
                }
                return Ok(());
            }
            done += read;
        }
        Ok(())
    }

    /// Non-collective contiguous write.
    fn write_span(&self, offset: u64, data: &[u8]) -> Result<(), ParseisError> {
        let mut done = 0;
        while done < data.len() {
            let want = std::cmp::min(MAX_IO_CHUNK, data.len() - done);
            self.file
                .write_all_at(&data[done..done + want], offset + done as u64)
                .map_err(|e| {
                    self.fatal(format!("Write of {} failed: {}", self.name, e));
                    ParseisError::StdIoError(e)
                })?;
            done += want;
        }
        Ok(())
    }
}
