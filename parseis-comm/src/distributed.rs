//! A globally addressable, locally resident array.
//!
//! Each rank owns the slice of `[0, n)` its block decomposition gives it
//! and publishes it to the group; any rank may then read or write any
//! element. Reads take the owning slice's shared lock, writes the
//! exclusive lock. Bulk transfers run rank by rank, holding each owner's
//! lock once and splitting the copy into transport-sized chunks.
//!
//! Between a writer and a reader of the same element there must be a
//! [`DistributedVector::sync`]; unsynchronised access to disjoint elements
//! is safe.
use std::sync::{Arc, RwLock};

use crate::communicator::Communicator;
use crate::decomposition::{block_decomposition, block_decomposition_location};
use crate::file::MAX_IO_CHUNK;

/// A fixed-size distributed array of `T`.
pub struct DistributedVector<'c, T: Copy + Default + Send + Sync + 'static> {
    comm: &'c Communicator,
    global_size: usize,
    sizes: Vec<usize>,
    slices: Vec<Arc<RwLock<Vec<T>>>>,
}

impl<'c, T: Copy + Default + Send + Sync + 'static> DistributedVector<'c, T> {
    /// Collectively construct the array. Elements start at `T::default()`.
    pub fn new(comm: &'c Communicator, global_size: usize) -> Self {
        let dec = block_decomposition(global_size, comm.num_ranks(), comm.rank());
        let local = Arc::new(RwLock::new(vec![T::default(); dec.local_size]));
        let slices = comm.gather(local);
        let sizes = (0..comm.num_ranks())
            .map(|r| block_decomposition(global_size, comm.num_ranks(), r).local_size)
            .collect();
        DistributedVector {
            comm,
            global_size,
            sizes,
            slices,
        }
    }

    pub fn size(&self) -> usize {
        self.global_size
    }

    pub fn communicator(&self) -> &Communicator {
        self.comm
    }

    /// Read one element. Out-of-range indices read as `T::default()`.
    pub fn get(&self, i: usize) -> T {
        if i >= self.global_size {
            return T::default();
        }
        let loc = block_decomposition_location(self.global_size, self.comm.num_ranks(), i);
        let slice = self.slices[loc.rank].read().expect("window lock poisoned");
        slice[loc.local_index]
    }

    /// Write one element. Out-of-range indices are ignored.
    pub fn set(&self, i: usize, value: T) {
        if i >= self.global_size {
            return;
        }
        let loc = block_decomposition_location(self.global_size, self.comm.num_ranks(), i);
        let mut slice = self.slices[loc.rank].write().expect("window lock poisoned");
        slice[loc.local_index] = value;
    }

    /// Read `buf.len()` elements starting at `offset`.
    pub fn get_n(&self, offset: usize, buf: &mut [T]) {
        assert!(offset + buf.len() <= self.global_size);
        let chunk = std::cmp::max(1, MAX_IO_CHUNK / std::mem::size_of::<T>());

        let mut done = 0;
        while done < buf.len() {
            let loc =
                block_decomposition_location(self.global_size, self.comm.num_ranks(), offset + done);
            let run = std::cmp::min(buf.len() - done, self.sizes[loc.rank] - loc.local_index);
            let slice = self.slices[loc.rank].read().expect("window lock poisoned");
            let mut copied = 0;
            while copied < run {
                let n = std::cmp::min(chunk, run - copied);
                buf[done + copied..done + copied + n].copy_from_slice(
                    &slice[loc.local_index + copied..loc.local_index + copied + n],
                );
                copied += n;
            }
            done += run;
        }
    }

    /// Write `data.len()` elements starting at `offset`.
    pub fn set_n(&self, offset: usize, data: &[T]) {
        assert!(offset + data.len() <= self.global_size);
        let chunk = std::cmp::max(1, MAX_IO_CHUNK / std::mem::size_of::<T>());

        let mut done = 0;
        while done < data.len() {
            let loc =
                block_decomposition_location(self.global_size, self.comm.num_ranks(), offset + done);
            let run = std::cmp::min(data.len() - done, self.sizes[loc.rank] - loc.local_index);
            let mut slice = self.slices[loc.rank].write().expect("window lock poisoned");
            let mut copied = 0;
            while copied < run {
                let n = std::cmp::min(chunk, run - copied);
                slice[loc.local_index + copied..loc.local_index + copied + n]
                    .copy_from_slice(&data[done + copied..done + copied + n]);
                copied += n;
            }
            done += run;
        }
    }

    /// Collectively reallocate to `new_size`, keeping the overlapping
    /// prefix of the old content.
    pub fn resize(&mut self, new_size: usize) {
        let keep = std::cmp::min(self.global_size, new_size);
        let dec = block_decomposition(new_size, self.comm.num_ranks(), self.comm.rank());

        let mut local = vec![T::default(); dec.local_size];
        let local_keep = keep.saturating_sub(dec.global_offset);
        let local_keep = std::cmp::min(local_keep, dec.local_size);
        if local_keep > 0 {
            self.get_n(dec.global_offset, &mut local[..local_keep]);
        }
        self.comm.barrier();

        let slices = self.comm.gather(Arc::new(RwLock::new(local)));
        self.sizes = (0..self.comm.num_ranks())
            .map(|r| block_decomposition(new_size, self.comm.num_ranks(), r).local_size)
            .collect();
        self.slices = slices;
        self.global_size = new_size;
    }

    /// Synchronise the group: all writes before the sync are visible to
    /// all reads after it.
    pub fn sync(&self) {
        self.comm.barrier();
    }
}
