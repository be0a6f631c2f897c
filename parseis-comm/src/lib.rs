//! The parallel substrate of the `parseis` workspace.
//!
//! Processing is SPMD over a fixed group of ranks. [`ProcessGroup::run`]
//! launches the group and hands each rank a [`Communicator`]; everything
//! collective in the file engines and the operators is built on the
//! primitives here: the communicator's collectives and mailboxes, the block
//! decomposition of index ranges, the globally addressable
//! [`DistributedVector`] and the collective [`ParallelFile`] I/O.
//!
//! Every collective operation must be entered by every rank of the group in
//! the same order. A rank with no local work still participates with a
//! zero-sized call; the engines' batch balancing exists to guarantee that.
extern crate crossbeam_channel;
extern crate parseis_core;

pub mod communicator;
pub mod decomposition;
pub mod distributed;
pub mod file;

pub use communicator::{Communicator, ProcessGroup};
pub use decomposition::{
    block_decomp, block_decomposition, block_decomposition_location, Decomposition,
    DecompositionLocation,
};
pub use distributed::DistributedVector;
pub use file::{FileMode, ParallelFile, MAX_IO_CHUNK};
