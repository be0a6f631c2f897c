//! Distributed operators over trace metadata and payloads.
//!
//! Everything here runs SPMD over a `parseis-comm` process group:
//!
//! - [`sort`]: a bounded-memory global reorder of a metadata table by an
//!   arbitrary comparator, via neighbour exchange. No rank ever holds more
//!   than twice its local share.
//! - [`check_order`]: streaming verification that a file obeys a sort
//!   order, including across rank boundaries.
//! - [`get_min_max`]: parallel argmin/argmax of two projections with
//!   global trace witnesses.
//! - [`get_il_xl_gathers`]: run-length grouping of a file into
//!   inline/crossline gathers, reconciled across rank boundaries.
//! - [`fourd`]: the 4D binning matcher, pairing every trace of one survey
//!   with its geometric nearest neighbour in another.
extern crate log;
extern crate num;
#[macro_use]
extern crate num_derive;
extern crate num_traits;
extern crate parseis_comm;
extern crate parseis_core;
extern crate parseis_in;
extern crate parseis_out;

pub mod fourd;
pub mod gather;
pub mod minmax;
pub mod sort;
#[cfg(test)]
mod integration_tests;

pub use gather::{get_il_xl_gathers, GatherInfo};
pub use minmax::{get_min_max, get_min_max_keyed, CoordElem};
pub use sort::{check_order, get_comp, get_sort_index, sort, sort_by_type, SortType};

use parseis_comm::Communicator;

/// Every rank calls this; rank 0 logs the message once the whole group
/// has arrived.
pub(crate) fn cmsg(comm: &Communicator, msg: &str) {
    comm.barrier();
    if comm.rank() == 0 {
        log::info!("{}", msg);
    }
}
