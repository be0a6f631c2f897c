//! The I/O phases of the 4D binning matcher.
use std::path::Path;
use std::sync::Arc;

use parseis_comm::{block_decomposition, Communicator};
use parseis_core::segy::{trace_header_byte, trace_size};
use parseis_core::{ParseisError, RuleSet, TraceKey, TraceMetadata, TRACE_HEADER_LEN};
use parseis_in::InputSegy;
use parseis_out::OutputSegy;

use super::coords::Coords;
use crate::cmsg;
use crate::sort::{get_sort_index, sort};

/// The working-memory budget of the extraction phase.
const MEM_LIMIT: usize = 2 * 1024 * 1024 * 1024;

/// The working-memory budget of the output phase.
const OUTPUT_MEM_LIMIT: usize = 1024 * 1024 * 1024;

fn batches(n: usize, max: usize) -> usize {
    n / max + usize::from(n % max > 0)
}

fn batch_cap(budget: usize, per_row: usize) -> usize {
    std::cmp::max(1, budget / per_row)
}

/// Source x first, ties in original file order.
fn by_x_src_then_gtn(prm: &TraceMetadata, i: usize, j: usize) -> bool {
    let a = prm.get_floating_point(i, TraceKey::SourceX).unwrap_or(f64::NAN);
    let b = prm.get_floating_point(j, TraceKey::SourceX).unwrap_or(f64::NAN);
    if a < b {
        return true;
    }
    if a > b {
        return false;
    }
    prm.get_index(i, TraceKey::Gtn).unwrap_or(usize::MAX)
        < prm.get_index(j, TraceKey::Gtn).unwrap_or(usize::MAX)
}

/// Read one file's coordinates, decomposed over the group and locally
/// sorted by source x (ties by original trace number).
///
/// The global sort redistributes the traces so each rank ends up with a
/// contiguous source-x band; the coordinates are then fetched through the
/// sort permutation with batched ascending reads.
pub fn get_coords<P: AsRef<Path>>(
    comm: &Communicator,
    name: P,
    ixline: bool,
) -> Result<Arc<Coords>, ParseisError> {
    let file = InputSegy::open(comm, &name)?;
    comm.assert_ok()?;

    let dec = block_decomposition(file.read_nt(), comm.num_ranks(), comm.rank());
    let offset = dec.global_offset;
    let lnt = dec.local_size;

    let mut coords = Coords::new(lnt, ixline);

    // Pass one: trace numbers and source x, batched against the memory
    // budget. Collective I/O needs every rank to issue the same number of
    // calls, so ranks with fewer batches pad with null reads.
    let rule = RuleSet::new(&[TraceKey::Gtn, TraceKey::SourceX]);
    let biggest = comm.max(lnt);
    let budget = MEM_LIMIT.saturating_sub(4 * biggest * std::mem::size_of::<f64>());
    let max = batch_cap(budget, rule.memory_usage_per_header() + TRACE_HEADER_LEN);
    let extra = batches(biggest, max) - batches(lnt, max);

    let mut prm = TraceMetadata::new(rule, lnt);
    let mut i = 0;
    while i < lnt {
        let rblock = std::cmp::min(max, lnt - i);
        file.read_metadata(offset + i, rblock, &mut prm, i)?;
        for j in 0..rblock {
            prm.set_index(i + j, TraceKey::Gtn, offset + i + j)?;
        }
        i += rblock;
    }
    for _ in 0..extra {
        file.read_metadata_null(&mut prm)?;
    }
    cmsg(comm, "get_coords sort");

    let trlist = sort(comm, &mut prm, by_x_src_then_gtn, false)?;
    cmsg(comm, "get_coords post-sort I/O");

    // Pass two: full coordinates of the redistributed traces. Each batch
    // of the sorted trace list is fetched in ascending order and scattered
    // back into sorted positions.
    let ckeys = if ixline {
        vec![
            TraceKey::SourceX,
            TraceKey::SourceY,
            TraceKey::ReceiverX,
            TraceKey::ReceiverY,
            TraceKey::Inline,
            TraceKey::Crossline,
        ]
    } else {
        vec![
            TraceKey::SourceX,
            TraceKey::SourceY,
            TraceKey::ReceiverX,
            TraceKey::ReceiverY,
        ]
    };
    let crule = RuleSet::new(&ckeys);
    let max = batch_cap(
        budget,
        crule.memory_usage_per_header() + TRACE_HEADER_LEN + 2 * std::mem::size_of::<usize>(),
    );
    let extra = batches(biggest, max) - batches(lnt, max);

    let mut prm2 = TraceMetadata::new(crule, std::cmp::min(lnt, max));
    let mut i = 0;
    while i < lnt {
        let rblock = std::cmp::min(max, lnt - i);
        let order = get_sort_index(&trlist[i..i + rblock]);
        let ascending: Vec<usize> = order.iter().map(|&s| trlist[i + s]).collect();

        file.read_metadata_non_contiguous(&ascending, &mut prm2, 0)?;

        for j in 0..rblock {
            let dst = i + order[j];
            coords.x_src[dst] = prm2.get_floating_point(j, TraceKey::SourceX)? as f32;
            coords.y_src[dst] = prm2.get_floating_point(j, TraceKey::SourceY)? as f32;
            coords.x_rcv[dst] = prm2.get_floating_point(j, TraceKey::ReceiverX)? as f32;
            coords.y_rcv[dst] = prm2.get_floating_point(j, TraceKey::ReceiverY)? as f32;
            coords.tn[dst] = trlist[dst];
        }
        if ixline {
            for j in 0..rblock {
                let dst = i + order[j];
                coords.il[dst] = prm2.get_integer(j, TraceKey::Inline)?;
                coords.xl[dst] = prm2.get_integer(j, TraceKey::Crossline)?;
            }
        }
        i += rblock;
    }
    for _ in 0..extra {
        file.read_metadata_non_contiguous(&[], &mut prm2, 0)?;
    }

    comm.barrier();
    cmsg(
        comm,
        &format!("Read coordinates from {}", file.file_name()),
    );
    Ok(Arc::new(coords))
}

/// Write the matched traces: read each rank's winners from the source
/// file (indices repeat and arrive unordered) and write them contiguously
/// into the destination, optionally persisting the achieved `dsr` in the
/// trace headers.
pub fn output_non_monotonic<P: AsRef<Path>>(
    comm: &Communicator,
    dst_name: P,
    src_name: P,
    list: &[usize],
    minrs: &[f32],
    print_dsr: bool,
) -> Result<(), ParseisError> {
    let mut rule = RuleSet::new(&[]);
    rule.add_copy();
    // The dissimilarity rides in the source-measurement field, scaled by
    // the time scalar, where common viewers accept a float.
    if print_dsr {
        rule.add_segy_float(
            TraceKey::Dsdr,
            trace_header_byte::SOURCE_MEASUREMENT,
            trace_header_byte::TIME_SCALAR,
        );
    }

    let src = InputSegy::open(comm, &src_name)?;
    let mut dst = OutputSegy::create(comm, &dst_name)?;
    comm.assert_ok()?;

    let ns = src.read_ns();
    let lnt = list.len();
    let counts = comm.gather(lnt);
    let offset: usize = counts[..comm.rank()].iter().sum();
    let total: usize = counts.iter().sum();
    let biggest = counts.iter().max().copied().unwrap_or(0);

    let max = batch_cap(
        OUTPUT_MEM_LIMIT,
        4 * trace_size(ns) + 4 * rule.extent_len(),
    );
    let extra = batches(biggest, max) - batches(lnt, max);

    dst.write_text("parseis 4d-bin file.\n");
    dst.write_nt(total);
    dst.write_sample_interval(src.read_sample_interval())?;
    dst.write_ns(ns)?;

    let cap = std::cmp::min(lnt, max);
    let mut prm = TraceMetadata::new(rule, cap);
    let mut trc = vec![0f32; ns * cap];

    let mut i = 0;
    while i < lnt {
        let rblock = std::cmp::min(max, lnt - i);
        src.read_non_monotonic(&list[i..i + rblock], &mut trc[..rblock * ns], Some(&mut prm), 0)?;
        if print_dsr {
            for j in 0..rblock {
                prm.set_floating_point(j, TraceKey::Dsdr, f64::from(minrs[i + j]))?;
            }
        }
        dst.write_trace(offset + i, rblock, &trc[..rblock * ns], Some(&prm), 0)?;
        i += rblock;
    }
    for _ in 0..extra {
        src.read_trace_non_contiguous(&[], &mut [], Some(&mut prm), 0)?;
        dst.write_trace(0, 0, &[], Some(&prm), 0)?;
    }

    dst.close()?;
    comm.barrier();
    cmsg(comm, "4d-bin output written");
    Ok(())
}
