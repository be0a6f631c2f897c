// Copyright (C) 2024 by GiGa infosystems
//! The compute kernel of the 4D binning matcher.
use std::sync::Arc;

use parseis_comm::Communicator;

use super::coords::{Coords, ALIGN};
use super::FourDOptions;
use crate::cmsg;

/// The hypotenuse, written out so the inner loop stays vectorisable.
fn hypot(x: f32, y: f32) -> f32 {
    (x * x + y * y).sqrt()
}

/// The dissimilarity of two source/receiver pairs: the summed
/// source-to-source and receiver-to-receiver distances, taking whichever
/// of the forward and reversed boat orientations is closer.
#[allow(clippy::too_many_arguments)]
pub fn dsr(
    xs1: f32,
    ys1: f32,
    xr1: f32,
    yr1: f32,
    xs2: f32,
    ys2: f32,
    xr2: f32,
    yr2: f32,
) -> f32 {
    let forward = hypot(xs1 - xs2, ys1 - ys2) + hypot(xr1 - xr2, yr1 - yr2);
    let reverse = hypot(xs1 - xr2, ys1 - yr2) + hypot(xr1 - xs2, yr1 - ys2);
    forward.min(reverse)
}

/// Seed every row of `crd1` from the first entry of the local `crd2`, so
/// each minimisation starts bounded before any cross-rank comparison.
pub fn init_update(crd1: &Coords, crd2: &Coords, min: &mut [usize], minrs: &mut [f32]) {
    for i in 0..crd1.sz {
        minrs[i] = dsr(
            crd1.x_src[i],
            crd1.y_src[i],
            crd1.x_rcv[i],
            crd1.y_rcv[i],
            crd2.x_src[0],
            crd2.y_src[0],
            crd2.x_rcv[0],
            crd2.y_rcv[0],
        );
        min[i] = crd2.tn[0];
    }
}

/// Sweep one candidate table against the local rows, committing improved
/// `(min, minrs)` pairs. Returns the number of `dsr` evaluations.
///
/// Both tables are sorted by source x, so rows whose source x lies more
/// than `dsr_max` outside the other side's range are trimmed before the
/// sweep; the surviving start is snapped down to the alignment
/// granularity. The inner loop carries no data-dependent branches, only
/// selects, and ties keep the earlier winner.
pub fn update(
    crd1: &Coords,
    crd2: &Coords,
    min: &mut [usize],
    minrs: &mut [f32],
    dsr_max: f32,
) -> usize {
    let mut lstart = 0usize;
    let mut lend = crd1.sz;
    let mut rstart = 0usize;
    let mut rend = crd2.sz;
    if lend == 0 || rend == 0 {
        return 0;
    }

    // Trim candidates that cannot beat dsr_max on source x alone.
    while rstart < rend && crd2.x_src[rstart] < crd1.x_src[lstart] - dsr_max {
        rstart += 1;
    }
    while rend > rstart && crd2.x_src[rend - 1] > crd1.x_src[lend - 1] + dsr_max {
        rend -= 1;
    }
    while lstart < lend && rstart < rend && crd1.x_src[lstart] < crd2.x_src[rstart] - dsr_max {
        lstart += 1;
    }
    while lend > lstart && rstart < rend && crd1.x_src[lend - 1] > crd2.x_src[rend - 1] + dsr_max {
        lend -= 1;
    }
    if lstart >= lend || rstart >= rend {
        return 0;
    }
    lstart = (lstart / ALIGN) * ALIGN;

    let x_s2 = &crd2.x_src;
    let y_s2 = &crd2.y_src;
    let x_r2 = &crd2.x_rcv;
    let y_r2 = &crd2.y_rcv;
    let tn = &crd2.tn;

    for i in lstart..lend {
        let (xs1, ys1, xr1, yr1) = (
            crd1.x_src[i],
            crd1.y_src[i],
            crd1.x_rcv[i],
            crd1.y_rcv[i],
        );
        let mut lm = min[i];
        let mut lmrs = minrs[i];
        for j in rstart..rend {
            let dval = dsr(xs1, ys1, xr1, yr1, x_s2[j], y_s2[j], x_r2[j], y_r2[j]);
            lm = if dval < lmrs { tn[j] } else { lm };
            lmrs = if dval < lmrs { dval } else { lmrs };
        }
        min[i] = lm;
        minrs[i] = lmrs;
    }
    (lend - lstart) * (rend - rstart)
}

/// Pull one published window into a fresh local table.
fn pull_window(remote: &Coords) -> Coords {
    let mut local = Coords::new(remote.sz, false);
    let sz = remote.sz;
    local.x_src[..sz].copy_from_slice(&remote.x_src[..sz]);
    local.y_src[..sz].copy_from_slice(&remote.y_src[..sz]);
    local.x_rcv[..sz].copy_from_slice(&remote.x_rcv[..sz]);
    local.y_rcv[..sz].copy_from_slice(&remote.y_rcv[..sz]);
    local.tn[..sz].copy_from_slice(&remote.tn[..sz]);
    local
}

/// For every row of the local `crd1`, find the entry of the global `crd2`
/// minimising [`dsr`], visiting only ranks whose source-x range can
/// possibly contain a winner within `dsr_max`.
///
/// Collective. Returns the winning global trace numbers and the achieved
/// dissimilarities; rows whose dissimilarity exceeds `dsr_max` are the
/// caller's to drop.
pub fn calc_4dbin(
    comm: &Communicator,
    dsr_max: f32,
    crd1: &Coords,
    crd2: &Arc<Coords>,
    options: &FourDOptions,
) -> (Vec<usize>, Vec<f32>) {
    cmsg(comm, "Compute phase");
    let sizes = comm.gather(crd2.sz);

    // Every rank's source-x range of the candidate survey; the tables are
    // sorted, so the ends of each slice carry the extremes.
    let xsmin = comm.gather(if crd2.sz > 0 { crd2.x_src[0] } else { f32::MAX });
    let xsmax = comm.gather(if crd2.sz > 0 {
        crd2.x_src[crd2.sz - 1]
    } else {
        f32::MIN
    });

    let mut min = vec![usize::MAX; crd1.sz];
    let mut minrs = vec![f32::MAX; crd1.sz];
    if crd1.sz > 0 && crd2.sz > 0 {
        init_update(crd1, crd2, &mut min, &mut minrs);
    }

    let (xslmin, xslmax) = if crd1.sz > 0 {
        (crd1.x_src[0], crd1.x_src[crd1.sz - 1])
    } else {
        (f32::MAX, f32::MIN)
    };
    let active: Vec<usize> = (0..comm.num_ranks())
        .filter(|&q| xsmin[q] - dsr_max <= xslmax && xsmax[q] + dsr_max >= xslmin)
        .collect();

    if options.verbose {
        for q in 0..comm.num_ranks() {
            cmsg(
                comm,
                &format!("minmax {} {} {}", q, xsmin[q], xsmax[q]),
            );
        }
    }

    // Window publication: every rank's candidate table becomes remotely
    // readable.
    let windows: Vec<Arc<Coords>> = comm.gather(crd2.clone());

    for &q in &active {
        let candidates = pull_window(&windows[q]);
        let evaluations = update(crd1, &candidates, &mut min, &mut minrs, dsr_max);
        if options.verbose {
            let full = crd1.sz * sizes[q];
            log::info!(
                "rank {} --> {}: {} of {} evaluations",
                comm.rank(),
                q,
                evaluations,
                full
            );
        }
    }

    comm.barrier();
    cmsg(comm, "Compute phase completed");
    (min, minrs)
}
