//! Parallel argmin/argmax with global trace witnesses.
use parseis_comm::Communicator;
use parseis_core::{ParseisError, TraceKey, TraceMetadata};

/// A value and the global trace number it was found at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordElem {
    pub val: f64,
    pub num: usize,
}

fn better_min(current: CoordElem, candidate: CoordElem) -> CoordElem {
    if candidate.val < current.val || (candidate.val == current.val && candidate.num < current.num)
    {
        candidate
    } else {
        current
    }
}

fn better_max(current: CoordElem, candidate: CoordElem) -> CoordElem {
    if candidate.val > current.val || (candidate.val == current.val && candidate.num < current.num)
    {
        candidate
    } else {
        current
    }
}

/// Compute `(min_x, max_x, min_y, max_y)` of two projections over a
/// distributed collection, each with the global trace number of its
/// witness. `offset` is the global trace number of `items[0]`; ties break
/// toward the smaller trace number.
///
/// Collective: every rank receives the same four elements.
pub fn get_min_max<T, X, Y>(
    comm: &Communicator,
    offset: usize,
    items: &[T],
    x: X,
    y: Y,
    minmax: &mut [CoordElem; 4],
) where
    X: Fn(&T) -> f64,
    Y: Fn(&T) -> f64,
{
    let mut local = [
        CoordElem {
            val: f64::INFINITY,
            num: usize::MAX,
        },
        CoordElem {
            val: f64::NEG_INFINITY,
            num: usize::MAX,
        },
        CoordElem {
            val: f64::INFINITY,
            num: usize::MAX,
        },
        CoordElem {
            val: f64::NEG_INFINITY,
            num: usize::MAX,
        },
    ];
    for (i, item) in items.iter().enumerate() {
        let xi = CoordElem {
            val: x(item),
            num: offset + i,
        };
        let yi = CoordElem {
            val: y(item),
            num: offset + i,
        };
        local[0] = better_min(local[0], xi);
        local[1] = better_max(local[1], xi);
        local[2] = better_min(local[2], yi);
        local[3] = better_max(local[3], yi);
    }

    // Every rank reduces the gathered candidates identically, so the
    // result needs no broadcast.
    let gathered = comm.gather(local);
    let mut out = local;
    for quad in gathered {
        out[0] = better_min(out[0], quad[0]);
        out[1] = better_max(out[1], quad[1]);
        out[2] = better_min(out[2], quad[2]);
        out[3] = better_max(out[3], quad[3]);
    }
    *minmax = out;
}

/// [`get_min_max`] over two float columns of a metadata table.
pub fn get_min_max_keyed(
    comm: &Communicator,
    offset: usize,
    prm: &TraceMetadata,
    key_x: TraceKey,
    key_y: TraceKey,
    minmax: &mut [CoordElem; 4],
) -> Result<(), ParseisError> {
    let pairs: Vec<(f64, f64)> = (0..prm.size())
        .map(|i| {
            Ok((
                prm.get_floating_point(i, key_x)?,
                prm.get_floating_point(i, key_y)?,
            ))
        })
        .collect::<Result<_, ParseisError>>()?;
    get_min_max(comm, offset, &pairs, |p| p.0, |p| p.1, minmax);
    Ok(())
}
