//! Block decomposition of index ranges over the ranks of a group.

/// A section of a range distributed onto one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    /// The offset into the global range for the given rank.
    pub global_offset: usize,
    /// The local size of the section of the range on the local process.
    pub local_size: usize,
}

/// The rank and local index of a global index in a decomposed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompositionLocation {
    pub rank: usize,
    pub local_index: usize,
}

/// Decompose `[0, range_size)` into `num_ranks` contiguous pieces whose
/// sizes differ by at most one.
pub fn block_decomposition(range_size: usize, num_ranks: usize, rank: usize) -> Decomposition {
    assert!(num_ranks > 0);
    assert!(rank < num_ranks);

    let quotient = range_size / num_ranks;
    let remainder = range_size % num_ranks;
    Decomposition {
        global_offset: rank * quotient + std::cmp::min(rank, remainder),
        local_size: quotient + usize::from(rank < remainder),
    }
}

/// The inverse of [`block_decomposition`]: which rank holds `global_index`,
/// and where in its slice.
pub fn block_decomposition_location(
    range_size: usize,
    num_ranks: usize,
    global_index: usize,
) -> DecompositionLocation {
    assert!(num_ranks > 0);
    assert!(global_index < range_size);

    let quotient = range_size / num_ranks;
    let remainder = range_size % num_ranks;

    // The first `remainder` ranks carry one extra element each.
    let fat = remainder * (quotient + 1);
    if global_index < fat {
        DecompositionLocation {
            rank: global_index / (quotient + 1),
            local_index: global_index % (quotient + 1),
        }
    } else {
        let rest = global_index - fat;
        DecompositionLocation {
            rank: remainder + rest / quotient,
            local_index: rest % quotient,
        }
    }
}

/// Decompose `sz` bytes in whole blocks of `bsz` bytes aligned to the
/// absolute offset `off`, compensating the partial first and last blocks.
///
/// Used when copying byte ranges whose interior boundaries must land on
/// block multiples of the underlying storage.
pub fn block_decomp(
    sz: usize,
    bsz: usize,
    num_ranks: usize,
    rank: usize,
    off: usize,
) -> Decomposition {
    assert!(bsz > 0);
    if sz == 0 {
        return Decomposition {
            global_offset: 0,
            local_size: 0,
        };
    }

    // Bytes in the leading partial block, when the start is unaligned.
    let first = std::cmp::min(sz, (bsz - off % bsz) % bsz);
    let rest = sz - first;
    let whole = rest / bsz;
    let last = rest % bsz;
    let block_count = usize::from(first > 0) + whole + usize::from(last > 0);

    let blocks = block_decomposition(block_count, num_ranks, rank);

    let start_of = |b: usize| -> usize {
        if b == 0 {
            0
        } else if first > 0 {
            first + (b - 1) * bsz
        } else {
            b * bsz
        }
    };
    let begin = start_of(blocks.global_offset);
    let end = if blocks.global_offset + blocks.local_size == block_count {
        sz
    } else {
        start_of(blocks.global_offset + blocks.local_size)
    };
    Decomposition {
        global_offset: begin,
        local_size: end - begin,
    }
}
