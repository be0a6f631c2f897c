// Copyright (C) 2024 by GiGa infosystems
//! The distributed sort.
//!
//! The algorithm is a nearest-neighbour exchange: each rank stable-sorts
//! its local rows, then repeatedly trades half-blocks with its neighbours.
//! In the down phase each rank hands its smallest half-block to the rank
//! below, merges what arrives from above, and returns the overflow; the up
//! phase mirrors it with the largest half-blocks. When a whole pass
//! changes nothing anywhere, rank `r`'s local rows are globally the `r`-th
//! contiguous slice of the sorted order.
//!
//! A rank only ever holds its own rows plus one neighbour's half-block, so
//! memory stays bounded at one and a half times the local share.
use std::cmp::Ordering;

use num::FromPrimitive;
use parseis_comm::{Communicator, Decomposition, DistributedVector};
use parseis_core::{PackedRow, ParseisError, RuleSet, TraceKey, TraceMetadata};
use parseis_in::InputSegy;

/// The built-in sort orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum SortType {
    /// Sort by source x, source y, receiver x, receiver y.
    SrcRcv,
    /// Sort by source x, source y, calculated offset.
    SrcOff,
    /// Sort by source x, source y, offset read from the header.
    SrcROff,
    /// Sort by receiver x, receiver y, calculated offset.
    RcvOff,
    /// Sort by receiver x, receiver y, offset read from the header.
    RcvROff,
    /// Sort by inline, crossline, calculated offset.
    LineOff,
    /// Sort by inline, crossline, offset read from the header.
    LineROff,
    /// Sort by calculated offset, inline, crossline.
    OffLine,
    /// Sort by offset read from the header, inline, crossline.
    ROffLine,
}

impl SortType {
    pub fn new(code: u16) -> Result<Self, ParseisError> {
        SortType::from_u16(code).ok_or(ParseisError::ParseEnum {
            f: "SortType".to_string(),
            code,
        })
    }

    /// The metadata keys this ordering reads.
    pub fn required_keys(self) -> Vec<TraceKey> {
        use TraceKey::*;
        let mut keys = match self {
            SortType::SrcRcv | SortType::SrcOff | SortType::RcvOff => {
                vec![SourceX, SourceY, ReceiverX, ReceiverY]
            }
            SortType::SrcROff => vec![SourceX, SourceY, Offset],
            SortType::RcvROff => vec![ReceiverX, ReceiverY, Offset],
            SortType::LineOff | SortType::OffLine => {
                vec![SourceX, SourceY, ReceiverX, ReceiverY, Inline, Crossline]
            }
            SortType::LineROff | SortType::ROffLine => vec![Offset, Inline, Crossline],
        };
        keys.push(Gtn);
        keys
    }
}

/// A less-than over two rows of one table.
pub type CompareFn = fn(&TraceMetadata, usize, usize) -> bool;

/// Floating comparison where NaN is greater than every finite value, so
/// NaN rows sink to the end of a sort.
fn float_ord(a: f64, b: f64) -> Ordering {
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None if a.is_nan() && b.is_nan() => Ordering::Equal,
        None if a.is_nan() => Ordering::Greater,
        None => Ordering::Less,
    }
}

fn fetch_float(prm: &TraceMetadata, row: usize, key: TraceKey) -> f64 {
    prm.get_floating_point(row, key).unwrap_or(f64::NAN)
}

fn fetch_int(prm: &TraceMetadata, row: usize, key: TraceKey) -> i64 {
    prm.get_integer(row, key).unwrap_or(i64::MAX)
}

fn fetch_gtn(prm: &TraceMetadata, row: usize) -> usize {
    prm.get_index(row, TraceKey::Gtn).unwrap_or(usize::MAX)
}

/// The squared source-to-receiver distance of a row.
fn derived_offset(prm: &TraceMetadata, row: usize) -> f64 {
    let dx = fetch_float(prm, row, TraceKey::SourceX) - fetch_float(prm, row, TraceKey::ReceiverX);
    let dy = fetch_float(prm, row, TraceKey::SourceY) - fetch_float(prm, row, TraceKey::ReceiverY);
    dx * dx + dy * dy
}

enum SortField {
    Float(TraceKey),
    Int(TraceKey),
    DerivedOffset,
}

fn less_by(prm: &TraceMetadata, i: usize, j: usize, fields: &[SortField]) -> bool {
    for field in fields {
        let ord = match field {
            SortField::Float(key) => float_ord(fetch_float(prm, i, *key), fetch_float(prm, j, *key)),
            SortField::Int(key) => fetch_int(prm, i, *key).cmp(&fetch_int(prm, j, *key)),
            SortField::DerivedOffset => float_ord(derived_offset(prm, i), derived_offset(prm, j)),
        };
        match ord {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }
    }
    fetch_gtn(prm, i) < fetch_gtn(prm, j)
}

/// The comparison function for a sort type. Every ordering breaks final
/// ties on the global trace number, so sorts are deterministic.
pub fn get_comp(sort_type: SortType) -> CompareFn {
    use SortField::*;
    use TraceKey::*;
    match sort_type {
        SortType::SrcRcv => |prm, i, j| {
            less_by(
                prm,
                i,
                j,
                &[Float(SourceX), Float(SourceY), Float(ReceiverX), Float(ReceiverY)],
            )
        },
        SortType::SrcOff => {
            |prm, i, j| less_by(prm, i, j, &[Float(SourceX), Float(SourceY), DerivedOffset])
        }
        SortType::SrcROff => {
            |prm, i, j| less_by(prm, i, j, &[Float(SourceX), Float(SourceY), Int(Offset)])
        }
        SortType::RcvOff => {
            |prm, i, j| less_by(prm, i, j, &[Float(ReceiverX), Float(ReceiverY), DerivedOffset])
        }
        SortType::RcvROff => {
            |prm, i, j| less_by(prm, i, j, &[Float(ReceiverX), Float(ReceiverY), Int(Offset)])
        }
        SortType::LineOff => {
            |prm, i, j| less_by(prm, i, j, &[Int(Inline), Int(Crossline), DerivedOffset])
        }
        SortType::LineROff => {
            |prm, i, j| less_by(prm, i, j, &[Int(Inline), Int(Crossline), Int(Offset)])
        }
        SortType::OffLine => {
            |prm, i, j| less_by(prm, i, j, &[DerivedOffset, Int(Inline), Int(Crossline)])
        }
        SortType::ROffLine => {
            |prm, i, j| less_by(prm, i, j, &[Int(Offset), Int(Inline), Int(Crossline)])
        }
    }
}

/// The indices of `list` in ascending order of value, ties kept stable.
pub fn get_sort_index(list: &[usize]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..list.len()).collect();
    idx.sort_by_key(|&i| list[i]);
    idx
}

/// The stable ordering of rows `[0, len)` of a table under `comp`.
fn sorted_order<F>(prm: &TraceMetadata, len: usize, comp: &F) -> Vec<usize>
where
    F: Fn(&TraceMetadata, usize, usize) -> bool,
{
    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by(|&a, &b| {
        if comp(prm, a, b) {
            Ordering::Less
        } else if comp(prm, b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    order
}

/// The exchange working set: a table with headroom for one incoming
/// half-block, whose live rows `[0, len)` are kept sorted.
///
/// Rows only enter via `merge` and leave via `take_front`/`take_back`, so
/// the global row multiset is preserved by construction.
struct SortBuffer {
    table: TraceMetadata,
    len: usize,
}

impl SortBuffer {
    /// Capacity is the local share plus the largest half-block a
    /// neighbour can send, which never exceeds half the local share.
    fn from_table<F>(prm: &TraceMetadata, comp: &F) -> Result<Self, ParseisError>
    where
        F: Fn(&TraceMetadata, usize, usize) -> bool,
    {
        let m = prm.size();
        let mut table = TraceMetadata::new(prm.rules().clone(), m + m / 2 + 1);
        for k in 0..m {
            table.copy_entries(k, prm, k)?;
        }
        let mut buf = SortBuffer { table, len: m };
        buf.restore_order(comp)?;
        Ok(buf)
    }

    fn restore_order<F>(&mut self, comp: &F) -> Result<(), ParseisError>
    where
        F: Fn(&TraceMetadata, usize, usize) -> bool,
    {
        let order = sorted_order(&self.table, self.len, comp);
        if order.iter().enumerate().all(|(dst, &src)| dst == src) {
            return Ok(());
        }
        let scratch = self.table.clone();
        for (dst, &src) in order.iter().enumerate() {
            self.table.copy_entries(dst, &scratch, src)?;
        }
        Ok(())
    }

    /// Remove and return the smallest `c` rows.
    fn take_front(&mut self, c: usize) -> Result<Vec<PackedRow>, ParseisError> {
        let taken: Vec<PackedRow> = (0..c).map(|k| self.table.pack_row(k)).collect::<Result<_, _>>()?;
        let scratch = self.table.clone();
        for k in c..self.len {
            self.table.copy_entries(k - c, &scratch, k)?;
        }
        self.len -= c;
        Ok(taken)
    }

    /// Remove and return the largest `c` rows.
    fn take_back(&mut self, c: usize) -> Result<Vec<PackedRow>, ParseisError> {
        let taken = (self.len - c..self.len)
            .map(|k| self.table.pack_row(k))
            .collect::<Result<_, _>>()?;
        self.len -= c;
        Ok(taken)
    }

    /// Append the incoming rows and re-establish the sorted order.
    fn merge<F>(&mut self, rows: &[PackedRow], comp: &F) -> Result<(), ParseisError>
    where
        F: Fn(&TraceMetadata, usize, usize) -> bool,
    {
        for (x, row) in rows.iter().enumerate() {
            self.table.unpack_row(self.len + x, row)?;
        }
        self.len += rows.len();
        self.restore_order(comp)
    }

    fn gtn_column(&self) -> Result<Vec<usize>, ParseisError> {
        (0..self.len)
            .map(|k| self.table.get_index(k, TraceKey::Gtn))
            .collect()
    }

    fn write_back(&self, prm: &mut TraceMetadata) -> Result<(), ParseisError> {
        for k in 0..self.len {
            prm.copy_entries(k, &self.table, k)?;
        }
        Ok(())
    }
}

/// One down-then-up neighbour pass. Each phase removes the half-block
/// being traded before anything else is merged, so no row is ever counted
/// twice.
fn exchange_pass<F>(
    comm: &Communicator,
    buf: &mut SortBuffer,
    comp: &F,
    sizes: &[usize],
) -> Result<(), ParseisError>
where
    F: Fn(&TraceMetadata, usize, usize) -> bool,
{
    let rank = comm.rank();
    let num_ranks = comm.num_ranks();
    let m = sizes[rank];

    // Half the smaller of the two partners' shares; single-row shares
    // still trade their one row, or adjacent singletons could never swap.
    let half_block = |a: usize, b: usize| {
        let smaller = std::cmp::min(a, b);
        if smaller >= 2 {
            smaller / 2
        } else {
            smaller
        }
    };

    // Down phase: the smallest half-blocks sink toward rank 0.
    if rank > 0 {
        let c = half_block(m, sizes[rank - 1]);
        let rows = buf.take_front(c)?;
        comm.send_to(rank - 1, rows);
    }
    if rank < num_ranks - 1 {
        let incoming: Vec<PackedRow> = comm.recv_from(rank + 1);
        buf.merge(&incoming, comp)?;
        let back = buf.take_back(incoming.len())?;
        comm.send_to(rank + 1, back);
    }
    if rank > 0 {
        let back: Vec<PackedRow> = comm.recv_from(rank - 1);
        buf.merge(&back, comp)?;
    }

    // Up phase: the largest half-blocks rise toward the last rank.
    if rank < num_ranks - 1 {
        let c = half_block(m, sizes[rank + 1]);
        let rows = buf.take_back(c)?;
        comm.send_to(rank + 1, rows);
    }
    if rank > 0 {
        let incoming: Vec<PackedRow> = comm.recv_from(rank - 1);
        buf.merge(&incoming, comp)?;
        let back = buf.take_front(incoming.len())?;
        comm.send_to(rank - 1, back);
    }
    if rank < num_ranks - 1 {
        let back: Vec<PackedRow> = comm.recv_from(rank + 1);
        buf.merge(&back, comp)?;
    }
    Ok(())
}

/// Globally sort a metadata table.
///
/// The table's `Gtn` column must hold each row's global trace number, laid
/// out contiguously in rank order (row `k` on this rank is global trace
/// `offset + k`). On return the table's local rows are the rank's slice of
/// the globally sorted order.
///
/// With `file_order` the returned vector maps each *original* local row to
/// its global position in the sorted order; without it, the vector lists
/// the global trace numbers of the rows that now reside locally.
pub fn sort<F>(
    comm: &Communicator,
    prm: &mut TraceMetadata,
    comp: F,
    file_order: bool,
) -> Result<Vec<usize>, ParseisError>
where
    F: Fn(&TraceMetadata, usize, usize) -> bool,
{
    if prm.rules().get_entry(TraceKey::Gtn).is_none() {
        return Err(ParseisError::KeyNotFound {
            key: TraceKey::Gtn,
        });
    }

    let m = prm.size();
    let total = comm.sum(m);
    let my_offset = comm.offset(m);
    let sizes = comm.gather(m);

    let mut buf = SortBuffer::from_table(prm, &comp)?;
    if comm.num_ranks() > 1 {
        loop {
            let before = buf.gtn_column()?;
            exchange_pass(comm, &mut buf, &comp, &sizes)?;
            let changed = before != buf.gtn_column()?;
            if !comm.any(changed) {
                break;
            }
        }
    }
    buf.write_back(prm)?;

    if file_order {
        let destinations = DistributedVector::<usize>::new(comm, total);
        for k in 0..m {
            destinations.set(prm.get_index(k, TraceKey::Gtn)?, my_offset + k);
        }
        destinations.sync();
        let mut out = vec![0usize; m];
        destinations.get_n(my_offset, &mut out);
        destinations.sync();
        Ok(out)
    } else {
        (0..m).map(|k| prm.get_index(k, TraceKey::Gtn)).collect()
    }
}

/// Sort a table by one of the built-in orderings.
///
/// Global trace numbers are (re)assigned in file order before sorting.
pub fn sort_by_type(
    comm: &Communicator,
    sort_type: SortType,
    prm: &mut TraceMetadata,
) -> Result<Vec<usize>, ParseisError> {
    for key in sort_type.required_keys() {
        if prm.rules().get_entry(key).is_none() {
            return Err(ParseisError::KeyNotFound { key });
        }
    }
    let offset = comm.offset(prm.size());
    for k in 0..prm.size() {
        prm.set_index(k, TraceKey::Gtn, offset + k)?;
    }
    sort(comm, prm, get_comp(sort_type), true)
}

/// Verify that a file's decomposed range obeys an ordering, including
/// across the rank boundaries.
pub fn check_order(
    input: &InputSegy,
    dec: Decomposition,
    sort_type: SortType,
) -> Result<bool, ParseisError> {
    let comm = input.communicator();
    let comp = get_comp(sort_type);
    let rules = RuleSet::new(&sort_type.required_keys());
    let lnt = dec.local_size;

    let mut prm = TraceMetadata::new(rules.clone(), lnt);
    input.read_metadata(dec.global_offset, lnt, &mut prm, 0)?;
    for k in 0..lnt {
        prm.set_index(k, TraceKey::Gtn, dec.global_offset + k)?;
    }

    let mut ok = true;
    for k in 1..lnt {
        if comp(&prm, k, k - 1) {
            ok = false;
        }
    }

    // The last local row against the next non-empty rank's first row.
    let first = if lnt > 0 { Some(prm.pack_row(0)?) } else { None };
    let firsts = comm.gather(first);
    if ok && lnt > 0 {
        if let Some(next_first) = firsts[comm.rank() + 1..].iter().flatten().next() {
            let mut pair = TraceMetadata::new(rules, 2);
            pair.copy_entries(0, &prm, lnt - 1)?;
            pair.unpack_row(1, next_first)?;
            pair.set_index(0, TraceKey::Gtn, 0)?;
            pair.set_index(1, TraceKey::Gtn, 1)?;
            if comp(&pair, 1, 0) {
                ok = false;
            }
        }
    }
    Ok(comm.all(ok))
}
