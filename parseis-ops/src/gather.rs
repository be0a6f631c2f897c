//! Grouping traces into inline/crossline gathers.
use parseis_comm::{block_decomposition, Communicator, DistributedVector};
use parseis_core::{ParseisError, RuleSet, TraceKey, TraceMetadata};
use parseis_in::InputSegy;

/// One gather: a run of traces sharing an inline/crossline pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatherInfo {
    /// The number of traces in the gather.
    pub num_traces: usize,
    pub in_line: i64,
    pub crossline: i64,
}

/// Find the inline/crossline of each gather and the number of traces in
/// it, assuming the file is ordered by line numbers.
///
/// Collective. Runs that span rank boundaries are merged onto the first
/// rank of the run; the result is a distributed array with one entry per
/// gather, in file order.
pub fn get_il_xl_gathers<'c>(
    comm: &'c Communicator,
    file: &InputSegy,
) -> Result<DistributedVector<'c, GatherInfo>, ParseisError> {
    let dec = block_decomposition(file.read_nt(), comm.num_ranks(), comm.rank());

    let rules = RuleSet::new(&[TraceKey::Inline, TraceKey::Crossline]);
    let mut prm = TraceMetadata::new(rules, dec.local_size);
    file.read_metadata(dec.global_offset, dec.local_size, &mut prm, 0)?;

    get_gathers(comm, &prm)
}

/// The run-length pass over one rank's line numbers, with the boundary
/// runs reconciled across the group.
fn get_gathers<'c>(
    comm: &'c Communicator,
    prm: &TraceMetadata,
) -> Result<DistributedVector<'c, GatherInfo>, ParseisError> {
    let rank = comm.rank();
    let num_ranks = comm.num_ranks();

    let mut lline: Vec<GatherInfo> = Vec::new();
    for i in 0..prm.size() {
        let il = prm.get_integer(i, TraceKey::Inline)?;
        let xl = prm.get_integer(i, TraceKey::Crossline)?;
        match lline.last_mut() {
            Some(last) if last.in_line == il && last.crossline == xl => {
                last.num_traces += 1;
            }
            _ => lline.push(GatherInfo {
                num_traces: 1,
                in_line: il,
                crossline: xl,
            }),
        }
    }

    // Ranks with no traces never match a real line pair.
    let sentinel = GatherInfo {
        num_traces: 0,
        in_line: i64::MIN,
        crossline: i64::MIN,
    };
    let firsts = comm.gather(lline.first().copied().unwrap_or(sentinel));
    let lasts = comm.gather(lline.last().copied().unwrap_or(sentinel));

    let continues = |a: &GatherInfo, b: &GatherInfo| {
        a.num_traces > 0 && a.in_line == b.in_line && a.crossline == b.crossline
    };

    // A first gather that continues the previous rank's last belongs to
    // that rank.
    let start = usize::from(
        rank > 0 && !lline.is_empty() && continues(&firsts[rank], &lasts[rank - 1]),
    );

    // A last gather that spills into the following ranks absorbs their
    // leading runs while the line pair keeps matching. A rank whose whole
    // share was claimed by its predecessor leaves that to the run's owner.
    if start < lline.len() {
        for q in rank + 1..num_ranks {
            if continues(&firsts[q], &lasts[rank]) {
                let absorbed = firsts[q].num_traces;
                if let Some(last) = lline.last_mut() {
                    last.num_traces += absorbed;
                }
            } else {
                break;
            }
        }
    }

    let sz = lline.len() - start;
    let offset = comm.offset(sz);
    let total = comm.sum(sz);

    let line = DistributedVector::<GatherInfo>::new(comm, total);
    for (i, info) in lline[start..].iter().enumerate() {
        line.set(offset + i, *info);
    }
    line.sync();
    Ok(line)
}
