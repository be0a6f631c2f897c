use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use parseis_comm::{block_decomposition, Communicator, ProcessGroup};
use parseis_core::rules::{RuleSet, TraceKey};
use parseis_core::TraceMetadata;
use parseis_in::InputSegy;
use parseis_out::OutputSegy;

use crate::fourd::{calc_4dbin, dsr, get_coords, output_non_monotonic, Coords, FourDOptions};
use crate::gather::{get_il_xl_gathers, GatherInfo};
use crate::minmax::{get_min_max, get_min_max_keyed, CoordElem};
use crate::sort::{check_order, get_comp, sort, sort_by_type, SortType};

fn srcrcv_table(comm: &Communicator, rows: usize) -> TraceMetadata {
    let rules = RuleSet::new(&[
        TraceKey::SourceX,
        TraceKey::SourceY,
        TraceKey::ReceiverX,
        TraceKey::ReceiverY,
        TraceKey::Gtn,
    ]);
    let mut prm = TraceMetadata::new(rules, rows);
    for i in 0..rows {
        let k = rows * comm.rank() + i;
        prm.set_index(i, TraceKey::Gtn, k).unwrap();
    }
    prm
}

#[test]
fn sort_backwards_reverses() {
    ProcessGroup::run(2, |comm| {
        let mut prm = srcrcv_table(&comm, 200);
        for i in 0..200 {
            let k = 200 * comm.rank() + i;
            prm.set_floating_point(i, TraceKey::SourceX, 1000.0 - (k / 20) as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::SourceY, 1000.0 - (k % 20) as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverX, 1000.0 - (k / 10) as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverY, 1000.0 - (k % 10) as f64)
                .unwrap();
        }

        let list = sort_by_type(&comm, SortType::SrcRcv, &mut prm).unwrap();
        let total = comm.sum(list.len());
        for (i, &dst) in list.iter().enumerate() {
            assert_eq!(dst, total - (200 * comm.rank() + i) - 1);
        }
    });
}

#[test]
fn sort_forwards_is_identity() {
    ProcessGroup::run(2, |comm| {
        let mut prm = srcrcv_table(&comm, 200);
        for i in 0..200 {
            let k = 200 * comm.rank() + i;
            prm.set_floating_point(i, TraceKey::SourceX, 1000.0 + (k / 20) as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::SourceY, 1000.0 + (k % 20) as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverX, 1000.0 + (k / 10) as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverY, 1000.0 + (k % 10) as f64)
                .unwrap();
        }

        let list = sort_by_type(&comm, SortType::SrcRcv, &mut prm).unwrap();
        for (i, &dst) in list.iter().enumerate() {
            assert_eq!(dst, 200 * comm.rank() + i);
        }
    });
}

#[test]
fn sort_scattered_values_find_their_slots() {
    ProcessGroup::run(2, |comm| {
        let values = [5.0, 3.0, 1.0, 4.0, 2.0, 9.0, 6.0, 8.0, 7.0, 0.0];
        let mut prm = srcrcv_table(&comm, 10);
        for (i, &v) in values.iter().enumerate() {
            prm.set_floating_point(i, TraceKey::SourceX, 10.0 * comm.rank() as f64 + v)
                .unwrap();
            prm.set_floating_point(i, TraceKey::SourceY, 1000.0).unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverX, 1000.0).unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverY, 1000.0).unwrap();
        }

        let list = sort_by_type(&comm, SortType::SrcRcv, &mut prm).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(list[i], 10 * comm.rank() + v as usize);
        }
    });
}

#[test]
fn sort_single_row_ranks_swap() {
    ProcessGroup::run(3, |comm| {
        let mut prm = srcrcv_table(&comm, 1);
        prm.set_floating_point(0, TraceKey::SourceX, (10 - comm.rank()) as f64)
            .unwrap();
        for key in [TraceKey::SourceY, TraceKey::ReceiverX, TraceKey::ReceiverY].iter() {
            prm.set_floating_point(0, *key, 0.0).unwrap();
        }

        let list = sort_by_type(&comm, SortType::SrcRcv, &mut prm).unwrap();
        assert_eq!(list, vec![2 - comm.rank()]);
    });
}

#[test]
fn sort_with_fewer_rows_than_ranks() {
    ProcessGroup::run(3, |comm| {
        let rows = block_decomposition(2, comm.num_ranks(), comm.rank()).local_size;
        let offset = comm.offset(rows);

        let rules = RuleSet::new(&[
            TraceKey::SourceX,
            TraceKey::SourceY,
            TraceKey::ReceiverX,
            TraceKey::ReceiverY,
            TraceKey::Gtn,
        ]);
        let mut prm = TraceMetadata::new(rules, rows);
        for i in 0..rows {
            prm.set_index(i, TraceKey::Gtn, offset + i).unwrap();
            prm.set_floating_point(i, TraceKey::SourceX, 50.0 - (offset + i) as f64)
                .unwrap();
            for key in [TraceKey::SourceY, TraceKey::ReceiverX, TraceKey::ReceiverY].iter() {
                prm.set_floating_point(i, *key, 0.0).unwrap();
            }
        }

        let local = sort(&comm, &mut prm, get_comp(SortType::SrcRcv), false).unwrap();
        let expected = match comm.rank() {
            0 => vec![1],
            1 => vec![0],
            _ => vec![],
        };
        assert_eq!(local, expected);
    });
}

#[test]
fn sort_preserves_the_row_multiset() {
    ProcessGroup::run(3, |comm| {
        let mut rng = StdRng::seed_from_u64(11 + comm.rank() as u64);
        let rows = 50;
        let mut prm = srcrcv_table(&comm, rows);
        for i in 0..rows {
            prm.set_floating_point(i, TraceKey::SourceX, rng.gen_range(0.0..100.0))
                .unwrap();
            prm.set_floating_point(i, TraceKey::SourceY, rng.gen_range(0.0..100.0))
                .unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverX, 0.0).unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverY, 0.0).unwrap();
        }

        let local: Vec<usize> =
            sort(&comm, &mut prm, get_comp(SortType::SrcRcv), false).unwrap();

        // Every original trace number appears exactly once globally.
        let mut all = comm.gather_vec(&local);
        all.sort_unstable();
        let expected: Vec<usize> = (0..3 * rows).collect();
        assert_eq!(all, expected);

        // Each rank's slice is locally ordered and below the next rank's.
        let comp = get_comp(SortType::SrcRcv);
        for k in 1..rows {
            assert!(!comp(&prm, k, k - 1));
        }
        let extremes = comm.gather((
            prm.get_floating_point(0, TraceKey::SourceX).unwrap(),
            prm.get_floating_point(rows - 1, TraceKey::SourceX).unwrap(),
        ));
        for pair in extremes.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
    });
}

/// Write a small file whose trace `k` has source `(xs(k), 0)` and
/// receiver `(xs(k), 0)`, so `SrcRcv` order follows `xs`.
fn build_geometry_file<F>(comm: &Communicator, path: &Path, nt: usize, ns: usize, xs: F)
where
    F: Fn(usize) -> f64,
{
    let mut out = OutputSegy::create(comm, path).unwrap();
    out.write_text("geometry");
    out.write_ns(ns).unwrap();
    out.write_sample_interval(4.0e-6).unwrap();

    let dec = block_decomposition(nt, comm.num_ranks(), comm.rank());
    let rules = RuleSet::new(&[
        TraceKey::SourceX,
        TraceKey::SourceY,
        TraceKey::ReceiverX,
        TraceKey::ReceiverY,
    ]);
    let mut prm = TraceMetadata::new(rules, dec.local_size);
    let mut trc = vec![0f32; dec.local_size * ns];
    for i in 0..dec.local_size {
        let k = dec.global_offset + i;
        prm.set_floating_point(i, TraceKey::SourceX, xs(k)).unwrap();
        prm.set_floating_point(i, TraceKey::SourceY, 0.0).unwrap();
        prm.set_floating_point(i, TraceKey::ReceiverX, xs(k)).unwrap();
        prm.set_floating_point(i, TraceKey::ReceiverY, 0.0).unwrap();
        for j in 0..ns {
            trc[i * ns + j] = (k * ns + j) as f32;
        }
    }
    out.write_trace(dec.global_offset, dec.local_size, &trc, Some(&prm), 0)
        .unwrap();
    out.close().unwrap();
}

#[test]
fn check_order_accepts_sorted_and_rejects_unsorted() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let ascending = dir.path().join("ascending.sgy");
    let sawtooth = dir.path().join("sawtooth.sgy");

    ProcessGroup::run(2, |comm| {
        build_geometry_file(&comm, &ascending, 10, 4, |k| k as f64);
        // Ordered within each rank's slice, broken across the boundary.
        build_geometry_file(&comm, &sawtooth, 10, 4, |k| (k % 5) as f64);

        let good = InputSegy::open(&comm, &ascending).unwrap();
        let dec = block_decomposition(good.read_nt(), comm.num_ranks(), comm.rank());
        assert!(check_order(&good, dec, SortType::SrcRcv).unwrap());

        let bad = InputSegy::open(&comm, &sawtooth).unwrap();
        let dec = block_decomposition(bad.read_nt(), comm.num_ranks(), comm.rank());
        assert!(!check_order(&bad, dec, SortType::SrcRcv).unwrap());
        comm.assert_ok().unwrap();
    });
}

#[test]
fn min_max_witnesses() {
    ProcessGroup::run(1, |comm| {
        let coords: Vec<(f64, f64)> = (0..1000).map(|i| (1500.0 + i as f64, 1300.0 - i as f64)).collect();

        let mut minmax = [CoordElem { val: 0.0, num: 0 }; 4];
        for &offset in &[0usize, 37, 300_000] {
            get_min_max(&comm, offset, &coords, |c| c.0, |c| c.1, &mut minmax);
            assert_eq!(minmax[0], CoordElem { val: 1500.0, num: offset });
            assert_eq!(minmax[1], CoordElem { val: 2499.0, num: offset + 999 });
            assert_eq!(minmax[2], CoordElem { val: 301.0, num: offset + 999 });
            assert_eq!(minmax[3], CoordElem { val: 1300.0, num: offset });
        }
    });
}

#[test]
fn min_max_reduces_across_ranks() {
    ProcessGroup::run(4, |comm| {
        let rules = RuleSet::new(&[TraceKey::SourceX, TraceKey::SourceY]);
        let mut prm = TraceMetadata::new(rules, 10);
        let offset = 10 * comm.rank();
        for i in 0..10 {
            let k = (offset + i) as f64;
            prm.set_floating_point(i, TraceKey::SourceX, 100.0 - k).unwrap();
            prm.set_floating_point(i, TraceKey::SourceY, k * k).unwrap();
        }

        let mut minmax = [CoordElem { val: 0.0, num: 0 }; 4];
        get_min_max_keyed(
            &comm,
            offset,
            &prm,
            TraceKey::SourceX,
            TraceKey::SourceY,
            &mut minmax,
        )
        .unwrap();
        assert_eq!(minmax[0], CoordElem { val: 61.0, num: 39 });
        assert_eq!(minmax[1], CoordElem { val: 100.0, num: 0 });
        assert_eq!(minmax[2], CoordElem { val: 0.0, num: 0 });
        assert_eq!(minmax[3], CoordElem { val: 39.0 * 39.0, num: 39 });
    });
}

#[test]
fn gathers_merge_across_rank_boundaries() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("lines.sgy");

    // (inline, crossline) runs of 4, 3 and 3 traces; the second run
    // straddles the two ranks' slices.
    let lines = [
        (1i64, 1i64),
        (1, 1),
        (1, 1),
        (1, 1),
        (1, 2),
        (1, 2),
        (1, 2),
        (2, 2),
        (2, 2),
        (2, 2),
    ];

    ProcessGroup::run(2, |comm| {
        let mut out = OutputSegy::create(&comm, &path).unwrap();
        out.write_text("lines");
        out.write_ns(2).unwrap();
        out.write_sample_interval(4.0e-6).unwrap();

        let dec = block_decomposition(lines.len(), comm.num_ranks(), comm.rank());
        let rules = RuleSet::new(&[TraceKey::Inline, TraceKey::Crossline]);
        let mut prm = TraceMetadata::new(rules, dec.local_size);
        for i in 0..dec.local_size {
            let (il, xl) = lines[dec.global_offset + i];
            prm.set_integer(i, TraceKey::Inline, il).unwrap();
            prm.set_integer(i, TraceKey::Crossline, xl).unwrap();
        }
        let trc = vec![0f32; dec.local_size * 2];
        out.write_trace(dec.global_offset, dec.local_size, &trc, Some(&prm), 0)
            .unwrap();
        out.close().unwrap();

        let file = InputSegy::open(&comm, &path).unwrap();
        let gathers = get_il_xl_gathers(&comm, &file).unwrap();
        assert_eq!(gathers.size(), 3);
        assert_eq!(
            gathers.get(0),
            GatherInfo {
                num_traces: 4,
                in_line: 1,
                crossline: 1
            }
        );
        assert_eq!(
            gathers.get(1),
            GatherInfo {
                num_traces: 3,
                in_line: 1,
                crossline: 2
            }
        );
        assert_eq!(
            gathers.get(2),
            GatherInfo {
                num_traces: 3,
                in_line: 2,
                crossline: 2
            }
        );
        gathers.sync();
        comm.assert_ok().unwrap();
    });
}

/// Build one rank's coordinate band: `count` entries starting at global
/// trace `first`, with distinct geometry derived from the trace number.
fn coords_band(first: usize, count: usize) -> Coords {
    let mut coords = Coords::new(count, false);
    for i in 0..count {
        let k = first + i;
        coords.x_src[i] = k as f32;
        coords.y_src[i] = 2.0 * k as f32;
        coords.x_rcv[i] = k as f32 + 0.5;
        coords.y_rcv[i] = 2.0 * k as f32 + 0.5;
        coords.tn[i] = k;
    }
    coords
}

#[test]
fn identical_surveys_match_themselves() {
    ProcessGroup::run(2, |comm| {
        let dec = block_decomposition(200, comm.num_ranks(), comm.rank());
        let crd1 = coords_band(dec.global_offset, dec.local_size);
        let crd2 = Arc::new(coords_band(dec.global_offset, dec.local_size));

        let options = FourDOptions::default();
        let (min, minrs) = calc_4dbin(&comm, 2.0, &crd1, &crd2, &options);

        for i in 0..crd1.sz {
            assert_eq!(min[i], crd1.tn[i]);
            assert!(minrs[i].abs() < 1.0e-6);
        }
    });
}

#[test]
fn matcher_agrees_with_brute_force() {
    ProcessGroup::run(2, |comm| {
        let mut rng = StdRng::seed_from_u64(4242 + comm.rank() as u64);
        let count = 40;

        let mut make_band = |first_tn: usize| {
            let mut xs: Vec<f32> = (0..count).map(|_| rng.gen_range(0.0f32..100.0)).collect();
            xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mut coords = Coords::new(count, false);
            for i in 0..count {
                coords.x_src[i] = xs[i];
                coords.y_src[i] = rng.gen_range(0.0f32..100.0);
                coords.x_rcv[i] = rng.gen_range(0.0f32..100.0);
                coords.y_rcv[i] = rng.gen_range(0.0f32..100.0);
                coords.tn[i] = first_tn + i;
            }
            coords
        };
        let crd1 = make_band(comm.rank() * count);
        let crd2 = Arc::new(make_band(1000 + comm.rank() * count));

        let options = FourDOptions::default();
        let (min, minrs) = calc_4dbin(&comm, 1.0e6, &crd1, &crd2, &options);

        // The whole candidate survey, as every rank published it.
        let all: Vec<(f32, f32, f32, f32, usize)> = comm.gather_vec(
            &(0..count)
                .map(|i| {
                    (
                        crd2.x_src[i],
                        crd2.y_src[i],
                        crd2.x_rcv[i],
                        crd2.y_rcv[i],
                        crd2.tn[i],
                    )
                })
                .collect::<Vec<_>>(),
        );

        for i in 0..crd1.sz {
            let best = all
                .iter()
                .map(|&(xs, ys, xr, yr, _)| {
                    dsr(
                        crd1.x_src[i],
                        crd1.y_src[i],
                        crd1.x_rcv[i],
                        crd1.y_rcv[i],
                        xs,
                        ys,
                        xr,
                        yr,
                    )
                })
                .fold(f32::MAX, f32::min);
            assert_eq!(minrs[i], best);

            let chosen = all.iter().find(|c| c.4 == min[i]).expect("winner exists");
            let chosen_dsr = dsr(
                crd1.x_src[i],
                crd1.y_src[i],
                crd1.x_rcv[i],
                crd1.y_rcv[i],
                chosen.0,
                chosen.1,
                chosen.2,
                chosen.3,
            );
            assert_eq!(chosen_dsr, minrs[i]);
        }
    });
}

#[test]
fn fourd_end_to_end_writes_matched_traces() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let survey = dir.path().join("survey.sgy");
    let matched = dir.path().join("matched.sgy");
    let (nt, ns) = (12usize, 4usize);

    ProcessGroup::run(2, |comm| {
        build_geometry_file(&comm, &survey, nt, ns, |k| 10.25 + k as f64);

        let crd1 = get_coords(&comm, &survey, false).unwrap();
        let crd2 = get_coords(&comm, &survey, false).unwrap();

        let options = FourDOptions::default();
        let (min, minrs) = calc_4dbin(&comm, 0.5, &crd1, &crd2, &options);
        for i in 0..crd1.sz {
            assert_eq!(min[i], crd1.tn[i]);
            assert!(minrs[i].abs() < 1.0e-6);
        }

        output_non_monotonic(&comm, &matched, &survey, &min, &minrs, true).unwrap();

        let result = InputSegy::open(&comm, &matched).unwrap();
        assert_eq!(result.read_nt(), nt);
        assert_eq!(result.read_ns(), ns);

        let mut rules = RuleSet::new(&[]);
        rules.add_segy_float(
            TraceKey::Dsdr,
            parseis_core::segy::trace_header_byte::SOURCE_MEASUREMENT,
            parseis_core::segy::trace_header_byte::TIME_SCALAR,
        );
        let mut prm = TraceMetadata::new(rules, nt);
        let mut trc = vec![0f32; nt * ns];
        result.read_trace(0, nt, &mut trc, Some(&mut prm), 0).unwrap();
        for k in 0..nt {
            for j in 0..ns {
                assert_eq!(trc[k * ns + j], (k * ns + j) as f32);
            }
            assert!(prm.get_floating_point(k, TraceKey::Dsdr).unwrap().abs() < 1.0e-6);
        }
        comm.assert_ok().unwrap();
    });
}
