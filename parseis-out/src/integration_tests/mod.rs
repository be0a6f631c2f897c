use crate::OutputSegy;
use parseis_comm::{block_decomposition, ProcessGroup};
use parseis_core::rules::{RuleSet, TraceKey};
use parseis_core::TraceMetadata;
use parseis_in::InputSegy;

fn sample(trace: usize, ns: usize, j: usize) -> f32 {
    (trace * ns + j) as f32
}

#[test]
fn write_and_read_back() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("round-trip.sgy");
    let (nt, ns) = (8usize, 16usize);

    ProcessGroup::run(2, |comm| {
        let mut out = OutputSegy::create(&comm, &path).unwrap();
        out.write_text("Test file");
        out.write_ns(ns).unwrap();
        out.write_sample_interval(4.0e-6).unwrap();

        let dec = block_decomposition(nt, comm.num_ranks(), comm.rank());
        let rules = RuleSet::new(&[TraceKey::SourceX, TraceKey::Inline]);
        let mut prm = TraceMetadata::new(rules, dec.local_size);
        let mut trc = vec![0f32; dec.local_size * ns];
        for i in 0..dec.local_size {
            let trace = dec.global_offset + i;
            prm.set_floating_point(i, TraceKey::SourceX, 100.5 + trace as f64)
                .unwrap();
            prm.set_integer(i, TraceKey::Inline, 40 + trace as i64).unwrap();
            for j in 0..ns {
                trc[i * ns + j] = sample(trace, ns, j);
            }
        }
        out.write_trace(dec.global_offset, dec.local_size, &trc, Some(&prm), 0)
            .unwrap();
        out.close().unwrap();

        let input = InputSegy::open(&comm, &path).unwrap();
        assert_eq!(input.read_nt(), nt);
        assert_eq!(input.read_ns(), ns);
        assert!((input.read_sample_interval() - 4.0e-6).abs() < 1.0e-9);
        assert!(input.read_text().starts_with("Test file"));

        let rules = RuleSet::new(&[TraceKey::SourceX, TraceKey::Inline]);
        let mut back = TraceMetadata::new(rules, nt);
        let mut all = vec![0f32; nt * ns];
        input
            .read_trace(0, nt, &mut all, Some(&mut back), 0)
            .unwrap();
        for trace in 0..nt {
            assert_eq!(
                back.get_floating_point(trace, TraceKey::SourceX).unwrap(),
                100.5 + trace as f64
            );
            assert_eq!(
                back.get_integer(trace, TraceKey::Inline).unwrap(),
                40 + trace as i64
            );
            for j in 0..ns {
                assert_eq!(all[trace * ns + j], sample(trace, ns, j));
            }
        }
        comm.assert_ok().unwrap();
    });

    // The reel and every fixed-length trace are accounted for.
    let expected = 3600 + nt * (240 + 4 * ns);
    assert_eq!(
        std::fs::metadata(&path).expect("Couldn't stat output.").len(),
        expected as u64
    );
}

#[test]
fn unequal_batches_stay_balanced() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("balanced.sgy");
    let ns = 4usize;
    let max_per_batch = 2usize;

    ProcessGroup::run(2, |comm| {
        // Rank 0 owns 7 traces, rank 1 owns 3.
        let local = if comm.rank() == 0 { 7 } else { 3 };
        let offset = if comm.rank() == 0 { 0 } else { 7 };

        let mut out = OutputSegy::create(&comm, &path).unwrap();
        out.write_text("balance");
        out.write_ns(ns).unwrap();
        out.write_sample_interval(1.0e-3).unwrap();

        let biggest = comm.max(local);
        let batches = |n: usize| (n + max_per_batch - 1) / max_per_batch;
        let extra = batches(biggest) - batches(local);

        let mut i = 0;
        while i < local {
            let n = std::cmp::min(max_per_batch, local - i);
            let mut trc = vec![0f32; n * ns];
            for k in 0..n {
                for j in 0..ns {
                    trc[k * ns + j] = sample(offset + i + k, ns, j);
                }
            }
            out.write_trace(offset + i, n, &trc, None, 0).unwrap();
            i += n;
        }
        for _ in 0..extra {
            out.write_null().unwrap();
        }
        out.close().unwrap();

        let input = InputSegy::open(&comm, &path).unwrap();
        assert_eq!(input.read_nt(), 10);
        let mut all = vec![0f32; 10 * ns];
        input.read_trace(0, 10, &mut all, None, 0).unwrap();
        for trace in 0..10 {
            for j in 0..ns {
                assert_eq!(all[trace * ns + j], sample(trace, ns, j));
            }
        }
        comm.assert_ok().unwrap();
    });
}

#[test]
fn copied_traces_are_byte_exact() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let first = dir.path().join("first.sgy");
    let second = dir.path().join("second.sgy");
    let (nt, ns) = (5usize, 12usize);

    ProcessGroup::run(2, |comm| {
        let mut out = OutputSegy::create(&comm, &first).unwrap();
        out.write_text("byte exact");
        out.write_ns(ns).unwrap();
        out.write_sample_interval(2.0e-6).unwrap();

        let dec = block_decomposition(nt, comm.num_ranks(), comm.rank());
        let rules = RuleSet::new(&[TraceKey::SourceX, TraceKey::ReceiverY]);
        let mut prm = TraceMetadata::new(rules, dec.local_size);
        let mut trc = vec![0f32; dec.local_size * ns];
        for i in 0..dec.local_size {
            let trace = dec.global_offset + i;
            prm.set_floating_point(i, TraceKey::SourceX, 7000.25 - trace as f64)
                .unwrap();
            prm.set_floating_point(i, TraceKey::ReceiverY, 13.0 * trace as f64)
                .unwrap();
            for j in 0..ns {
                trc[i * ns + j] = sample(trace, ns, j) * 0.5;
            }
        }
        out.write_trace(dec.global_offset, dec.local_size, &trc, Some(&prm), 0)
            .unwrap();
        out.close().unwrap();

        // Copy through a full-header passthrough.
        let input = InputSegy::open(&comm, &first).unwrap();
        let mut copy_rules = RuleSet::new(&[]);
        copy_rules.add_copy();
        let mut carried = TraceMetadata::new(copy_rules, dec.local_size);
        let mut samples = vec![0f32; dec.local_size * ns];
        input
            .read_trace(dec.global_offset, dec.local_size, &mut samples, Some(&mut carried), 0)
            .unwrap();

        let mut copy = OutputSegy::create(&comm, &second).unwrap();
        copy.write_text("byte exact");
        copy.write_ns(ns).unwrap();
        copy.write_sample_interval(input.read_sample_interval()).unwrap();
        copy.write_trace(dec.global_offset, dec.local_size, &samples, Some(&carried), 0)
            .unwrap();
        copy.close().unwrap();
        comm.assert_ok().unwrap();
    });

    let a = std::fs::read(&first).expect("Couldn't read first output.");
    let b = std::fs::read(&second).expect("Couldn't read second output.");
    assert_eq!(a, b);
}
