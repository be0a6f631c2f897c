use crate::InputSegy;
use parseis_comm::{block_decomposition, ProcessGroup};
use parseis_core::number_encoding::ieee_to_ibm;
use parseis_core::rules::{RuleSet, TraceKey};
use parseis_core::text_encoding::ascii_to_ebcdic;
use parseis_core::TraceMetadata;

use std::path::Path;

/// Hand-assemble a small rev1 file: `nt` traces of `ns` IEEE samples where
/// trace `i` sample `j` is `(i * ns + j)` and `source_x` is `1000 + i`.
fn build_test_file(path: &Path, ns: usize, nt: usize, format: i16, text: &[u8]) {
    let mut raw = vec![0u8; 3600 + nt * (240 + 4 * ns)];
    raw[..text.len().min(3200)].copy_from_slice(&text[..text.len().min(3200)]);
    for slot in raw[text.len().min(3200)..3200].iter_mut() {
        *slot = b' ';
    }
    raw[3216..3218].copy_from_slice(&4000i16.to_be_bytes());
    raw[3220..3222].copy_from_slice(&(ns as i16).to_be_bytes());
    raw[3224..3226].copy_from_slice(&format.to_be_bytes());

    for i in 0..nt {
        let header = 3600 + i * (240 + 4 * ns);
        raw[header + 70..header + 72].copy_from_slice(&1i16.to_be_bytes());
        raw[header + 72..header + 76].copy_from_slice(&(1000 + i as i32).to_be_bytes());
        for j in 0..ns {
            let value = (i * ns + j) as f32;
            let at = header + 240 + 4 * j;
            let bytes = if format == 1 {
                ieee_to_ibm(value)
            } else {
                value.to_be_bytes()
            };
            raw[at..at + 4].copy_from_slice(&bytes);
        }
    }
    std::fs::write(path, raw).expect("Couldn't write test file.");
}

#[test]
fn reel_fields_and_decomposed_reads() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("plain.sgy");
    build_test_file(&path, 10, 6, 5, b"C 1 parseis test file");

    ProcessGroup::run(2, |comm| {
        let file = InputSegy::open(&comm, &path).unwrap();
        assert_eq!(file.read_ns(), 10);
        assert_eq!(file.read_nt(), 6);
        assert!((file.read_sample_interval() - 4.0e-3).abs() < 1.0e-9);
        assert!(file.read_text().starts_with("C 1 parseis test file"));
        assert_eq!(file.read_text().len(), 3200);

        let dec = block_decomposition(file.read_nt(), comm.num_ranks(), comm.rank());
        let rules = RuleSet::new(&[TraceKey::SourceX, TraceKey::Ltn]);
        let mut prm = TraceMetadata::new(rules, dec.local_size);
        let mut trc = vec![0f32; dec.local_size * file.read_ns()];
        file.read_trace(dec.global_offset, dec.local_size, &mut trc, Some(&mut prm), 0)
            .unwrap();

        for i in 0..dec.local_size {
            let trace = dec.global_offset + i;
            assert_eq!(
                prm.get_floating_point(i, TraceKey::SourceX).unwrap(),
                1000.0 + trace as f64
            );
            assert_eq!(prm.get_index(i, TraceKey::Ltn).unwrap(), trace);
            for j in 0..file.read_ns() {
                assert_eq!(trc[i * 10 + j], (trace * 10 + j) as f32);
            }
        }
        comm.assert_ok().unwrap();
    });
}

#[test]
fn ibm_samples_decode() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("ibm.sgy");
    build_test_file(&path, 8, 3, 1, b"C 1 ibm");

    ProcessGroup::run(1, |comm| {
        let file = InputSegy::open(&comm, &path).unwrap();
        let mut trc = vec![0f32; 3 * 8];
        file.read_trace(0, 3, &mut trc, None, 0).unwrap();
        for (k, &sample) in trc.iter().enumerate() {
            assert_eq!(sample, k as f32);
        }
    });
}

#[test]
fn ebcdic_reel_text_decodes() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("ebcdic.sgy");

    let line = "This is a string for testing EBCDIC conversion etc.";
    let repeated: String = std::iter::repeat(line)
        .take(1 + 3200 / line.len())
        .collect::<String>()[..3200]
        .to_string();
    let coded: Vec<u8> = repeated.bytes().map(ascii_to_ebcdic).collect();
    build_test_file(&path, 4, 1, 5, &coded);

    ProcessGroup::run(1, |comm| {
        let file = InputSegy::open(&comm, &path).unwrap();
        assert_eq!(file.read_text(), repeated);
    });
}

#[test]
fn over_reads_clamp_with_a_warning() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("clamp.sgy");
    build_test_file(&path, 4, 3, 5, b"C 1 clamp");

    ProcessGroup::run(1, |comm| {
        let file = InputSegy::open(&comm, &path).unwrap();

        let mut trc = vec![-1f32; 5 * 4];
        file.read_trace(2, 5, &mut trc, None, 0).unwrap();
        // Only trace 2 exists; the rest of the buffer is untouched.
        assert_eq!(trc[0], 8.0);
        assert_eq!(trc[4], -1.0);

        file.read_trace(10, 2, &mut trc, None, 0).unwrap();
        comm.assert_ok().unwrap();
    });
}

#[test]
fn non_monotonic_reads_serve_duplicates() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("dups.sgy");
    build_test_file(&path, 4, 3, 5, b"C 1 dups");

    ProcessGroup::run(1, |comm| {
        let file = InputSegy::open(&comm, &path).unwrap();

        let wanted = [2usize, 0, 2, 1, 0];
        let rules = RuleSet::new(&[TraceKey::SourceX]);
        let mut prm = TraceMetadata::new(rules, wanted.len());
        let mut trc = vec![0f32; wanted.len() * 4];
        file.read_non_monotonic(&wanted, &mut trc, Some(&mut prm), 0)
            .unwrap();

        for (slot, &trace) in wanted.iter().enumerate() {
            assert_eq!(
                prm.get_floating_point(slot, TraceKey::SourceX).unwrap(),
                1000.0 + trace as f64
            );
            for j in 0..4 {
                assert_eq!(trc[slot * 4 + j], (trace * 4 + j) as f32);
            }
        }
    });
}

#[test]
fn truncated_files_are_fatal() {
    let dir = tempfile::tempdir().expect("Couldn't get tempdir.");
    let path = dir.path().join("stub.sgy");
    std::fs::write(&path, vec![0u8; 100]).expect("Couldn't write test file.");

    ProcessGroup::run(2, |comm| {
        assert!(InputSegy::open(&comm, &path).is_err());
        assert!(comm.assert_ok().is_err());
    });
}
