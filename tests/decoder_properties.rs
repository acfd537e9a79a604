//! Property-based tests for region file decoding
//!
//! Progress must be monotone and end at 1.0, and a malformed line must be
//! reported with its 1-based line number.

use bedlens::core::{DecodeError, IoStrategy, Strand, UploadedFile};
use bedlens::formats::bed::{parse_region_line, ChunkedDecoder, RegionDecoder};
use bedlens::PipelineConfig;
use flate2::write::GzEncoder;
use flate2::Compression;
use proptest::prelude::*;
use std::io::Write;

/// Generate a valid chromosome name
fn arb_chrom_name() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u8..=22).prop_map(|n| format!("chr{}", n)),
        Just("chrX".to_string()),
        Just("chrM".to_string()),
    ]
}

/// Generate a strand field
fn arb_strand_field() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("+".to_string()),
        Just("-".to_string()),
        Just(".".to_string()),
    ]
}

/// Generate a BED3 or BED6 line
fn arb_bed_line() -> impl Strategy<Value = String> {
    prop_oneof![
        (arb_chrom_name(), 0u64..1_000_000, 1u64..5000)
            .prop_map(|(chrom, start, size)| format!("{}\t{}\t{}", chrom, start, start + size)),
        (arb_chrom_name(), 0u64..1_000_000, 1u64..5000, arb_strand_field()).prop_map(
            |(chrom, start, size, strand)| {
                format!("{}\t{}\t{}\tpeak\t0\t{}", chrom, start, start + size, strand)
            }
        ),
    ]
}

/// Generate a line that cannot be decoded
fn arb_malformed_line() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_chrom_name(),
        arb_chrom_name().prop_map(|c| format!("{}\t100", c)),
        arb_chrom_name().prop_map(|c| format!("{}\tabc\t200", c)),
        arb_chrom_name().prop_map(|c| format!("{}\t100\t-5", c)),
    ]
}

fn upload(lines: &[String]) -> UploadedFile {
    let mut content = lines.join("\n");
    content.push('\n');
    UploadedFile::from_bytes("regions.bed", content.into_bytes())
}

fn decode_with_progress(file: &UploadedFile, chunk_bytes: usize) -> (Result<usize, DecodeError>, Vec<f64>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let decoder = RegionDecoder::new(&PipelineConfig::default().with_chunk_bytes(chunk_bytes));
    let mut reports = Vec::new();
    let result = runtime.block_on(decoder.decode(file, |p| reports.push(p), || true));
    (result.map(|s| s.len()), reports)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: decoding keeps every line in input order
    #[test]
    fn prop_decode_preserves_lines(lines in prop::collection::vec(arb_bed_line(), 1..200)) {
        let file = upload(&lines);
        let sequence = RegionDecoder::default().decode_blocking(&file).unwrap();

        prop_assert_eq!(sequence.len(), lines.len());
        for (record, line) in sequence.iter().zip(&lines) {
            let expected = parse_region_line(line.as_bytes(), 1).unwrap();
            prop_assert_eq!(record, &expected);
        }
    }

    /// Property: progress never decreases and ends at exactly 1.0
    #[test]
    fn prop_progress_monotone(
        lines in prop::collection::vec(arb_bed_line(), 1..200),
        chunk_bytes in 1usize..512,
    ) {
        let file = upload(&lines);
        let (result, reports) = decode_with_progress(&file, chunk_bytes);

        prop_assert_eq!(result, Ok(lines.len()));
        prop_assert!(reports.windows(2).all(|w| w[0] <= w[1]), "{:?}", reports);
        prop_assert!(reports.iter().all(|p| (0.0..=1.0).contains(p)));
        prop_assert_eq!(reports.last().copied(), Some(1.0));
    }

    /// Property: a malformed line fails the decode with its line number
    #[test]
    fn prop_malformed_line_number(
        mut lines in prop::collection::vec(arb_bed_line(), 1..100),
        bad in arb_malformed_line(),
        position in any::<prop::sample::Index>(),
    ) {
        let index = position.index(lines.len() + 1);
        lines.insert(index, bad);
        let file = upload(&lines);

        let err = RegionDecoder::default().decode_blocking(&file).unwrap_err();
        prop_assert_eq!(err.line_number(), Some(index + 1));
    }

    /// Property: the chunk size changes scheduling, not the decoded result
    #[test]
    fn prop_chunk_size_invariant(
        lines in prop::collection::vec(arb_bed_line(), 1..100),
        chunk_bytes in 1usize..256,
    ) {
        let file = upload(&lines);
        let whole = RegionDecoder::default().decode_blocking(&file).unwrap();
        let chunked = RegionDecoder::new(&PipelineConfig::default().with_chunk_bytes(chunk_bytes))
            .decode_blocking(&file)
            .unwrap();
        prop_assert_eq!(whole, chunked);
    }
}

#[test]
fn test_gzip_upload_matches_plain() {
    let lines = vec![
        "chr1\t10\t20".to_string(),
        "chr2\t30\t40\tx\t0\t-".to_string(),
    ];
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(lines.join("\n").as_bytes()).unwrap();
    let gz = UploadedFile::from_bytes("regions.bed.gz", encoder.finish().unwrap());

    let sequence = RegionDecoder::default().decode_blocking(&gz).unwrap();
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence.records()[1].strand, Some(Strand::Minus));

    let (result, reports) = decode_with_progress(&gz, 8);
    assert_eq!(result, Ok(2));
    assert_eq!(reports.last().copied(), Some(1.0));
}

#[test]
fn test_header_only_file_is_empty() {
    let file = UploadedFile::from_bytes(
        "header.bed",
        b"track name=peaks\nbrowser position chr1:1-100\n# comment\n".to_vec(),
    );
    assert_eq!(
        RegionDecoder::default().decode_blocking(&file),
        Err(DecodeError::Empty)
    );
}

#[test]
fn test_utf16_upload_rejected() {
    let file = UploadedFile::from_bytes("utf16.bed", vec![0xFF, 0xFE, b'c', 0, b'h', 0]);
    let err = ChunkedDecoder::open(&file, 1024, IoStrategy::Auto).err().unwrap();
    assert!(matches!(err, DecodeError::UnsupportedEncoding { line: None, .. }));
}

#[test]
fn test_stale_decode_stops_at_chunk_boundary() {
    let lines: Vec<String> = (0..100).map(|i| format!("chr1\t{}\t{}", i, i + 1)).collect();
    let file = upload(&lines);
    let decoder = RegionDecoder::new(&PipelineConfig::default().with_chunk_bytes(16));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let checks = std::cell::Cell::new(0usize);
    let result = runtime.block_on(decoder.decode(
        &file,
        |_| {},
        || {
            checks.set(checks.get() + 1);
            checks.get() <= 3
        },
    ));
    assert_eq!(result, Err(DecodeError::Cancelled));
}
