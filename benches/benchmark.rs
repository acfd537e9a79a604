//! Performance benchmarks for BedLens
//!
//! Run with: cargo bench

use bedlens::analysis::{AnalysisContext, GenomeAssembly, ReferenceSequences, StepwiseAnalyzer};
use bedlens::core::{RegionSetHandle, ResourceLedger, UploadedFile};
use bedlens::formats::{parse_region_line, RegionDecoder};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::rc::Rc;

/// Synthetic BED6 content with `n` regions spread over three chromosomes
fn synthetic_bed(n: usize) -> Vec<u8> {
    let mut out = String::with_capacity(n * 32);
    for i in 0..n {
        let chrom = ["chr1", "chr2", "chr3"][i % 3];
        let start = (i as u64 * 97) % 900_000;
        let strand = if i % 2 == 0 { '+' } else { '-' };
        out.push_str(&format!("{}\t{}\t{}\tr{}\t0\t{}\n", chrom, start, start + 250, i, strand));
    }
    out.into_bytes()
}

fn synthetic_context() -> AnalysisContext {
    let mut reference = ReferenceSequences::new();
    let mut sizes = HashMap::new();
    for chrom in ["chr1", "chr2", "chr3"] {
        reference.insert(chrom, b"ACGTTGCA".repeat(125_000));
        sizes.insert(chrom.to_string(), 1_000_000u64);
    }
    AnalysisContext::new()
        .with_reference(reference)
        .with_assembly(GenomeAssembly::new("synthetic", sizes))
}

/// Benchmark single-line parsing
fn bench_line_parsing(c: &mut Criterion) {
    let lines = [
        b"chr1\t1000\t2000".as_slice(),
        b"chr1\t1000\t2000\tgene1\t500\t+".as_slice(),
        b"chr1 1000 2000 gene1 500 -".as_slice(),
    ];

    let mut group = c.benchmark_group("line_parsing");

    for (name, line) in ["BED3", "BED6", "spaces"].iter().zip(lines.iter()) {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| {
                let result = parse_region_line(black_box(line), 1);
                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark whole-file decoding
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [1_000usize, 10_000, 100_000].iter() {
        let file = UploadedFile::from_bytes("bench.bed", synthetic_bed(*size));
        group.throughput(Throughput::Bytes(file.size()));
        group.bench_with_input(BenchmarkId::from_parameter(size), &file, |b, file| {
            b.iter(|| {
                let result = RegionDecoder::default().decode_blocking(black_box(file));
                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark region set construction and the default analysis phases
fn bench_analyze(c: &mut Criterion) {
    let analyzer = StepwiseAnalyzer::new(Rc::new(synthetic_context()));
    let file = UploadedFile::from_bytes("bench.bed", synthetic_bed(50_000));
    let sequence = match RegionDecoder::default().decode_blocking(&file) {
        Ok(sequence) => sequence,
        Err(e) => {
            eprintln!("Skipping analysis benchmark: {}", e);
            return;
        }
    };

    c.bench_function("construct_50k", |b| {
        b.iter(|| {
            let ledger = ResourceLedger::new(usize::MAX);
            let handle = RegionSetHandle::construct(black_box(sequence.clone()), &ledger);
            black_box(handle)
        })
    });

    let ledger = ResourceLedger::new(usize::MAX);
    let Ok(handle) = RegionSetHandle::construct(sequence, &ledger) else {
        return;
    };
    c.bench_function("analyze_50k", |b| {
        b.iter(|| {
            let outcome = analyzer.analyze_blocking(black_box(handle.get()));
            black_box(outcome)
        })
    });
}

criterion_group!(benches, bench_line_parsing, bench_decode, bench_analyze);

criterion_main!(benches);
