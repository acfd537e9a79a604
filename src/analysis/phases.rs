//! Default analysis phases
//!
//! Each phase reads the region set and the analysis context and produces one
//! [`PhaseOutput`]. Phases never see each other's output.

use crate::analysis::context::AnalysisContext;
use crate::analysis::result::{
    AnnotationOverlap, GenomeMatch, PhaseOutput, TssDistanceSummary, WidthStats,
};
use crate::core::{PhaseError, PhaseResult, RegionSet};

/// One independent, read-only step of the analyzer
pub trait AnalysisPhase {
    /// Stable phase name used in errors and logs
    fn name(&self) -> &'static str;

    fn run(&self, set: &RegionSet, context: &AnalysisContext) -> PhaseResult<PhaseOutput>;
}

/// The standard phase list, in execution order
pub fn default_phases() -> Vec<Box<dyn AnalysisPhase>> {
    vec![
        Box::new(RegionCountPhase),
        Box::new(WidthStatsPhase),
        Box::new(ChromosomeDistributionPhase),
        Box::new(GcContentPhase),
        Box::new(GenomeInferencePhase),
        Box::new(TssDistancePhase),
        Box::new(AnnotationOverlapPhase),
    ]
}

/// Median of an already sorted slice
fn median(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

pub struct RegionCountPhase;

impl AnalysisPhase for RegionCountPhase {
    fn name(&self) -> &'static str {
        "region_count"
    }

    fn run(&self, set: &RegionSet, _context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        Ok(PhaseOutput::RegionCount(set.len()))
    }
}

pub struct WidthStatsPhase;

impl AnalysisPhase for WidthStatsPhase {
    fn name(&self) -> &'static str {
        "width_stats"
    }

    fn run(&self, set: &RegionSet, _context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        let mut widths: Vec<u64> = set.records().iter().map(|r| r.width()).collect();
        if widths.is_empty() {
            return Err(PhaseError::new(self.name(), "region set is empty"));
        }
        widths.sort_unstable();

        Ok(PhaseOutput::Widths(WidthStats {
            min: widths[0],
            max: widths[widths.len() - 1],
            mean: mean(&widths),
            median: median(&widths),
        }))
    }
}

pub struct ChromosomeDistributionPhase;

impl AnalysisPhase for ChromosomeDistributionPhase {
    fn name(&self) -> &'static str {
        "chromosome_distribution"
    }

    fn run(&self, set: &RegionSet, _context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        let distribution = set
            .chromosomes()
            .map(|chrom| (chrom.to_string(), set.chrom_regions(chrom).count()))
            .collect();
        Ok(PhaseOutput::ChromosomeDistribution(distribution))
    }
}

/// Mean per-region GC fraction over called bases (A/C/G/T)
pub struct GcContentPhase;

impl AnalysisPhase for GcContentPhase {
    fn name(&self) -> &'static str {
        "gc_content"
    }

    fn run(&self, set: &RegionSet, context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        let reference = context
            .reference
            .as_ref()
            .ok_or_else(|| PhaseError::new(self.name(), "no reference sequence loaded"))?;

        let mut total = 0.0;
        let mut measured = 0usize;
        for record in set.records() {
            let (lo, hi) = record.bounds();
            let Some(bases) = reference.slice(&record.chrom, lo, hi) else {
                continue;
            };
            let mut gc = 0u64;
            let mut called = 0u64;
            for base in bases {
                match base.to_ascii_uppercase() {
                    b'G' | b'C' => {
                        gc += 1;
                        called += 1;
                    }
                    b'A' | b'T' => called += 1,
                    _ => {}
                }
            }
            if called > 0 {
                total += gc as f64 / called as f64;
                measured += 1;
            }
        }

        if measured == 0 {
            return Err(PhaseError::new(
                self.name(),
                "no region overlaps a called reference base",
            ));
        }
        Ok(PhaseOutput::GcContent(total / measured as f64))
    }
}

/// Picks the loaded assembly that fits the most regions
pub struct GenomeInferencePhase;

impl AnalysisPhase for GenomeInferencePhase {
    fn name(&self) -> &'static str {
        "genome_inference"
    }

    fn run(&self, set: &RegionSet, context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        if context.assemblies.is_empty() {
            return Err(PhaseError::new(self.name(), "no reference assemblies loaded"));
        }
        if set.is_empty() {
            return Err(PhaseError::new(self.name(), "region set is empty"));
        }

        let mut best: Option<GenomeMatch> = None;
        for assembly in &context.assemblies {
            let fitting = set
                .records()
                .iter()
                .filter(|r| assembly.contains(&r.chrom, r.bounds().1))
                .count();
            let score = fitting as f64 / set.len() as f64;
            // Strictly greater keeps the earliest assembly on ties
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(GenomeMatch {
                    assembly: assembly.name().to_string(),
                    score,
                });
            }
        }

        match best {
            Some(m) if m.score > 0.0 => Ok(PhaseOutput::Genome(m)),
            _ => Err(PhaseError::new(self.name(), "no assembly matches any region")),
        }
    }
}

pub struct TssDistancePhase;

impl AnalysisPhase for TssDistancePhase {
    fn name(&self) -> &'static str {
        "tss_distance"
    }

    fn run(&self, set: &RegionSet, context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        let tss = context
            .tss
            .as_ref()
            .ok_or_else(|| PhaseError::new(self.name(), "no TSS list loaded"))?;

        let mut distances: Vec<u64> = set
            .records()
            .iter()
            .filter_map(|r| tss.nearest_distance(&r.chrom, r.midpoint()))
            .collect();
        if distances.is_empty() {
            return Err(PhaseError::new(
                self.name(),
                "no region shares a chromosome with a TSS",
            ));
        }
        distances.sort_unstable();

        let within = distances.iter().filter(|&&d| d <= 1_000).count();
        Ok(PhaseOutput::TssDistance(TssDistanceSummary {
            mean: mean(&distances),
            median: median(&distances),
            within_1kb_fraction: within as f64 / distances.len() as f64,
            regions_measured: distances.len(),
        }))
    }
}

/// Percentage of regions overlapping each annotation class
///
/// When a TSS list is loaded and no `promoter` class exists, promoters are
/// derived as `promoter_window` bases either side of each TSS.
pub struct AnnotationOverlapPhase;

impl AnalysisPhase for AnnotationOverlapPhase {
    fn name(&self) -> &'static str {
        "annotation_overlap"
    }

    fn run(&self, set: &RegionSet, context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
        if context.annotations.is_none() && context.tss.is_none() {
            return Err(PhaseError::new(self.name(), "no annotations loaded"));
        }
        if set.is_empty() {
            return Err(PhaseError::new(self.name(), "region set is empty"));
        }
        let total = set.len() as f64;
        let mut overlaps = Vec::new();

        if let Some(annotations) = &context.annotations {
            for class in annotations.classes() {
                let hits = set
                    .records()
                    .iter()
                    .filter(|r| {
                        let (lo, hi) = r.bounds();
                        annotations.overlaps(class, &r.chrom, lo, hi.max(lo.saturating_add(1)))
                    })
                    .count();
                overlaps.push(AnnotationOverlap {
                    class: class.clone(),
                    percent: hits as f64 * 100.0 / total,
                });
            }
        }

        let has_promoter = overlaps.iter().any(|a| a.class == "promoter");
        if let (Some(tss), false) = (&context.tss, has_promoter) {
            let window = context.promoter_window;
            let hits = set
                .records()
                .iter()
                .filter(|r| {
                    let half_width = r.bounds().1.saturating_sub(r.bounds().0) / 2;
                    tss.nearest_distance(&r.chrom, r.midpoint())
                        .is_some_and(|d| d.saturating_sub(half_width) <= window)
                })
                .count();
            overlaps.push(AnnotationOverlap {
                class: "promoter".to_string(),
                percent: hits as f64 * 100.0 / total,
            });
        }

        Ok(PhaseOutput::AnnotationOverlap(overlaps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::context::{AnnotationSet, GenomeAssembly, ReferenceSequences, TssIndex};
    use crate::core::{DecodedRegionSequence, RegionRecord, RegionSetHandle, ResourceLedger};
    use std::collections::HashMap;

    fn handle(records: Vec<RegionRecord>) -> RegionSetHandle {
        let ledger = ResourceLedger::new(1000);
        RegionSetHandle::construct(DecodedRegionSequence::new(records), &ledger).unwrap()
    }

    fn regions() -> RegionSetHandle {
        handle(vec![
            RegionRecord::new("chr1", 0, 4, None),
            RegionRecord::new("chr1", 4, 8, None),
            RegionRecord::new("chr2", 0, 10, None),
        ])
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[1, 3, 5]), 3.0);
        assert_eq!(median(&[1, 3, 5, 7]), 4.0);
    }

    #[test]
    fn test_width_stats() {
        let h = regions();
        let output = WidthStatsPhase.run(h.get(), &AnalysisContext::new()).unwrap();
        assert_eq!(
            output,
            PhaseOutput::Widths(WidthStats {
                min: 4,
                max: 10,
                mean: 6.0,
                median: 4.0,
            })
        );
    }

    #[test]
    fn test_chromosome_distribution() {
        let h = regions();
        let output = ChromosomeDistributionPhase
            .run(h.get(), &AnalysisContext::new())
            .unwrap();
        assert_eq!(
            output,
            PhaseOutput::ChromosomeDistribution(vec![
                ("chr1".to_string(), 2),
                ("chr2".to_string(), 1)
            ])
        );
    }

    #[test]
    fn test_gc_content() {
        let mut reference = ReferenceSequences::new();
        reference.insert("chr1", b"GGCCATAT".to_vec());
        let context = AnalysisContext::new().with_reference(reference);
        let h = regions();

        // chr1:0-4 is all GC, chr1:4-8 has none, chr2 has no sequence
        let output = GcContentPhase.run(h.get(), &context).unwrap();
        assert_eq!(output, PhaseOutput::GcContent(0.5));
    }

    #[test]
    fn test_gc_content_without_reference_fails() {
        let h = regions();
        let err = GcContentPhase.run(h.get(), &AnalysisContext::new()).unwrap_err();
        assert_eq!(err.phase, "gc_content");
    }

    #[test]
    fn test_genome_inference_prefers_best_fit() {
        let small = GenomeAssembly::new("small", HashMap::from([("chr1".to_string(), 8u64)]));
        let full = GenomeAssembly::new(
            "full",
            HashMap::from([("chr1".to_string(), 100u64), ("chr2".to_string(), 100u64)]),
        );
        let context = AnalysisContext::new().with_assembly(small).with_assembly(full);
        let h = regions();

        let output = GenomeInferencePhase.run(h.get(), &context).unwrap();
        assert_eq!(
            output,
            PhaseOutput::Genome(GenomeMatch {
                assembly: "full".to_string(),
                score: 1.0,
            })
        );
    }

    #[test]
    fn test_genome_inference_without_match_fails() {
        let other = GenomeAssembly::new("other", HashMap::from([("chrZ".to_string(), 8u64)]));
        let context = AnalysisContext::new().with_assembly(other);
        let h = regions();
        assert!(GenomeInferencePhase.run(h.get(), &context).is_err());
    }

    #[test]
    fn test_tss_distance() {
        let mut tss = TssIndex::new();
        tss.insert("chr1", 2);
        let context = AnalysisContext::new().with_tss(tss);
        let h = regions();

        let output = TssDistancePhase.run(h.get(), &context).unwrap();
        let PhaseOutput::TssDistance(summary) = output else {
            panic!("unexpected output");
        };
        // midpoints 2 and 6 on chr1, chr2 has no TSS
        assert_eq!(summary.regions_measured, 2);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.within_1kb_fraction, 1.0);
    }

    #[test]
    fn test_annotation_overlap_with_derived_promoter() {
        let mut annotations = AnnotationSet::new();
        annotations.insert("exon", "chr1", 0, 2);
        let mut tss = TssIndex::new();
        tss.insert("chr2", 5000);
        let context = AnalysisContext::new()
            .with_annotations(annotations)
            .with_tss(tss)
            .with_promoter_window(100);
        let h = regions();

        let output = AnnotationOverlapPhase.run(h.get(), &context).unwrap();
        let PhaseOutput::AnnotationOverlap(classes) = output else {
            panic!("unexpected output");
        };
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].class, "exon");
        assert!((classes[0].percent - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(classes[1].class, "promoter");
        assert_eq!(classes[1].percent, 0.0);
    }

    #[test]
    fn test_annotation_overlap_without_inputs_fails() {
        let h = regions();
        assert!(AnnotationOverlapPhase
            .run(h.get(), &AnalysisContext::new())
            .is_err());
    }
}
