//! Aggregate analysis result
//!
//! Every field is filled independently by one phase. A failed phase leaves
//! its field as `None` and never touches the others.

use std::fmt;

/// Region width summary
#[derive(Debug, Clone, PartialEq)]
pub struct WidthStats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub median: f64,
}

/// Best matching reference assembly
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeMatch {
    pub assembly: String,
    /// Fraction of regions that fit inside the assembly
    pub score: f64,
}

/// Distance from region midpoints to the nearest TSS
#[derive(Debug, Clone, PartialEq)]
pub struct TssDistanceSummary {
    pub mean: f64,
    pub median: f64,
    /// Fraction of measured regions within 1kb of a TSS
    pub within_1kb_fraction: f64,
    /// Regions with at least one TSS on their chromosome
    pub regions_measured: usize,
}

/// Share of regions overlapping one annotation class
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationOverlap {
    pub class: String,
    pub percent: f64,
}

/// Output of a single phase, applied to exactly one result field
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutput {
    RegionCount(usize),
    Widths(WidthStats),
    ChromosomeDistribution(Vec<(String, usize)>),
    GcContent(f64),
    Genome(GenomeMatch),
    TssDistance(TssDistanceSummary),
    AnnotationOverlap(Vec<AnnotationOverlap>),
}

/// Best-effort aggregate of all phases
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub region_count: Option<usize>,
    pub width_stats: Option<WidthStats>,
    pub chromosome_distribution: Option<Vec<(String, usize)>>,
    pub gc_content: Option<f64>,
    pub genome_inference: Option<GenomeMatch>,
    pub tss_distance: Option<TssDistanceSummary>,
    pub annotation_overlap: Option<Vec<AnnotationOverlap>>,
}

impl AnalysisResult {
    /// Store a phase output in its field
    pub fn apply(&mut self, output: PhaseOutput) {
        match output {
            PhaseOutput::RegionCount(n) => self.region_count = Some(n),
            PhaseOutput::Widths(w) => self.width_stats = Some(w),
            PhaseOutput::ChromosomeDistribution(d) => self.chromosome_distribution = Some(d),
            PhaseOutput::GcContent(gc) => self.gc_content = Some(gc),
            PhaseOutput::Genome(g) => self.genome_inference = Some(g),
            PhaseOutput::TssDistance(t) => self.tss_distance = Some(t),
            PhaseOutput::AnnotationOverlap(a) => self.annotation_overlap = Some(a),
        }
    }

    /// Number of fields that hold a value
    pub fn populated_fields(&self) -> usize {
        [
            self.region_count.is_some(),
            self.width_stats.is_some(),
            self.chromosome_distribution.is_some(),
            self.gc_content.is_some(),
            self.genome_inference.is_some(),
            self.tss_distance.is_some(),
            self.annotation_overlap.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count()
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn missing(f: &mut fmt::Formatter<'_>, label: &str) -> fmt::Result {
            writeln!(f, "{:<16} unavailable", label)
        }

        match self.region_count {
            Some(n) => writeln!(f, "{:<16} {}", "Regions:", n)?,
            None => missing(f, "Regions:")?,
        }
        match &self.width_stats {
            Some(w) => writeln!(
                f,
                "{:<16} mean {:.1}, median {:.1}, min {}, max {}",
                "Width:", w.mean, w.median, w.min, w.max
            )?,
            None => missing(f, "Width:")?,
        }
        match &self.chromosome_distribution {
            Some(d) => writeln!(f, "{:<16} {} chromosomes", "Chromosomes:", d.len())?,
            None => missing(f, "Chromosomes:")?,
        }
        match self.gc_content {
            Some(gc) => writeln!(f, "{:<16} {:.2}%", "GC content:", gc * 100.0)?,
            None => missing(f, "GC content:")?,
        }
        match &self.genome_inference {
            Some(g) => writeln!(f, "{:<16} {} ({:.1}% fit)", "Genome:", g.assembly, g.score * 100.0)?,
            None => missing(f, "Genome:")?,
        }
        match &self.tss_distance {
            Some(t) => writeln!(
                f,
                "{:<16} mean {:.0}, median {:.0}, {:.1}% within 1kb",
                "TSS distance:",
                t.mean,
                t.median,
                t.within_1kb_fraction * 100.0
            )?,
            None => missing(f, "TSS distance:")?,
        }
        match &self.annotation_overlap {
            Some(classes) => {
                writeln!(f, "Annotation overlap:")?;
                for a in classes {
                    writeln!(f, "  {:<14} {:.1}%", a.class, a.percent)?;
                }
            }
            None => missing(f, "Annotation:")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_one_field() {
        let mut result = AnalysisResult::default();
        assert_eq!(result.populated_fields(), 0);

        result.apply(PhaseOutput::RegionCount(3));
        result.apply(PhaseOutput::GcContent(0.4));
        assert_eq!(result.region_count, Some(3));
        assert_eq!(result.gc_content, Some(0.4));
        assert_eq!(result.populated_fields(), 2);
    }

    #[test]
    fn test_display_marks_missing_fields() {
        let mut result = AnalysisResult::default();
        result.apply(PhaseOutput::RegionCount(3));
        let text = result.to_string();
        assert!(text.contains("Regions:         3"));
        assert!(text.contains("GC content:      unavailable"));
    }
}
