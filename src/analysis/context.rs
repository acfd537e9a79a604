//! Reference inputs for analysis phases
//!
//! Everything here is optional. A phase whose input is missing fails on its
//! own and leaves its result field unset.

use rust_lapper::{Interval, Lapper};
use std::collections::HashMap;

use crate::config::DEFAULT_PROMOTER_WINDOW;

/// Reference sequences keyed by chromosome
#[derive(Debug, Clone, Default)]
pub struct ReferenceSequences {
    seqs: HashMap<String, Vec<u8>>,
}

impl ReferenceSequences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chrom: impl Into<String>, sequence: Vec<u8>) {
        self.seqs.insert(chrom.into(), sequence);
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Bases in `[start, end)`, clipped to the sequence
    pub fn slice(&self, chrom: &str, start: u64, end: u64) -> Option<&[u8]> {
        let seq = self.seqs.get(chrom)?;
        let start = (start as usize).min(seq.len());
        let end = (end as usize).min(seq.len());
        if start >= end {
            return None;
        }
        Some(&seq[start..end])
    }
}

/// Chromosome sizes of one named assembly
#[derive(Debug, Clone)]
pub struct GenomeAssembly {
    name: String,
    chrom_sizes: HashMap<String, u64>,
}

impl GenomeAssembly {
    pub fn new(name: impl Into<String>, chrom_sizes: HashMap<String, u64>) -> Self {
        Self {
            name: name.into(),
            chrom_sizes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chrom_size(&self, chrom: &str) -> Option<u64> {
        self.chrom_sizes.get(chrom).copied()
    }

    /// Whether `[_, end)` on `chrom` fits inside this assembly
    pub fn contains(&self, chrom: &str, end: u64) -> bool {
        self.chrom_size(chrom).is_some_and(|size| end <= size)
    }
}

/// Sorted transcription start sites per chromosome
#[derive(Debug, Clone, Default)]
pub struct TssIndex {
    by_chrom: HashMap<String, Vec<u64>>,
}

impl TssIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chrom: impl Into<String>, position: u64) {
        self.by_chrom.entry(chrom.into()).or_default().push(position);
    }

    /// Sort positions; call once after the last insert
    pub fn finalize(&mut self) {
        for positions in self.by_chrom.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_chrom.values().all(|v| v.is_empty())
    }

    /// Distance from `position` to the closest TSS on `chrom`
    pub fn nearest_distance(&self, chrom: &str, position: u64) -> Option<u64> {
        let positions = self.by_chrom.get(chrom)?;
        let idx = positions.partition_point(|&p| p < position);
        let after = positions.get(idx).map(|&p| p - position);
        let before = idx
            .checked_sub(1)
            .and_then(|i| positions.get(i))
            .map(|&p| position - p);
        match (before, after) {
            (Some(b), Some(a)) => Some(b.min(a)),
            (b, a) => b.or(a),
        }
    }
}

/// Annotation features grouped by class (promoter, exon, intron, ...)
#[derive(Debug, Default)]
pub struct AnnotationSet {
    /// Class names in first-seen order
    classes: Vec<String>,
    features: HashMap<String, HashMap<String, Vec<Interval<u64, ()>>>>,
    index: HashMap<String, HashMap<String, Lapper<u64, ()>>>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: &str, chrom: &str, start: u64, end: u64) {
        if !self.features.contains_key(class) {
            self.classes.push(class.to_string());
        }
        self.features
            .entry(class.to_string())
            .or_default()
            .entry(chrom.to_string())
            .or_default()
            .push(Interval {
                start: start.min(end),
                stop: end.max(start.saturating_add(1)),
                val: (),
            });
    }

    /// Build the interval trees; call once after the last insert
    pub fn finalize(&mut self) {
        self.index = self
            .features
            .iter()
            .map(|(class, chroms)| {
                let trees = chroms
                    .iter()
                    .map(|(chrom, ivs)| (chrom.clone(), Lapper::new(ivs.clone())))
                    .collect();
                (class.clone(), trees)
            })
            .collect();
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether any feature of `class` overlaps `[start, end)` on `chrom`
    pub fn overlaps(&self, class: &str, chrom: &str, start: u64, end: u64) -> bool {
        self.index
            .get(class)
            .and_then(|trees| trees.get(chrom))
            .is_some_and(|lapper| lapper.find(start, end).next().is_some())
    }
}

/// All optional inputs the default phases draw on
#[derive(Debug)]
pub struct AnalysisContext {
    pub reference: Option<ReferenceSequences>,
    pub assemblies: Vec<GenomeAssembly>,
    pub tss: Option<TssIndex>,
    pub annotations: Option<AnnotationSet>,
    /// Half-window around each TSS used to derive promoters
    pub promoter_window: u64,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            reference: None,
            assemblies: Vec::new(),
            tss: None,
            annotations: None,
            promoter_window: DEFAULT_PROMOTER_WINDOW,
        }
    }
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(mut self, reference: ReferenceSequences) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_assembly(mut self, assembly: GenomeAssembly) -> Self {
        self.assemblies.push(assembly);
        self
    }

    pub fn with_tss(mut self, mut tss: TssIndex) -> Self {
        tss.finalize();
        self.tss = Some(tss);
        self
    }

    pub fn with_annotations(mut self, mut annotations: AnnotationSet) -> Self {
        annotations.finalize();
        self.annotations = Some(annotations);
        self
    }

    pub fn with_promoter_window(mut self, promoter_window: u64) -> Self {
        self.promoter_window = promoter_window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_slice_clips() {
        let mut reference = ReferenceSequences::new();
        reference.insert("chr1", b"ACGTACGT".to_vec());

        assert_eq!(reference.slice("chr1", 2, 6), Some(&b"GTAC"[..]));
        assert_eq!(reference.slice("chr1", 6, 100), Some(&b"GT"[..]));
        assert_eq!(reference.slice("chr1", 100, 200), None);
        assert_eq!(reference.slice("chr2", 0, 2), None);
    }

    #[test]
    fn test_nearest_tss() {
        let mut tss = TssIndex::new();
        tss.insert("chr1", 1000);
        tss.insert("chr1", 100);
        tss.insert("chr1", 5000);
        tss.finalize();

        assert_eq!(tss.nearest_distance("chr1", 0), Some(100));
        assert_eq!(tss.nearest_distance("chr1", 900), Some(100));
        assert_eq!(tss.nearest_distance("chr1", 1000), Some(0));
        assert_eq!(tss.nearest_distance("chr1", 9000), Some(4000));
        assert_eq!(tss.nearest_distance("chr2", 10), None);
    }

    #[test]
    fn test_annotation_overlap() {
        let mut annotations = AnnotationSet::new();
        annotations.insert("exon", "chr1", 100, 200);
        annotations.insert("intron", "chr1", 200, 900);
        annotations.insert("exon", "chr2", 10, 20);
        annotations.finalize();

        assert_eq!(annotations.classes(), &["exon".to_string(), "intron".to_string()]);
        assert!(annotations.overlaps("exon", "chr1", 150, 160));
        assert!(!annotations.overlaps("exon", "chr1", 300, 400));
        assert!(annotations.overlaps("intron", "chr1", 300, 400));
        assert!(!annotations.overlaps("utr", "chr1", 100, 200));
    }

    #[test]
    fn test_assembly_contains() {
        let sizes = HashMap::from([("chr1".to_string(), 1000u64)]);
        let assembly = GenomeAssembly::new("toy", sizes);
        assert!(assembly.contains("chr1", 1000));
        assert!(!assembly.contains("chr1", 1001));
        assert!(!assembly.contains("chr2", 1));
    }
}
