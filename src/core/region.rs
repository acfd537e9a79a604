//! Region records
//!
//! One decoded interval line and the ordered sequence produced by the decoder.

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    /// Parse strand from char
    ///
    /// # Examples
    /// ```
    /// use bedlens::core::Strand;
    /// assert_eq!(Strand::from_char('+'), Some(Strand::Plus));
    /// assert_eq!(Strand::from_char('-'), Some(Strand::Minus));
    /// assert_eq!(Strand::from_char('.'), None);
    /// ```
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Plus),
            '-' => Some(Strand::Minus),
            _ => None,
        }
    }

    /// Parse strand from a whole field; anything but a lone `+`/`-` is unstranded
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            _ => None,
        }
    }

    /// Convert to char
    pub fn to_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }
}

/// A single genomic interval
///
/// `start < end` is not enforced; the decoder only checks that each line is
/// structurally well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub chrom: String,
    /// Start position (0-based)
    pub start: u64,
    /// End position (exclusive)
    pub end: u64,
    pub strand: Option<Strand>,
}

impl RegionRecord {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, strand: Option<Strand>) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            strand,
        }
    }

    /// Width in bases, zero for inverted records
    pub fn width(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Lower and upper bound regardless of orientation
    pub fn bounds(&self) -> (u64, u64) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// Midpoint of the interval
    pub fn midpoint(&self) -> u64 {
        let (lo, hi) = self.bounds();
        lo + (hi - lo) / 2
    }
}

/// Records in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRegionSequence {
    records: Vec<RegionRecord>,
}

impl DecodedRegionSequence {
    pub fn new(records: Vec<RegionRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RegionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegionRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<RegionRecord> {
        self.records
    }
}

impl From<Vec<RegionRecord>> for DecodedRegionSequence {
    fn from(records: Vec<RegionRecord>) -> Self {
        Self::new(records)
    }
}
