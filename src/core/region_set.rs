//! Region set resource
//!
//! A [`RegionSet`] is the indexed in-memory form of a decoded file. It lives
//! behind a [`RegionSetHandle`], which is the only owner: dropping or
//! releasing the handle frees the set. Other consumers get a [`RegionSetRef`]
//! that stops resolving the instant the owner releases.
//!
//! Per-chromosome overlap queries use rust-lapper.

use crate::core::error::{ConstructionError, HandleError};
use crate::core::region::{DecodedRegionSequence, RegionRecord};
use log::debug;
use rust_lapper::{Interval, Lapper};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Default region capacity for a single set
pub const DEFAULT_MAX_REGIONS: usize = 50_000_000;

/// Interval payload: index of the record in file order
type RegionInterval = Interval<u64, usize>;

/// Indexed, immutable set of regions in file order
pub struct RegionSet {
    id: u64,
    records: Vec<RegionRecord>,
    /// Chromosomes in first-seen order
    chrom_order: Vec<String>,
    /// Chromosome -> interval tree over record indices
    index: HashMap<String, Lapper<u64, usize>>,
}

impl RegionSet {
    fn build(id: u64, sequence: DecodedRegionSequence) -> Self {
        let records = sequence.into_records();
        let mut chrom_order = Vec::new();
        let mut by_chrom: HashMap<String, Vec<RegionInterval>> = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            let (lo, hi) = record.bounds();
            let intervals = by_chrom.entry(record.chrom.clone()).or_insert_with(|| {
                chrom_order.push(record.chrom.clone());
                Vec::new()
            });
            // Lapper needs non-empty intervals
            intervals.push(Interval {
                start: lo,
                stop: hi.max(lo.saturating_add(1)),
                val: i,
            });
        }

        let index = by_chrom
            .into_iter()
            .map(|(chrom, intervals)| (chrom, Lapper::new(intervals)))
            .collect();

        Self {
            id,
            records,
            chrom_order,
            index,
        }
    }

    /// Identifier assigned at construction
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in file order
    pub fn records(&self) -> &[RegionRecord] {
        &self.records
    }

    /// Chromosome names in first-seen order
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.chrom_order.iter().map(|s| s.as_str())
    }

    /// Records on one chromosome, in file order
    pub fn chrom_regions<'a>(&'a self, chrom: &'a str) -> impl Iterator<Item = &'a RegionRecord> {
        self.records.iter().filter(move |r| r.chrom == chrom)
    }

    /// Records overlapping `[start, end)` on `chrom`
    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> Vec<&RegionRecord> {
        match self.index.get(chrom) {
            Some(lapper) => lapper
                .find(start, end)
                .map(|iv| &self.records[iv.val])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of records overlapping `[start, end)` on `chrom`
    pub fn count_overlapping(&self, chrom: &str, start: u64, end: u64) -> usize {
        self.index
            .get(chrom)
            .map(|lapper| lapper.find(start, end).count())
            .unwrap_or(0)
    }
}

/// Bookkeeping for region-set construction and release
///
/// Shared by every handle built through it; tests use it to check that at
/// most one handle is live and that each one is released exactly once.
#[derive(Debug)]
pub struct ResourceLedger {
    max_regions: usize,
    next_id: Cell<u64>,
    constructed: Cell<u64>,
    released: Cell<u64>,
    peak_live: Cell<u64>,
}

impl ResourceLedger {
    pub fn new(max_regions: usize) -> Rc<Self> {
        Rc::new(Self {
            max_regions,
            next_id: Cell::new(1),
            constructed: Cell::new(0),
            released: Cell::new(0),
            peak_live: Cell::new(0),
        })
    }

    pub fn max_regions(&self) -> usize {
        self.max_regions
    }

    /// Handles constructed so far
    pub fn constructed(&self) -> u64 {
        self.constructed.get()
    }

    /// Handles released so far
    pub fn released(&self) -> u64 {
        self.released.get()
    }

    /// Handles currently alive
    pub fn live(&self) -> u64 {
        self.constructed.get() - self.released.get()
    }

    /// Largest number of handles alive at once
    pub fn peak_live(&self) -> u64 {
        self.peak_live.get()
    }

    fn record_construct(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.constructed.set(self.constructed.get() + 1);
        self.peak_live.set(self.peak_live.get().max(self.live()));
        id
    }

    fn record_release(&self) {
        self.released.set(self.released.get() + 1);
    }
}

/// Exclusive owner of a [`RegionSet`]
///
/// Not `Clone`. [`release`](Self::release) consumes the handle, so a second
/// release does not compile; dropping an unreleased handle releases it.
pub struct RegionSetHandle {
    set: Option<Rc<RegionSet>>,
    ledger: Rc<ResourceLedger>,
}

impl RegionSetHandle {
    /// Build a region set from a decoded sequence
    pub fn construct(
        sequence: DecodedRegionSequence,
        ledger: &Rc<ResourceLedger>,
    ) -> Result<Self, ConstructionError> {
        if sequence.len() > ledger.max_regions() {
            return Err(ConstructionError::CapacityExceeded {
                requested: sequence.len(),
                limit: ledger.max_regions(),
            });
        }

        let id = ledger.record_construct();
        let set = RegionSet::build(id, sequence);
        debug!("constructed region set {} with {} regions", id, set.len());

        Ok(Self {
            set: Some(Rc::new(set)),
            ledger: Rc::clone(ledger),
        })
    }

    pub fn id(&self) -> u64 {
        self.set.as_ref().map(|s| s.id()).unwrap_or_default()
    }

    /// Read-only access for the owner
    pub fn get(&self) -> &RegionSet {
        match &self.set {
            Some(set) => set,
            // `set` is only taken by release/drop, both of which consume self
            None => unreachable!("region set accessed after release"),
        }
    }

    /// Lend a non-owning reference
    pub fn lend(&self) -> RegionSetRef {
        RegionSetRef {
            id: self.id(),
            set: self.set.as_ref().map(Rc::downgrade).unwrap_or_default(),
        }
    }

    /// Release the region set; lent references stop resolving
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(set) = self.set.take() {
            debug!("released region set {}", set.id());
            drop(set);
            self.ledger.record_release();
        }
    }
}

impl Drop for RegionSetHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for RegionSetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSetHandle").field("id", &self.id()).finish()
    }
}

/// Non-owning reference to a region set
///
/// Valid only while the owner holds the handle. Consumers must not cache it
/// across pipeline generations.
#[derive(Clone)]
pub struct RegionSetRef {
    id: u64,
    set: Weak<RegionSet>,
}

impl RegionSetRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the owner still holds the set
    pub fn is_valid(&self) -> bool {
        self.set.strong_count() > 0
    }

    /// Run `f` against the set, or fail if it has been released
    pub fn with<T>(&self, f: impl FnOnce(&RegionSet) -> T) -> Result<T, HandleError> {
        match self.set.upgrade() {
            Some(set) => Ok(f(&set)),
            None => Err(HandleError::Released(self.id)),
        }
    }
}

impl PartialEq for RegionSetRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.set, &other.set)
    }
}

impl Eq for RegionSetRef {}

impl std::fmt::Debug for RegionSetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSetRef")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}
