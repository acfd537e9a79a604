//! File format readers
//!
//! The region decoder for uploaded interval files, and loaders for the
//! reference inputs used by analysis (FASTA, chrom sizes, TSS, annotations).

pub mod bed;
pub mod context;

pub use bed::{is_header_line, parse_region_line, split_fields, ChunkedDecoder, RegionDecoder};
pub use context::{
    load_annotations, load_chrom_sizes_spec, load_fasta, load_tss, read_annotations,
    read_chrom_sizes, read_fasta, read_tss,
};
