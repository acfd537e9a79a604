//! Core types
//!
//! Region records, the uploaded-file source layer, the region-set resource
//! and the error taxonomy shared by the decoder, analyzer and pipeline.

mod error;
pub mod io;
mod region;
mod region_set;

pub use error::{
    BedLensError, ConstructionError, ContextError, ContextResult, DecodeError, DecodeResult,
    HandleError, PhaseError, PhaseResult, PipelineError, Result, ViewError,
};
pub use io::{
    detect_compression, ByteCounter, CompressionFormat, IoStrategy, SmartReader, UploadedFile,
    DEFAULT_BUFFER_SIZE, LARGE_BUFFER_SIZE, MMAP_THRESHOLD,
};
pub use region::{DecodedRegionSequence, RegionRecord, Strand};
pub use region_set::{
    RegionSet, RegionSetHandle, RegionSetRef, ResourceLedger, DEFAULT_MAX_REGIONS,
};
