//! BedLens - region file ingestion and analysis
//!
//! Decodes a user-supplied interval file, builds an indexed region set from
//! it and runs a series of independent analysis phases over that set, all on
//! a single-threaded cooperative executor.
//!
//! # Features
//!
//! - Chunked decoding with progress and prompt abandonment of superseded files
//! - Exclusively owned region-set handles, released exactly once
//! - Best-effort analysis: a failing phase only drops its own field
//! - Keep-alive coordinator for views too expensive to rebuild
//!
//! # Example
//!
//! ```ignore
//! use bedlens::{AnalysisContext, FileAnalysisPipeline, PipelineConfig, UploadedFile};
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let pipeline = FileAnalysisPipeline::new(PipelineConfig::default(), AnalysisContext::new());
//!     let file = UploadedFile::from_path("peaks.bed")?;
//!     pipeline.select_file(file).await?;
//!     println!("{}", pipeline.get_state());
//! }).await;
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod formats;
pub mod pipeline;
pub mod views;

// Re-export commonly used types
pub use analysis::{AnalysisContext, AnalysisOutcome, AnalysisResult, StepwiseAnalyzer};
pub use config::PipelineConfig;
pub use core::{
    BedLensError, ConstructionError, DecodeError, DecodedRegionSequence, PhaseError,
    PipelineError, RegionRecord, RegionSet, RegionSetHandle, RegionSetRef, Strand, UploadedFile,
};
pub use formats::RegionDecoder;
pub use pipeline::{FileAnalysisPipeline, PipelineState, SubscriptionToken};
pub use views::{HeavyView, LayoutSlot, PersistentViewCoordinator, Placement, ViewId};
