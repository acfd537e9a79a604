//! Pipeline configuration

use crate::core::{IoStrategy, DEFAULT_MAX_REGIONS};

/// Default number of raw bytes decoded between yields (64KB)
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Default promoter half-window around a TSS
pub const DEFAULT_PROMOTER_WINDOW: u64 = 2_000;

/// Tunables for decoding, construction and analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Raw bytes consumed per decode chunk before yielding to the scheduler
    pub chunk_bytes: usize,
    /// Region capacity of a single region set
    pub max_regions: usize,
    /// Read strategy for path-backed uploads
    pub io_strategy: IoStrategy,
    /// Bases either side of a TSS treated as promoter when no promoter class is loaded
    pub promoter_window: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_regions: DEFAULT_MAX_REGIONS,
            io_strategy: IoStrategy::Auto,
            promoter_window: DEFAULT_PROMOTER_WINDOW,
        }
    }
}

impl PipelineConfig {
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn with_max_regions(mut self, max_regions: usize) -> Self {
        self.max_regions = max_regions;
        self
    }

    pub fn with_io_strategy(mut self, io_strategy: IoStrategy) -> Self {
        self.io_strategy = io_strategy;
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
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_bytes, 64 * 1024);
        assert_eq!(config.max_regions, DEFAULT_MAX_REGIONS);
        assert_eq!(config.io_strategy, IoStrategy::Auto);
    }

    #[test]
    fn test_zero_chunk_is_clamped() {
        let config = PipelineConfig::default().with_chunk_bytes(0);
        assert_eq!(config.chunk_bytes, 1);
    }
}
