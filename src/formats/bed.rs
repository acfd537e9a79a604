//! BED region decoder
//!
//! Decodes uploaded interval files (BED3 and wider, tab or space delimited)
//! into a [`DecodedRegionSequence`], a chunk at a time. The async entry point
//! yields to the scheduler between chunks and stops at the next chunk
//! boundary once its caller is no longer current.

use crate::config::PipelineConfig;
use crate::core::{
    ByteCounter, CompressionFormat, DecodeError, DecodeResult, DecodedRegionSequence, IoStrategy,
    RegionRecord, Strand, UploadedFile,
};
use log::debug;
use memchr::memchr2;
use std::io::BufRead;

/// Split a line into fields on runs of tabs or spaces
pub fn split_fields(line: &[u8]) -> Vec<&[u8]> {
    let mut fields = Vec::with_capacity(12);
    let mut pos = 0;

    while pos < line.len() {
        match memchr2(b'\t', b' ', &line[pos..]) {
            Some(0) => pos += 1,
            Some(offset) => {
                fields.push(&line[pos..pos + offset]);
                pos += offset + 1;
            }
            None => {
                fields.push(&line[pos..]);
                break;
            }
        }
    }
    fields
}

/// Whether a line carries no region: blank, comment, `track` or `browser`
pub fn is_header_line(line: &[u8]) -> bool {
    let trimmed = match line.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(first) => &line[first..],
        None => return true,
    };
    trimmed.starts_with(b"#") || trimmed.starts_with(b"track") || trimmed.starts_with(b"browser")
}

/// Parse one region line
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_region_line(line: &[u8], line_no: usize) -> DecodeResult<RegionRecord> {
    let text = std::str::from_utf8(line).map_err(|e| DecodeError::UnsupportedEncoding {
        line: Some(line_no),
        reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
    })?;
    let fields = split_fields(text.as_bytes());

    if fields.len() < 3 {
        return Err(DecodeError::TooFewFields {
            line: line_no,
            found: fields.len(),
        });
    }

    // Fields come from a valid str split on ASCII bytes, so they are valid UTF-8
    let field = |i: usize| std::str::from_utf8(fields[i]).unwrap_or_default();
    let coordinate = |i: usize, name: &'static str| {
        let value = field(i);
        value.parse::<u64>().map_err(|_| DecodeError::InvalidCoordinate {
            line: line_no,
            field: name,
            value: value.to_string(),
        })
    };

    let start = coordinate(1, "start")?;
    let end = coordinate(2, "end")?;
    let strand = if fields.len() > 5 {
        Strand::from_field(field(5))
    } else {
        None
    };

    Ok(RegionRecord::new(field(0), start, end, strand))
}

/// Incremental decoder state over one opened upload
pub struct ChunkedDecoder {
    reader: Box<dyn BufRead>,
    /// Raw bytes pulled from the source; `None` for plain input
    raw_consumed: Option<ByteCounter>,
    /// Decompressed bytes handed to the line parser
    decoded: u64,
    size: u64,
    chunk_bytes: usize,
    line_no: usize,
    records: Vec<RegionRecord>,
    buf: Vec<u8>,
    last_progress: f64,
    done: bool,
}

impl ChunkedDecoder {
    /// Open an upload and check its leading bytes for an unsupported encoding
    pub fn open(file: &UploadedFile, chunk_bytes: usize, strategy: IoStrategy) -> DecodeResult<Self> {
        let compressed = file.compression()? != CompressionFormat::Plain;
        let (mut reader, consumed) = file.open(strategy)?;
        let mut decoded = 0;

        let head = reader.fill_buf()?;
        if head.starts_with(&[0xFF, 0xFE]) || head.starts_with(&[0xFE, 0xFF]) {
            return Err(DecodeError::UnsupportedEncoding {
                line: None,
                reason: "UTF-16 byte order mark".to_string(),
            });
        }
        if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
            reader.consume(3);
            decoded = 3;
        }

        Ok(Self {
            reader,
            raw_consumed: compressed.then_some(consumed),
            decoded,
            size: file.size(),
            chunk_bytes: chunk_bytes.max(1),
            line_no: 0,
            records: Vec::new(),
            buf: Vec::with_capacity(4096),
            last_progress: 0.0,
            done: false,
        })
    }

    /// Decode up to one chunk of lines
    ///
    /// Returns `Some(progress)` while input remains and `None` at end of input.
    pub fn next_chunk(&mut self) -> DecodeResult<Option<f64>> {
        if self.done {
            return Ok(None);
        }

        let mut chunk_consumed = 0usize;
        while chunk_consumed < self.chunk_bytes {
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                self.done = true;
                return Ok(None);
            }
            chunk_consumed += n;
            self.decoded += n as u64;
            self.line_no += 1;

            let mut line = self.buf.as_slice();
            if line.last() == Some(&b'\n') {
                line = &line[..line.len() - 1];
            }
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if is_header_line(line) {
                continue;
            }
            self.records.push(parse_region_line(line, self.line_no)?);
        }

        Ok(Some(self.progress()))
    }

    /// Fraction of the upload consumed, never decreasing
    ///
    /// Compressed input is measured in raw bytes read from the source, plain
    /// input in bytes actually parsed.
    fn progress(&mut self) -> f64 {
        let consumed = match &self.raw_consumed {
            Some(counter) => counter.get(),
            None => self.decoded,
        };
        let fraction = if self.size == 0 {
            0.0
        } else {
            (consumed as f64 / self.size as f64).clamp(0.0, 1.0)
        };
        self.last_progress = self.last_progress.max(fraction);
        self.last_progress
    }

    /// Lines read so far
    pub fn lines_read(&self) -> usize {
        self.line_no
    }

    /// Hand over the decoded sequence; an input with no regions is an error
    pub fn finish(self) -> DecodeResult<DecodedRegionSequence> {
        if self.records.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(DecodedRegionSequence::new(self.records))
    }
}

/// Decoder for uploaded region files
#[derive(Debug, Clone)]
pub struct RegionDecoder {
    chunk_bytes: usize,
    io_strategy: IoStrategy,
}

impl Default for RegionDecoder {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl RegionDecoder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            chunk_bytes: config.chunk_bytes,
            io_strategy: config.io_strategy,
        }
    }

    /// Decode cooperatively
    ///
    /// Yields to the scheduler after each chunk and reports progress in
    /// `[0, 1]`, ending at exactly `1.0` on success. When `is_current`
    /// returns false at a chunk boundary, decoding stops with
    /// [`DecodeError::Cancelled`] and the partial records are dropped.
    pub async fn decode<P, C>(
        &self,
        file: &UploadedFile,
        mut on_progress: P,
        is_current: C,
    ) -> DecodeResult<DecodedRegionSequence>
    where
        P: FnMut(f64),
        C: Fn() -> bool,
    {
        let mut decoder = ChunkedDecoder::open(file, self.chunk_bytes, self.io_strategy)?;

        loop {
            if !is_current() {
                debug!(
                    "decode of '{}' cancelled after {} lines",
                    file.name(),
                    decoder.lines_read()
                );
                return Err(DecodeError::Cancelled);
            }
            match decoder.next_chunk()? {
                Some(progress) => {
                    on_progress(progress);
                    tokio::task::yield_now().await;
                }
                None => break,
            }
        }

        let sequence = decoder.finish()?;
        on_progress(1.0);
        debug!("decoded {} regions from '{}'", sequence.len(), file.name());
        Ok(sequence)
    }

    /// Decode to completion without yielding
    pub fn decode_blocking(&self, file: &UploadedFile) -> DecodeResult<DecodedRegionSequence> {
        let mut decoder = ChunkedDecoder::open(file, self.chunk_bytes, self.io_strategy)?;
        while decoder.next_chunk()?.is_some() {}
        decoder.finish()
    }
}
