//! Uploaded file sources and readers
//!
//! An [`UploadedFile`] is either an in-memory blob (what a file picker hands
//! over) or a path on disk. Both are opened as a buffered byte stream with
//! transparent gzip/bzip2 decompression, and the raw bytes pulled from the
//! source are counted so decoders can report progress against `size`.

use memmap2::Mmap;
use std::cell::Cell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Default buffer size for BufReader (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Large buffer size for high-throughput I/O (1MB)
pub const LARGE_BUFFER_SIZE: usize = 1024 * 1024;

/// Threshold for using memory mapping (100MB)
pub const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;

/// I/O strategy selection for path-backed uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoStrategy {
    /// Use buffered reading with configurable buffer size
    Buffered(usize),
    /// Use memory mapping for the entire file
    MemoryMapped,
    /// Automatically select based on file size
    #[default]
    Auto,
}

/// A smart reader that automatically selects the optimal I/O strategy
pub enum SmartReader {
    /// Buffered reader for smaller files or streaming
    Buffered(BufReader<File>),
    /// Memory-mapped reader for large files
    Mapped(MappedReader),
}

/// Memory-mapped file reader
pub struct MappedReader {
    mmap: Mmap,
    position: usize,
}

impl MappedReader {
    /// Create a new memory-mapped reader
    pub fn new(file: &File) -> io::Result<Self> {
        // SAFETY: We assume the file won't be modified while mapped
        let mmap = unsafe { Mmap::map(file)? };
        Ok(Self { mmap, position: 0 })
    }

    /// Get file size
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl Read for MappedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.mmap[self.position..];
        let to_read = std::cmp::min(buf.len(), remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read;
        Ok(to_read)
    }
}

impl SmartReader {
    /// Open a file with the specified I/O strategy
    pub fn open<P: AsRef<Path>>(path: P, strategy: IoStrategy) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len();

        match strategy {
            IoStrategy::Buffered(buf_size) => {
                Ok(SmartReader::Buffered(BufReader::with_capacity(buf_size, file)))
            }
            IoStrategy::MemoryMapped => Ok(SmartReader::Mapped(MappedReader::new(&file)?)),
            IoStrategy::Auto => {
                if file_size >= MMAP_THRESHOLD {
                    Ok(SmartReader::Mapped(MappedReader::new(&file)?))
                } else {
                    let buf_size = if file_size > 10 * 1024 * 1024 {
                        LARGE_BUFFER_SIZE
                    } else {
                        DEFAULT_BUFFER_SIZE
                    };
                    Ok(SmartReader::Buffered(BufReader::with_capacity(buf_size, file)))
                }
            }
        }
    }

    /// Check if using memory mapping
    pub fn is_mapped(&self) -> bool {
        matches!(self, SmartReader::Mapped(_))
    }
}

impl Read for SmartReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SmartReader::Buffered(reader) => reader.read(buf),
            SmartReader::Mapped(reader) => reader.read(buf),
        }
    }
}

/// Compression format of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain text (uncompressed)
    Plain,
    /// Gzip compressed (.gz)
    Gzip,
    /// Bzip2 compressed (.bz2)
    Bzip2,
}

/// Detect compression from a file name and its leading bytes
pub fn detect_compression(name: &str, magic: &[u8]) -> CompressionFormat {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    if extension == "gz" || (magic.len() >= 2 && magic[0] == 0x1f && magic[1] == 0x8b) {
        CompressionFormat::Gzip
    } else if extension == "bz2" || (magic.len() >= 3 && &magic[..3] == b"BZh") {
        CompressionFormat::Bzip2
    } else {
        CompressionFormat::Plain
    }
}

/// Shared count of raw bytes pulled from an upload
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Rc<Cell<u64>>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    fn add(&self, n: usize) {
        self.0.set(self.0.get() + n as u64);
    }
}

/// Reader adapter that records how many bytes passed through it
struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.add(n);
        Ok(n)
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Memory(Arc<[u8]>),
    Path(PathBuf),
}

/// A user-supplied file: name, size, and read-only bytes
#[derive(Debug, Clone)]
pub struct UploadedFile {
    name: String,
    size: u64,
    source: FileSource,
}

impl UploadedFile {
    /// Wrap an in-memory blob
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Reference a file on disk; size is taken from its metadata
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            size,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in raw (possibly compressed) bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Detect the compression format of this upload
    pub fn compression(&self) -> io::Result<CompressionFormat> {
        match &self.source {
            FileSource::Memory(bytes) => {
                Ok(detect_compression(&self.name, &bytes[..bytes.len().min(3)]))
            }
            FileSource::Path(path) => {
                let mut file = File::open(path)?;
                let mut magic = [0u8; 3];
                let bytes_read = file.read(&mut magic)?;
                Ok(detect_compression(&self.name, &magic[..bytes_read]))
            }
        }
    }

    /// Open the upload as a decompressed byte stream
    ///
    /// The returned counter tracks raw bytes consumed from the source, which
    /// is what progress is measured against.
    pub fn open(&self, strategy: IoStrategy) -> io::Result<(Box<dyn BufRead>, ByteCounter)> {
        let counter = ByteCounter::default();
        let raw: Box<dyn Read> = match &self.source {
            FileSource::Memory(bytes) => Box::new(Cursor::new(Arc::clone(bytes))),
            FileSource::Path(path) => Box::new(SmartReader::open(path, strategy)?),
        };
        let counted = CountingReader {
            inner: raw,
            counter: counter.clone(),
        };

        let reader: Box<dyn BufRead> = match self.compression()? {
            CompressionFormat::Gzip => Box::new(BufReader::with_capacity(
                DEFAULT_BUFFER_SIZE,
                flate2::read::MultiGzDecoder::new(counted),
            )),
            CompressionFormat::Bzip2 => Box::new(BufReader::with_capacity(
                DEFAULT_BUFFER_SIZE,
                bzip2::read::BzDecoder::new(counted),
            )),
            CompressionFormat::Plain => {
                Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, counted))
            }
        };
        Ok((reader, counter))
    }
}
