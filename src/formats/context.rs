//! Loaders for analysis context files
//!
//! FASTA reference sequences, chrom-sizes tables, TSS lists and annotation
//! class tracks. Each loader takes a `BufRead`; the `load_*` helpers open a
//! path through [`UploadedFile`] so gzip/bzip2 inputs work as well.

use crate::analysis::{AnnotationSet, GenomeAssembly, ReferenceSequences, TssIndex};
use crate::core::{ContextError, ContextResult, IoStrategy, Strand, UploadedFile};
use crate::formats::bed::{is_header_line, split_fields};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

fn invalid(kind: &'static str, line: usize, message: impl Into<String>) -> ContextError {
    ContextError::InvalidLine {
        kind,
        line,
        message: message.into(),
    }
}

fn parse_u64(kind: &'static str, line: usize, field: &[u8]) -> ContextResult<u64> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(kind, line, format!("invalid integer '{}'", String::from_utf8_lossy(field))))
}

/// Iterate the data lines of a reader as `(line_no, fields)`
fn for_each_record<R: BufRead>(
    mut reader: R,
    mut f: impl FnMut(usize, Vec<&[u8]>) -> ContextResult<()>,
) -> ContextResult<()> {
    let mut buf = Vec::with_capacity(1024);
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        line_no += 1;
        let line = buf.trim_ascii_end();
        if is_header_line(line) {
            continue;
        }
        f(line_no, split_fields(line))?;
    }
}

/// Read a FASTA file; sequence names are the first word of each header
pub fn read_fasta<R: BufRead>(mut reader: R) -> ContextResult<ReferenceSequences> {
    let mut reference = ReferenceSequences::new();
    let mut current: Option<(String, Vec<u8>)> = None;
    let mut buf = Vec::with_capacity(1024);
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix(b">") {
            if let Some((name, seq)) = current.take() {
                reference.insert(name, seq);
            }
            let name = split_fields(header)
                .first()
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .ok_or_else(|| invalid("FASTA", line_no, "empty sequence name"))?;
            current = Some((name, Vec::new()));
        } else {
            match current.as_mut() {
                Some((_, seq)) => seq.extend_from_slice(line),
                None => return Err(invalid("FASTA", line_no, "sequence data before first header")),
            }
        }
    }

    if let Some((name, seq)) = current {
        reference.insert(name, seq);
    }
    Ok(reference)
}

/// Read a two-column `chrom<TAB>size` table
pub fn read_chrom_sizes<R: BufRead>(name: &str, reader: R) -> ContextResult<GenomeAssembly> {
    let mut sizes = HashMap::new();
    for_each_record(reader, |line_no, fields| {
        if fields.len() < 2 {
            return Err(invalid("chrom sizes", line_no, "expected chrom and size"));
        }
        let size = parse_u64("chrom sizes", line_no, fields[1])?;
        sizes.insert(String::from_utf8_lossy(fields[0]).into_owned(), size);
        Ok(())
    })?;
    Ok(GenomeAssembly::new(name, sizes))
}

/// Read TSS sites from a BED file
///
/// Each line is a transcript or gene; its TSS is `start` on the plus strand
/// (or when unstranded) and `end` on the minus strand.
pub fn read_tss<R: BufRead>(reader: R) -> ContextResult<TssIndex> {
    let mut tss = TssIndex::new();
    for_each_record(reader, |line_no, fields| {
        if fields.len() < 3 {
            return Err(invalid("TSS", line_no, "expected at least 3 fields"));
        }
        let start = parse_u64("TSS", line_no, fields[1])?;
        let end = parse_u64("TSS", line_no, fields[2])?;
        let strand = fields
            .get(5)
            .and_then(|f| std::str::from_utf8(f).ok())
            .and_then(Strand::from_field);
        let site = match strand {
            Some(Strand::Minus) => end,
            _ => start,
        };
        tss.insert(String::from_utf8_lossy(fields[0]).into_owned(), site);
        Ok(())
    })?;
    tss.finalize();
    Ok(tss)
}

/// Read annotation features from a BED file whose 4th column is the class
pub fn read_annotations<R: BufRead>(reader: R) -> ContextResult<AnnotationSet> {
    let mut annotations = AnnotationSet::new();
    for_each_record(reader, |line_no, fields| {
        if fields.len() < 4 {
            return Err(invalid("annotation", line_no, "expected chrom, start, end and class"));
        }
        let start = parse_u64("annotation", line_no, fields[1])?;
        let end = parse_u64("annotation", line_no, fields[2])?;
        let chrom = String::from_utf8_lossy(fields[0]);
        let class = String::from_utf8_lossy(fields[3]);
        annotations.insert(&class, &chrom, start, end);
        Ok(())
    })?;
    annotations.finalize();
    Ok(annotations)
}

fn open_path(path: &Path) -> ContextResult<Box<dyn BufRead>> {
    let (reader, _) = UploadedFile::from_path(path)?.open(IoStrategy::Auto)?;
    Ok(reader)
}

pub fn load_fasta<P: AsRef<Path>>(path: P) -> ContextResult<ReferenceSequences> {
    read_fasta(open_path(path.as_ref())?)
}

/// Load an assembly from a `NAME=PATH` argument
pub fn load_chrom_sizes_spec(spec: &str) -> ContextResult<GenomeAssembly> {
    let (name, path) = spec
        .split_once('=')
        .filter(|(name, path)| !name.is_empty() && !path.is_empty())
        .ok_or_else(|| ContextError::InvalidAssemblySpec(spec.to_string()))?;
    read_chrom_sizes(name, open_path(Path::new(path))?)
}

pub fn load_tss<P: AsRef<Path>>(path: P) -> ContextResult<TssIndex> {
    read_tss(open_path(path.as_ref())?)
}

pub fn load_annotations<P: AsRef<Path>>(path: P) -> ContextResult<AnnotationSet> {
    read_annotations(open_path(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_fasta() {
        let data = b">chr1 description\nACGT\nGGCC\n>chr2\nAT\n";
        let reference = read_fasta(BufReader::new(&data[..])).unwrap();

        assert_eq!(reference.len(), 2);
        assert_eq!(reference.slice("chr1", 0, 8), Some(&b"ACGTGGCC"[..]));
        assert_eq!(reference.slice("chr2", 0, 2), Some(&b"AT"[..]));
    }

    #[test]
    fn test_read_fasta_without_header() {
        let result = read_fasta(BufReader::new(&b"ACGT\n"[..]));
        assert!(matches!(result, Err(ContextError::InvalidLine { line: 1, .. })));
    }

    #[test]
    fn test_read_chrom_sizes() {
        let data = b"chr1\t1000\nchr2\t500\n";
        let assembly = read_chrom_sizes("toy", BufReader::new(&data[..])).unwrap();
        assert_eq!(assembly.name(), "toy");
        assert_eq!(assembly.chrom_size("chr2"), Some(500));
    }

    #[test]
    fn test_read_chrom_sizes_invalid() {
        let result = read_chrom_sizes("toy", BufReader::new(&b"chr1\tbig\n"[..]));
        assert!(matches!(result, Err(ContextError::InvalidLine { line: 1, .. })));
    }

    #[test]
    fn test_read_tss_uses_strand() {
        let data = b"chr1\t100\t500\tg1\t0\t+\nchr1\t1000\t2000\tg2\t0\t-\n";
        let tss = read_tss(BufReader::new(&data[..])).unwrap();
        assert_eq!(tss.nearest_distance("chr1", 100), Some(0));
        assert_eq!(tss.nearest_distance("chr1", 1990), Some(10));
    }

    #[test]
    fn test_read_annotations() {
        let data = b"chr1\t0\t100\texon\nchr1\t100\t500\tintron\n";
        let annotations = read_annotations(BufReader::new(&data[..])).unwrap();
        assert_eq!(annotations.classes().len(), 2);
        assert!(annotations.overlaps("intron", "chr1", 200, 210));
    }

    #[test]
    fn test_chrom_sizes_spec() -> ContextResult<()> {
        let mut temp = NamedTempFile::new()?;
        writeln!(temp, "chr1\t248956422")?;
        temp.flush()?;

        let spec = format!("hg38={}", temp.path().display());
        let assembly = load_chrom_sizes_spec(&spec)?;
        assert_eq!(assembly.name(), "hg38");
        assert_eq!(assembly.chrom_size("chr1"), Some(248956422));

        assert!(matches!(
            load_chrom_sizes_spec("no-equals-sign"),
            Err(ContextError::InvalidAssemblySpec(_))
        ));
        Ok(())
    }
}
