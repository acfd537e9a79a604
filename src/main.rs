//! BedLens CLI entry point
//!
//! Runs the file analysis pipeline on a single-threaded event loop.

use anyhow::Context;
use bedlens::analysis::AnalysisContext;
use bedlens::core::IoStrategy;
use bedlens::formats::{self, RegionDecoder};
use bedlens::{FileAnalysisPipeline, PipelineConfig, PipelineState, UploadedFile};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "bedlens")]
#[command(about = "Decode and analyze genomic region files")]
#[command(version)]
#[command(author = "BedLens Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DecodeArgs {
    /// Bytes decoded between progress reports
    #[arg(long = "chunk-bytes", default_value_t = bedlens::config::DEFAULT_CHUNK_BYTES)]
    chunk_bytes: usize,
    /// Memory-map the input instead of buffered reads
    #[arg(long)]
    mmap: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a region file and report what it contains
    Decode {
        /// Input BED file (plain, .gz or .bz2)
        input: PathBuf,
        #[command(flatten)]
        decode: DecodeArgs,
    },
    /// Decode a region file and run all analysis phases
    Analyze {
        /// Input BED file (plain, .gz or .bz2)
        input: PathBuf,
        /// Reference genome FASTA for GC content
        #[arg(short = 'r', long)]
        reference: Option<PathBuf>,
        /// Assembly chrom sizes as NAME=PATH (repeatable)
        #[arg(short = 'g', long = "chrom-sizes")]
        chrom_sizes: Vec<String>,
        /// BED file of transcripts/genes whose starts are TSS
        #[arg(long)]
        tss: Option<PathBuf>,
        /// BED file with annotation class in column 4
        #[arg(short = 'a', long)]
        annotations: Option<PathBuf>,
        /// Region capacity of the region set
        #[arg(long = "max-regions", default_value_t = bedlens::core::DEFAULT_MAX_REGIONS)]
        max_regions: usize,
        /// Promoter half-window around each TSS
        #[arg(long = "promoter-window", default_value_t = bedlens::config::DEFAULT_PROMOTER_WINDOW)]
        promoter_window: u64,
        #[command(flatten)]
        decode: DecodeArgs,
    },
}

impl DecodeArgs {
    fn config(&self) -> PipelineConfig {
        let strategy = if self.mmap {
            IoStrategy::MemoryMapped
        } else {
            IoStrategy::Auto
        };
        PipelineConfig::default()
            .with_chunk_bytes(self.chunk_bytes)
            .with_io_strategy(strategy)
    }
}

fn load_context(
    reference: Option<PathBuf>,
    chrom_sizes: &[String],
    tss: Option<PathBuf>,
    annotations: Option<PathBuf>,
) -> anyhow::Result<AnalysisContext> {
    let start = Instant::now();
    let mut context = AnalysisContext::new();

    if let Some(path) = reference {
        eprintln!("Loading reference: {:?}", path);
        let sequences = formats::load_fasta(&path)
            .with_context(|| format!("Failed to load reference {:?}", path))?;
        context = context.with_reference(sequences);
    }
    for spec in chrom_sizes {
        let assembly = formats::load_chrom_sizes_spec(spec)
            .with_context(|| format!("Failed to load chrom sizes '{}'", spec))?;
        context = context.with_assembly(assembly);
    }
    if let Some(path) = tss {
        let sites = formats::load_tss(&path).with_context(|| format!("Failed to load TSS {:?}", path))?;
        context = context.with_tss(sites);
    }
    if let Some(path) = annotations {
        let features = formats::load_annotations(&path)
            .with_context(|| format!("Failed to load annotations {:?}", path))?;
        context = context.with_annotations(features);
    }

    eprintln!("Analysis context loaded in {:.2}s", start.elapsed().as_secs_f64());
    Ok(context)
}

fn run_decode(input: PathBuf, config: PipelineConfig) -> anyhow::Result<()> {
    let file = UploadedFile::from_path(&input).with_context(|| format!("Cannot open {:?}", input))?;
    let sequence = RegionDecoder::new(&config).decode_blocking(&file)?;

    let mut chroms: Vec<&str> = Vec::new();
    for record in sequence.iter() {
        if !chroms.contains(&record.chrom.as_str()) {
            chroms.push(&record.chrom);
        }
    }

    eprintln!("\n=== Decode Summary ===");
    eprintln!("File:            {}", file.name());
    eprintln!("Regions:         {}", sequence.len());
    eprintln!("Chromosomes:     {}", chroms.join(", "));
    Ok(())
}

fn run_analyze(input: PathBuf, config: PipelineConfig, context: AnalysisContext) -> anyhow::Result<()> {
    let file = UploadedFile::from_path(&input).with_context(|| format!("Cannot open {:?}", input))?;
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let local = tokio::task::LocalSet::new();

    let state = local.block_on(&runtime, async {
        let pipeline = FileAnalysisPipeline::new(config, context);
        pipeline.subscribe(|state| log::debug!("pipeline: {}", state));
        pipeline.select_file(file).await?;
        anyhow::Ok(pipeline.get_state())
    })?;

    match state {
        PipelineState::Ready {
            result,
            phase_errors,
            ..
        } => {
            eprintln!("\n=== Analysis Result ===");
            eprint!("{}", result);
            for error in phase_errors {
                eprintln!("  note: {}", error);
            }
            Ok(())
        }
        PipelineState::AnalysisFailed { error, .. } => {
            eprintln!("\n{}", error);
            Ok(())
        }
        PipelineState::ParseFailed { error } => Err(error.into()),
        other => anyhow::bail!("Pipeline stopped in unexpected state: {}", other),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Decode { input, decode } => {
            eprintln!("Decoding region file: {:?}", input);
            run_decode(input, decode.config())?;
        }
        Commands::Analyze {
            input,
            reference,
            chrom_sizes,
            tss,
            annotations,
            max_regions,
            promoter_window,
            decode,
        } => {
            let context = load_context(reference, &chrom_sizes, tss, annotations)?;
            let config = decode
                .config()
                .with_max_regions(max_regions)
                .with_promoter_window(promoter_window);
            eprintln!("Analyzing region file: {:?}", input);
            run_analyze(input, config, context)?;
        }
    }

    eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
