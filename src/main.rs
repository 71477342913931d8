use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hapcall::genomics::{
    BamReadSource, FastaReferenceSource, RecordWriter, ReferenceSource, VcfGivenAlleles,
};
use hapcall::{
    CallerConfig, GenomeInterval, GenotypingMode, HaplotypeCallerEngine, ReferenceConfidenceMode,
    RegionWalker,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hapcall", about = "Local-haplotype variant caller with reference-confidence output")]
struct Cli {
    /// Verbose logging (debug level for hapcall).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call variants from an indexed BAM against an indexed FASTA.
    Call(CallArgs),
    /// Print the padded shards an interval is divided into.
    Shards {
        /// Indexed FASTA reference.
        #[arg(short = 'R', long)]
        reference: PathBuf,
        /// Interval as `contig:start-end`.
        #[arg(short = 'L', long)]
        region: String,
        /// Bases per shard.
        #[arg(long, default_value_t = 5_000)]
        shard_size: i64,
        /// Padding on both sides of each shard.
        #[arg(long, default_value_t = 100)]
        shard_padding: i64,
    },
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    /// Indexed BAM of aligned reads.
    #[arg(short = 'I', long)]
    bam: PathBuf,
    /// Indexed FASTA reference.
    #[arg(short = 'R', long)]
    reference: PathBuf,
    /// Interval as `contig:start-end`; every contig when omitted.
    #[arg(short = 'L', long)]
    region: Option<String>,
    /// Output file; stdout when omitted.
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,
    /// Emit GQ-banded reference-confidence blocks.
    #[arg(long)]
    erc: bool,
    /// Genotype only the passing alleles of this VCF/BCF.
    #[arg(long)]
    alleles: Option<PathBuf>,
    /// Restrict calling to one sample.
    #[arg(long)]
    sample_name: Option<String>,
    /// Only keep reads of this read group.
    #[arg(long)]
    keep_read_group: Option<String>,
    /// Sample ploidy.
    #[arg(long, default_value_t = 2)]
    ploidy: usize,
    /// Minimum phred-scaled QUAL for a variant to be emitted.
    #[arg(long, default_value_t = 30.0)]
    confidence: f64,
    /// Minimum base quality for a base to count as evidence.
    #[arg(long, default_value_t = 10)]
    min_base_quality: u8,
    /// Minimum mapping quality for a read to be used.
    #[arg(long, default_value_t = 20)]
    min_mapping_quality: u8,
    /// Bases per shard.
    #[arg(long, default_value_t = 5_000)]
    shard_size: i64,
    /// Padding on both sides of each shard.
    #[arg(long, default_value_t = 100)]
    shard_padding: i64,
    /// Comma-separated GQ band boundaries.
    #[arg(long, value_delimiter = ',')]
    gq_bands: Option<Vec<u8>>,
    /// Stop after finding active regions.
    #[arg(long)]
    just_determine_active_regions: bool,
    /// Worker threads (rayon default when omitted).
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("hapcall=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Call(args) => run_call(args)?,
        Commands::Shards {
            reference,
            region,
            shard_size,
            shard_padding,
        } => run_shards(reference, &region, shard_size, shard_padding)?,
    }

    Ok(())
}

fn run_call(args: CallArgs) -> Result<()> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let config = build_config(&args)?;
    let reads = BamReadSource::open(&args.bam)
        .with_context(|| format!("failed to open reads {}", args.bam.display()))?;
    let reference = FastaReferenceSource::open(&args.reference)
        .with_context(|| format!("failed to open reference {}", args.reference.display()))?;

    let engine = HaplotypeCallerEngine::with_default_assembler(config, reads.samples())
        .context("failed to initialize caller")?;
    info!(samples = ?engine.samples(), "caller ready");

    let given = match &args.alleles {
        Some(path) => Some(
            VcfGivenAlleles::open(path)
                .with_context(|| format!("failed to read alleles {}", path.display()))?,
        ),
        None => None,
    };
    let mut walker = RegionWalker::new(&engine, &reads, &reference);
    if let Some(given) = &given {
        walker = walker.with_given_alleles(given);
    }

    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create output {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = RecordWriter::new(BufWriter::new(output))?;
    let emitted = match &args.region {
        Some(region) => {
            let interval: GenomeInterval = region.parse().context("invalid --region")?;
            walker.run(&interval, &mut sink)
        }
        None => walker.run_all(&mut sink),
    }
    .context("variant calling failed")?;
    sink.finish().context("failed to flush output")?;
    info!(records = emitted, "calling finished");
    Ok(())
}

fn build_config(args: &CallArgs) -> Result<CallerConfig> {
    let mut config = CallerConfig::default()
        .with_shards(args.shard_size, args.shard_padding)?
        .with_ploidy(args.ploidy)?
        .with_calling_confidence(args.confidence)?
        .with_min_base_quality(args.min_base_quality);
    config.min_mapping_quality = args.min_mapping_quality;
    config.keep_read_group = args.keep_read_group.clone();
    config.just_determine_active_regions = args.just_determine_active_regions;
    if args.erc {
        config = config.with_reference_confidence(ReferenceConfidenceMode::Gvcf);
    }
    if args.alleles.is_some() {
        config = config.with_genotyping_mode(GenotypingMode::GivenAlleles);
    }
    if let Some(sample) = &args.sample_name {
        config = config.with_sample_name(sample.clone());
    }
    if let Some(bands) = &args.gq_bands {
        config = config.with_gq_bands(bands.clone());
    }
    Ok(config.validated()?)
}

fn run_shards(reference_path: PathBuf, region: &str, size: i64, padding: i64) -> Result<()> {
    let reference = FastaReferenceSource::open(&reference_path)
        .with_context(|| format!("failed to open reference {}", reference_path.display()))?;
    let interval: GenomeInterval = region.parse().context("invalid --region")?;
    let shards =
        hapcall::divide_interval_into_shards(&interval, size, padding, reference.dictionary())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for shard in shards {
        writeln!(out, "{}\t{}", shard.interval(), shard.padded_interval())?;
    }
    Ok(())
}
