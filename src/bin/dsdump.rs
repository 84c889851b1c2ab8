//! dsdump
//!
//! Print the contents of a Finder .DS_Store file, either as a structural dump
//! or as JSON.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};
use dsstore::{DecodeOptions, Description, DsStore, describe_record};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dsdump")]
#[command(about = "Inspect Finder .DS_Store files")]
#[command(group(ArgGroup::new("mode").required(true).args(["dump", "convert"])))]
struct Args {
    /// Print the header, allocator state, header block and every record
    #[arg(long, value_name = "PATH")]
    dump: Option<PathBuf>,

    /// Print every record as JSON
    #[arg(long, value_name = "PATH")]
    convert: Option<PathBuf>,

    /// Output format for --convert
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// JSON file with decode limits
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Warn instead of failing when the tree node page size is not 0x1000
    #[arg(long)]
    lenient_page_size: bool,

    /// Maximum B-tree depth to follow
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut options = match &args.options {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading options from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing options from {}", path.display()))?
        }
        None => DecodeOptions::default(),
    };
    if args.lenient_page_size {
        options.strict_page_size = false;
    }
    if let Some(depth) = args.max_depth {
        options.max_tree_depth = depth;
    }

    match (&args.dump, &args.convert) {
        (Some(path), _) => dump(path, options),
        (None, Some(path)) => match args.format {
            Format::Json => convert(path, options),
        },
        (None, None) => anyhow::bail!("one of --dump or --convert is required"),
    }
}

fn open(path: &Path, options: DecodeOptions) -> anyhow::Result<DsStore> {
    DsStore::open_with(path, options).with_context(|| format!("opening {}", path.display()))
}

fn describe_all(store: &DsStore) -> anyhow::Result<Vec<Description>> {
    let mut ctx = store.context();
    let records = store.records(&mut ctx).context("reading records")?;
    records
        .iter()
        .map(|record| {
            describe_record(record, &mut ctx)
                .with_context(|| format!("describing record '{}'", record.filename_lossy()))
        })
        .collect()
}

fn dump(path: &Path, options: DecodeOptions) -> anyhow::Result<()> {
    let store = open(path, options)?;
    let descriptions = describe_all(&store)?;
    let mut out = io::stdout().lock();

    let header = store.header();
    writeln!(out, "version: {}", header.version)?;
    writeln!(out, "magic: '{}' ({})", header.magic, header.magic.as_u32())?;
    writeln!(out, "allocator offset: {}", header.allocator_offset)?;
    writeln!(out, "allocator size: {}", header.allocator_size)?;
    writeln!(out, "allocator offset copy: {}", header.allocator_offset_check)?;
    writeln!(out, "padding: 0x{}", hex::encode(header.padding))?;
    writeln!(out)?;

    write!(out, "{}", store.allocator())?;
    writeln!(out)?;

    let header_block = store.header_block();
    writeln!(out, "root block number: {}", header_block.root_block_number)?;
    writeln!(out, "node level count: {}", header_block.node_levels)?;
    writeln!(out, "record count: {}", header_block.record_count)?;
    writeln!(out, "node count: {}", header_block.node_count)?;
    writeln!(out, "tree node page size: {}", header_block.tree_node_page_size)?;

    for description in descriptions {
        writeln!(out)?;
        write!(out, "{description}")?;
    }
    Ok(())
}

fn convert(path: &Path, options: DecodeOptions) -> anyhow::Result<()> {
    let store = open(path, options)?;
    let descriptions = describe_all(&store)?;
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &descriptions).context("writing JSON")?;
    writeln!(out)?;
    Ok(())
}
