//! remora - inspect captured protobuf payloads and generate class mappings
//!
//! The `dump` and `get` commands decode captured wire-format payloads
//! without a schema; `map` runs the bundled mappers against a class index
//! exported from a dex disassembly and writes the cacheable mapping table.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use remora_core::mapper::{ClassIndex, MappingEngine, MappingResult};
use remora_core::{Reader, WireValue};
use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect captured protobuf payloads and generate class mappings
#[derive(Parser, Debug)]
#[command(name = "remora")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode payload file(s) and print the field tree
    Dump(DumpArgs),
    /// Read a single value out of a payload by field path
    Get(GetArgs),
    /// Run the bundled mappers against a class index export
    Map(MapArgs),
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Payload file, or a directory of captures to walk
    input: PathBuf,

    /// Maximum nesting depth to descend into
    #[arg(long, default_value = "16")]
    max_depth: usize,

    /// Also dump files whose content duplicates one already seen
    #[arg(long)]
    keep_duplicates: bool,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Payload file to read from
    input: PathBuf,

    /// Field path, comma-separated (e.g. 4,4,11)
    #[arg(long)]
    path: String,

    /// How to interpret the addressed field
    #[arg(long = "as", value_enum, default_value = "varint")]
    interpret: Interpretation,
}

#[derive(Args, Debug)]
struct MapArgs {
    /// Class index JSON export
    index: PathBuf,

    /// Host app version to stamp into the result
    #[arg(long)]
    app_version: Option<String>,

    /// Write the mapping table to this file as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Interpretation of a leaf field for `get`
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Interpretation {
    /// Raw unsigned varint
    Varint,
    /// 32-bit fixed, raw bits
    Fixed32,
    /// 64-bit fixed, raw bits
    Fixed64,
    /// 32-bit fixed, reinterpreted as float
    Float,
    /// 64-bit fixed, reinterpreted as double
    Double,
    /// Length-delimited, decoded as UTF-8
    String,
    /// Length-delimited, hex bytes
    Bytes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Dump(args) => run_dump(&args),
        Commands::Get(args) => run_get(&args),
        Commands::Map(args) => run_map(&args),
    }
}

fn run_dump(args: &DumpArgs) -> Result<()> {
    if !args.input.exists() {
        bail!("Input path does not exist: {}", args.input.display());
    }

    if args.input.is_file() {
        let data = read_payload(&args.input)?;
        print!("{}", render_tree(&Reader::new(data), args.max_depth));
        return Ok(());
    }

    info!("Scanning directory: {}", args.input.display());

    let mut seen_hashes: HashSet<blake3::Hash> = HashSet::new();
    let mut dumped = 0usize;
    let mut duplicates = 0usize;

    for entry in WalkDir::new(&args.input)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let data = match read_payload(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                continue;
            }
        };

        if !args.keep_duplicates && !seen_hashes.insert(blake3::hash(&data)) {
            debug!("Skipping duplicate capture: {}", path.display());
            duplicates += 1;
            continue;
        }

        let reader = Reader::new(data);
        if reader.is_empty() {
            trace!("No decodable fields in {}", path.display());
            continue;
        }

        println!("=== {} ===", path.display());
        print!("{}", render_tree(&reader, args.max_depth));
        dumped += 1;
    }

    info!("Dumped {} captures, {} duplicates skipped", dumped, duplicates);
    Ok(())
}

fn run_get(args: &GetArgs) -> Result<()> {
    let path = parse_path(&args.path)?;
    let data = read_payload(&args.input)?;
    let reader = Reader::new(data);

    let rendered = match args.interpret {
        Interpretation::Varint => reader.get_varint(&path).map(|v| v.to_string()),
        Interpretation::Fixed32 => reader.get_fixed32(&path).map(|v| v.to_string()),
        Interpretation::Fixed64 => reader.get_fixed64(&path).map(|v| v.to_string()),
        Interpretation::Float => reader
            .get_fixed32(&path)
            .map(|v| f32::from_bits(v).to_string()),
        Interpretation::Double => reader
            .get_fixed64(&path)
            .map(|v| f64::from_bits(v).to_string()),
        Interpretation::String => reader.get_string(&path),
        Interpretation::Bytes => reader.get_bytes(&path).map(|b| hex_string(&b)),
    };

    match rendered {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => bail!(
            "No {} value at path {:?}",
            format!("{:?}", args.interpret).to_lowercase(),
            path
        ),
    }
}

fn run_map(args: &MapArgs) -> Result<()> {
    let index = ClassIndex::load(&args.index)
        .with_context(|| format!("Failed to load class index: {}", args.index.display()))?;
    info!("Loaded class index with {} classes", index.len());

    let mut result = MappingEngine::with_default_mappers().run(&index);
    if let Some(version) = &args.app_version {
        result = result.with_app_version(version.clone());
    }

    print!("{}", render_mappings(&result));

    if let Some(output) = &args.output {
        result
            .save(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Wrote {}", output.display());
    }

    if !result.warnings().is_empty() {
        warn!(
            "{} warnings occurred while generating mappings",
            result.warnings().len()
        );
    }
    Ok(())
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read payload: {}", path.display()))
}

/// Parse a comma-separated field path like `4,4,11`
fn parse_path(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(|segment| {
            let segment = segment.trim();
            segment
                .parse::<u32>()
                .with_context(|| format!("Invalid path segment '{}'", segment))
        })
        .collect()
}

/// Render the decoded field tree of one payload
fn render_tree(reader: &Reader, max_depth: usize) -> String {
    let mut out = String::new();
    render_scope(reader, 0, max_depth, &mut out);
    out
}

fn render_scope(reader: &Reader, depth: usize, max_depth: usize, out: &mut String) {
    for (field_number, value) in reader.iter() {
        for _ in 0..depth {
            out.push_str("  ");
        }
        match value {
            WireValue::Varint(v) => {
                let _ = writeln!(out, "{}: varint {}", field_number, v);
            }
            WireValue::I32(v) => {
                let _ = writeln!(
                    out,
                    "{}: fixed32 {} (float {})",
                    field_number,
                    v,
                    f32::from_bits(*v)
                );
            }
            WireValue::I64(v) => {
                let _ = writeln!(
                    out,
                    "{}: fixed64 {} (double {})",
                    field_number,
                    v,
                    f64::from_bits(*v)
                );
            }
            WireValue::Len(payload) => {
                let nested = Reader::new(payload.clone());
                // Only treat a payload as a submessage if every byte decodes
                if !nested.is_empty() && nested.consumed() == payload.len() && depth < max_depth {
                    let _ = writeln!(out, "{}: message ({} bytes)", field_number, payload.len());
                    render_scope(&nested, depth + 1, max_depth, out);
                } else if let Some(text) = printable_utf8(payload) {
                    let _ = writeln!(out, "{}: \"{}\"", field_number, text);
                } else {
                    let _ = writeln!(
                        out,
                        "{}: bytes ({}) {}",
                        field_number,
                        payload.len(),
                        hex_preview(payload, 16)
                    );
                }
            }
        }
    }
}

/// Render the mapping table of one pass
fn render_mappings(result: &MappingResult) -> String {
    let mut out = String::new();
    if let Some(version) = result.app_version() {
        let _ = writeln!(out, "app version: {}", version);
    }
    for (mapper, slots) in result.iter() {
        let _ = writeln!(out, "[{}]", mapper);
        for (slot, value) in slots.iter() {
            let _ = writeln!(out, "  {} = {}", slot, value.unwrap_or("<unresolved>"));
        }
    }
    for warning in result.warnings() {
        let _ = writeln!(out, "warning: {}", warning);
    }
    out
}

fn printable_utf8(data: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(data).ok()?;
    if !text.is_empty() && text.chars().all(|c| !c.is_control() || c == '\n') {
        Some(text)
    } else {
        None
    }
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_preview(data: &[u8], limit: usize) -> String {
    let preview = hex_string(&data[..data.len().min(limit)]);
    if data.len() > limit {
        format!("{}...", preview)
    } else {
        preview
    }
}
