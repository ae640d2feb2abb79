//! Argument parsing and translation into session preferences.

use clap::Parser;

use crate::block::CompressorConfig;
use crate::entropy::EntropyType;
use crate::error::{Error, Result};
use crate::io::prefs::Prefs;
use crate::transform::parse_descriptor;
use crate::util::parse_size;

/// Block-oriented lossless data compressor.
#[derive(Parser, Debug)]
#[command(name = "knz", version, disable_help_subcommand = true)]
pub struct Args {
    /// Compress the input.
    #[arg(short = 'c', long)]
    pub compress: bool,

    /// Decompress the input.
    #[arg(short = 'd', long)]
    pub decompress: bool,

    /// Input file, directory, or '-' for stdin.
    #[arg(long, value_name = "PATH")]
    pub input: Option<String>,

    /// Output file or '-' for stdout; derived from the input by default.
    #[arg(long, value_name = "PATH")]
    pub output: Option<String>,

    /// Block size with optional K/M/G suffix, or 'auto'.
    #[arg(long, value_name = "SIZE", default_value = "auto")]
    pub block: String,

    /// Compression level selecting a transform+entropy pair.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub level: Option<u8>,

    /// Transform chain, e.g. BWT+RANK+ZRLT. Overrides the level's chain.
    #[arg(long, value_name = "NAMES")]
    pub transform: Option<String>,

    /// Entropy codec name. Overrides the level's codec.
    #[arg(long, value_name = "NAME")]
    pub entropy: Option<String>,

    /// Store per-block checksums (32 or 64; the container records 32 bits).
    #[arg(short = 'x', long, value_name = "BITS")]
    pub checksum: Option<u32>,

    /// Detect and copy through incompressible blocks.
    #[arg(long)]
    pub skip: bool,

    /// Worker threads (0 = auto).
    #[arg(long, default_value_t = 0)]
    pub jobs: usize,

    /// Verbosity 0..5.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=5), default_value_t = 1)]
    pub verbose: u8,

    /// Overwrite existing output files.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Remove the input file after success.
    #[arg(long = "rm")]
    pub remove_input: bool,

    /// First block to emit on decompression (1-based, inclusive).
    #[arg(long, value_name = "ID")]
    pub from: Option<u64>,

    /// First block to stop at on decompression (exclusive).
    #[arg(long, value_name = "ID")]
    pub to: Option<u64>,

    /// Skip symbolic links when walking directories.
    #[arg(long = "no-link")]
    pub no_link: bool,

    /// Skip dot files when walking directories.
    #[arg(long = "no-dot-file")]
    pub no_dot_file: bool,

    /// Input file (same as --input).
    #[arg(value_name = "FILE")]
    pub positional: Option<String>,
}

/// Level to (transform chain, entropy codec) mapping.
pub fn level_pair(level: u8) -> (&'static str, &'static str) {
    match level {
        0 => ("NONE", "NONE"),
        1 => ("PACK+LZ", "NONE"),
        2 => ("DNA+LZ", "HUFFMAN"),
        3 => ("TEXT+UTF+PACK+MM+LZX", "HUFFMAN"),
        4 => ("TEXT+UTF+EXE+PACK+MM+ROLZ", "NONE"),
        5 => ("TEXT+UTF+BWT+RANK+ZRLT", "ANS0"),
        6 => ("TEXT+UTF+BWT+SRT+ZRLT", "FPAQ"),
        7 => ("LZP+TEXT+UTF+BWT+LZP", "CM"),
        8 => ("EXE+RLT+TEXT+UTF+DNA", "TPAQ"),
        _ => ("EXE+RLT+TEXT+UTF+DNA", "TPAQX"),
    }
}

/// Automatic block size by level.
fn auto_block_size(level: u8) -> usize {
    match level {
        0..=4 => 4 << 20,
        5..=6 => 16 << 20,
        _ => 32 << 20,
    }
}

/// The resolved request: direction, preferences, and paths.
pub struct Request {
    pub compress: bool,
    pub prefs: Prefs,
    pub input: String,
    pub output: Option<String>,
}

pub fn resolve(args: &Args) -> Result<Request> {
    if args.compress == args.decompress {
        return Err(Error::InvalidParam(
            "exactly one of --compress / --decompress is required".to_string(),
        ));
    }
    let level = args.level.unwrap_or(3);
    let (level_transform, level_entropy) = level_pair(level);
    let transform_spec = args.transform.as_deref().unwrap_or(level_transform);
    let entropy_spec = args.entropy.as_deref().unwrap_or(level_entropy);

    let block_size = if args.block.eq_ignore_ascii_case("auto") {
        auto_block_size(level)
    } else {
        let raw = parse_size(&args.block)
            .ok_or_else(|| Error::BlockSize(format!("cannot parse {}", args.block)))? as usize;
        // Round down to the granularity the header can carry.
        raw & !15
    };

    let checksum = match args.checksum {
        None => false,
        Some(32) => true,
        Some(64) => {
            crate::io::prefs::display_level(
                2,
                "note: the container stores a 32-bit block hash\n",
            );
            true
        }
        Some(other) => {
            return Err(Error::InvalidParam(format!(
                "checksum must be 32 or 64, got {}",
                other
            )))
        }
    };

    let jobs = if args.jobs == 0 {
        (num_cpus::get() / 2).clamp(1, crate::block::MAX_JOBS)
    } else {
        args.jobs
    };

    let config = CompressorConfig {
        transform: parse_descriptor(transform_spec)?,
        entropy: EntropyType::from_name(entropy_spec)?,
        block_size,
        checksum,
        jobs,
        skip_blocks: args.skip,
        orig_size: 0,
    };
    config.validate()?;

    let input = args
        .input
        .clone()
        .or_else(|| args.positional.clone())
        .ok_or_else(|| Error::InvalidParam("no input given".to_string()))?;

    Ok(Request {
        compress: args.compress,
        prefs: Prefs {
            config,
            force: args.force,
            remove_input: args.remove_input,
            no_link: args.no_link,
            no_dot_file: args.no_dot_file,
            from: args.from.unwrap_or(0),
            to: args.to.unwrap_or(u64::MAX),
        },
        input,
        output: args.output.clone(),
    })
}
