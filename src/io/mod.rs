//! File-level drivers for the CLI: open/create policy, stream wiring,
//! directory expansion, and progress display.

pub mod file_io;
pub mod prefs;

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::block::{CompressedReader, CompressedWriter, CompressorConfig};
use crate::error::{Error, Result};
use crate::io::file_io::{open_dst, open_src, output_name, InputKind, STDIO_MARK};
use crate::io::prefs::{display_level, Prefs};

/// Default extension of compressed files.
pub const EXTENSION: &str = "knz";

/// Compress one input (file or `-` for stdin) to one output.
pub fn compress_file(prefs: &Prefs, input: &str, output: Option<&str>) -> Result<()> {
    let started = Instant::now();
    let (mut src, in_size) = open_src(input)?;
    let out_path = output_name(input, output, true)?;
    let dst = open_dst(&out_path, prefs.force)?;

    let mut cfg = prefs.config.clone();
    cfg.orig_size = in_size.unwrap_or(0);
    let mut writer = CompressedWriter::new(dst, cfg)?;
    copy_stream(&mut *src, &mut writer)?;
    writer.close()?;
    let read = writer.bytes_read();
    let written = writer.bytes_written();
    drop(writer);

    finish_output(prefs, input, &out_path)?;
    display_level(
        2,
        &format!(
            "{}: {} => {} bytes ({:.2}%) in {:.0} ms\n",
            display_name(input),
            read,
            written,
            written as f64 * 100.0 / read.max(1) as f64,
            started.elapsed().as_secs_f64() * 1000.0,
        ),
    );
    Ok(())
}

/// Decompress one input to one output.
pub fn decompress_file(prefs: &Prefs, input: &str, output: Option<&str>) -> Result<()> {
    let started = Instant::now();
    let (src, _) = open_src(input)?;
    let out_path = output_name(input, output, false)?;
    let mut dst = open_dst(&out_path, prefs.force)?;

    let mut reader =
        CompressedReader::with_range(src, prefs.config.jobs, prefs.from, prefs.to)?;
    copy_stream(&mut reader, &mut *dst)?;
    dst.flush().map_err(Error::from)?;
    let written = reader.bytes_written();
    drop(dst);

    finish_output(prefs, input, &out_path)?;
    display_level(
        2,
        &format!(
            "{}: {} bytes restored in {:.0} ms\n",
            display_name(input),
            written,
            started.elapsed().as_secs_f64() * 1000.0,
        ),
    );
    Ok(())
}

/// Expand an input path into the list of files to process. Directories are
/// walked recursively, honoring the symlink and dot-file filters.
pub fn expand_inputs(prefs: &Prefs, input: &str) -> Result<Vec<String>> {
    if input == STDIO_MARK {
        return Ok(vec![input.to_string()]);
    }
    let path = Path::new(input);
    let meta = fs::metadata(path)
        .map_err(|e| Error::OpenFile(format!("{}: {}", input, e)))?;
    if meta.is_file() {
        return Ok(vec![input.to_string()]);
    }
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(path)
        .follow_links(!prefs.no_link)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| Error::OpenFile(format!("{}: {}", input, e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if prefs.no_link && entry.path_is_symlink() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if prefs.no_dot_file && name.starts_with('.') {
            continue;
        }
        files.push(entry.path().to_string_lossy().into_owned());
    }
    Ok(files)
}

fn display_name(input: &str) -> &str {
    if input == STDIO_MARK {
        "stdin"
    } else {
        input
    }
}

fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(src: &mut R, dst: &mut W) -> Result<u64> {
    let mut buf = vec![0u8; 1 << 16];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from(e)),
        };
        dst.write_all(&buf[..n]).map_err(Error::from)?;
        total += n as u64;
    }
}

/// Post-success bookkeeping: carry the mtime over and honor `--rm`.
fn finish_output(prefs: &Prefs, input: &str, out_path: &str) -> Result<()> {
    if input == STDIO_MARK || out_path == STDIO_MARK {
        return Ok(());
    }
    if let Ok(meta) = fs::metadata(input) {
        if let Ok(mtime) = meta.modified() {
            let _ = filetime::set_file_mtime(
                PathBuf::from(out_path),
                filetime::FileTime::from_system_time(mtime),
            );
        }
    }
    if prefs.remove_input {
        fs::remove_file(input).map_err(|e| Error::WriteFile(format!("{}: {}", input, e)))?;
    }
    Ok(())
}

/// Process one compress/decompress request, expanding directories.
pub fn run(prefs: &Prefs, compress: bool, input: &str, output: Option<&str>) -> Result<()> {
    let files = expand_inputs(prefs, input)?;
    let multi = files.len() > 1;
    if multi && output.is_some() && output != Some(STDIO_MARK) {
        return Err(Error::InvalidParam(
            "explicit --output conflicts with a directory input".to_string(),
        ));
    }
    for file in &files {
        let kind = InputKind::of(file);
        display_level(3, &format!("processing {:?} {}\n", kind, file));
        if compress {
            compress_file(prefs, file, if multi { None } else { output })?;
        } else {
            decompress_file(prefs, file, if multi { None } else { output })?;
        }
    }
    Ok(())
}
