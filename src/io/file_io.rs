//! File open/create policy and output naming.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// `-` selects stdin/stdout.
pub const STDIO_MARK: &str = "-";

/// Coarse input classification for progress messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Stdio,
    File,
}

impl InputKind {
    pub fn of(input: &str) -> Self {
        if input == STDIO_MARK {
            InputKind::Stdio
        } else {
            InputKind::File
        }
    }
}

/// Open an input stream; returns its size when it is a regular file.
pub fn open_src(input: &str) -> Result<(Box<dyn Read + Send>, Option<u64>)> {
    if input == STDIO_MARK {
        return Ok((Box::new(std::io::stdin()), None));
    }
    let meta = fs::metadata(input).map_err(|e| Error::OpenFile(format!("{}: {}", input, e)))?;
    if meta.is_dir() {
        return Err(Error::OpenFile(format!("{} is a directory", input)));
    }
    let f = File::open(input).map_err(|e| Error::OpenFile(format!("{}: {}", input, e)))?;
    Ok((Box::new(f), Some(meta.len())))
}

/// Create the output stream, honoring the overwrite policy.
pub fn open_dst(output: &str, force: bool) -> Result<Box<dyn Write + Send>> {
    if output == STDIO_MARK {
        return Ok(Box::new(std::io::stdout()));
    }
    let path = Path::new(output);
    if path.is_dir() {
        return Err(Error::OutputIsDir(output.to_string()));
    }
    if path.exists() && !force {
        return Err(Error::OverwriteFile(format!(
            "{} exists (use --force)",
            output
        )));
    }
    let f = File::create(output).map_err(|e| Error::CreateFile(format!("{}: {}", output, e)))?;
    Ok(Box::new(f))
}

/// Resolve the output path: explicit name, or derived from the input by
/// adding/stripping the default extension.
pub fn output_name(input: &str, output: Option<&str>, compress: bool) -> Result<String> {
    if let Some(o) = output {
        return Ok(o.to_string());
    }
    if input == STDIO_MARK {
        return Ok(STDIO_MARK.to_string());
    }
    let ext = format!(".{}", super::EXTENSION);
    if compress {
        Ok(format!("{}{}", input, ext))
    } else if let Some(stripped) = input.strip_suffix(&ext) {
        Ok(stripped.to_string())
    } else {
        Err(Error::InvalidParam(format!(
            "{} does not end in {}; use --output",
            input, ext
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    #[test]
    fn output_names_follow_the_extension() {
        assert_eq!(output_name("data.bin", None, true).unwrap(), "data.bin.knz");
        assert_eq!(output_name("data.bin.knz", None, false).unwrap(), "data.bin");
        assert_eq!(output_name("x", Some("y"), true).unwrap(), "y");
        assert!(output_name("noext", None, false).is_err());
        assert_eq!(output_name(STDIO_MARK, None, true).unwrap(), STDIO_MARK);
    }

    #[test]
    fn overwrite_policy_is_enforced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.knz");
        let path_str = path.to_str().unwrap();
        File::create(&path).unwrap().write_all(b"x").unwrap();
        assert!(matches!(
            open_dst(path_str, false),
            Err(Error::OverwriteFile(_))
        ));
        assert!(open_dst(path_str, true).is_ok());
        assert!(matches!(
            open_dst(dir.path().to_str().unwrap(), true),
            Err(Error::OutputIsDir(_))
        ));
    }

    #[test]
    fn open_src_reports_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.bin");
        fs::write(&path, b"hello").unwrap();
        let (_, size) = open_src(path.to_str().unwrap()).unwrap();
        assert_eq!(size, Some(5));
        assert!(open_src("/definitely/not/there").is_err());
    }
}
