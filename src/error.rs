//! Error kinds shared by the whole crate.
//!
//! One variant per failure class. Library code returns these directly; the
//! CLI maps them to negative process exit codes via [`Error::exit_code`].

use core::fmt;
use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the compression/decompression session.
#[derive(Debug)]
pub enum Error {
    /// Operation on a closed bit stream.
    Closed,
    /// Underlying byte-stream I/O failure.
    Io(io::Error),
    /// Premature end of the underlying stream.
    EndOfStream,
    /// Bad container magic.
    InvalidFile(String),
    /// Container version newer than supported (or reserved).
    StreamVersion(u32),
    /// Unknown entropy or transform id.
    InvalidCodec(String),
    /// Header or frame block size out of range.
    BlockSize(String),
    /// Header or block checksum mismatch.
    CrcCheck(String),
    /// Transform or entropy stage failed on a block.
    ProcessBlock(String),
    /// Refusing to overwrite an existing output file.
    OverwriteFile(String),
    /// Output path is a directory.
    OutputIsDir(String),
    CreateFile(String),
    OpenFile(String),
    ReadFile(String),
    WriteFile(String),
    /// Programming / configuration error.
    InvalidParam(String),
    /// Benign early return of a worker whose peers hit end-of-stream or an
    /// error; never surfaced to the caller as a failure.
    Canceled,
}

impl Error {
    /// Process exit code for the CLI. 0 is success; error classes are
    /// negative, mirroring the order they are listed in the format notes.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::OpenFile(_) => -1,
            Error::CreateFile(_) => -2,
            Error::ReadFile(_) | Error::EndOfStream => -3,
            Error::WriteFile(_) => -4,
            Error::ProcessBlock(_) => -5,
            Error::CrcCheck(_) => -6,
            Error::InvalidCodec(_) => -7,
            Error::InvalidFile(_) => -8,
            Error::BlockSize(_) => -9,
            Error::StreamVersion(_) => -10,
            Error::OverwriteFile(_) => -11,
            Error::OutputIsDir(_) => -12,
            Error::Io(_) | Error::Closed | Error::InvalidParam(_) | Error::Canceled => -127,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Closed => write!(f, "bit stream closed"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::EndOfStream => write!(f, "unexpected end of stream"),
            Error::InvalidFile(m) => write!(f, "invalid file: {}", m),
            Error::StreamVersion(v) => write!(f, "unsupported stream version {}", v),
            Error::InvalidCodec(m) => write!(f, "invalid codec: {}", m),
            Error::BlockSize(m) => write!(f, "invalid block size: {}", m),
            Error::CrcCheck(m) => write!(f, "checksum mismatch: {}", m),
            Error::ProcessBlock(m) => write!(f, "block processing failed: {}", m),
            Error::OverwriteFile(m) => write!(f, "refusing to overwrite: {}", m),
            Error::OutputIsDir(m) => write!(f, "output is a directory: {}", m),
            Error::CreateFile(m) => write!(f, "cannot create file: {}", m),
            Error::OpenFile(m) => write!(f, "cannot open file: {}", m),
            Error::ReadFile(m) => write!(f, "read error: {}", m),
            Error::WriteFile(m) => write!(f, "write error: {}", m),
            Error::InvalidParam(m) => write!(f, "invalid parameter: {}", m),
            Error::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::EndOfStream
        } else {
            Error::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_negative_and_distinct_per_class() {
        let errs = [
            Error::OpenFile(String::new()),
            Error::CreateFile(String::new()),
            Error::ReadFile(String::new()),
            Error::WriteFile(String::new()),
            Error::ProcessBlock(String::new()),
            Error::CrcCheck(String::new()),
            Error::InvalidCodec(String::new()),
            Error::InvalidFile(String::new()),
            Error::BlockSize(String::new()),
            Error::StreamVersion(7),
            Error::OverwriteFile(String::new()),
            Error::OutputIsDir(String::new()),
        ];
        let codes: Vec<i32> = errs.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|&c| c < 0));
        let mut dedup = codes.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), codes.len());
    }

    #[test]
    fn eof_io_error_converts_to_end_of_stream() {
        let e: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(e, Error::EndOfStream));
    }
}
