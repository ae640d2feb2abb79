//! MSB-first bit reader.

use std::io::Read;

use crate::error::{Error, Result};

use super::BUFFER_SIZE;

/// Buffered bit reader over any byte source.
///
/// Mirrors [`super::BitWriter`]: reading back exactly the bits that were
/// written yields the same values. Reading past the end of the underlying
/// stream fails with `EndOfStream`.
pub struct BitReader<R: Read> {
    source: R,
    buffer: Vec<u8>,
    buf_pos: usize,
    buf_len: usize,
    /// Unconsumed bits, left-aligned: the next bit to deliver is bit 63.
    acc: u64,
    pending: usize,
    read_total: u64,
    closed: bool,
    source_eof: bool,
}

impl<R: Read> BitReader<R> {
    pub fn new(source: R) -> Self {
        BitReader {
            source,
            buffer: vec![0u8; BUFFER_SIZE],
            buf_pos: 0,
            buf_len: 0,
            acc: 0,
            pending: 0,
            read_total: 0,
            closed: false,
            source_eof: false,
        }
    }

    /// Read one bit (0 or 1).
    #[inline]
    pub fn read_bit(&mut self) -> Result<u8> {
        Ok(self.read_bits(1)? as u8)
    }

    /// Read `count` bits, MSB first, into the low bits of the result.
    /// `count` must be in `[1, 64]`.
    pub fn read_bits(&mut self, count: usize) -> Result<u64> {
        if self.closed {
            return Err(Error::Closed);
        }
        if count == 0 || count > 64 {
            return Err(Error::InvalidParam(format!("bit count {} not in [1,64]", count)));
        }
        let mut res: u64 = 0;
        let mut need = count;
        while need > 0 {
            if self.pending == 0 {
                self.refill_acc()?;
            }
            let take = need.min(self.pending);
            if take == 64 {
                res = self.acc;
                self.acc = 0;
            } else {
                res = (res << take) | (self.acc >> (64 - take));
                self.acc <<= take;
            }
            self.pending -= take;
            need -= take;
        }
        self.read_total += count as u64;
        Ok(res)
    }

    /// Read `count_bits` bits into `bytes`, MSB first within each byte. Any
    /// trailing partial byte is zero-padded in its low bits.
    pub fn read_bits_into(&mut self, bytes: &mut [u8], count_bits: usize) -> Result<usize> {
        if count_bits > bytes.len() * 8 {
            return Err(Error::InvalidParam(format!(
                "{} bits requested into {} bytes",
                count_bits,
                bytes.len()
            )));
        }
        let whole = count_bits / 8;
        let rem = count_bits % 8;
        let mut i = 0;
        while i + 8 <= whole {
            let v = self.read_bits(64)?;
            bytes[i..i + 8].copy_from_slice(&v.to_be_bytes());
            i += 8;
        }
        while i < whole {
            bytes[i] = self.read_bits(8)? as u8;
            i += 1;
        }
        if rem > 0 {
            bytes[whole] = (self.read_bits(rem)? as u8) << (8 - rem);
        }
        Ok(count_bits)
    }

    /// Running total of bits consumed.
    #[inline]
    pub fn read(&self) -> u64 {
        self.read_total
    }

    /// Mark the reader closed. Further reads fail with `Closed`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn refill_acc(&mut self) -> Result<()> {
        debug_assert_eq!(self.pending, 0);
        let mut acc: u64 = 0;
        let mut n = 0usize;
        while n < 8 {
            match self.next_byte()? {
                Some(b) => {
                    acc = (acc << 8) | b as u64;
                    n += 1;
                }
                None => break,
            }
        }
        if n == 0 {
            return Err(Error::EndOfStream);
        }
        self.acc = acc << (64 - 8 * n);
        self.pending = 8 * n;
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.buf_pos == self.buf_len {
            if self.source_eof {
                return Ok(None);
            }
            self.buf_len = 0;
            self.buf_pos = 0;
            loop {
                match self.source.read(&mut self.buffer[self.buf_len..]) {
                    Ok(0) => {
                        self.source_eof = true;
                        break;
                    }
                    Ok(n) => {
                        self.buf_len += n;
                        if self.buf_len == self.buffer.len() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::from(e)),
                }
            }
            if self.buf_len == 0 {
                return Ok(None);
            }
        }
        let b = self.buffer[self.buf_pos];
        self.buf_pos += 1;
        Ok(Some(b))
    }
}
