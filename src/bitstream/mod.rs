//! Buffered MSB-first bit streams over arbitrary byte streams.
//!
//! [`BitWriter`] and [`BitReader`] are the only way bits enter or leave the
//! container. Two instantiations are used throughout the crate: per-block
//! staging buffers (`BitWriter<Vec<u8>>`, `BitReader<Cursor<Vec<u8>>>`) and
//! the shared stream of a compression session (boxed `Write`/`Read`).

mod reader;
mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;

use std::io::Cursor;

/// Bit writer over an in-memory staging buffer.
pub type StageWriter = BitWriter<Vec<u8>>;
/// Bit reader over an in-memory staging buffer.
pub type StageReader = BitReader<Cursor<Vec<u8>>>;

/// Internal byte-buffer size. Must be a multiple of 8 and at least 1024.
pub(crate) const BUFFER_SIZE: usize = 16 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bits_round_trip() {
        let mut bw = BitWriter::new(Vec::new());
        let pattern = [1u8, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1];
        for &b in &pattern {
            bw.write_bit(b).unwrap();
        }
        bw.close().unwrap();
        assert_eq!(bw.written(), pattern.len() as u64);

        let bytes = bw.into_inner();
        let mut br = BitReader::new(Cursor::new(bytes));
        for &b in &pattern {
            assert_eq!(br.read_bit().unwrap(), b);
        }
        assert_eq!(br.read(), pattern.len() as u64);
    }

    #[test]
    fn multi_bit_values_round_trip() {
        let values: [(u64, usize); 8] = [
            (0, 1),
            (1, 1),
            (0xA5, 8),
            (0x1234, 16),
            (0x0FFF_FFFF, 28),
            (0x1FFF_FFFF_FFFF, 48),
            (u64::MAX, 64),
            (5, 3),
        ];
        let mut bw = BitWriter::new(Vec::new());
        for &(v, n) in &values {
            bw.write_bits(v, n).unwrap();
        }
        bw.close().unwrap();
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        for &(v, n) in &values {
            assert_eq!(br.read_bits(n).unwrap(), v, "{} bits", n);
        }
    }

    #[test]
    fn byte_slices_round_trip_with_partial_tail() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut bw = BitWriter::new(Vec::new());
        bw.write_bits(0b101, 3).unwrap(); // misalign on purpose
        bw.write_bits_from(&data, data.len() * 8).unwrap();
        bw.write_bits_from(&[0b1100_0000], 2).unwrap();
        bw.close().unwrap();
        assert_eq!(bw.written(), 3 + 256 * 8 + 2);

        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        assert_eq!(br.read_bits(3).unwrap(), 0b101);
        let mut out = vec![0u8; 256];
        br.read_bits_into(&mut out, 256 * 8).unwrap();
        assert_eq!(out, data);
        assert_eq!(br.read_bits(2).unwrap(), 0b11);
    }

    #[test]
    fn close_pads_to_byte_boundary_with_zeros() {
        let mut bw = BitWriter::new(Vec::new());
        bw.write_bits(0b11, 2).unwrap();
        bw.close().unwrap();
        assert_eq!(bw.written(), 2);
        assert_eq!(bw.into_inner(), vec![0b1100_0000]);
    }

    #[test]
    fn read_past_end_reports_end_of_stream() {
        let mut br = BitReader::new(Cursor::new(vec![0xFFu8]));
        assert_eq!(br.read_bits(8).unwrap(), 0xFF);
        assert!(matches!(
            br.read_bits(1),
            Err(crate::error::Error::EndOfStream)
        ));
    }

    #[test]
    fn use_after_close_is_rejected() {
        let mut bw = BitWriter::new(Vec::new());
        bw.close().unwrap();
        assert!(matches!(
            bw.write_bits(1, 1),
            Err(crate::error::Error::Closed)
        ));

        let mut br = BitReader::new(Cursor::new(vec![0u8; 4]));
        br.close();
        assert!(matches!(br.read_bit(), Err(crate::error::Error::Closed)));
    }

    #[test]
    fn large_payload_crosses_internal_buffer_boundaries() {
        let n = 3 * BUFFER_SIZE + 17;
        let data: Vec<u8> = (0..n).map(|i| (i * 31 % 251) as u8).collect();
        let mut bw = BitWriter::new(Vec::new());
        bw.write_bit(1).unwrap();
        bw.write_bits_from(&data, n * 8).unwrap();
        bw.close().unwrap();
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        assert_eq!(br.read_bit().unwrap(), 1);
        let mut out = vec![0u8; n];
        br.read_bits_into(&mut out, n * 8).unwrap();
        assert_eq!(out, data);
    }
}
