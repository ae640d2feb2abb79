//! Content detection: magic numbers, data-type hints, and the first-order
//! entropy score used by the incompressible-block policy.

/// Content hint attached to each block before the transform chain runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    Undefined,
    Text,
    Utf8,
    Base64,
    Dna,
    Multimedia,
    Executable,
    /// Already-compressed payload (gzip, jpeg, ...).
    Compressed,
}

/// Entropy score (scaled so 8 bits/byte = 1024) at or above which a block
/// is treated as incompressible under `--skip`.
pub const INCOMPRESSIBLE_THRESHOLD: u32 = 973;

/// Magic prefixes of formats that are known to be already compressed.
const COMPRESSED_MAGICS: &[&[u8]] = &[
    &[0x1F, 0x8B],             // gzip
    &[0x28, 0xB5, 0x2F, 0xFD], // zstd
    &[0xFD, b'7', b'z', b'X', b'Z'], // xz
    &[b'7', b'z', 0xBC, 0xAF], // 7z
    &[b'P', b'K', 0x03, 0x04], // zip
    &[0xFF, 0xD8, 0xFF],       // jpeg
    &[0x89, b'P', b'N', b'G'], // png
    b"%PDF",                   // pdf
    b"BZh",                    // bzip2
    &[0x04, 0x22, 0x4D, 0x18], // lz4 frame
    b"Rar!",                   // rar
    &[0x4B, 0x41, 0x4E, 0x5A], // our own container
];

const EXECUTABLE_MAGICS: &[&[u8]] = &[
    &[0x7F, b'E', b'L', b'F'],
    b"MZ",
    &[0xFE, 0xED, 0xFA, 0xCE],
    &[0xFE, 0xED, 0xFA, 0xCF],
    &[0xCE, 0xFA, 0xED, 0xFE],
    &[0xCF, 0xFA, 0xED, 0xFE],
];

const MULTIMEDIA_MAGICS: &[&[u8]] = &[
    b"RIFF", // wav / avi
    b"BM",   // bmp
    b"P5",   // pgm
    b"P6",   // ppm
    b"FORM", // aiff
];

/// True when the block starts with the magic of a known compressed format.
pub fn is_known_compressed(block: &[u8]) -> bool {
    COMPRESSED_MAGICS.iter().any(|m| block.starts_with(m))
}

/// Cheap per-block content classification.
pub fn detect_type(block: &[u8]) -> DataType {
    if block.is_empty() {
        return DataType::Undefined;
    }
    if is_known_compressed(block) {
        return DataType::Compressed;
    }
    if EXECUTABLE_MAGICS.iter().any(|m| block.starts_with(m)) {
        return DataType::Executable;
    }
    if MULTIMEDIA_MAGICS.iter().any(|m| block.starts_with(m)) {
        return DataType::Multimedia;
    }

    let sample = &block[..block.len().min(16 * 1024)];
    let mut counts = [0u32; 256];
    for &b in sample {
        counts[b as usize] += 1;
    }
    let n = sample.len() as u32;

    let dna: u32 = b"ACGTacgtNn\n".iter().map(|&b| counts[b as usize]).sum();
    if dna * 100 >= n * 90 {
        return DataType::Dna;
    }

    let base64: u32 = (b'A'..=b'Z')
        .chain(b'a'..=b'z')
        .chain(b'0'..=b'9')
        .chain([b'+', b'/', b'=', b'\n', b'\r'])
        .map(|b| counts[b as usize])
        .sum();
    // Base64 uses its alphabet exclusively and has no spaces.
    if base64 == n && counts[b' ' as usize] == 0 && counts[b'+' as usize] + counts[b'/' as usize] > 0
    {
        return DataType::Base64;
    }

    let printable: u32 = (0x20u8..0x7F)
        .chain([b'\n', b'\r', b'\t'])
        .map(|b| counts[b as usize])
        .sum();
    if printable * 100 >= n * 85 {
        return if std::str::from_utf8(sample).is_ok() {
            DataType::Text
        } else {
            DataType::Undefined
        };
    }
    let high: u32 = (0x80u8..=0xFF).map(|b| counts[b as usize]).sum();
    if high > 0 && std::str::from_utf8(sample).is_ok() {
        return DataType::Utf8;
    }
    DataType::Undefined
}

/// Order-0 entropy of the block scaled to 1024 (8 bits/byte = 1024).
///
/// Used only as an encoder-side policy input; the decoder never computes
/// it, so the float arithmetic has no wire impact.
pub fn entropy_1024(block: &[u8]) -> u32 {
    if block.is_empty() {
        return 0;
    }
    let mut counts = [0u64; 256];
    for &b in block {
        counts[b as usize] += 1;
    }
    let n = block.len() as f64;
    let mut bits = 0f64;
    for &c in counts.iter() {
        if c > 0 {
            let p = c as f64 / n;
            bits -= p * p.log2();
        }
    }
    ((bits / 8.0) * 1024.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_compressed_magics_hit() {
        assert!(is_known_compressed(&[0x1F, 0x8B, 0x08, 0x00]));
        assert!(is_known_compressed(b"PK\x03\x04rest"));
        assert!(is_known_compressed(b"%PDF-1.7"));
        assert!(!is_known_compressed(b"plain old text"));
    }

    #[test]
    fn executable_and_multimedia_magics_classify() {
        assert_eq!(detect_type(&[0x7F, b'E', b'L', b'F', 2, 1]), DataType::Executable);
        assert_eq!(detect_type(b"RIFF\x10\x00\x00\x00WAVE"), DataType::Multimedia);
    }

    #[test]
    fn dna_and_text_heuristics_classify() {
        let dna: Vec<u8> = b"ACGT".iter().cycle().take(2000).copied().collect();
        assert_eq!(detect_type(&dna), DataType::Dna);
        let text = b"The quick brown fox jumps over the lazy dog. ".repeat(40);
        assert_eq!(detect_type(&text), DataType::Text);
    }

    #[test]
    fn entropy_score_orders_inputs() {
        let constant = vec![7u8; 4096];
        assert_eq!(entropy_1024(&constant), 0);
        let ramp: Vec<u8> = (0u8..=255).cycle().take(65536).collect();
        assert_eq!(entropy_1024(&ramp), 1024);
        let text = b"some ordinary english text with letters ".repeat(100);
        let e = entropy_1024(&text);
        assert!(e > 100 && e < INCOMPRESSIBLE_THRESHOLD);
    }
}
