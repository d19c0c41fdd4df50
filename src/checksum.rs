//! Checksum algorithms for the frame layer.

/// Algorithm over a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// Wrapping sum of all bytes.
    Sum,
    /// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection, no final xor.
    Crc16Ccitt,
    /// CRC-32 (IEEE 802.3).
    Crc32,
}

impl ChecksumAlgorithm {
    pub fn compute(self, data: &[u8]) -> u64 {
        match self {
            ChecksumAlgorithm::Sum => data.iter().fold(0u64, |acc, &b| acc.wrapping_add(u64::from(b))),
            ChecksumAlgorithm::Crc16Ccitt => u64::from(crc16_ccitt(data)),
            ChecksumAlgorithm::Crc32 => u64::from(crc32fast::hash(data)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sum => "sum",
            ChecksumAlgorithm::Crc16Ccitt => "crc16",
            ChecksumAlgorithm::Crc32 => "crc32",
        }
    }
}

fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &b in data {
        crc ^= u16::from(b) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_values() {
        let data = b"123456789";
        assert_eq!(ChecksumAlgorithm::Crc16Ccitt.compute(data), 0x29B1);
        assert_eq!(ChecksumAlgorithm::Crc32.compute(data), 0xCBF4_3926);
        assert_eq!(ChecksumAlgorithm::Sum.compute(data), 477);
    }

    #[test]
    fn empty_input() {
        assert_eq!(ChecksumAlgorithm::Sum.compute(&[]), 0);
        assert_eq!(ChecksumAlgorithm::Crc16Ccitt.compute(&[]), 0xFFFF);
    }
}
