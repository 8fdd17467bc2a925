//! CRC-32 as used by ZIP (reflected polynomial `0xEDB88320`).
//!
//! The 256-entry lookup table is built from the polynomial on first use and
//! shared read-only by every caller afterwards.

use std::sync::LazyLock;

/// Reflected CRC-32 polynomial (IEEE 802.3).
pub const POLYNOMIAL: u32 = 0xEDB8_8320;

static TABLE: LazyLock<[u32; 256]> = LazyLock::new(|| {
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut c = i as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 {
                POLYNOMIAL ^ (c >> 1)
            } else {
                c >> 1
            };
        }
        *slot = c;
    }
    table
});

/// Incremental CRC-32 hasher; [`crc32`] is a single update over the whole input.
///
/// Feeding data through several [`update`](Crc32::update) calls yields the
/// same checksum as a single call over the concatenated bytes.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    register: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            register: 0xFFFF_FFFF,
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        let table = &*TABLE;
        let mut c = self.register;
        for &byte in data {
            c = table[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
        }
        self.register = c;
        self
    }

    pub fn finalize(&self) -> u32 {
        self.register ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the CRC-32 of `data` in one call.
pub fn crc32(data: &[u8]) -> u32 {
    Crc32::new().update(data).finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn known_values() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b"The quick brown fox jumps over the lazy dog"), 0x414F_A339);
        assert_eq!(crc32(b"a"), 0xE8B7_BE43);
    }

    #[test]
    fn table_matches_polynomial() {
        assert_eq!(TABLE[0], 0);
        assert_eq!(TABLE[1], 0x7707_3096);
        assert_eq!(TABLE[128], POLYNOMIAL);
        assert_eq!(TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = "کتاب‌ها و مقاله‌ها".as_bytes();
        let mut hasher = Crc32::new();
        for chunk in data.chunks(3) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finalize(), crc32(data));
    }

    #[test]
    fn repeated_calls_are_stable() {
        let data = b"{\"id\":\"1\"}";
        assert_eq!(crc32(data), crc32(data));
    }
}
