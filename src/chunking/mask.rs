use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of a scattered mask; its most significant bit is always set.
pub const SCATTERED_MASK_WIDTH: u32 = 48;

/// Seed used for scattered masks unless configured otherwise.
pub const DEFAULT_MASK_SEED: u64 = 941_568_351;

/// Bit layout of the generated masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MaskLayout {
    /// One-bits spread over a 48-bit field by a seeded shuffle, as in the FastCDC paper.
    #[default]
    Scattered,
    /// One-bits packed into the low-order end of the mask.
    Contiguous,
}

impl fmt::Display for MaskLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MaskLayout::Scattered => "scattered",
            MaskLayout::Contiguous => "contiguous",
        })
    }
}

impl FromStr for MaskLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scattered" => Ok(MaskLayout::Scattered),
            "contiguous" => Ok(MaskLayout::Contiguous),
            _ => Err(Error::config(format!("unknown mask layout: {s}"))),
        }
    }
}

impl TryFrom<String> for MaskLayout {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MaskLayout> for String {
    fn from(value: MaskLayout) -> Self {
        value.to_string()
    }
}

/// Derives the pair of masks used below and above the expected chunk size.
#[derive(Debug, Clone, Copy)]
pub struct MaskGenerator {
    expected_size: u32,
    normalization_level: u32,
    seed: u64,
    layout: MaskLayout,
}

impl MaskGenerator {
    ///
    /// Constructs a new `MaskGenerator`.
    ///
    /// ## Arguments
    ///
    /// * `expected_size`: The expected chunk size in bytes.
    /// * `normalization_level`: Number of bits removed from (small mask) and added to (large mask) the effective bits.
    /// * `seed`: Seed for distributing the bits of a scattered mask.
    /// * `layout`: The bit layout to generate.
    ///
    pub fn new(expected_size: u32, normalization_level: u32, seed: u64, layout: MaskLayout) -> Self {
        Self {
            expected_size,
            normalization_level,
            seed,
            layout,
        }
    }

    /// Index of the highest set bit of the expected size.
    pub fn effective_bits(&self) -> Result<u32> {
        self.expected_size
            .checked_ilog2()
            .ok_or_else(|| Error::config("expected chunk size must be positive"))
    }

    /// Mask tested while the chunk is still smaller than the expected size.
    /// Carries `effective_bits - normalization_level` one-bits.
    pub fn generate_small_mask(&self) -> Result<u64> {
        let bits = self
            .effective_bits()?
            .checked_sub(self.normalization_level)
            .filter(|&bits| bits > 0)
            .ok_or_else(|| {
                Error::config(format!(
                    "normalization level {} leaves no effective bits for expected size {}",
                    self.normalization_level, self.expected_size
                ))
            })?;
        self.generate(bits)
    }

    /// Mask tested once the chunk has grown past the expected size.
    /// Carries `effective_bits + normalization_level` one-bits.
    pub fn generate_large_mask(&self) -> Result<u64> {
        let bits = self
            .effective_bits()?
            .checked_add(self.normalization_level)
            .ok_or_else(|| Error::config("normalization level is too large"))?;
        self.generate(bits)
    }

    fn generate(&self, bits: u32) -> Result<u64> {
        match self.layout {
            MaskLayout::Scattered => scattered_mask(bits, self.seed),
            MaskLayout::Contiguous => contiguous_mask(bits),
        }
    }
}

fn scattered_mask(bits: u32, seed: u64) -> Result<u64> {
    if !(1..=SCATTERED_MASK_WIDTH).contains(&bits) {
        return Err(Error::config(format!(
            "scattered masks hold between 1 and {} one-bits, requested {}",
            SCATTERED_MASK_WIDTH, bits
        )));
    }

    // The top bit is fixed, only the remaining positions are shuffled.
    let mut positions = vec![false; (SCATTERED_MASK_WIDTH - 1) as usize];
    for slot in positions.iter_mut().take((bits - 1) as usize) {
        *slot = true;
    }
    positions.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));

    let mask = positions
        .iter()
        .fold(1u64, |mask, &set| (mask << 1) | u64::from(set));
    Ok(mask)
}

fn contiguous_mask(bits: u32) -> Result<u64> {
    match bits {
        1..=63 => Ok((1u64 << bits) - 1),
        64 => Ok(u64::MAX),
        _ => Err(Error::config(format!(
            "contiguous masks hold between 1 and 64 one-bits, requested {}",
            bits
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(layout: MaskLayout, seed: u64) -> MaskGenerator {
        MaskGenerator::new(8192, 2, seed, layout)
    }

    #[test]
    fn test_effective_bits() {
        assert_eq!(generator(MaskLayout::Contiguous, 0).effective_bits().unwrap(), 13);
        assert_eq!(
            MaskGenerator::new(10_000, 0, 0, MaskLayout::Contiguous)
                .effective_bits()
                .unwrap(),
            13
        );
        assert!(MaskGenerator::new(0, 0, 0, MaskLayout::Contiguous)
            .effective_bits()
            .is_err());
    }

    #[test]
    fn test_contiguous_masks() {
        let masks = generator(MaskLayout::Contiguous, 0);

        // 13 - 2 and 13 + 2 one-bits
        assert_eq!(masks.generate_small_mask().unwrap(), 0b111_1111_1111);
        assert_eq!(masks.generate_large_mask().unwrap(), 0b111_1111_1111_1111);
    }

    #[test]
    fn test_scattered_masks_layout() {
        let masks = generator(MaskLayout::Scattered, DEFAULT_MASK_SEED);
        let small = masks.generate_small_mask().unwrap();
        let large = masks.generate_large_mask().unwrap();

        for (mask, bits) in [(small, 11), (large, 15)] {
            assert_eq!(mask >> (SCATTERED_MASK_WIDTH - 1), 1, "top bit must be set");
            assert_eq!(mask >> SCATTERED_MASK_WIDTH, 0, "mask must fit in 48 bits");
            assert_eq!(mask.count_ones(), bits);
        }
    }

    #[test]
    fn test_scattered_masks_known_values() {
        let masks = generator(MaskLayout::Scattered, DEFAULT_MASK_SEED);
        assert_eq!(masks.generate_small_mask().unwrap(), 0x8074_e204_0400);
        assert_eq!(masks.generate_large_mask().unwrap(), 0x80fc_e204_8500);

        let masks = MaskGenerator::new(4096, 2, DEFAULT_MASK_SEED, MaskLayout::Scattered);
        assert_eq!(masks.generate_small_mask().unwrap(), 0x8074_e204_0000);
        assert_eq!(masks.generate_large_mask().unwrap(), 0x80fc_e204_8400);
    }

    #[test]
    fn test_scattered_masks_are_seeded() {
        let a = generator(MaskLayout::Scattered, 1).generate_large_mask().unwrap();
        let b = generator(MaskLayout::Scattered, 1).generate_large_mask().unwrap();
        let c = generator(MaskLayout::Scattered, 2).generate_large_mask().unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_bit_counts() {
        // 13 - 13 leaves nothing for the small mask
        let masks = MaskGenerator::new(8192, 13, 0, MaskLayout::Contiguous);
        assert!(matches!(masks.generate_small_mask(), Err(Error::Configuration(_))));

        // 13 + 36 exceeds the scattered width
        let masks = MaskGenerator::new(8192, 36, 0, MaskLayout::Scattered);
        assert!(masks.generate_large_mask().is_err());

        // but still fits a contiguous mask
        let masks = MaskGenerator::new(8192, 36, 0, MaskLayout::Contiguous);
        assert_eq!(masks.generate_large_mask().unwrap().count_ones(), 49);
    }
}
