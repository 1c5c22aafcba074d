use crate::chunking::{
    Chunker, DEFAULT_MASK_SEED, Detector, DigestAlgorithm, FixedSizeDetector, GearDetector,
    GearTable, MaskGenerator, MaskLayout, Roll,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default expected chunk size, 8 KiB.
pub const DEFAULT_EXPECTED_CHUNK_SIZE: u32 = 8 * 1024;
/// Default factor applied to the expected size to get the minimum size.
pub const DEFAULT_MIN_SIZE_FACTOR: f64 = 0.25;
/// Default factor applied to the expected size to get the maximum size.
pub const DEFAULT_MAX_SIZE_FACTOR: f64 = 8.0;
/// Default normalization level.
pub const DEFAULT_NORMALIZATION_LEVEL: u32 = 2;

/// Boundary detection algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// Gear hash shifted left per byte, as in the FastCDC paper.
    #[default]
    FastCdc,
    /// Gear hash shifted right per byte.
    FastCdcRightShift,
    /// Cuts every `expected_chunk_size` bytes regardless of content.
    FixedSize,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::FastCdc => "fast_cdc",
            Algorithm::FastCdcRightShift => "fast_cdc_right_shift",
            Algorithm::FixedSize => "fixed_size",
        })
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fast_cdc" | "fastcdc" => Ok(Algorithm::FastCdc),
            "fast_cdc_right_shift" | "fastcdc_right_shift" => Ok(Algorithm::FastCdcRightShift),
            "fixed_size" | "fsc" => Ok(Algorithm::FixedSize),
            _ => Err(Error::config(format!("unknown chunking algorithm: {s}"))),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.to_string()
    }
}

/// Chunker configuration.
///
/// Plain data, checked as a whole by [`ChunkerConfig::build`]; a `Chunker` can only be
/// obtained from a configuration that passed every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkerConfig {
    pub algorithm: Algorithm,
    /// Expected chunk size in bytes (the fixed size for `Algorithm::FixedSize`).
    pub expected_chunk_size: u32,
    pub min_size_factor: f64,
    pub max_size_factor: f64,
    pub gear_table: GearTable,
    pub mask_layout: MaskLayout,
    pub normalization_level: u32,
    pub mask_seed: u64,
    pub digest: DigestAlgorithm,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            expected_chunk_size: DEFAULT_EXPECTED_CHUNK_SIZE,
            min_size_factor: DEFAULT_MIN_SIZE_FACTOR,
            max_size_factor: DEFAULT_MAX_SIZE_FACTOR,
            gear_table: GearTable::default(),
            mask_layout: MaskLayout::default(),
            normalization_level: DEFAULT_NORMALIZATION_LEVEL,
            mask_seed: DEFAULT_MASK_SEED,
            digest: DigestAlgorithm::default(),
        }
    }
}

impl ChunkerConfig {
    /// Parses a configuration from TOML; missing keys keep their defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Minimum chunk size derived from the expected size.
    pub fn min_size(&self) -> Result<usize> {
        if self.min_size_factor.is_nan() || self.min_size_factor <= 0.0 || self.min_size_factor > 1.0 {
            return Err(Error::config(format!(
                "min_size_factor must be in (0, 1], was: {}",
                self.min_size_factor
            )));
        }
        Ok((f64::from(self.expected_chunk_size) * self.min_size_factor) as usize)
    }

    /// Maximum chunk size derived from the expected size.
    pub fn max_size(&self) -> Result<usize> {
        if self.max_size_factor.is_nan() || self.max_size_factor < 1.0 {
            return Err(Error::config(format!(
                "max_size_factor must be at least 1, was: {}",
                self.max_size_factor
            )));
        }

        let max_size = (f64::from(self.expected_chunk_size) * self.max_size_factor).ceil();
        if max_size > f64::from(u32::MAX) {
            return Err(Error::config(format!(
                "max chunk size must fit in 32 bits, was: {max_size}"
            )));
        }
        Ok(max_size as usize)
    }

    /// The pair of masks used by the gear detectors.
    pub fn masks(&self) -> Result<(u64, u64)> {
        let generator = MaskGenerator::new(
            self.expected_chunk_size,
            self.normalization_level,
            self.mask_seed,
            self.mask_layout,
        );
        Ok((generator.generate_small_mask()?, generator.generate_large_mask()?))
    }

    /// Builds the detector selected by `algorithm`.
    pub fn detector(&self) -> Result<Detector> {
        if self.expected_chunk_size == 0 {
            return Err(Error::config("expected chunk size must be positive"));
        }

        match self.algorithm {
            Algorithm::FastCdc => Ok(Detector::FastCdc(self.gear_detector()?)),
            Algorithm::FastCdcRightShift => Ok(Detector::FastCdcRightShift(self.gear_detector()?)),
            Algorithm::FixedSize => Ok(Detector::FixedSize(FixedSizeDetector::new(
                self.expected_chunk_size as usize,
            )?)),
        }
    }

    fn gear_detector<S: Roll>(&self) -> Result<GearDetector<S>> {
        let (mask_s, mask_l) = self.masks()?;
        GearDetector::new(
            self.min_size()?,
            self.expected_chunk_size as usize,
            self.max_size()?,
            self.gear_table.resolve()?,
            mask_s,
            mask_l,
        )
    }

    /// Validates the configuration and builds a `Chunker` from it.
    pub fn build(&self) -> Result<Chunker> {
        Chunker::new(self)
    }
}
