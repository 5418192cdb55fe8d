//! Configuration options for the sdx engine.

use crate::value::SpecialValues;
use serde::{Deserialize, Serialize};

/// Default stream block size (32KB).
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Smallest accepted stream block size.
pub const MIN_BLOCK_SIZE: usize = 512;

/// Largest accepted stream block size.
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Configuration options for opening a write session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Block codec for the stream.
    /// Default: CompressionType::Deflate
    pub compression: CompressionType,

    /// Deflate level (0..=9). Ignored by the other codecs.
    /// Default: 6
    pub compression_level: u32,

    /// Size of the stream buffer, which is also the compression unit (in bytes).
    /// Default: 32KB
    pub block_size: usize,

    /// Reject records that do not sort strictly after their predecessor.
    /// When false, records are sorted before they are flushed.
    /// Default: true
    pub strict_order: bool,

    /// Compare labels without regard to ASCII case.
    /// Default: false
    pub case_insensitive_labels: bool,

    /// Audit string recorded in the file header.
    /// Default: "sdx <version>"
    pub producer: String,

    /// Doubles that are stored as special-value tags.
    /// Not part of the JSON form, since it holds infinities.
    #[serde(skip)]
    pub special_values: SpecialValues,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compression: CompressionType::Deflate,
            compression_level: 6,
            block_size: DEFAULT_BLOCK_SIZE,
            strict_order: true,
            case_insensitive_labels: false,
            producer: format!("sdx {}", env!("CARGO_PKG_VERSION")),
            special_values: SpecialValues::default(),
        }
    }
}

/// Block codecs supported by sdx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    None = 0,

    /// zlib/deflate compression (good ratio, moderate speed).
    Deflate = 1,

    /// Snappy compression (fast, moderate compression ratio).
    #[cfg(feature = "snappy")]
    Snappy = 2,

    /// LZ4 compression (very fast, lower compression ratio).
    #[cfg(feature = "lz4-compression")]
    Lz4 = 3,
}

impl CompressionType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Deflate),
            #[cfg(feature = "snappy")]
            2 => Some(CompressionType::Snappy),
            #[cfg(feature = "lz4-compression")]
            3 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Returns true unless this is `CompressionType::None`.
    pub fn is_compressed(self) -> bool {
        self != CompressionType::None
    }
}

impl Default for CompressionType {
    fn default() -> Self {
        CompressionType::Deflate
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block codec.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the deflate level.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the stream block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Enables or disables strict monotonic record order.
    pub fn strict_order(mut self, value: bool) -> Self {
        self.strict_order = value;
        self
    }

    /// Selects the case-insensitive label table.
    pub fn case_insensitive_labels(mut self, value: bool) -> Self {
        self.case_insensitive_labels = value;
        self
    }

    /// Sets the producer string stored in the header.
    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Replaces the special-value table.
    pub fn special_values(mut self, values: SpecialValues) -> Self {
        self.special_values = values;
        self
    }

    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let options: Options = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            return Err(crate::Error::invalid_argument(format!(
                "block_size must be between {} and {}",
                MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if self.compression_level > 9 {
            return Err(crate::Error::invalid_argument("compression_level must be <= 9"));
        }
        if self.producer.len() > u16::MAX as usize {
            return Err(crate::Error::invalid_argument("producer string too long"));
        }
        self.special_values.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.compression, CompressionType::Deflate);
        assert_eq!(opts.block_size, 32 * 1024);
        assert!(opts.strict_order);
        assert!(!opts.case_insensitive_labels);
        assert!(opts.producer.starts_with("sdx "));
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new()
            .compression(CompressionType::None)
            .block_size(4096)
            .strict_order(false)
            .producer("unit test");

        assert_eq!(opts.compression, CompressionType::None);
        assert_eq!(opts.block_size, 4096);
        assert!(!opts.strict_order);
        assert_eq!(opts.producer, "unit test");
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.block_size = 16;
        assert!(opts.validate().is_err());

        opts.block_size = 4096;
        opts.compression_level = 12;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_options_from_json() {
        let opts = Options::from_json(r#"{"compression":"None","block_size":1024}"#).unwrap();
        assert_eq!(opts.compression, CompressionType::None);
        assert_eq!(opts.block_size, 1024);
        assert!(opts.strict_order);

        assert!(Options::from_json(r#"{"block_size":3}"#).is_err());
        assert!(matches!(
            Options::from_json("not json"),
            Err(crate::Error::Serialization(_))
        ));
    }

    #[test]
    fn test_compression_tag() {
        assert_eq!(CompressionType::from_u8(0), Some(CompressionType::None));
        assert_eq!(CompressionType::from_u8(1), Some(CompressionType::Deflate));
        assert_eq!(CompressionType::from_u8(200), None);
        assert!(!CompressionType::None.is_compressed());
    }
}
