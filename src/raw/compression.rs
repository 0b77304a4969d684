//! Compression dispatch for raw source files: inference from file extension plus
//! a uniform `Read` wrapper regardless of codec.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;

use crate::error::{Error, Result};

/// The compression codec applied to a raw source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Infer from the file extension at open time (`.gz`, `.bz2`, `.zst`, else none).
    Auto,
    /// No compression.
    None,
    /// gzip (`.gz`).
    Gzip,
    /// bzip2 (`.bz2`).
    Bzip2,
    /// Zstandard (`.zst`).
    Zstd,
}

impl Compression {
    /// Infers a codec from `path`'s extension, defaulting to [`Compression::None`].
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Self::Gzip,
            Some("bz2") => Self::Bzip2,
            Some("zst") => Self::Zstd,
            _ => Self::None,
        }
    }

    /// Wraps `inner` in the appropriate decompressing reader. [`Compression::Auto`]
    /// is not valid here; callers must resolve it via [`Compression::infer`] first.
    pub fn wrap(self, inner: Box<dyn Read + Send>) -> Result<Box<dyn Read + Send>> {
        match self {
            Self::Auto => Err(Error::parse("compression", "Auto must be resolved via infer() before wrapping")),
            Self::None => Ok(inner),
            Self::Gzip => Ok(Box::new(GzDecoder::new(inner))),
            Self::Bzip2 => Ok(Box::new(BzDecoder::new(inner))),
            Self::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(inner)
                    .map_err(|e| Error::parse("compression", format!("invalid zstd stream: {e}")))?;
                Ok(Box::new(decoder))
            }
        }
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            "zstd" | "zst" => Ok(Self::Zstd),
            other => Err(Error::parse("compression", format!("unknown compression `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("data.csv.gz", Compression::Gzip)]
    #[case("data.csv.bz2", Compression::Bzip2)]
    #[case("data.csv.zst", Compression::Zstd)]
    #[case("data.csv", Compression::None)]
    fn infer_matches_extension(#[case] name: &str, #[case] expected: Compression) {
        assert_eq!(Compression::infer(Path::new(name)), expected);
    }

    #[test]
    fn from_str_accepts_both_long_and_short_names() {
        assert_eq!(Compression::from_str("gzip").unwrap(), Compression::Gzip);
        assert_eq!(Compression::from_str("gz").unwrap(), Compression::Gzip);
        assert!(Compression::from_str("lz4").is_err());
    }
}
