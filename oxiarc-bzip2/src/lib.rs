//! BZip2 compression/decompression for OxiArc.
//!
//! A pure Rust implementation of the bzip2 block-sorting compression
//! format. The pipeline, block by block:
//!
//! 1. RLE-1 — collapse runs of 4+ identical bytes before block-sort ever
//!    sees them.
//! 2. Burrows-Wheeler Transform — sort every cyclic rotation of the block.
//! 3. Move-to-Front — turn the sorted output's local repetition into small
//!    numbers.
//! 4. Zero-run RLE — fold MTF's runs of zero into RUNA/RUNB tokens.
//! 5. Canonical Huffman coding, switching between up to six tables every
//!    50 symbols.
//!
//! [`BzCompressor`] and [`BzDecompressor`] expose this as a resumable,
//! non-blocking [`oxiarc_core::traits::Compressor`] /
//! [`oxiarc_core::traits::Decompressor`] pair; [`io::BzEncoder`] and
//! [`io::BzDecoder`] wrap them in a blocking `std::io::{Read, Write}`
//! convenience layer for callers that don't need to drive the state
//! machine by hand.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitio;
pub mod bwt;
mod compress;
pub mod crc;
mod decompress;
pub mod error;
pub mod huffman;
pub mod io;
pub mod mtf;
pub mod randomize;
pub mod rle;

pub use compress::BzCompressor;
pub use decompress::BzDecompressor;
pub use error::{BzError, Result};
pub use io::{BzDecoder, BzEncoder};

/// BZip2 magic bytes ("BZ").
pub const BZIP2_MAGIC: [u8; 2] = [0x42, 0x5A];

/// Block header magic bytes (0x314159265359).
pub const BLOCK_MAGIC: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];

/// End of stream magic bytes (0x177245385090).
pub const EOS_MAGIC: [u8; 6] = [0x17, 0x72, 0x45, 0x38, 0x50, 0x90];

/// Maximum block size (900k).
pub const MAX_BLOCK_SIZE: usize = 900_000;

/// Compression level (1-9, where 9 = 900k block size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Create a new compression level (clamped to 1-9).
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 9))
    }

    /// Get the block size for this level.
    pub fn block_size(&self) -> usize {
        self.0 as usize * 100_000
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(9)
    }
}

/// bzip2's sort-effort knob (`-w`/`workFactor`, 0..=250). Higher values let
/// the block-sort engine spend more comparisons trying the ordinary
/// quicksort before falling back to the guaranteed-terminating suffix sort;
/// `0` selects the library default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkFactor(u32);

impl WorkFactor {
    /// Create a work factor from a raw `0..=250` value, clamping anything
    /// larger. `0` means "use the default".
    pub fn new(raw: u32) -> Self {
        Self(raw.min(250))
    }

    /// Same as [`WorkFactor::new`]; used when reconstructing a `WorkFactor`
    /// from the multiplier already stored on a handle.
    pub fn from_raw(raw: u32) -> Self {
        Self::new(raw)
    }

    /// The comparison-budget multiplier the block-sort engine should use.
    pub fn budget_multiplier(&self) -> u32 {
        if self.0 == 0 {
            bwt::DEFAULT_WORK_FACTOR
        } else {
            self.0
        }
    }
}

impl Default for WorkFactor {
    fn default() -> Self {
        Self(0)
    }
}
