//! Blocking `std::io::{Read, Write}` convenience layer.
//!
//! [`BzCompressor`]/[`BzDecompressor`] expose the resumable, non-blocking
//! contract the rest of the crate is built around; most callers don't need
//! that and would rather hand over a `Write`/`Read` and get ordinary
//! blocking semantics back. [`BzEncoder`] and [`BzDecoder`] are that
//! wrapper, grounded in the same shape the rest of the OxiArc codecs use: a
//! generic `<W: Write>`/`<R: Read>` handle with `new`/`finish`, plus free
//! `compress`/`decompress` functions for the common one-shot case.
//!
//! [`BzDecoder`] defaults to stopping at the first stream's end marker;
//! call [`BzDecoder::multistream`] to instead decode a concatenation of
//! bzip2 streams back-to-back as their joined plaintext, the way `bzcat`
//! handles multi-member files.

use crate::error::{BzError, Result};
use crate::{BzCompressor, BzDecompressor, CompressionLevel, WorkFactor};
use oxiarc_core::OxiArcError;
use oxiarc_core::traits::{CompressStatus, Compressor, FlushMode};
use std::io::{self, Read, Write};

const IO_BUF_SIZE: usize = 64 * 1024;

fn io_err(e: io::Error) -> BzError {
    BzError::Core(OxiArcError::from(e))
}

/// A blocking bzip2 encoder wrapping an underlying [`Write`].
pub struct BzEncoder<W: Write> {
    writer: W,
    inner: BzCompressor,
    out_buf: Box<[u8; IO_BUF_SIZE]>,
}

impl<W: Write> BzEncoder<W> {
    /// Create a new encoder at the given compression level, using the
    /// default work factor.
    pub fn new(writer: W, level: CompressionLevel) -> Self {
        Self::with_work_factor(writer, level, WorkFactor::default())
    }

    /// Create a new encoder with an explicit block-sort work factor.
    pub fn with_work_factor(writer: W, level: CompressionLevel, work_factor: WorkFactor) -> Self {
        Self {
            writer,
            inner: BzCompressor::new(level, work_factor),
            out_buf: Box::new([0u8; IO_BUF_SIZE]),
        }
    }

    /// Feed `data` into the encoder, writing any bytes it produces to the
    /// underlying writer.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let (consumed, produced, _status) =
                self.inner.compress(data, self.out_buf.as_mut_slice(), FlushMode::None)?;
            self.writer.write_all(&self.out_buf[..produced]).map_err(io_err)?;
            data = &data[consumed..];
        }
        self.drain_ready()
    }

    /// Drain whatever compressed output is already sitting in the
    /// compressor's internal buffer (used after `write_all` when the
    /// caller's data was fully consumed but the output buffer wasn't big
    /// enough to hold everything it produced).
    fn drain_ready(&mut self) -> Result<()> {
        loop {
            let (_, produced, status) =
                self.inner.compress(&[], self.out_buf.as_mut_slice(), FlushMode::None)?;
            if produced > 0 {
                self.writer.write_all(&self.out_buf[..produced]).map_err(io_err)?;
            }
            if status != CompressStatus::NeedsOutput {
                return Ok(());
            }
        }
    }

    /// Finish the stream (writing the end-of-stream marker and combined
    /// CRC) and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        loop {
            let (_, produced, status) =
                self.inner.compress(&[], self.out_buf.as_mut_slice(), FlushMode::Finish)?;
            if produced > 0 {
                self.writer.write_all(&self.out_buf[..produced]).map_err(io_err)?;
            }
            if status == CompressStatus::Done {
                break;
            }
        }
        self.writer.flush().map_err(io_err)?;
        Ok(self.writer)
    }
}

/// A blocking bzip2 decoder wrapping an underlying [`Read`].
pub struct BzDecoder<R: Read> {
    reader: R,
    inner: BzDecompressor,
    in_buf: Box<[u8; IO_BUF_SIZE]>,
    multistream: bool,
}

impl<R: Read> BzDecoder<R> {
    /// Create a new decoder using the fast (`tt`-array) inverse BWT mode.
    /// Stops at the first stream's end marker; see [`BzDecoder::multistream`]
    /// to decode a concatenation of streams instead.
    pub fn new(reader: R) -> Self {
        Self::with_small_mode(reader, false)
    }

    /// Create a new decoder, selecting the low-memory inverse BWT mode if
    /// `small` is set.
    pub fn with_small_mode(reader: R, small: bool) -> Self {
        Self {
            reader,
            inner: BzDecompressor::new(small),
            in_buf: Box::new([0u8; IO_BUF_SIZE]),
            multistream: false,
        }
    }

    /// Enable or disable multi-stream mode: once enabled, reaching one
    /// stream's end marker doesn't end the read — any bytes buffered past
    /// it (or anything further read from the source) are fed to a fresh
    /// decompressor as the start of a subsequent concatenated bzip2 stream.
    /// `bzcat`-style concatenation only happens when this is turned on.
    pub fn multistream(mut self, enabled: bool) -> Self {
        self.multistream = enabled;
        self
    }

    /// Read and decompress the whole remaining stream.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let start_len = out.len();
        let mut chunk = vec![0u8; IO_BUF_SIZE];
        loop {
            let produced = self.read(&mut chunk).map_err(io_err)?;
            if produced == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..produced]);
        }
        Ok(out.len() - start_len)
    }
}

/// Feed `data` into `inner` and report how many bytes it produced into
/// `buf`, translating its error type for `Read::read`. A free function so
/// callers can pass disjoint fields of `BzDecoder` (its `inner` and its
/// `in_buf`) without both being borrowed through `self` at once.
fn feed(inner: &mut BzDecompressor, data: &[u8], buf: &mut [u8]) -> io::Result<usize> {
    let (_, produced, _status) = inner.decompress(data, buf).map_err(io::Error::other)?;
    Ok(produced)
}

impl<R: Read> Read for BzDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.inner.is_finished() {
                if !self.multistream {
                    return Ok(0);
                }
                let leftover = self.inner.take_unused();
                self.inner.reset();
                if leftover.is_empty() {
                    let n = self.reader.read(self.in_buf.as_mut_slice())?;
                    if n == 0 {
                        return Ok(0);
                    }
                    let produced = feed(&mut self.inner, &self.in_buf[..n], buf)?;
                    if produced > 0 {
                        return Ok(produced);
                    }
                    continue;
                }
                let produced = feed(&mut self.inner, &leftover, buf)?;
                if produced > 0 {
                    return Ok(produced);
                }
                continue;
            }

            let n = self.reader.read(self.in_buf.as_mut_slice())?;
            let produced = feed(&mut self.inner, &self.in_buf[..n], buf)?;
            if produced > 0 {
                return Ok(produced);
            }
            if !self.inner.is_finished() && n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated bzip2 stream",
                ));
            }
        }
    }
}

/// Compress `data` in one shot and return the compressed bytes.
pub fn compress(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a complete bzip2 stream read from `reader`.
pub fn decompress<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut decoder = BzDecoder::new(reader);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn compress_decompress_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog, repeated for good measure. ".repeat(50);
        let compressed = compress(&data, CompressionLevel::new(3)).unwrap();
        let decompressed = decompress(Cursor::new(compressed)).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn encoder_accepts_multiple_write_all_calls() {
        let mut encoder = BzEncoder::new(Vec::new(), CompressionLevel::new(1));
        encoder.write_all(b"hello, ").unwrap();
        encoder.write_all(b"world!").unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = decompress(Cursor::new(compressed)).unwrap();
        assert_eq!(decompressed, b"hello, world!");
    }

    #[test]
    fn decoder_reports_truncated_stream() {
        let data = b"some data to compress so the stream has a real block in it".repeat(20);
        let compressed = compress(&data, CompressionLevel::new(1)).unwrap();
        let truncated = &compressed[..compressed.len() - 4];

        let mut decoder = BzDecoder::new(Cursor::new(truncated));
        let mut out = Vec::new();
        assert!(decoder.read_to_end(&mut out).is_err());
    }

    #[test]
    fn default_decoder_stops_at_first_stream_end() {
        let a = compress(b"first stream", CompressionLevel::new(1)).unwrap();
        let b = compress(b"second stream", CompressionLevel::new(1)).unwrap();
        let mut joined = a.clone();
        joined.extend_from_slice(&b);

        let mut decoder = BzDecoder::new(Cursor::new(joined));
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"first stream");
    }

    #[test]
    fn multistream_decoder_concatenates_plaintexts() {
        let a = compress(b"first stream, ", CompressionLevel::new(1)).unwrap();
        let b = compress(b"second stream.", CompressionLevel::new(1)).unwrap();
        let mut joined = a.clone();
        joined.extend_from_slice(&b);

        let mut decoder = BzDecoder::new(Cursor::new(joined)).multistream(true);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"first stream, second stream.");
    }
}
