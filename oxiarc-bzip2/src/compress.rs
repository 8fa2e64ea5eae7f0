//! Compression state machine.
//!
//! A block's heavy transforms (RLE-1, block-sort, MTF, group/selector
//! refinement) only make sense as one atomic unit — the sort needs the
//! whole block before it can place a single byte — so [`BzCompressor`]
//! buffers input until a block is full (or the caller finishes the
//! stream), transforms it in one shot, and bit-packs the result into an
//! internal buffer. Only *draining that buffer out to the caller* is
//! incremental: `compress` copies as much of it as the caller's output
//! slice can hold and remembers how far it got, so callers that hand it
//! small output buffers still get a fully resumable `Compressor`.

use crate::bitio::BlockBitWriter;
use crate::bwt;
use crate::crc::{BzCrc32, fold_combined};
use crate::error::Result;
use crate::huffman::{self, HuffmanTable, MAX_ENCODE_LEN, SYMBOLS_PER_GROUP};
use crate::mtf;
use crate::rle;
use crate::{BLOCK_MAGIC, BZIP2_MAGIC, CompressionLevel, EOS_MAGIC, WorkFactor};
use oxiarc_core::traits::{CompressStatus, Compressor, FlushMode};

/// Number of refinement passes run over the group/selector assignment.
const REFINEMENT_PASSES: usize = 4;

/// A resumable bzip2 compressor implementing [`Compressor`].
pub struct BzCompressor {
    level: CompressionLevel,
    work_factor: u32,
    block_buf: Vec<u8>,
    pending: Vec<u8>,
    pending_pos: usize,
    writer: BlockBitWriter,
    combined_crc: u32,
    header_written: bool,
    footer_written: bool,
    bytes_in: u64,
    bytes_out: u64,
}

impl BzCompressor {
    /// Create a new compressor at the given block-size level and work
    /// factor (bzip2's 0..=250 sort-effort knob; see [`WorkFactor`]).
    pub fn new(level: CompressionLevel, work_factor: WorkFactor) -> Self {
        Self {
            level,
            work_factor: work_factor.budget_multiplier(),
            block_buf: Vec::with_capacity(level.block_size()),
            pending: Vec::new(),
            pending_pos: 0,
            writer: BlockBitWriter::new(),
            combined_crc: 0,
            header_written: false,
            footer_written: false,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Total plaintext bytes consumed so far, as 32-bit (high, low) halves
    /// of the 64-bit count, mirroring how libbzip2 reports `total_in`
    /// on its `bz_stream` once a stream finishes.
    pub fn total_in(&self) -> (u32, u32) {
        ((self.bytes_in >> 32) as u32, self.bytes_in as u32)
    }

    /// Total compressed bytes produced so far, as 32-bit (high, low) halves
    /// of the 64-bit count, mirroring libbzip2's `total_out`.
    pub fn total_out(&self) -> (u32, u32) {
        ((self.bytes_out >> 32) as u32, self.bytes_out as u32)
    }

    fn ensure_header(&mut self) {
        if self.header_written {
            return;
        }
        for &b in &BZIP2_MAGIC {
            self.writer.write_bits(&mut self.pending, b as u32, 8);
        }
        self.writer.write_bits(&mut self.pending, b'h' as u32, 8);
        self.writer
            .write_bits(&mut self.pending, (b'0' + self.level.level()) as u32, 8);
        self.header_written = true;
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block_buf.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.block_buf);
        self.block_buf = Vec::with_capacity(self.level.block_size());
        self.write_block(&data)
    }

    fn write_block(&mut self, data: &[u8]) -> Result<()> {
        let block_crc = BzCrc32::compute(data);
        self.combined_crc = fold_combined(self.combined_crc, block_crc);

        let rle1_data = rle::rle1_encode(data);
        let bwt::ForwardResult { bwt, orig_ptr } = bwt::forward(&rle1_data, self.work_factor);

        let mut alphabet: Vec<u8> = bwt.to_vec();
        alphabet.sort_unstable();
        alphabet.dedup();

        let mtf_ranks = mtf::encode(&bwt, &alphabet);
        let zrle = rle::encode_zero_runs(&mtf_ranks);

        let n_in_use = alphabet.len();
        let alpha_size = n_in_use + 2;
        let eob = (alpha_size - 1) as u16;
        let mut symbols = zrle;
        symbols.push(eob);

        let (tables, selectors, n_groups) = build_tables_and_selectors(&symbols, alpha_size);

        for &b in &BLOCK_MAGIC {
            self.writer.write_bits(&mut self.pending, b as u32, 8);
        }
        self.writer.write_bits(&mut self.pending, block_crc, 32);
        self.writer.write_bit(&mut self.pending, 0); // never emit randomized blocks
        self.writer.write_bits(&mut self.pending, orig_ptr, 24);

        write_in_use_map(&mut self.writer, &mut self.pending, &alphabet);

        self.writer
            .write_bits(&mut self.pending, n_groups as u32, 3);
        self.writer
            .write_bits(&mut self.pending, selectors.len() as u32, 15);

        let mtf_selectors = mtf_encode_selectors(&selectors, n_groups);
        for sel in mtf_selectors {
            write_unary(&mut self.writer, &mut self.pending, sel);
        }

        for table in &tables {
            write_table_lengths(&mut self.writer, &mut self.pending, &table.lengths);
        }

        let mut group_idx = 0usize;
        for chunk in symbols.chunks(SYMBOLS_PER_GROUP) {
            let table = &tables[selectors[group_idx] as usize];
            for &sym in chunk {
                let (code, len) = table.get_code(sym);
                self.writer.write_bits(&mut self.pending, code, len);
            }
            group_idx += 1;
        }

        Ok(())
    }

    fn write_footer(&mut self) {
        for &b in &EOS_MAGIC {
            self.writer.write_bits(&mut self.pending, b as u32, 8);
        }
        self.writer
            .write_bits(&mut self.pending, self.combined_crc, 32);
        self.writer.align_to_byte(&mut self.pending);
    }

    fn compact_pending(&mut self) {
        if self.pending_pos == self.pending.len() {
            self.pending.clear();
            self.pending_pos = 0;
        } else if self.pending_pos > 1 << 20 {
            self.pending.drain(0..self.pending_pos);
            self.pending_pos = 0;
        }
    }
}

impl Compressor for BzCompressor {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        self.ensure_header();

        let mut consumed = 0;
        while consumed < input.len() {
            let room = self.level.block_size() - self.block_buf.len();
            let take = room.min(input.len() - consumed);
            self.block_buf
                .extend_from_slice(&input[consumed..consumed + take]);
            consumed += take;
            if self.block_buf.len() == self.level.block_size() {
                self.flush_block()?;
            }
        }

        if consumed == input.len() && !self.footer_written {
            match flush {
                FlushMode::Finish => {
                    self.flush_block()?;
                    self.write_footer();
                    self.footer_written = true;
                }
                FlushMode::Sync | FlushMode::Full => {
                    self.flush_block()?;
                }
                FlushMode::None => {}
            }
        }

        let avail = self.pending.len() - self.pending_pos;
        let to_copy = avail.min(output.len());
        output[..to_copy]
            .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + to_copy]);
        self.pending_pos += to_copy;
        self.compact_pending();

        self.bytes_in += consumed as u64;
        self.bytes_out += to_copy as u64;

        let status = if self.footer_written && self.pending_pos >= self.pending.len() {
            CompressStatus::Done
        } else if to_copy < avail {
            CompressStatus::NeedsOutput
        } else {
            CompressStatus::NeedsInput
        };
        Ok((consumed, to_copy, status))
    }

    fn reset(&mut self) {
        *self = Self::new(self.level, WorkFactor::from_raw(self.work_factor));
    }

    fn is_finished(&self) -> bool {
        self.footer_written && self.pending_pos >= self.pending.len()
    }
}

/// Write the two-level in-use bitmap: a 16-bit map of which 16-byte groups
/// have any member present, followed by one 16-bit per-byte map for each
/// group that does.
fn write_in_use_map(writer: &mut BlockBitWriter, out: &mut Vec<u8>, alphabet: &[u8]) {
    let mut used = [false; 256];
    for &b in alphabet {
        used[b as usize] = true;
    }

    let mut group_map = 0u16;
    for i in 0..16 {
        if used[i * 16..i * 16 + 16].iter().any(|&u| u) {
            group_map |= 1 << (15 - i);
        }
    }
    writer.write_bits(out, group_map as u32, 16);

    for i in 0..16 {
        if (group_map >> (15 - i)) & 1 == 1 {
            let mut bits = 0u16;
            for j in 0..16 {
                if used[i * 16 + j] {
                    bits |= 1 << (15 - j);
                }
            }
            writer.write_bits(out, bits as u32, 16);
        }
    }
}

fn write_unary(writer: &mut BlockBitWriter, out: &mut Vec<u8>, value: u8) {
    for _ in 0..value {
        writer.write_bit(out, 1);
    }
    writer.write_bit(out, 0);
}

fn write_table_lengths(writer: &mut BlockBitWriter, out: &mut Vec<u8>, lengths: &[u8]) {
    let start = lengths.first().copied().unwrap_or(1) as i32;
    writer.write_bits(out, start as u32, 5);
    let mut current = start;
    for &len in lengths {
        let target = len as i32;
        while current != target {
            writer.write_bit(out, 1);
            if target > current {
                writer.write_bit(out, 0);
                current += 1;
            } else {
                writer.write_bit(out, 1);
                current -= 1;
            }
        }
        writer.write_bit(out, 0);
    }
}

/// MTF-encode the per-group table selectors over the list `0..n_groups`:
/// bzip2 transmits selectors through a small MTF pass of their own before
/// the unary coding, since consecutive groups tend to reuse the same
/// table.
fn mtf_encode_selectors(selectors: &[u8], n_groups: usize) -> Vec<u8> {
    let mut order: Vec<u8> = (0..n_groups as u8).collect();
    let mut out = Vec::with_capacity(selectors.len());
    for &s in selectors {
        let pos = order.iter().position(|&x| x == s).expect("selector in range");
        out.push(pos as u8);
        if pos > 0 {
            let v = order.remove(pos);
            order.insert(0, v);
        }
    }
    out
}

/// Choose how many Huffman tables to use, matching bzip2's size bands.
fn choose_num_groups(n_symbols: usize) -> usize {
    match n_symbols {
        0..=199 => 2,
        200..=599 => 3,
        600..=1199 => 4,
        1200..=2399 => 5,
        _ => 6,
    }
}

/// Build the (up to 6) group Huffman tables and the per-50-symbol selector
/// list via iterative refinement: seed each table so it favours a
/// contiguous slice of the alphabet, then repeatedly re-assign every group
/// to its cheapest table and rebuild each table's code lengths from the
/// frequencies that assignment produced.
fn build_tables_and_selectors(symbols: &[u16], alpha_size: usize) -> (Vec<HuffmanTable>, Vec<u8>, usize) {
    let n_groups = choose_num_groups(symbols.len());

    let mut total_freq = vec![0u32; alpha_size];
    for &s in symbols {
        total_freq[s as usize] += 1;
    }

    let mut len_tables: Vec<Vec<u8>> = Vec::with_capacity(n_groups);
    {
        let total: u32 = total_freq.iter().sum::<u32>().max(1);
        let mut remaining = total;
        let mut start = 0usize;
        for t in 0..n_groups {
            let share = remaining / (n_groups - t) as u32;
            let mut acc = 0u32;
            let mut end = start;
            while end < alpha_size && (acc < share || end == start) {
                acc += total_freq[end];
                end += 1;
            }
            if t == n_groups - 1 {
                end = alpha_size;
            }
            let mut lens = vec![15u8; alpha_size];
            for l in lens.iter_mut().take(end).skip(start) {
                *l = 0;
            }
            len_tables.push(lens);
            remaining = remaining.saturating_sub(acc);
            start = end;
        }
    }

    let n_selectors = symbols.len().div_ceil(SYMBOLS_PER_GROUP);
    let mut selectors = vec![0u8; n_selectors];

    for _ in 0..REFINEMENT_PASSES {
        let mut rfreq = vec![vec![0u32; alpha_size]; n_groups];
        for (gi, chunk) in symbols.chunks(SYMBOLS_PER_GROUP).enumerate() {
            let mut best = 0usize;
            let mut best_cost = u32::MAX;
            for (t, lens) in len_tables.iter().enumerate() {
                let cost: u32 = chunk.iter().map(|&s| lens[s as usize] as u32).sum();
                if cost < best_cost {
                    best_cost = cost;
                    best = t;
                }
            }
            selectors[gi] = best as u8;
            for &s in chunk {
                rfreq[best][s as usize] += 1;
            }
        }
        for (t, lens) in len_tables.iter_mut().enumerate() {
            *lens = huffman::build_code_lengths(&rfreq[t], MAX_ENCODE_LEN);
        }
    }

    let tables: Vec<HuffmanTable> = len_tables
        .iter()
        .map(|l| HuffmanTable::from_lengths(l).expect("constructed lengths are always valid"))
        .collect();

    (tables, selectors, n_groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::BzDecompressor;
    use oxiarc_core::traits::{DecompressStatus, Decompressor};

    fn roundtrip(data: &[u8]) {
        let mut enc = BzCompressor::new(CompressionLevel::new(1), WorkFactor::default());
        let compressed = enc.compress_all(data).unwrap();

        let mut dec = BzDecompressor::new(false);
        let decompressed = dec.decompress_all(&compressed).unwrap();
        assert_eq!(decompressed, data, "roundtrip mismatch");
    }

    #[test]
    fn empty_stream_roundtrips() {
        roundtrip(b"");
    }

    #[test]
    fn short_text_roundtrips() {
        roundtrip(b"hello world");
    }

    #[test]
    fn repeated_text_roundtrips() {
        roundtrip(b"aaaaaaaaaabbbbbbbbbbcccccccccc");
    }

    #[test]
    fn mixed_block_roundtrips() {
        let data = b"The quick brown fox jumps over the lazy dog. 0123456789 ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        roundtrip(data);
    }

    #[test]
    fn choose_num_groups_matches_size_bands() {
        assert_eq!(choose_num_groups(0), 2);
        assert_eq!(choose_num_groups(199), 2);
        assert_eq!(choose_num_groups(200), 3);
        assert_eq!(choose_num_groups(2400), 6);
    }

    #[test]
    fn sync_flush_emits_a_partial_block() {
        let mut enc = BzCompressor::new(CompressionLevel::new(9), WorkFactor::default());
        let mut out = [0u8; 4096];
        let (_, produced, status) = enc
            .compress(b"not a full block", &mut out, FlushMode::Sync)
            .unwrap();
        assert!(produced > 0, "FLUSH should emit the partial block's bytes");
        assert_eq!(status, CompressStatus::NeedsInput);
        assert!(!enc.is_finished());

        // The stream isn't finished yet (no end-of-stream marker), so the
        // decoder should decode the flushed block but keep waiting for more.
        let mut dec = BzDecompressor::new(false);
        let mut buf = [0u8; 64];
        let (_, produced, status) = dec.decompress(&out[..produced], &mut buf).unwrap();
        assert_eq!(&buf[..produced], b"not a full block");
        assert_eq!(status, DecompressStatus::NeedsInput);
    }

    #[test]
    fn byte_totals_track_input_and_output() {
        let mut enc = BzCompressor::new(CompressionLevel::new(1), WorkFactor::default());
        let data = b"the quick brown fox jumps over the lazy dog";
        let compressed = enc.compress_all(data).unwrap();

        assert_eq!(enc.total_in(), (0, data.len() as u32));
        assert_eq!(enc.total_out(), (0, compressed.len() as u32));

        let mut dec = BzDecompressor::new(false);
        let decompressed = dec.decompress_all(&compressed).unwrap();

        assert_eq!(dec.total_in(), (0, compressed.len() as u32));
        assert_eq!(dec.total_out(), (0, decompressed.len() as u32));
    }
}
