//! Decompression state machine.
//!
//! Like the compressor, the heavy transforms (inverse BWT in particular)
//! only make sense once a whole block's Huffman-coded symbol stream has
//! been read, so [`BzDecompressor`] tries to decode one whole block at a
//! time: it buffers every byte it's fed into `input_buf`, and on each call
//! attempts to advance as far as the buffered bytes allow. If a block (or
//! the stream header, or the end-of-stream marker) can't be fully read
//! with what's currently buffered, the bit-level cursor is rolled back to
//! where that attempt started and the call reports `NeedsInput` — the
//! next call with more bytes appended retries the exact same unit from
//! scratch. Once a block does decode, its output bytes queue up in
//! `pending` and drain out to the caller's buffer incrementally, so an
//! undersized `output` slice never loses state either.

use crate::bitio::BlockBitReader;
use crate::bwt;
use crate::crc::{BzCrc32, fold_combined};
use crate::error::{BzError, Result};
use crate::huffman::{HuffmanTable, MAX_DECODE_LEN, MAX_TABLES, SYMBOLS_PER_GROUP};
use crate::mtf;
use crate::randomize;
use crate::rle;
use crate::{BLOCK_MAGIC, BZIP2_MAGIC, EOS_MAGIC};
use oxiarc_core::traits::{DecompressStatus, Decompressor};

/// Unwraps an `Option` produced while reading bits, propagating "not
/// enough input yet" as `Ok(None)` from the enclosing
/// `Result<Option<_>>`-returning function.
macro_rules! bit {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => return Ok(None),
        }
    };
}

/// A resumable bzip2 decompressor implementing [`Decompressor`].
pub struct BzDecompressor {
    /// Use the low-memory `ll16`/`ll4` inverse-BWT representation.
    small: bool,
    input_buf: Vec<u8>,
    byte_pos: usize,
    bit_reader: BlockBitReader,
    pending: Vec<u8>,
    pending_pos: usize,
    combined_crc: u32,
    header_parsed: bool,
    finished: bool,
    bytes_in: u64,
    bytes_out: u64,
}

impl BzDecompressor {
    /// Create a new decompressor. `small` selects the low-memory inverse
    /// BWT mode over the faster flat-array one; both produce identical
    /// output.
    pub fn new(small: bool) -> Self {
        Self {
            small,
            input_buf: Vec::new(),
            byte_pos: 0,
            bit_reader: BlockBitReader::new(),
            pending: Vec::new(),
            pending_pos: 0,
            combined_crc: 0,
            header_parsed: false,
            finished: false,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Total compressed bytes consumed so far, as 32-bit (high, low) halves
    /// of the 64-bit count, mirroring libbzip2's `total_in`.
    pub fn total_in(&self) -> (u32, u32) {
        ((self.bytes_in >> 32) as u32, self.bytes_in as u32)
    }

    /// Total plaintext bytes produced so far, as 32-bit (high, low) halves
    /// of the 64-bit count, mirroring libbzip2's `total_out`.
    pub fn total_out(&self) -> (u32, u32) {
        ((self.bytes_out >> 32) as u32, self.bytes_out as u32)
    }

    /// Try to consume the next unit (stream header, one block, or the
    /// end-of-stream marker) from currently buffered input. Returns
    /// `Ok(true)` if a unit was consumed, `Ok(false)` if not enough input
    /// is buffered yet (in which case no state was actually advanced).
    fn try_advance(&mut self) -> Result<bool> {
        let snapshot_reader = self.bit_reader.clone();
        let snapshot_pos = self.byte_pos;
        match self.try_advance_inner() {
            Ok(Some(())) => Ok(true),
            Ok(None) => {
                self.bit_reader = snapshot_reader;
                self.byte_pos = snapshot_pos;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn try_advance_inner(&mut self) -> Result<Option<()>> {
        if !self.header_parsed {
            let header = bit!(read_bytes::<4>(
                &self.input_buf,
                &mut self.bit_reader,
                &mut self.byte_pos
            )?);
            if header[0] != BZIP2_MAGIC[0]
                || header[1] != BZIP2_MAGIC[1]
                || header[2] != b'h'
                || !(b'1'..=b'9').contains(&header[3])
            {
                return Err(BzError::DataErrorMagic);
            }
            self.header_parsed = true;
            return Ok(Some(()));
        }

        let magic = bit!(read_bytes::<6>(
            &self.input_buf,
            &mut self.bit_reader,
            &mut self.byte_pos
        )?);
        if magic == EOS_MAGIC {
            let stored_crc = bit!(self.bit_reader.read_bits(&self.input_buf, &mut self.byte_pos, 32));
            if stored_crc != self.combined_crc {
                return Err(BzError::data_error("combined stream CRC mismatch"));
            }
            self.finished = true;
            return Ok(Some(()));
        }
        if magic != BLOCK_MAGIC {
            return Err(BzError::data_error("bad block magic"));
        }
        self.parse_block_body()
    }

    fn parse_block_body(&mut self) -> Result<Option<()>> {
        let block_crc = bit!(self.bit_reader.read_bits(&self.input_buf, &mut self.byte_pos, 32));
        let randomized =
            bit!(self.bit_reader.read_bit(&self.input_buf, &mut self.byte_pos)) == 1;
        let orig_ptr = bit!(self.bit_reader.read_bits(&self.input_buf, &mut self.byte_pos, 24));

        let alphabet = bit!(read_alphabet(&self.input_buf, &mut self.bit_reader, &mut self.byte_pos)?);
        if alphabet.is_empty() {
            return Err(BzError::data_error("block has an empty in-use map"));
        }
        let alpha_size = alphabet.len() + 2;
        let eob = (alpha_size - 1) as u16;

        let n_groups =
            bit!(self.bit_reader.read_bits(&self.input_buf, &mut self.byte_pos, 3)) as usize;
        if !(2..=MAX_TABLES).contains(&n_groups) {
            return Err(BzError::data_error("invalid Huffman table count"));
        }
        let n_selectors =
            bit!(self.bit_reader.read_bits(&self.input_buf, &mut self.byte_pos, 15)) as usize;

        let mut mtf_selectors = Vec::with_capacity(n_selectors);
        for _ in 0..n_selectors {
            let v = bit!(read_unary(&self.input_buf, &mut self.bit_reader, &mut self.byte_pos)?);
            if v as usize >= n_groups {
                return Err(BzError::data_error("selector out of range"));
            }
            mtf_selectors.push(v);
        }
        let selectors = mtf_decode_selectors(&mtf_selectors, n_groups);

        let mut tables = Vec::with_capacity(n_groups);
        for _ in 0..n_groups {
            let lengths = bit!(read_table_lengths(
                &self.input_buf,
                &mut self.bit_reader,
                &mut self.byte_pos,
                alpha_size
            )?);
            tables.push(HuffmanTable::from_lengths(&lengths)?);
        }

        let mut symbols = Vec::new();
        let mut group_idx = 0usize;
        let mut in_group = 0usize;
        loop {
            if group_idx >= selectors.len() {
                return Err(BzError::data_error(
                    "symbol stream ran past its selector list without an end-of-block symbol",
                ));
            }
            let table = &tables[selectors[group_idx] as usize];
            let sym = bit!(table.decode(&mut self.bit_reader, &self.input_buf, &mut self.byte_pos)?);
            if sym == eob {
                break;
            }
            symbols.push(sym);
            in_group += 1;
            if in_group == SYMBOLS_PER_GROUP {
                in_group = 0;
                group_idx += 1;
            }
        }

        let mtf_ranks = rle::decode_zero_runs(&symbols);
        let bwt_bytes = mtf::decode(&mtf_ranks, &alphabet);
        let mut pre_rle1 = bwt::inverse(&bwt_bytes, orig_ptr, self.small);
        if randomized {
            randomize::derandomize(&mut pre_rle1);
        }
        let block_data = rle::rle1_decode(&pre_rle1)?;

        let computed_crc = BzCrc32::compute(&block_data);
        if computed_crc != block_crc {
            return Err(BzError::data_error("block CRC mismatch"));
        }
        self.combined_crc = fold_combined(self.combined_crc, block_crc);
        self.pending.extend_from_slice(&block_data);

        Ok(Some(()))
    }

    /// Once finished, returns (and clears) any buffered bytes that arrived
    /// after this stream's end marker — the start of a subsequent
    /// concatenated stream, for callers implementing multi-stream decoding.
    /// Returns an empty vector if the decompressor isn't finished yet.
    pub fn take_unused(&mut self) -> Vec<u8> {
        if !self.finished {
            return Vec::new();
        }
        let unused = self.input_buf[self.byte_pos..].to_vec();
        self.byte_pos = self.input_buf.len();
        unused
    }

    fn compact_input(&mut self) {
        if self.byte_pos > 0 {
            self.input_buf.drain(0..self.byte_pos);
            self.byte_pos = 0;
        }
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

impl Decompressor for BzDecompressor {
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)> {
        self.input_buf.extend_from_slice(input);
        let consumed = input.len();

        while !self.finished && self.try_advance()? {}
        self.compact_input();

        let avail = self.pending.len() - self.pending_pos;
        let to_copy = avail.min(output.len());
        output[..to_copy]
            .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + to_copy]);
        self.pending_pos += to_copy;
        self.compact_pending();

        self.bytes_in += consumed as u64;
        self.bytes_out += to_copy as u64;

        let status = if self.finished && self.pending_pos >= self.pending.len() {
            DecompressStatus::Done
        } else if to_copy < avail {
            DecompressStatus::NeedsOutput
        } else {
            DecompressStatus::NeedsInput
        };
        Ok((consumed, to_copy, status))
    }

    fn reset(&mut self) {
        *self = Self::new(self.small);
    }

    fn is_finished(&self) -> bool {
        self.finished && self.pending_pos >= self.pending.len()
    }
}

fn read_bytes<const N: usize>(
    buf: &[u8],
    reader: &mut BlockBitReader,
    pos: &mut usize,
) -> Result<Option<[u8; N]>> {
    let mut out = [0u8; N];
    for slot in out.iter_mut() {
        *slot = bit!(reader.read_bits(buf, pos, 8)) as u8;
    }
    Ok(Some(out))
}

fn read_unary(buf: &[u8], reader: &mut BlockBitReader, pos: &mut usize) -> Result<Option<u8>> {
    let mut count = 0u8;
    loop {
        let b = bit!(reader.read_bit(buf, pos));
        if b == 0 {
            return Ok(Some(count));
        }
        count = count.saturating_add(1);
    }
}

/// Read the two-level in-use bitmap and return the dense alphabet of bytes
/// actually present in the block.
fn read_alphabet(
    buf: &[u8],
    reader: &mut BlockBitReader,
    pos: &mut usize,
) -> Result<Option<Vec<u8>>> {
    let group_map = bit!(reader.read_bits(buf, pos, 16)) as u16;
    let mut used = [false; 256];
    for i in 0..16 {
        if (group_map >> (15 - i)) & 1 == 1 {
            let bits = bit!(reader.read_bits(buf, pos, 16)) as u16;
            for j in 0..16 {
                if (bits >> (15 - j)) & 1 == 1 {
                    used[i * 16 + j] = true;
                }
            }
        }
    }
    Ok(Some(
        (0..256u16).filter(|&b| used[b as usize]).map(|b| b as u8).collect(),
    ))
}

fn read_table_lengths(
    buf: &[u8],
    reader: &mut BlockBitReader,
    pos: &mut usize,
    alpha_size: usize,
) -> Result<Option<Vec<u8>>> {
    let mut current = bit!(reader.read_bits(buf, pos, 5)) as i32;
    let mut lengths = Vec::with_capacity(alpha_size);
    for _ in 0..alpha_size {
        loop {
            let continue_bit = bit!(reader.read_bit(buf, pos));
            if continue_bit == 0 {
                break;
            }
            let direction_bit = bit!(reader.read_bit(buf, pos));
            if direction_bit == 0 {
                current += 1;
            } else {
                current -= 1;
            }
        }
        if !(1..=MAX_DECODE_LEN as i32).contains(&current) {
            return Err(BzError::data_error("Huffman code length out of range"));
        }
        lengths.push(current as u8);
    }
    Ok(Some(lengths))
}

/// Inverse of the encoder's selector MTF pass.
fn mtf_decode_selectors(mtf_selectors: &[u8], n_groups: usize) -> Vec<u8> {
    let mut order: Vec<u8> = (0..n_groups as u8).collect();
    let mut out = Vec::with_capacity(mtf_selectors.len());
    for &j in mtf_selectors {
        let v = order[j as usize];
        out.push(v);
        if j > 0 {
            let moved = order.remove(j as usize);
            order.insert(0, moved);
        }
    }
    out
}
