//! Run-length encoding stages.
//!
//! bzip2 uses two distinct RLE passes: the initial pass (RLE-1) collapses
//! runs of 4+ identical input bytes before the block-sort stage ever sees
//! them (keeping pathological runs from dominating the sort), and the
//! post-MTF pass folds runs of the zero symbol into single RUNA/RUNB
//! tokens in bijective base-2, since MTF output is dominated by zeros.

use crate::error::{BzError, Result};

/// Encode `data` with the initial RLE pass: any run of 4 or more identical
/// bytes becomes the 4 literal bytes followed by a count byte (0..=251)
/// giving the number of *additional* repeats beyond the 4 already written.
pub fn rle1_encode(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let mut run_len = 1usize;
        while i + run_len < data.len() && data[i + run_len] == byte && run_len < 255 {
            run_len += 1;
        }

        if run_len >= 4 {
            result.extend_from_slice(&[byte, byte, byte, byte]);
            let extra = (run_len - 4).min(251) as u8;
            result.push(extra);
            i += 4 + extra as usize;
        } else {
            for _ in 0..run_len {
                result.push(byte);
            }
            i += run_len;
        }
    }
    result
}

/// Inverse of [`rle1_encode`]. Any run of 4 identical bytes in the encoded
/// stream is necessarily one the encoder compacted (it never emits an
/// uncompacted run of 4+), so it is always immediately followed by a count
/// byte.
pub fn rle1_decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        result.push(byte);
        i += 1;

        if i + 2 < data.len() && data[i] == byte && data[i + 1] == byte && data[i + 2] == byte {
            result.extend_from_slice(&[byte, byte, byte]);
            i += 3;
            let count = *data
                .get(i)
                .ok_or_else(|| BzError::data_error("truncated RLE-1 run count"))?
                as usize;
            result.resize(result.len() + count, byte);
            i += 1;
        }
    }
    Ok(result)
}

/// Encode post-MTF ranks, folding runs of rank `0` into RUNA (`0`) / RUNB
/// (`1`) tokens in bijective base-2. Every MTF alphabet is already dense
/// (ranks `0..nInUse`), so a non-zero rank `r` needs no further remapping
/// beyond shifting past the two reserved run symbols: wire symbol `r + 1`.
/// The values `0`/`1` never collide with a shifted rank since rank `0`
/// never reaches this branch — it is always consumed by the run-length
/// loop above.
pub fn encode_zero_runs(ranks: &[u16]) -> Vec<u16> {
    let mut result = Vec::with_capacity(ranks.len());
    let mut i = 0;
    while i < ranks.len() {
        if ranks[i] == 0 {
            let mut count = 0usize;
            while i < ranks.len() && ranks[i] == 0 {
                count += 1;
                i += 1;
            }
            let mut n = count;
            while n > 0 {
                if n & 1 == 1 {
                    result.push(0); // RUNA
                } else {
                    result.push(1); // RUNB
                }
                n = (n - 1) >> 1;
            }
        } else {
            result.push(ranks[i] + 1);
            i += 1;
        }
    }
    result
}

/// Inverse of [`encode_zero_runs`]. `symbols` should already have the
/// end-of-block symbol stripped off by the caller (the Huffman decode loop
/// is what recognises it).
pub fn decode_zero_runs(symbols: &[u16]) -> Vec<u16> {
    let mut result = Vec::with_capacity(symbols.len());
    let mut i = 0;
    while i < symbols.len() {
        let sym = symbols[i];
        if sym == 0 || sym == 1 {
            let mut power = 1usize;
            let mut count = 0usize;
            while i < symbols.len() && (symbols[i] == 0 || symbols[i] == 1) {
                count += if symbols[i] == 0 { power } else { 2 * power };
                power *= 2;
                i += 1;
            }
            result.resize(result.len() + count, 0);
        } else {
            result.push(sym - 1);
            i += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle1_passes_through_short_runs() {
        let data = b"abcdef";
        let encoded = rle1_encode(data);
        assert_eq!(encoded, data.as_slice());
        assert_eq!(rle1_decode(&encoded).unwrap(), data.as_slice());
    }

    #[test]
    fn rle1_compacts_runs_of_four_or_more() {
        let data = b"aabbbcccc";
        let encoded = rle1_encode(data);
        assert_eq!(&encoded[..5], b"aabbb");
        assert_eq!(&encoded[5..], &[b'c', b'c', b'c', b'c', 0]);
        assert_eq!(rle1_decode(&encoded).unwrap(), data.as_slice());
    }

    #[test]
    fn rle1_roundtrips_long_runs() {
        let data = b"aaaaaabbbbbbbbccccccccccc";
        let encoded = rle1_encode(data);
        assert_eq!(rle1_decode(&encoded).unwrap(), data.as_slice());
    }

    #[test]
    fn rle1_roundtrips_run_capped_at_255_bytes() {
        let data = vec![b'z'; 1000];
        let encoded = rle1_encode(&data);
        assert_eq!(rle1_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn zero_run_bijective_base2_encoding() {
        assert_eq!(encode_zero_runs(&[0]), vec![0]); // RUNA
        assert_eq!(encode_zero_runs(&[0, 0]), vec![1]); // RUNB
        assert_eq!(encode_zero_runs(&[0, 0, 0]), vec![0, 0]); // RUNA RUNA
    }

    #[test]
    fn zero_run_roundtrips_over_dense_mtf_ranks() {
        let ranks = vec![0u16, 0, 0, 1, 0, 0, 2, 0, 0, 0, 0, 0];
        let encoded = encode_zero_runs(&ranks);
        let decoded = decode_zero_runs(&encoded);
        assert_eq!(decoded, ranks);
    }
}
