//! Move-to-Front transform.
//!
//! bzip2 runs MTF over the reduced "used bytes" alphabet recorded in the
//! block header's in-use map, not the full 256-byte alphabet,
//! so symbol values stay small even when the source data only touches a
//! handful of distinct bytes. Any implementation that produces the same
//! output symbol sequence as the canonical front-list walk is acceptable;
//! this one is the straightforward `Vec`-based version, not the
//! 4096-byte working-area bulk-rewind optimization libbzip2 uses.

/// Move every byte in `data` to the front of `alphabet` as it is seen,
/// emitting each byte's rank (position in the current list) in its place.
pub fn encode(data: &[u8], alphabet: &[u8]) -> Vec<u16> {
    let mut list = alphabet.to_vec();
    let mut result = Vec::with_capacity(data.len());
    for &byte in data {
        let pos = list
            .iter()
            .position(|&b| b == byte)
            .expect("byte must be a member of the block's in-use alphabet");
        result.push(pos as u16);
        if pos > 0 {
            let b = list.remove(pos);
            list.insert(0, b);
        }
    }
    result
}

/// Inverse of [`encode`]: recover the original bytes from MTF ranks.
pub fn decode(ranks: &[u16], alphabet: &[u8]) -> Vec<u8> {
    let mut list = alphabet.to_vec();
    let mut result = Vec::with_capacity(ranks.len());
    for &rank in ranks {
        let pos = rank as usize;
        let byte = list[pos];
        result.push(byte);
        if pos > 0 {
            let b = list.remove(pos);
            list.insert(0, b);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_roundtrips() {
        let alphabet: Vec<u8> = (0..=255).collect();
        assert!(encode(b"", &alphabet).is_empty());
        assert!(decode(&[], &alphabet).is_empty());
    }

    #[test]
    fn repeated_byte_collapses_to_zeros_after_first() {
        let alphabet: Vec<u8> = vec![b'a', b'b', b'c'];
        let ranks = encode(b"aaaa", &alphabet);
        assert_eq!(ranks, vec![0, 0, 0, 0]);
    }

    #[test]
    fn roundtrips_over_reduced_alphabet() {
        let cases: [&[u8]; 4] = [b"hello", b"banana", b"abracadabra", b"the quick brown fox"];
        for data in cases {
            let mut seen: Vec<u8> = data.to_vec();
            seen.sort_unstable();
            seen.dedup();
            let ranks = encode(data, &seen);
            let recovered = decode(&ranks, &seen);
            assert_eq!(recovered, data, "failed for {:?}", data);
        }
    }

    #[test]
    fn two_symbol_alphabet_alternating_input() {
        let alphabet = [b'a', b'b'];
        let ranks = encode(b"abab", &alphabet);
        assert_eq!(ranks, vec![0, 1, 1, 1]);
        let recovered = decode(&ranks, &alphabet);
        assert_eq!(recovered, b"abab");
    }
}
