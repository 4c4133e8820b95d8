// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Pre-authentication encoding (PASETO style).
//!
//! Binds a sequence of byte strings unambiguously into a single MAC input:
//! a little-endian u64 piece count, then for each piece a little-endian u64
//! length followed by the bytes. Distinct piece tuples always yield distinct
//! encodings.

/// Encode `pieces` into one unambiguous byte string.
pub fn pae(pieces: &[&[u8]]) -> Vec<u8> {
    let total: usize = pieces.iter().map(|p| 8 + p.len()).sum();
    let mut out = Vec::with_capacity(8 + total);
    out.extend_from_slice(&(pieces.len() as u64).to_le_bytes());
    for piece in pieces {
        out.extend_from_slice(&(piece.len() as u64).to_le_bytes());
        out.extend_from_slice(piece);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::pae;

    #[test]
    fn known_vectors() {
        assert_eq!(hex::encode(pae(&[])), "0000000000000000");
        assert_eq!(
            hex::encode(pae(&[b"".as_slice()])),
            "01000000000000000000000000000000"
        );
        assert_eq!(
            hex::encode(pae(&[b"test".as_slice()])),
            "0100000000000000040000000000000074657374"
        );
    }

    #[test]
    fn concatenation_is_not_ambiguous() {
        assert_ne!(
            pae(&[b"ab".as_slice(), b"cd".as_slice()]),
            pae(&[b"abcd".as_slice()])
        );
        assert_ne!(
            pae(&[b"ab".as_slice(), b"cd".as_slice()]),
            pae(&[b"a".as_slice(), b"bcd".as_slice()])
        );
        assert_ne!(
            pae(&[b"".as_slice(), b"ab".as_slice()]),
            pae(&[b"ab".as_slice(), b"".as_slice()])
        );
    }
}
