// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Passphrase wrapping of private keys as a compact JWE.
//!
//! Key wrapping is PBES2-HS512+A256KW with 500001 iterations over a random
//! 16-byte salt; content encryption is A256GCM with the protected header as
//! associated data. The five base64url segments follow RFC 7516 compact
//! serialization.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use aes_kw::KekAes256;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as b64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::{IdentityError, Result};

const ALGORITHM: &str = "PBES2-HS512+A256KW";
const ENCRYPTION: &str = "A256GCM";
const ITERATIONS: u32 = 500_001;
const MAX_ITERATIONS: u32 = 10_000_000;
const SALT_SIZE: usize = 16;
const CEK_SIZE: usize = 32;
const IV_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    enc: String,
    p2s: String,
    p2c: u32,
}

pub(crate) fn encrypt(plaintext: &[u8], passphrase: &[u8]) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|_| IdentityError::Internal("entropy source failure"))?;

    let header = Header {
        alg: ALGORITHM.to_string(),
        enc: ENCRYPTION.to_string(),
        p2s: b64.encode(salt),
        p2c: ITERATIONS,
    };
    let protected = b64.encode(serde_json::to_vec(&header).map_err(|_| IdentityError::WrapFailed)?);

    let kek = derive_kek(passphrase, &salt, ITERATIONS);

    let mut cek = Zeroizing::new([0u8; CEK_SIZE]);
    OsRng
        .try_fill_bytes(cek.as_mut())
        .map_err(|_| IdentityError::Internal("entropy source failure"))?;

    let mut wrapped = [0u8; CEK_SIZE + 8];
    KekAes256::new(GenericArray::from_slice(kek.as_ref()))
        .wrap(cek.as_ref(), &mut wrapped)
        .map_err(|_| IdentityError::WrapFailed)?;

    let mut iv = [0u8; IV_SIZE];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|_| IdentityError::Internal("entropy source failure"))?;

    let cipher =
        Aes256Gcm::new_from_slice(cek.as_ref()).map_err(|_| IdentityError::WrapFailed)?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: protected.as_bytes(),
            },
        )
        .map_err(|_| IdentityError::WrapFailed)?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    Ok([
        protected,
        b64.encode(wrapped),
        b64.encode(iv),
        b64.encode(ciphertext),
        b64.encode(tag),
    ]
    .join("."))
}

pub(crate) fn decrypt(compact: &str, passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let parts: Vec<&str> = compact.split('.').collect();
    if parts.len() != 5 {
        return Err(IdentityError::UnwrapFailed);
    }

    let header_bytes = b64.decode(parts[0]).map_err(|_| IdentityError::UnwrapFailed)?;
    let header: Header =
        serde_json::from_slice(&header_bytes).map_err(|_| IdentityError::UnwrapFailed)?;
    if header.alg != ALGORITHM || header.enc != ENCRYPTION {
        return Err(IdentityError::UnsupportedEncoding(header.alg));
    }
    if header.p2c == 0 || header.p2c > MAX_ITERATIONS {
        return Err(IdentityError::UnwrapFailed);
    }
    let salt = b64.decode(&header.p2s).map_err(|_| IdentityError::UnwrapFailed)?;

    let kek = derive_kek(passphrase, &salt, header.p2c);

    let wrapped = b64.decode(parts[1]).map_err(|_| IdentityError::UnwrapFailed)?;
    if wrapped.len() != CEK_SIZE + 8 {
        return Err(IdentityError::UnwrapFailed);
    }
    let mut cek = Zeroizing::new([0u8; CEK_SIZE]);
    KekAes256::new(GenericArray::from_slice(kek.as_ref()))
        .unwrap(&wrapped, cek.as_mut())
        .map_err(|_| IdentityError::UnwrapFailed)?;

    let iv = b64.decode(parts[2]).map_err(|_| IdentityError::UnwrapFailed)?;
    if iv.len() != IV_SIZE {
        return Err(IdentityError::UnwrapFailed);
    }
    let ciphertext = b64.decode(parts[3]).map_err(|_| IdentityError::UnwrapFailed)?;
    let tag = b64.decode(parts[4]).map_err(|_| IdentityError::UnwrapFailed)?;

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let cipher =
        Aes256Gcm::new_from_slice(cek.as_ref()).map_err(|_| IdentityError::UnwrapFailed)?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: parts[0].as_bytes(),
            },
        )
        .map_err(|_| IdentityError::UnwrapFailed)?;
    Ok(Zeroizing::new(plaintext))
}

fn derive_kek(passphrase: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; CEK_SIZE]> {
    // RFC 7518 salt input: the algorithm name, a zero byte, then p2s.
    let mut salt_input = Zeroizing::new(Vec::with_capacity(ALGORITHM.len() + 1 + salt.len()));
    salt_input.extend_from_slice(ALGORITHM.as_bytes());
    salt_input.push(0x00);
    salt_input.extend_from_slice(salt);

    let mut kek = Zeroizing::new([0u8; CEK_SIZE]);
    pbkdf2_hmac::<Sha512>(passphrase, &salt_input, iterations, kek.as_mut());
    kek
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let sealed = encrypt(b"private key bytes", b"correct horse").unwrap();
        assert_eq!(sealed.split('.').count(), 5);

        let opened = decrypt(&sealed, b"correct horse").unwrap();
        assert_eq!(opened.as_slice(), b"private key bytes");
    }

    #[test]
    fn header_declares_the_scheme() {
        let sealed = encrypt(b"payload", b"passphrase").unwrap();
        let protected = sealed.split('.').next().unwrap();
        let header: Header =
            serde_json::from_slice(&b64.decode(protected).unwrap()).unwrap();

        assert_eq!(header.alg, "PBES2-HS512+A256KW");
        assert_eq!(header.enc, "A256GCM");
        assert_eq!(header.p2c, 500_001);
        assert_eq!(b64.decode(header.p2s).unwrap().len(), 16);
    }

    #[test]
    fn wrong_passphrase_rejected() {
        let sealed = encrypt(b"payload", b"passphrase").unwrap();
        assert!(decrypt(&sealed, b"not the passphrase").is_err());
    }

    #[test]
    fn tampered_segments_rejected() {
        let sealed = encrypt(b"payload", b"passphrase").unwrap();
        let parts: Vec<&str> = sealed.split('.').collect();

        for idx in 1..5 {
            let mut tampered = parts.clone();
            let flipped = if tampered[idx].starts_with('A') {
                format!("B{}", &tampered[idx][1..])
            } else {
                format!("A{}", &tampered[idx][1..])
            };
            tampered[idx] = &flipped;
            assert!(decrypt(&tampered.join("."), b"passphrase").is_err());
        }
    }

    #[test]
    fn excessive_iteration_count_rejected() {
        let header = Header {
            alg: ALGORITHM.to_string(),
            enc: ENCRYPTION.to_string(),
            p2s: b64.encode([0u8; SALT_SIZE]),
            p2c: MAX_ITERATIONS + 1,
        };
        let protected = b64.encode(serde_json::to_vec(&header).unwrap());
        let compact = format!("{protected}.AAAA.AAAA.AAAA.AAAA");
        assert!(decrypt(&compact, b"passphrase").is_err());
    }
}
