// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Seed-keyed authenticated encryption built on AES-256-CTR and
//! HMAC-SHA-384.
//!
//! Every encryption draws a fresh 32-byte seed; the cipher key, counter
//! block and authentication key are all derived from `(key, seed)` through
//! HKDF-SHA-384, so a key can be reused across messages without nonce
//! bookkeeping. The output layout is `seed || ciphertext || tag`.

use anyhow::{anyhow, bail, Result};
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha384;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::pae::pae;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
type HmacSha384 = Hmac<Sha384>;

const SEED_SIZE: usize = 32;
const TAG_SIZE: usize = 48;

const ENCRYPTION_KDF_INFO: &[u8] = b"harp-encryption-key-v2";
const AUTH_KDF_INFO: &[u8] = b"harp-auth-key-for-aead";
const AUTH_TAG_HEADER: &[u8] = b"harp-authentication-tag-v2";

struct DerivedKeys {
    encryption_key: Zeroizing<[u8; 32]>,
    counter: [u8; 16],
    auth_key: Zeroizing<[u8; 16]>,
}

fn derive_keys(key: &[u8], seed: &[u8]) -> Result<DerivedKeys> {
    let hk = Hkdf::<Sha384>::new(None, key);

    let mut okm = Zeroizing::new([0u8; 48]);
    hk.expand_multi_info(&[ENCRYPTION_KDF_INFO, seed], okm.as_mut())
        .map_err(|_| anyhow!("failed to derive encryption key"))?;

    let mut encryption_key = Zeroizing::new([0u8; 32]);
    encryption_key.copy_from_slice(&okm[..32]);
    let mut counter = [0u8; 16];
    counter.copy_from_slice(&okm[32..]);

    let mut auth_key = Zeroizing::new([0u8; 16]);
    hk.expand_multi_info(&[AUTH_KDF_INFO, seed], auth_key.as_mut())
        .map_err(|_| anyhow!("failed to derive authentication key"))?;

    Ok(DerivedKeys {
        encryption_key,
        counter,
        auth_key,
    })
}

fn authentication_tag(auth_key: &[u8], seed: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha384::new_from_slice(auth_key)
        .map_err(|_| anyhow!("failed to initialize authentication"))?;
    mac.update(&pae(&[AUTH_TAG_HEADER, seed, ciphertext]));
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Encrypt and authenticate `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut seed = [0u8; SEED_SIZE];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|_| anyhow!("entropy source failure"))?;

    let keys = derive_keys(key, &seed)?;

    let mut ciphertext = plaintext.to_vec();
    let mut cipher = Aes256Ctr::new(
        GenericArray::from_slice(keys.encryption_key.as_ref()),
        GenericArray::from_slice(&keys.counter),
    );
    cipher.apply_keystream(&mut ciphertext);

    let tag = authentication_tag(keys.auth_key.as_ref(), &seed, &ciphertext)?;

    let mut out = Vec::with_capacity(SEED_SIZE + ciphertext.len() + TAG_SIZE);
    out.extend_from_slice(&seed);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Authenticate and decrypt a `seed || ciphertext || tag` body under `key`.
pub fn decrypt(body: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if body.len() < SEED_SIZE + TAG_SIZE {
        bail!("ciphertext too short");
    }

    let seed = &body[..SEED_SIZE];
    let ciphertext = &body[SEED_SIZE..body.len() - TAG_SIZE];
    let tag = &body[body.len() - TAG_SIZE..];

    let keys = derive_keys(key, seed)?;

    let expected = Zeroizing::new(authentication_tag(keys.auth_key.as_ref(), seed, ciphertext)?);
    if !bool::from(expected.ct_eq(tag)) {
        bail!("message authentication failed");
    }

    let mut plaintext = ciphertext.to_vec();
    let mut cipher = Aes256Ctr::new(
        GenericArray::from_slice(keys.encryption_key.as_ref()),
        GenericArray::from_slice(&keys.counter),
    );
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::{decrypt, encrypt, SEED_SIZE, TAG_SIZE};
    use rstest::rstest;

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"cleartext message".as_slice())]
    #[case(&[0u8; 1024])]
    fn encrypt_decrypt(#[case] plaintext: &[u8]) {
        let key = [7u8; 32];

        let body = encrypt(plaintext, &key).expect("encryption failed");
        assert_eq!(body.len(), SEED_SIZE + plaintext.len() + TAG_SIZE);

        let recovered = decrypt(&body, &key).expect("decryption failed");
        assert_eq!(plaintext, recovered.as_slice());
    }

    #[test]
    fn fresh_seed_per_encryption() {
        let key = [7u8; 32];
        let a = encrypt(b"msg", &key).unwrap();
        let b = encrypt(b"msg", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tamper_detection() {
        let key = [7u8; 32];
        let body = encrypt(b"cleartext message", &key).unwrap();

        for idx in [0, SEED_SIZE, body.len() - 1] {
            let mut corrupted = body.clone();
            corrupted[idx] ^= 0x01;
            assert!(decrypt(&corrupted, &key).is_err());
        }
    }

    #[test]
    fn wrong_key_rejected() {
        let body = encrypt(b"cleartext message", &[7u8; 32]).unwrap();
        assert!(decrypt(&body, &[8u8; 32]).is_err());
    }

    #[test]
    fn short_body_rejected() {
        assert!(decrypt(&[0u8; SEED_SIZE + TAG_SIZE - 1], &[7u8; 32]).is_err());
    }
}
