// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Deterministic master-seed derivations.
//!
//! Both sealing schemes can derive their key material from a caller-held
//! master seed plus an opaque target label, so the same `(seed, target)`
//! pair always regenerates the same key pair. The two schemes use disjoint
//! salt domains; the derived buffers never overlap between versions.

use anyhow::{anyhow, bail, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use blake2::digest::Mac;
use blake2::Blake2bMac512;
use hmac::Hmac;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

/// Minimum length of a master seed.
pub const MIN_MASTER_KEY_SIZE: usize = 32;

/// Length of the derived deterministic buffer.
pub const DERIVED_SIZE: usize = 64;

const V1_SALT_KEY: &[u8] = b"harp deterministic salt v1";
const V2_SALT_KEY: &[u8] = b"harp deterministic salt v2";

const V1_ARGON2_TIME: u32 = 1;
const V1_ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const V1_ARGON2_LANES: u32 = 4;
const V2_PBKDF2_ITERATIONS: u32 = 250_001;

fn check_master_key(master: &[u8]) -> Result<()> {
    if master.len() < MIN_MASTER_KEY_SIZE {
        bail!("master key must be at least {MIN_MASTER_KEY_SIZE} bytes");
    }
    Ok(())
}

/// Derive the 64-byte deterministic buffer feeding X25519 generation.
///
/// `salt = Blake2b-512(key = salt domain, message = target)`, then Argon2id
/// over the first 32 bytes of the master seed.
pub fn v1_derive(master: &[u8], target: &[u8]) -> Result<Zeroizing<[u8; DERIVED_SIZE]>> {
    check_master_key(master)?;

    let mut mac = Blake2bMac512::new_from_slice(V1_SALT_KEY)
        .map_err(|_| anyhow!("failed to initialize salt derivation"))?;
    mac.update(target);
    let mut salt = Zeroizing::new([0u8; 64]);
    salt.copy_from_slice(&mac.finalize().into_bytes()[..]);

    let params = Params::new(
        V1_ARGON2_MEMORY_KIB,
        V1_ARGON2_TIME,
        V1_ARGON2_LANES,
        Some(DERIVED_SIZE),
    )
    .map_err(|_| anyhow!("invalid key derivation parameters"))?;

    let mut derived = Zeroizing::new([0u8; DERIVED_SIZE]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(
            &master[..MIN_MASTER_KEY_SIZE],
            salt.as_ref(),
            derived.as_mut(),
        )
        .map_err(|_| anyhow!("key derivation failed"))?;
    Ok(derived)
}

/// Derive the 64-byte deterministic buffer feeding P-384 generation.
///
/// `salt = HMAC-SHA-512(key = salt domain, message = target)`, then
/// PBKDF2-HMAC-SHA-512 over the first 32 bytes of the master seed.
pub fn v2_derive(master: &[u8], target: &[u8]) -> Result<Zeroizing<[u8; DERIVED_SIZE]>> {
    check_master_key(master)?;

    let mut mac = Hmac::<Sha512>::new_from_slice(V2_SALT_KEY)
        .map_err(|_| anyhow!("failed to initialize salt derivation"))?;
    mac.update(target);
    let mut salt = Zeroizing::new([0u8; 64]);
    salt.copy_from_slice(&mac.finalize().into_bytes()[..]);

    let mut derived = Zeroizing::new([0u8; DERIVED_SIZE]);
    pbkdf2_hmac::<Sha512>(
        &master[..MIN_MASTER_KEY_SIZE],
        salt.as_ref(),
        V2_PBKDF2_ITERATIONS,
        derived.as_mut(),
    );
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::{v1_derive, v2_derive};
    use rstest::rstest;

    const MASTER: &[u8] = b"deterministic-seed-for-test-00001";

    #[rstest]
    #[case(b"short".as_slice())]
    #[case(b"".as_slice())]
    #[case(&[0u8; 31])]
    fn short_master_key_rejected(#[case] master: &[u8]) {
        assert!(v1_derive(master, b"target").is_err());
        assert!(v2_derive(master, b"target").is_err());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = v1_derive(MASTER, b"Release 64").unwrap();
        let b = v1_derive(MASTER, b"Release 64").unwrap();
        assert_eq!(*a, *b);

        let a = v2_derive(MASTER, b"Release 64").unwrap();
        let b = v2_derive(MASTER, b"Release 64").unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn targets_are_domain_separated() {
        let a = v1_derive(MASTER, b"Release 64").unwrap();
        let b = v1_derive(MASTER, b"Release 65").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn versions_never_overlap() {
        let v1 = v1_derive(MASTER, b"Release 64").unwrap();
        let v2 = v2_derive(MASTER, b"Release 64").unwrap();
        assert_ne!(*v1, *v2);
    }

    #[test]
    fn only_first_32_master_bytes_matter() {
        let mut extended = MASTER.to_vec();
        extended.extend_from_slice(b"-trailing-garbage");
        let a = v1_derive(MASTER, b"Release 64").unwrap();
        let b = v1_derive(&extended, b"Release 64").unwrap();
        assert_eq!(*a, *b);
    }
}
