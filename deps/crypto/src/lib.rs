// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Crypto
//!
//! This crate encapsulates the low-level crypto helpers shared by the
//! sealing and identity crates:
//! - `aead`: the seed-keyed AES-256-CTR + HMAC-SHA-384 construction used by
//!   the FIPS sealing scheme
//! - `kdf`: deterministic master-seed derivations (Argon2id / PBKDF2)
//! - `pae`: pre-authentication encoding of multi-part MAC inputs
//! - `x25519`: low-order public key guard
//! - `bytes`: deterministic byte source driving reproducible key generation

pub mod aead;
pub mod bytes;
pub mod kdf;
pub mod pae;
pub mod x25519;
