// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Sealed secret containers
//!
//! A container is an envelope shipping a protobuf-serialized secret bundle
//! between trust boundaries. Sealing encrypts the whole container for a set
//! of recipient public keys and signs the result with an ephemeral key; only
//! a holder of one of the matching private keys can recover the original
//! container.
//!
//! Two sealing schemes coexist, selected by the textual prefix of the
//! recipient keys:
//! - `v1`: X25519 key agreement, XSalsa20-Poly1305 secretboxes, Ed25519
//!   signatures, Blake2b-512 hashing
//! - `v2`: NIST P-384 ECDH and ECDSA, AES-256-CTR with HMAC-SHA-384,
//!   SHA-512 hashing
//!
//! The [`codec`] module frames any container (sealed or not) into a byte
//! stream with a version-tagged magic prefix.

pub mod codec;
pub mod error;
pub mod key;
pub mod proto;
pub mod seal;

pub use error::{Error, Result};
pub use proto::{Container, Header, Recipient};
pub use seal::{seal, unseal, KeySource};
