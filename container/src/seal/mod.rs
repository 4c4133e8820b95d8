// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Sealing strategies and version dispatch.
//!
//! The strategy is chosen from the recipient keys themselves: `v1.*` keys
//! select the X25519/Ed25519 scheme, `v2.*` keys the P-384 scheme. A
//! recipient set mixing versions is refused rather than partially honored.

pub mod v1;
pub mod v2;

use crate::error::{Error, Result};
use crate::key::{self, ContainerKey, KeyTag, SealVersion};
use crate::proto::Container;

/// Content type marking a sealed container, shared by both schemes.
pub const SEALED_CONTENT_TYPE: &str = "application/vnd.harp.v1.SealedContainer";

/// Upper bound on the serialized container size accepted for sealing.
pub const MAX_CONTENT_SIZE: usize = 64 * 1024 * 1024;

/// Entropy policy for key generation.
pub enum KeySource<'a> {
    /// Operating-system CSPRNG.
    Random,
    /// Reproducible derivation from a master seed and a target label. The
    /// master seed must be at least 32 bytes; the target is opaque bytes
    /// acting as a domain separator.
    Deterministic { master: &'a [u8], target: &'a [u8] },
}

/// Seal `container` for the given recipient public keys.
///
/// The recipient list in the output preserves the caller-supplied key
/// order. All keys must belong to the same seal version.
pub fn seal(container: &Container, peer_keys: &[&str]) -> Result<Container> {
    let (version, keys) = key::group_for_seal(peer_keys)?;
    match version {
        SealVersion::V1 => v1::seal(container, &keys),
        SealVersion::V2 => v2::seal(container, &keys),
    }
}

/// Unseal `container` with one private identity key, recovering the inner
/// container.
pub fn unseal(container: &Container, identity_key: &str) -> Result<Container> {
    let identity = ContainerKey::parse(identity_key)?;
    if identity.tag() == KeyTag::Ipk {
        return Err(Error::KeyFormat("not a private container key"));
    }
    match identity.version() {
        SealVersion::V1 => v1::unseal(container, &identity),
        SealVersion::V2 => v2::unseal(container, &identity),
    }
}

/// Generate a serialized key pair for the given seal version.
///
/// Returns `(public, private)` in textual form.
pub fn generate_key(version: SealVersion, source: &KeySource<'_>) -> Result<(String, String)> {
    match version {
        SealVersion::V1 => v1::generate_key(source),
        SealVersion::V2 => v2::generate_key(source),
    }
}
