// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Textual container keys.
//!
//! Serialized keys take the form `<version>.<tag>.<base64url>` with an
//! unpadded url-safe payload, e.g. `v1.sk.qKXPnUP6...`. The version selects
//! the sealing scheme; the tag names the key's flavor. The v1 scheme
//! historically emitted its public half under the `sk` tag and its private
//! half under `pk`, and existing key strings keep that spelling, so parsing
//! accepts any tag and the operation consuming the key fixes its role:
//! sealing reads keys as public material, unsealing as private material.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as b64, Engine};
use const_format::concatcp;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

const V1: &str = "v1";
const V2: &str = "v2";
const TAG_PK: &str = "pk";
const TAG_SK: &str = "sk";
const TAG_CK: &str = "ck";
const TAG_IPK: &str = "ipk";

/// Prefix of v1 public (sealing) keys.
pub const V1_PUBLIC_PREFIX: &str = concatcp!(V1, ".", TAG_SK, ".");
/// Prefix of v1 private keys.
pub const V1_PRIVATE_PREFIX: &str = concatcp!(V1, ".", TAG_PK, ".");
/// Prefix of v1 recovery (container) keys.
pub const V1_RECOVERY_PREFIX: &str = concatcp!(V1, ".", TAG_CK, ".");
/// Prefix of v1 identity public keys.
pub const V1_IDENTITY_PREFIX: &str = concatcp!(V1, ".", TAG_IPK, ".");
/// Prefix of v2 public (sealing) keys.
pub const V2_PUBLIC_PREFIX: &str = concatcp!(V2, ".", TAG_PK, ".");
/// Prefix of v2 private keys.
pub const V2_PRIVATE_PREFIX: &str = concatcp!(V2, ".", TAG_SK, ".");
/// Prefix of v2 recovery (container) keys.
pub const V2_RECOVERY_PREFIX: &str = concatcp!(V2, ".", TAG_CK, ".");
/// Prefix of v2 identity public keys.
pub const V2_IDENTITY_PREFIX: &str = concatcp!(V2, ".", TAG_IPK, ".");

/// Sealing scheme selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum SealVersion {
    #[strum(serialize = "v1")]
    V1,
    #[strum(serialize = "v2")]
    V2,
}

/// Flavor tag carried in a serialized key string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyTag {
    Pk,
    Sk,
    Ck,
    Ipk,
}

/// A parsed container key: version, tag, and decoded material.
pub struct ContainerKey {
    version: SealVersion,
    tag: KeyTag,
    material: Zeroizing<Vec<u8>>,
}

impl ContainerKey {
    /// Parse a `<version>.<tag>.<base64url>` key string.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, '.');
        let (version, tag, data) = match (parts.next(), parts.next(), parts.next()) {
            (Some(version), Some(tag), Some(data)) => (version, tag, data),
            _ => return Err(Error::KeyFormat("expected <version>.<tag>.<data>")),
        };

        let version = match version {
            V1 => SealVersion::V1,
            V2 => SealVersion::V2,
            _ => return Err(Error::KeyFormat("unknown key version")),
        };
        let tag = match tag {
            TAG_PK => KeyTag::Pk,
            TAG_SK => KeyTag::Sk,
            TAG_CK => KeyTag::Ck,
            TAG_IPK => KeyTag::Ipk,
            _ => return Err(Error::KeyFormat("unknown key tag")),
        };

        let material = Zeroizing::new(
            b64.decode(data)
                .map_err(|_| Error::KeyFormat("invalid key encoding"))?,
        );
        if material.is_empty() {
            return Err(Error::KeyFormat("empty key material"));
        }

        Ok(Self {
            version,
            tag,
            material,
        })
    }

    pub fn version(&self) -> SealVersion {
        self.version
    }

    pub fn tag(&self) -> KeyTag {
        self.tag
    }

    pub(crate) fn material(&self) -> &[u8] {
        &self.material
    }
}

/// Serialize key material under the given prefix.
pub(crate) fn encode(prefix: &str, material: &[u8]) -> String {
    format!("{prefix}{}", b64.encode(material))
}

/// Parse a recipient key set for sealing: all keys must share one version
/// and carry sealing tags.
pub(crate) fn group_for_seal(keys: &[&str]) -> Result<(SealVersion, Vec<ContainerKey>)> {
    if keys.is_empty() {
        return Err(Error::InvalidInput("empty recipient key list"));
    }

    let parsed = keys
        .iter()
        .map(|k| ContainerKey::parse(k))
        .collect::<Result<Vec<_>>>()?;

    let version = parsed[0].version();
    for key in &parsed {
        if key.version() != version {
            return Err(Error::KeyFormat("mixed seal versions in recipient set"));
        }
        if !matches!(key.tag(), KeyTag::Pk | KeyTag::Sk) {
            return Err(Error::KeyFormat("not a sealing public key"));
        }
    }
    Ok((version, parsed))
}
