// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Private key wrapping.
//!
//! The private portion of an identity is never stored in the clear. Two
//! wrapping modes exist: a passphrase-derived JWE envelope, and remote
//! wrapping by a transit service reached through the `harp-kms` provider
//! traits. The `encoding` field of a wrapped key names the mode, remote
//! wraps as `kms:<provider>:<short-hash>` where the short hash commits to
//! the transit key path.

mod jwe;

use base64::engine::general_purpose::STANDARD;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as b64, Engine};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use log::debug;
use zeroize::Zeroizing;

use harp_kms::{Annotations, Decrypter, Encrypter};

use crate::document::PrivateKey;
use crate::error::{IdentityError, Result};
use crate::jwk::Jwk;

type Blake2b256 = Blake2b<U32>;

/// Encoding tag of passphrase-wrapped keys.
pub const JWE_ENCODING: &str = "jwe";

/// Wrap a private JWK under a passphrase.
pub fn with_passphrase(jwk: &Jwk, passphrase: &[u8]) -> Result<PrivateKey> {
    let payload =
        Zeroizing::new(serde_json::to_vec(jwk).map_err(|_| IdentityError::WrapFailed)?);
    let content = jwe::encrypt(&payload, passphrase)?;
    Ok(PrivateKey {
        encoding: JWE_ENCODING.to_string(),
        content,
    })
}

/// Unwrap a passphrase-wrapped private JWK.
pub fn open_with_passphrase(private: &PrivateKey, passphrase: &[u8]) -> Result<Jwk> {
    if private.encoding != JWE_ENCODING {
        return Err(IdentityError::UnsupportedEncoding(private.encoding.clone()));
    }
    let payload = jwe::decrypt(&private.content, passphrase)?;
    serde_json::from_slice(&payload).map_err(|_| IdentityError::UnwrapFailed)
}

/// Wrap a private JWK with a remote transit key.
pub async fn with_transit(
    jwk: &Jwk,
    encrypter: &mut dyn Encrypter,
    provider: &str,
    mount_path: &str,
    key_name: &str,
) -> Result<PrivateKey> {
    let payload =
        Zeroizing::new(serde_json::to_vec(jwk).map_err(|_| IdentityError::WrapFailed)?);
    let key_id = transit_key_id(mount_path, key_name);
    debug!("wrapping identity private key with {provider} transit key {key_id}");

    let (ciphertext, _) = encrypter.encrypt(&payload, &key_id).await?;
    Ok(PrivateKey {
        encoding: encoding_tag(provider, mount_path, key_name),
        content: STANDARD.encode(ciphertext),
    })
}

/// Unwrap a transit-wrapped private JWK.
pub async fn open_with_transit(
    private: &PrivateKey,
    decrypter: &mut dyn Decrypter,
    provider: &str,
    mount_path: &str,
    key_name: &str,
) -> Result<Jwk> {
    if private.encoding != encoding_tag(provider, mount_path, key_name) {
        return Err(IdentityError::UnsupportedEncoding(private.encoding.clone()));
    }

    let ciphertext = STANDARD
        .decode(&private.content)
        .map_err(|_| IdentityError::UnwrapFailed)?;
    let key_id = transit_key_id(mount_path, key_name);
    debug!("unwrapping identity private key with {provider} transit key {key_id}");

    let payload = Zeroizing::new(
        decrypter
            .decrypt(&ciphertext, &key_id, &Annotations::default())
            .await?,
    );
    serde_json::from_slice(&payload).map_err(|_| IdentityError::UnwrapFailed)
}

/// The `kms:<provider>:<short-hash>` encoding tag, committing to the transit
/// key path without spelling it out.
pub fn encoding_tag(provider: &str, mount_path: &str, key_name: &str) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(transit_key_id(mount_path, key_name).as_bytes());
    format!("kms:{provider}:{}", b64.encode(hasher.finalize()))
}

fn transit_key_id(mount_path: &str, key_name: &str) -> String {
    format!("{mount_path}/{key_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::{generate_key_pair, KeyType};
    use async_trait::async_trait;
    use harp_kms::Result as KmsResult;

    #[test]
    fn passphrase_wrap_round_trip() {
        let (_, jwk) = generate_key_pair(KeyType::Ed25519).unwrap();

        let wrapped = with_passphrase(&jwk, b"open sesame").unwrap();
        assert_eq!(wrapped.encoding, "jwe");

        let opened = open_with_passphrase(&wrapped, b"open sesame").unwrap();
        assert_eq!(opened, jwk);
    }

    #[test]
    fn wrong_passphrase_rejected() {
        let (_, jwk) = generate_key_pair(KeyType::Ed25519).unwrap();
        let wrapped = with_passphrase(&jwk, b"open sesame").unwrap();
        assert!(open_with_passphrase(&wrapped, b"close sesame").is_err());
    }

    #[test]
    fn encoding_tag_commits_to_the_key_path() {
        let tag = encoding_tag("vault", "transit", "harp-identities");
        assert!(tag.starts_with("kms:vault:"));
        assert!(!tag.contains('='));
        assert_eq!(tag, encoding_tag("vault", "transit", "harp-identities"));
        assert_ne!(tag, encoding_tag("vault", "transit", "other-key"));
        assert_ne!(tag, encoding_tag("vault", "secrets", "harp-identities"));
    }

    /// Transit stand-in flipping every byte; enough to prove the plumbing.
    struct FlipTransit;

    #[async_trait]
    impl Encrypter for FlipTransit {
        async fn encrypt(&mut self, data: &[u8], _key_id: &str) -> KmsResult<(Vec<u8>, Annotations)> {
            Ok((data.iter().map(|b| !b).collect(), Annotations::default()))
        }
    }

    #[async_trait]
    impl Decrypter for FlipTransit {
        async fn decrypt(
            &mut self,
            ciphertext: &[u8],
            _key_id: &str,
            _crypto_context: &Annotations,
        ) -> KmsResult<Vec<u8>> {
            Ok(ciphertext.iter().map(|b| !b).collect())
        }
    }

    #[tokio::test]
    async fn transit_wrap_round_trip() {
        let (_, jwk) = generate_key_pair(KeyType::P384).unwrap();

        let mut transit = FlipTransit;
        let wrapped = with_transit(&jwk, &mut transit, "vault", "transit", "harp")
            .await
            .unwrap();
        assert!(wrapped.encoding.starts_with("kms:vault:"));

        let opened = open_with_transit(&wrapped, &mut transit, "vault", "transit", "harp")
            .await
            .unwrap();
        assert_eq!(opened, jwk);
    }

    #[tokio::test]
    async fn transit_tag_mismatch_rejected() {
        let (_, jwk) = generate_key_pair(KeyType::P384).unwrap();

        let mut transit = FlipTransit;
        let wrapped = with_transit(&jwk, &mut transit, "vault", "transit", "harp")
            .await
            .unwrap();

        assert!(matches!(
            open_with_transit(&wrapped, &mut transit, "vault", "transit", "other")
                .await,
            Err(IdentityError::UnsupportedEncoding(_))
        ));
    }
}
