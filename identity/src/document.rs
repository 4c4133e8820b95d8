// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Identity JSON documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harp_kms::{Decrypter, Encrypter};

use crate::error::{IdentityError, Result};
use crate::jwk::{self, Jwk, KeyType};
use crate::wrap;

pub const API_VERSION: &str = "harp.io/v1";
pub const KIND: &str = "ContainerIdentity";

const MAX_DESCRIPTION_SIZE: usize = 50;

/// Wrapped private key material of an identity.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PrivateKey {
    /// Wrapping scheme tag (`jwe` or `kms:<provider>:<short-hash>`).
    pub encoding: String,

    /// The wrapped private JWK.
    pub content: String,
}

/// A stored container identity.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Identity {
    #[serde(rename = "@apiVersion")]
    pub api_version: String,

    #[serde(rename = "@kind")]
    pub kind: String,

    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "@description")]
    pub description: String,

    /// Textual public identity key; immutable once generated.
    pub public: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<PrivateKey>,
}

impl Identity {
    /// Generate an identity whose private key is wrapped under a
    /// passphrase.
    pub fn with_passphrase(
        key_type: KeyType,
        description: &str,
        passphrase: &[u8],
    ) -> Result<Self> {
        validate_description(description)?;
        let (public, jwk) = jwk::generate_key_pair(key_type)?;
        let private = wrap::with_passphrase(&jwk, passphrase)?;
        Ok(Self::assemble(description, public, private))
    }

    /// Generate an identity whose private key is wrapped by a remote
    /// transit key.
    pub async fn with_transit(
        key_type: KeyType,
        description: &str,
        encrypter: &mut dyn Encrypter,
        provider: &str,
        mount_path: &str,
        key_name: &str,
    ) -> Result<Self> {
        validate_description(description)?;
        let (public, jwk) = jwk::generate_key_pair(key_type)?;
        let private =
            wrap::with_transit(&jwk, encrypter, provider, mount_path, key_name).await?;
        Ok(Self::assemble(description, public, private))
    }

    /// Recover the private JWK from a passphrase-wrapped identity.
    pub fn private_key_with_passphrase(&self, passphrase: &[u8]) -> Result<Jwk> {
        let private = self.private.as_ref().ok_or(IdentityError::NoPrivateKey)?;
        wrap::open_with_passphrase(private, passphrase)
    }

    /// Recover the private JWK from a transit-wrapped identity.
    pub async fn private_key_with_transit(
        &self,
        decrypter: &mut dyn Decrypter,
        provider: &str,
        mount_path: &str,
        key_name: &str,
    ) -> Result<Jwk> {
        let private = self.private.as_ref().ok_or(IdentityError::NoPrivateKey)?;
        wrap::open_with_transit(private, decrypter, provider, mount_path, key_name).await
    }

    /// Derive the recovery (container) key of a passphrase-wrapped
    /// identity.
    pub fn recovery_key_with_passphrase(&self, passphrase: &[u8]) -> Result<String> {
        jwk::recovery_key(&self.private_key_with_passphrase(passphrase)?)
    }

    pub fn has_private_key(&self) -> bool {
        self.private.is_some()
    }

    fn assemble(description: &str, public: String, private: PrivateKey) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            timestamp: Utc::now(),
            description: description.to_string(),
            public,
            private: Some(private),
        }
    }
}

fn validate_description(description: &str) -> Result<()> {
    if description.is_empty()
        || description.len() > MAX_DESCRIPTION_SIZE
        || !description.is_ascii()
    {
        return Err(IdentityError::InvalidDescription);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn document_layout() {
        let identity = Identity {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            timestamp: "2024-06-01T12:00:00Z".parse().unwrap(),
            description: "release signing".to_string(),
            public: "v1.ipk.p0dOTk1wXp8xY29ubmVjdGVkLXRlc3Qta2V5LWJ5dGVz".to_string(),
            private: Some(PrivateKey {
                encoding: "jwe".to_string(),
                content: "header.key.iv.ciphertext.tag".to_string(),
            }),
        };

        assert_json_eq!(
            serde_json::to_value(&identity).unwrap(),
            json!({
                "@apiVersion": "harp.io/v1",
                "@kind": "ContainerIdentity",
                "@timestamp": "2024-06-01T12:00:00Z",
                "@description": "release signing",
                "public": "v1.ipk.p0dOTk1wXp8xY29ubmVjdGVkLXRlc3Qta2V5LWJ5dGVz",
                "private": {
                    "encoding": "jwe",
                    "content": "header.key.iv.ciphertext.tag"
                }
            })
        );

        let parsed: Identity =
            serde_json::from_value(serde_json::to_value(&identity).unwrap()).unwrap();
        assert_eq!(parsed, identity);
    }

    #[rstest]
    #[case(KeyType::X25519)]
    #[case(KeyType::Ed25519)]
    #[case(KeyType::P384)]
    fn generated_identity_round_trips(#[case] key_type: KeyType) {
        let identity =
            Identity::with_passphrase(key_type, "team secrets", b"melodious kelp").unwrap();
        assert!(identity.has_private_key());

        let jwk = identity
            .private_key_with_passphrase(b"melodious kelp")
            .unwrap();
        assert!(jwk.d.is_some());

        let recovery = identity
            .recovery_key_with_passphrase(b"melodious kelp")
            .unwrap();
        assert!(!recovery.is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("way too long description that keeps going and going on")]
    #[case("non-ascii déscription")]
    fn invalid_descriptions_rejected(#[case] description: &str) {
        assert!(matches!(
            Identity::with_passphrase(KeyType::Ed25519, description, b"pass"),
            Err(IdentityError::InvalidDescription)
        ));
    }

    #[test]
    fn identity_without_private_key_cannot_recover() {
        let mut identity =
            Identity::with_passphrase(KeyType::Ed25519, "ephemeral", b"pass").unwrap();
        identity.private = None;

        assert!(matches!(
            identity.private_key_with_passphrase(b"pass"),
            Err(IdentityError::NoPrivateKey)
        ));
    }
}
