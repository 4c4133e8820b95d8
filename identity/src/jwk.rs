// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! JSON Web Key model of an identity key pair.
//!
//! Coordinates and scalars are base64url without padding; P-384 coordinates
//! are left-zero-padded to 48 bytes as the SEC1 field encoding already
//! guarantees.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as b64, Engine};
use crypto_box::SecretKey as X25519SecretKey;
use ed25519_dalek::SigningKey;
use p384::elliptic_curve::sec1::ToEncodedPoint;
use p384::SecretKey as P384SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, Zeroizing};

use harp_container::key::{
    V1_IDENTITY_PREFIX, V1_RECOVERY_PREFIX, V2_IDENTITY_PREFIX, V2_RECOVERY_PREFIX,
};

use crate::error::{IdentityError, Result};

/// Supported identity key types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    /// Legacy container identity, directly usable as a v1 recipient.
    X25519,
    /// Signing identity; convertible to a v1 recovery key.
    Ed25519,
    /// FIPS identity, usable with the v2 scheme.
    P384,
}

/// A private JSON Web Key. Coordinates are wiped on drop.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl Drop for Jwk {
    fn drop(&mut self) {
        self.x.zeroize();
        if let Some(y) = self.y.as_mut() {
            y.zeroize();
        }
        if let Some(d) = self.d.as_mut() {
            d.zeroize();
        }
    }
}

/// Generate a fresh identity key pair: the textual public key and the
/// private JWK.
pub fn generate_key_pair(key_type: KeyType) -> Result<(String, Jwk)> {
    match key_type {
        KeyType::X25519 => {
            let mut seed = Zeroizing::new([0u8; 32]);
            OsRng
                .try_fill_bytes(seed.as_mut())
                .map_err(|_| IdentityError::Internal("entropy source failure"))?;
            let public = X25519SecretKey::from(*seed).public_key();

            Ok((
                b64.encode(public.as_bytes()),
                Jwk {
                    kty: "OKP".to_string(),
                    crv: "X25519".to_string(),
                    x: b64.encode(public.as_bytes()),
                    y: None,
                    d: Some(b64.encode(&seed[..])),
                },
            ))
        }
        KeyType::Ed25519 => {
            let mut seed = Zeroizing::new([0u8; 32]);
            OsRng
                .try_fill_bytes(seed.as_mut())
                .map_err(|_| IdentityError::Internal("entropy source failure"))?;
            let public = SigningKey::from_bytes(&seed).verifying_key();

            Ok((
                format!("{}{}", V1_IDENTITY_PREFIX, b64.encode(public.as_bytes())),
                Jwk {
                    kty: "OKP".to_string(),
                    crv: "Ed25519".to_string(),
                    x: b64.encode(public.as_bytes()),
                    y: None,
                    d: Some(b64.encode(&seed[..])),
                },
            ))
        }
        KeyType::P384 => {
            let secret = P384SecretKey::random(&mut OsRng);
            let point = secret.public_key().to_encoded_point(false);
            let x = point
                .x()
                .ok_or(IdentityError::Internal("public key without coordinate x"))?;
            let y = point
                .y()
                .ok_or(IdentityError::Internal("public key without coordinate y"))?;
            let compressed = secret.public_key().to_encoded_point(true);

            let mut scalar = Zeroizing::new([0u8; 48]);
            scalar.copy_from_slice(secret.to_bytes().as_slice());

            Ok((
                format!("{}{}", V2_IDENTITY_PREFIX, b64.encode(compressed.as_bytes())),
                Jwk {
                    kty: "EC".to_string(),
                    crv: "P-384".to_string(),
                    x: b64.encode(x),
                    y: Some(b64.encode(y)),
                    d: Some(b64.encode(&scalar[..])),
                },
            ))
        }
    }
}

/// Derive the recovery ("container") key of a private JWK.
///
/// The recovery key is a symmetric-form private key acting as a fallback
/// recipient secret: X25519 scalars pass through untouched, Ed25519 seeds
/// are converted to their Curve25519 scalar, P-384 scalars keep the FIPS
/// scheme tag.
pub fn recovery_key(jwk: &Jwk) -> Result<String> {
    let d = jwk.d.as_ref().ok_or(IdentityError::NoPrivateKey)?;

    match (jwk.kty.as_str(), jwk.crv.as_str()) {
        ("OKP", "X25519") => Ok(d.clone()),
        ("OKP", "Ed25519") => {
            let seed = Zeroizing::new(
                b64.decode(d)
                    .map_err(|_| IdentityError::MalformedKey("invalid private key encoding"))?,
            );
            if seed.len() != 32 {
                return Err(IdentityError::MalformedKey("invalid private key length"));
            }

            let mut hash = Zeroizing::new([0u8; 64]);
            hash.copy_from_slice(&Sha512::digest(seed.as_slice())[..]);
            let mut scalar = Zeroizing::new([0u8; 32]);
            scalar.copy_from_slice(&hash[..32]);
            scalar[0] &= 248;
            scalar[31] &= 127;
            scalar[31] |= 64;

            Ok(format!("{}{}", V1_RECOVERY_PREFIX, b64.encode(&scalar[..])))
        }
        ("EC", "P-384") => Ok(format!("{}{}", V2_RECOVERY_PREFIX, d)),
        _ => Err(IdentityError::MalformedKey("unsupported key type")),
    }
}
