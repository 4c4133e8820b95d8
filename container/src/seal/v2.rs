// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! FIPS sealing scheme: NIST P-384 ECDH and ECDSA, AES-256-CTR with
//! HMAC-SHA-384 authentication, SHA-512 hashing.
//!
//! The flow mirrors the v1 scheme with NIST primitives: a fresh payload key
//! encrypts the ephemeral ECDSA public key into the headers and
//! `signature || content` into the body, and is wrapped once per recipient
//! under an HKDF-derived ECDH shared secret. Every encryption draws its own
//! seed (see `harp_crypto::aead`), so no nonce is ever derived from header
//! state.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use p384::ecdh;
use p384::ecdsa::signature::{Signer, Verifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use p384::elliptic_curve::sec1::ToEncodedPoint;
use p384::{FieldBytes, PublicKey, SecretKey};
use prost::Message;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use harp_crypto::bytes::DeterministicSource;
use harp_crypto::{aead, kdf};

use crate::error::{Error, Result};
use crate::key::{self, ContainerKey, V2_PRIVATE_PREFIX, V2_PUBLIC_PREFIX};
use crate::proto::{Container, Header, Recipient};
use crate::seal::{KeySource, MAX_CONTENT_SIZE, SEALED_CONTENT_TYPE};

const PUBLIC_KEY_SIZE: usize = 49;
const PRIVATE_KEY_SIZE: usize = 48;
const PAYLOAD_KEY_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 96;
const IDENTIFIER_SIZE: usize = 32;

const SIGNATURE_DOMAIN: &[u8] = b"harp fips encrypted signature";
const KEY_IDENTIFIER_KEY: &[u8] = b"harp signcryption box key identifier";
const RECIPIENT_KDF_ALGORITHM: &[u8] = b"A256CTR";

/// Seal `container` for a set of already-parsed v2 recipient keys.
pub(crate) fn seal(container: &Container, peer_keys: &[ContainerKey]) -> Result<Container> {
    let content = container.encode_to_vec();
    if content.len() > MAX_CONTENT_SIZE {
        return Err(Error::InvalidInput("payload exceeds the 64 MiB limit"));
    }

    let mut payload_key = Zeroizing::new([0u8; PAYLOAD_KEY_SIZE]);
    OsRng
        .try_fill_bytes(payload_key.as_mut())
        .map_err(|_| Error::Internal("entropy source failure"))?;

    // Ephemeral signing key; its public half only travels encrypted.
    let signing_secret = SecretKey::random(&mut OsRng);
    let signing_key = SigningKey::from(&signing_secret);
    let signing_public = signing_secret.public_key().to_encoded_point(true);
    let container_box = aead::encrypt(signing_public.as_bytes(), payload_key.as_ref())
        .map_err(|_| Error::Internal("signing key sealing failure"))?;

    let encryption_secret = SecretKey::random(&mut OsRng);
    let encryption_public = encryption_secret.public_key().to_encoded_point(true);

    let mut headers = Header {
        content_type: SEALED_CONTENT_TYPE.to_string(),
        encryption_public_key: encryption_public.as_bytes().to_vec(),
        container_box,
        seal_version: 2,
        ..Default::default()
    };

    for peer in peer_keys {
        headers.recipients.push(pack_recipient(
            payload_key.as_ref(),
            &encryption_secret,
            peer,
        )?);
    }
    if headers.recipients.is_empty() {
        return Err(Error::InvalidInput("empty recipient list"));
    }

    let header_hash = Sha512::digest(headers.encode_to_vec());
    let signature: Signature = signing_key.sign(&protected_content(header_hash.as_slice(), &content));

    let mut body = Zeroizing::new(Vec::with_capacity(SIGNATURE_SIZE + content.len()));
    body.extend_from_slice(signature.to_bytes().as_slice());
    body.extend_from_slice(&content);

    let raw = aead::encrypt(&body, payload_key.as_ref())
        .map_err(|_| Error::Internal("payload sealing failure"))?;

    Ok(Container {
        headers: Some(headers),
        raw,
    })
}

/// Unseal `container` with a parsed v2 private key.
pub(crate) fn unseal(container: &Container, identity: &ContainerKey) -> Result<Container> {
    let headers = container
        .headers
        .as_ref()
        .ok_or(Error::InvalidInput("container has no headers"))?;
    if headers.content_type != SEALED_CONTENT_TYPE {
        return Err(Error::InvalidInput("container is not sealed"));
    }
    if headers.encryption_public_key.len() != PUBLIC_KEY_SIZE {
        return Err(Error::InvalidInput("invalid sender encryption key length"));
    }

    let sender_public =
        PublicKey::from_sec1_bytes(&headers.encryption_public_key).map_err(|_| Error::Crypto)?;

    if identity.material().len() != PRIVATE_KEY_SIZE {
        return Err(Error::KeyFormat("invalid private key length"));
    }
    let secret = SecretKey::from_bytes(FieldBytes::from_slice(identity.material()))
        .map_err(|_| Error::KeyFormat("invalid private key"))?;

    let shared = derive_shared(&secret, &sender_public)?;
    let identifier = key_identifier(shared.as_ref())?;

    let recipient = headers
        .recipients
        .iter()
        .find(|r| bool::from(r.identifier.ct_eq(&identifier)))
        .ok_or(Error::RecipientNotFound)?;
    let payload_key = Zeroizing::new(
        aead::decrypt(&recipient.key, shared.as_ref()).map_err(|_| Error::Crypto)?,
    );
    if payload_key.len() != PAYLOAD_KEY_SIZE {
        return Err(Error::Crypto);
    }

    let signing_public_bytes = aead::decrypt(&headers.container_box, payload_key.as_slice())
        .map_err(|_| Error::Crypto)?;
    if signing_public_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(Error::Crypto);
    }
    let verifying_key =
        VerifyingKey::from_sec1_bytes(&signing_public_bytes).map_err(|_| Error::Crypto)?;

    let header_hash = Sha512::digest(headers.encode_to_vec());
    let body = Zeroizing::new(
        aead::decrypt(&container.raw, payload_key.as_slice()).map_err(|_| Error::Crypto)?,
    );
    if body.len() < SIGNATURE_SIZE {
        return Err(Error::Crypto);
    }
    let (signature_bytes, content) = body.split_at(SIGNATURE_SIZE);
    let signature = Signature::from_slice(signature_bytes).map_err(|_| Error::Crypto)?;

    verifying_key
        .verify(&protected_content(header_hash.as_slice(), content), &signature)
        .map_err(|_| Error::Crypto)?;

    let mut inner =
        Container::decode(content).map_err(|_| Error::Framing("malformed sealed content"))?;
    if inner.headers.is_none() {
        inner.headers = Some(Header::default());
    }
    Ok(inner)
}

/// Generate a serialized v2 key pair, `(public, private)`.
pub fn generate_key(source: &KeySource<'_>) -> Result<(String, String)> {
    match source {
        KeySource::Random => generate_key_with_rng(&mut OsRng),
        KeySource::Deterministic { master, target } => {
            let derived = kdf::v2_derive(master, target)
                .map_err(|_| Error::InvalidInput("master key must be at least 32 bytes"))?;
            generate_key_with_rng(&mut DeterministicSource::new(derived.as_ref()))
        }
    }
}

/// Generate a serialized v2 key pair from a caller-supplied entropy source.
pub fn generate_key_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<(String, String)> {
    let secret = scalar_from_rng(rng)?;
    let public = secret.public_key().to_encoded_point(true);

    let mut private_bytes = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
    private_bytes.copy_from_slice(secret.to_bytes().as_slice());

    Ok((
        key::encode(V2_PUBLIC_PREFIX, public.as_bytes()),
        key::encode(V2_PRIVATE_PREFIX, private_bytes.as_ref()),
    ))
}

/// Draw scalar candidates of 48 bytes until one lands in `[1, n-1]`. The
/// second byte is xored with 0x42 so an all-zero stream cannot map to the
/// zero scalar; the deterministic derivation depends on this exact
/// candidate construction.
fn scalar_from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SecretKey> {
    loop {
        let mut candidate = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        rng.try_fill_bytes(candidate.as_mut())
            .map_err(|_| Error::Internal("entropy source exhausted"))?;
        candidate[1] ^= 0x42;

        if let Ok(secret) = SecretKey::from_bytes(FieldBytes::from_slice(candidate.as_ref())) {
            return Ok(secret);
        }
    }
}

fn pack_recipient(
    payload_key: &[u8],
    encryption_secret: &SecretKey,
    peer: &ContainerKey,
) -> Result<Recipient> {
    let peer_public =
        PublicKey::from_sec1_bytes(peer.material()).map_err(|_| Error::KeyFormat("invalid public key"))?;

    let shared = derive_shared(encryption_secret, &peer_public)?;
    let identifier = key_identifier(shared.as_ref())?;
    let key = aead::encrypt(payload_key, shared.as_ref())
        .map_err(|_| Error::Internal("recipient key wrap failure"))?;

    Ok(Recipient { identifier, key })
}

/// HKDF-SHA-512 over the ECDH x-coordinate, bound to the wrap algorithm
/// name and derived-key length.
fn derive_shared(secret: &SecretKey, peer: &PublicKey) -> Result<Zeroizing<[u8; 32]>> {
    let secret_point = ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());

    let mut info = Vec::with_capacity(4 + RECIPIENT_KDF_ALGORITHM.len() + 4);
    info.extend_from_slice(&(RECIPIENT_KDF_ALGORITHM.len() as u32).to_be_bytes());
    info.extend_from_slice(RECIPIENT_KDF_ALGORITHM);
    info.extend_from_slice(&(PAYLOAD_KEY_SIZE as u32).to_be_bytes());

    let hk = Hkdf::<Sha512>::new(None, secret_point.raw_secret_bytes().as_slice());
    let mut shared = Zeroizing::new([0u8; 32]);
    hk.expand(&info, shared.as_mut())
        .map_err(|_| Error::Internal("key derivation failure"))?;
    Ok(shared)
}

fn key_identifier(shared: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha512>::new_from_slice(KEY_IDENTIFIER_KEY)
        .map_err(|_| Error::Internal("identifier derivation failure"))?;
    mac.update(shared);
    Ok(mac.finalize().into_bytes()[..IDENTIFIER_SIZE].to_vec())
}

fn protected_content(header_hash: &[u8], content: &[u8]) -> Vec<u8> {
    let content_hash = Sha512::digest(content);
    let mut protected =
        Vec::with_capacity(SIGNATURE_DOMAIN.len() + 1 + header_hash.len() + content_hash.len());
    protected.extend_from_slice(SIGNATURE_DOMAIN);
    protected.push(0x00);
    protected.extend_from_slice(header_hash);
    protected.extend_from_slice(&content_hash);
    protected
}
