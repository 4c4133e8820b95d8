// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Modern sealing scheme: X25519 key agreement through NaCl box,
//! XSalsa20-Poly1305 secretboxes, Ed25519 signatures and Blake2b-512
//! hashing.
//!
//! Sealing generates a fresh payload key and an ephemeral signing key pair,
//! encrypts the signing public key into the headers, wraps the payload key
//! once per recipient under a box-derived shared secret, then signs the
//! header/content binding and encrypts `signature || content` under a nonce
//! truncated from the header hash. The header hash covers the fresh
//! ephemeral sender key, which is what keeps that nonce unique per message.

use blake2::digest::Mac;
use blake2::{Blake2b512, Blake2bMac512, Digest};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SIGNATURE_LENGTH};
use prost::Message;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use harp_crypto::bytes::DeterministicSource;
use harp_crypto::{kdf, x25519};

use crate::error::{Error, Result};
use crate::key::{self, ContainerKey, V1_PRIVATE_PREFIX, V1_PUBLIC_PREFIX};
use crate::proto::{Container, Header, Recipient};
use crate::seal::{KeySource, MAX_CONTENT_SIZE, SEALED_CONTENT_TYPE};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;
const IDENTIFIER_SIZE: usize = 32;

const SIGNATURE_DOMAIN: &[u8] = b"harp encrypted signature";
const SIGNING_KEY_NONCE: &[u8; NONCE_SIZE] = b"harp_container_psigk_box";
const DERIVATION_NONCE: &[u8; NONCE_SIZE] = b"harp_derived_id_sboxkey0";
const KEY_IDENTIFIER_KEY: &[u8] = b"harp signcryption box key identifier";

/// Seal `container` for a set of already-parsed v1 recipient keys.
pub(crate) fn seal(container: &Container, peer_keys: &[ContainerKey]) -> Result<Container> {
    let content = container.encode_to_vec();
    if content.len() > MAX_CONTENT_SIZE {
        return Err(Error::InvalidInput("payload exceeds the 64 MiB limit"));
    }

    let mut payload_key = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng
        .try_fill_bytes(payload_key.as_mut())
        .map_err(|_| Error::Internal("entropy source failure"))?;

    // Ephemeral signing key; its public half only travels encrypted.
    let mut signing_seed = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng
        .try_fill_bytes(signing_seed.as_mut())
        .map_err(|_| Error::Internal("entropy source failure"))?;
    let signing_key = SigningKey::from_bytes(&signing_seed);
    let container_box = secretbox_seal(
        payload_key.as_ref(),
        SIGNING_KEY_NONCE,
        signing_key.verifying_key().as_bytes(),
    )?;

    let encryption_key = SecretKey::generate(&mut OsRng);

    let mut headers = Header {
        content_type: SEALED_CONTENT_TYPE.to_string(),
        encryption_public_key: encryption_key.public_key().as_bytes().to_vec(),
        container_box,
        seal_version: 1,
        ..Default::default()
    };

    for peer in peer_keys {
        headers
            .recipients
            .push(pack_recipient(payload_key.as_ref(), &encryption_key, peer)?);
    }
    if headers.recipients.is_empty() {
        return Err(Error::InvalidInput("empty recipient list"));
    }

    let header_hash = Blake2b512::digest(headers.encode_to_vec());
    let signature = signing_key.sign(&protected_content(header_hash.as_slice(), &content));

    let mut body = Zeroizing::new(Vec::with_capacity(SIGNATURE_LENGTH + content.len()));
    body.extend_from_slice(&signature.to_bytes());
    body.extend_from_slice(&content);

    let raw = secretbox_seal(payload_key.as_ref(), &header_hash[..NONCE_SIZE], &body)?;

    Ok(Container {
        headers: Some(headers),
        raw,
    })
}

/// Unseal `container` with a parsed v1 private key.
pub(crate) fn unseal(container: &Container, identity: &ContainerKey) -> Result<Container> {
    let headers = container
        .headers
        .as_ref()
        .ok_or(Error::InvalidInput("container has no headers"))?;
    if headers.content_type != SEALED_CONTENT_TYPE {
        return Err(Error::InvalidInput("container is not sealed"));
    }
    if headers.encryption_public_key.len() != KEY_SIZE {
        return Err(Error::InvalidInput("invalid sender encryption key length"));
    }

    let secret_bytes: [u8; KEY_SIZE] = identity
        .material()
        .try_into()
        .map_err(|_| Error::KeyFormat("invalid private key length"))?;
    let secret = SecretKey::from(secret_bytes);

    let sender_bytes: [u8; KEY_SIZE] = headers
        .encryption_public_key
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidInput("invalid sender encryption key length"))?;
    let sender_public = PublicKey::from(sender_bytes);

    let shared = derive_shared(&sender_public, &secret)?;
    let identifier = key_identifier(shared.as_ref())?;

    let recipient = headers
        .recipients
        .iter()
        .find(|r| bool::from(r.identifier.ct_eq(&identifier)))
        .ok_or(Error::RecipientNotFound)?;
    if recipient.key.len() <= NONCE_SIZE {
        return Err(Error::Crypto);
    }
    let payload_key = Zeroizing::new(secretbox_open(
        shared.as_ref(),
        &recipient.key[..NONCE_SIZE],
        &recipient.key[NONCE_SIZE..],
    )?);
    if payload_key.len() != KEY_SIZE {
        return Err(Error::Crypto);
    }

    let signing_public = secretbox_open(&payload_key, SIGNING_KEY_NONCE, &headers.container_box)?;
    let signing_public: [u8; KEY_SIZE] =
        signing_public.as_slice().try_into().map_err(|_| Error::Crypto)?;
    let verifying_key = VerifyingKey::from_bytes(&signing_public).map_err(|_| Error::Crypto)?;

    let header_hash = Blake2b512::digest(headers.encode_to_vec());
    let body = Zeroizing::new(secretbox_open(
        &payload_key,
        &header_hash[..NONCE_SIZE],
        &container.raw,
    )?);
    if body.len() < SIGNATURE_LENGTH {
        return Err(Error::Crypto);
    }
    let (signature_bytes, content) = body.split_at(SIGNATURE_LENGTH);
    let signature_bytes: [u8; SIGNATURE_LENGTH] =
        signature_bytes.try_into().map_err(|_| Error::Crypto)?;
    let signature = Signature::from_bytes(&signature_bytes);

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

/// Generate a serialized v1 key pair, `(public, private)`.
pub fn generate_key(source: &KeySource<'_>) -> Result<(String, String)> {
    match source {
        KeySource::Random => generate_key_with_rng(&mut OsRng),
        KeySource::Deterministic { master, target } => {
            let derived = kdf::v1_derive(master, target)
                .map_err(|_| Error::InvalidInput("master key must be at least 32 bytes"))?;
            generate_key_with_rng(&mut DeterministicSource::new(derived.as_ref()))
        }
    }
}

/// Generate a serialized v1 key pair from a caller-supplied entropy source.
pub fn generate_key_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<(String, String)> {
    let mut secret_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rng.try_fill_bytes(secret_bytes.as_mut())
        .map_err(|_| Error::Internal("entropy source failure"))?;
    let public = SecretKey::from(*secret_bytes).public_key();

    Ok((
        key::encode(V1_PUBLIC_PREFIX, public.as_bytes()),
        key::encode(V1_PRIVATE_PREFIX, secret_bytes.as_ref()),
    ))
}

fn pack_recipient(
    payload_key: &[u8],
    encryption_key: &SecretKey,
    peer: &ContainerKey,
) -> Result<Recipient> {
    let peer_bytes: [u8; KEY_SIZE] = peer
        .material()
        .try_into()
        .map_err(|_| Error::KeyFormat("invalid public key length"))?;
    if x25519::is_low_order(&peer_bytes) {
        return Err(Error::KeyFormat("low-order public key"));
    }
    let peer_public = PublicKey::from(peer_bytes);

    let shared = derive_shared(&peer_public, encryption_key)?;
    let identifier = key_identifier(shared.as_ref())?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|_| Error::Internal("entropy source failure"))?;
    let wrapped = secretbox_seal(shared.as_ref(), &nonce, payload_key)?;

    let mut key = Vec::with_capacity(NONCE_SIZE + wrapped.len());
    key.extend_from_slice(&nonce);
    key.extend_from_slice(&wrapped);

    Ok(Recipient { identifier, key })
}

/// Derive the per-recipient shared key as a deterministic side-use of the
/// box primitive: seal 32 zero bytes under a fixed nonce and keep the last
/// 32 bytes of the output. Box is symmetric in (public, secret), so both
/// ends reach the same bytes.
fn derive_shared(peer: &PublicKey, secret: &SecretKey) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let sealed = SalsaBox::new(peer, secret)
        .encrypt(GenericArray::from_slice(DERIVATION_NONCE), [0u8; KEY_SIZE].as_slice())
        .map_err(|_| Error::Internal("key agreement failure"))?;

    let mut shared = Zeroizing::new([0u8; KEY_SIZE]);
    shared.copy_from_slice(&sealed[sealed.len() - KEY_SIZE..]);
    Ok(shared)
}

fn key_identifier(shared: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <Blake2bMac512 as Mac>::new_from_slice(KEY_IDENTIFIER_KEY)
        .map_err(|_| Error::Internal("identifier derivation failure"))?;
    mac.update(shared);
    Ok(mac.finalize().into_bytes()[..IDENTIFIER_SIZE].to_vec())
}

fn protected_content(header_hash: &[u8], content: &[u8]) -> Vec<u8> {
    let content_hash = Blake2b512::digest(content);
    let mut protected =
        Vec::with_capacity(SIGNATURE_DOMAIN.len() + 1 + header_hash.len() + content_hash.len());
    protected.extend_from_slice(SIGNATURE_DOMAIN);
    protected.push(0x00);
    protected.extend_from_slice(header_hash);
    protected.extend_from_slice(&content_hash);
    protected
}

fn secretbox_seal(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new_from_slice(key)
        .map_err(|_| Error::Internal("invalid secretbox key size"))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| Error::Internal("sealing failure"))
}

fn secretbox_open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new_from_slice(key).map_err(|_| Error::Crypto)?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Crypto)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &[u8] = b"deterministic-seed-for-test-00001";

    fn deterministic_pair(target: &[u8]) -> (String, String) {
        generate_key(&KeySource::Deterministic {
            master: MASTER,
            target,
        })
        .unwrap()
    }

    fn sample_container() -> Container {
        Container {
            headers: Some(Header {
                content_type: "harp.bundle.v1.Bundle".to_string(),
                ..Default::default()
            }),
            raw: vec![0xab; 1024],
        }
    }

    #[test]
    fn deterministic_public_key_vector() {
        let (public, private) = deterministic_pair(b"Release 64");
        assert_eq!(public, "v1.sk.qKXPnUP6-2Bb_4nYnmxOXyCdN4IV3AR5HooB33N3g2E");
        assert!(private.starts_with("v1.pk."));
    }

    #[test]
    fn deterministic_generation_is_pure() {
        assert_eq!(deterministic_pair(b"Release 64"), deterministic_pair(b"Release 64"));
        assert_ne!(deterministic_pair(b"Release 64"), deterministic_pair(b"Release 65"));
    }

    #[test]
    fn seal_unseal_round_trip() {
        let (public, private) = deterministic_pair(b"Release 64");
        let container = sample_container();

        let sealed = crate::seal::seal(&container, &[public.as_str()]).unwrap();
        let headers = sealed.headers.as_ref().unwrap();
        assert_eq!(headers.content_type, SEALED_CONTENT_TYPE);
        assert_eq!(headers.seal_version, 1);
        assert_eq!(headers.encryption_public_key.len(), 32);
        assert_eq!(headers.recipients.len(), 1);

        let unsealed = crate::seal::unseal(&sealed, &private).unwrap();
        assert_eq!(unsealed, container);
    }

    #[test]
    fn every_recipient_can_unseal() {
        let pairs: Vec<_> = (0..3)
            .map(|i| deterministic_pair(format!("Recipient {i}").as_bytes()))
            .collect();
        let publics: Vec<&str> = pairs.iter().map(|(p, _)| p.as_str()).collect();
        let container = sample_container();

        let sealed = crate::seal::seal(&container, &publics).unwrap();
        assert_eq!(sealed.headers.as_ref().unwrap().recipients.len(), 3);

        for (_, private) in &pairs {
            assert_eq!(crate::seal::unseal(&sealed, private).unwrap(), container);
        }
    }

    #[test]
    fn outsider_key_is_not_a_recipient() {
        let (public, _) = deterministic_pair(b"Release 64");
        let (_, outsider) = deterministic_pair(b"Someone else");

        let sealed = crate::seal::seal(&sample_container(), &[public.as_str()]).unwrap();
        assert!(matches!(
            crate::seal::unseal(&sealed, &outsider),
            Err(Error::RecipientNotFound)
        ));
    }

    #[test]
    fn tampered_payload_rejected() {
        let (public, private) = deterministic_pair(b"Release 64");
        let sealed = crate::seal::seal(&sample_container(), &[public.as_str()]).unwrap();

        let mut tampered = sealed.clone();
        let last = tampered.raw.len() - 1;
        tampered.raw[last] ^= 0x01;
        assert!(matches!(
            crate::seal::unseal(&tampered, &private),
            Err(Error::Crypto)
        ));
    }

    #[test]
    fn tampered_container_box_rejected() {
        let (public, private) = deterministic_pair(b"Release 64");
        let sealed = crate::seal::seal(&sample_container(), &[public.as_str()]).unwrap();

        let mut tampered = sealed.clone();
        tampered.headers.as_mut().unwrap().container_box[0] ^= 0x01;
        assert!(matches!(
            crate::seal::unseal(&tampered, &private),
            Err(Error::Crypto)
        ));
    }

    #[test]
    fn tampered_headers_rejected() {
        let (public, private) = deterministic_pair(b"Release 64");
        let sealed = crate::seal::seal(&sample_container(), &[public.as_str()]).unwrap();

        // Any header mutation shifts the header hash, and with it the
        // payload nonce, so decryption itself fails.
        let mut tampered = sealed.clone();
        tampered
            .headers
            .as_mut()
            .unwrap()
            .metadata
            .insert("injected".to_string(), "value".to_string());
        assert!(matches!(
            crate::seal::unseal(&tampered, &private),
            Err(Error::Crypto)
        ));
    }

    #[test]
    fn low_order_recipient_rejected() {
        let mut low_order = [0u8; 32];
        low_order[0] = 0x01;
        let text = key::encode(V1_PUBLIC_PREFIX, &low_order);

        assert!(matches!(
            crate::seal::seal(&sample_container(), &[text.as_str()]),
            Err(Error::KeyFormat(_))
        ));
    }

    #[test]
    fn short_master_key_rejected() {
        assert!(matches!(
            generate_key(&KeySource::Deterministic {
                master: b"too short",
                target: b"Release 64",
            }),
            Err(Error::InvalidInput(_))
        ));
    }
}
