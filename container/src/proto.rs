// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Protobuf wire model.
//!
//! The messages are written out by hand instead of being generated so the
//! build needs no protoc; field numbers are frozen and must never change,
//! existing sealed artifacts depend on them.

use std::collections::BTreeMap;

/// The envelope moved between trust boundaries.
///
/// When unsealed, `raw` is the caller's protobuf-serialized payload. When
/// sealed, `raw` is the ciphertext of an inner serialized [`Container`] and
/// `headers` carries the sealing metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Container {
    #[prost(message, optional, tag = "1")]
    pub headers: Option<Header>,

    #[prost(bytes = "vec", tag = "2")]
    pub raw: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Advisory encoding of the payload (e.g. `gzip`).
    #[prost(string, tag = "1")]
    pub content_encoding: String,

    /// Payload type; sealed containers carry a fixed marker value.
    #[prost(string, tag = "2")]
    pub content_type: String,

    /// Ephemeral sender public key, set while sealed.
    #[prost(bytes = "vec", tag = "3")]
    pub encryption_public_key: Vec<u8>,

    /// Encrypted ephemeral signing public key.
    #[prost(bytes = "vec", tag = "4")]
    pub container_box: Vec<u8>,

    /// Free-form annotations; sealing neither reads nor writes them.
    #[prost(btree_map = "string, string", tag = "5")]
    pub metadata: BTreeMap<String, String>,

    /// Per-recipient wrapped payload keys, in caller-supplied order.
    #[prost(message, repeated, tag = "6")]
    pub recipients: Vec<Recipient>,

    /// Sealing scheme applied to `raw` (1 or 2).
    #[prost(uint32, tag = "7")]
    pub seal_version: u32,
}

/// One recipient's wrapped payload key.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Recipient {
    /// Public 32-byte tag derived from the per-recipient shared secret.
    #[prost(bytes = "vec", tag = "1")]
    pub identifier: Vec<u8>,

    /// Wrapped payload key; the layout is seal-version specific.
    #[prost(bytes = "vec", tag = "2")]
    pub key: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::{Container, Header};
    use prost::Message;

    #[test]
    fn field_numbers_are_frozen() {
        let container = Container {
            headers: Some(Header {
                content_encoding: "gzip".to_string(),
                content_type: "harp.bundle.v1.Bundle".to_string(),
                ..Default::default()
            }),
            raw: vec![0x00, 0x00],
        };

        assert_eq!(
            hex::encode(container.encode_to_vec()),
            "0a1d0a04677a69701215686172702e62756e646c652e76312e42756e646c6512020000"
        );
    }

    #[test]
    fn round_trip() {
        let container = Container {
            headers: Some(Header {
                content_type: "harp.bundle.v1.Bundle".to_string(),
                seal_version: 2,
                ..Default::default()
            }),
            raw: b"opaque".to_vec(),
        };

        let decoded = Container::decode(container.encode_to_vec().as_slice()).unwrap();
        assert_eq!(container, decoded);
    }
}
