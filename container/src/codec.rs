// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Binary container framing.
//!
//! On the wire a container is a 6-byte prefix followed by the protobuf
//! payload, big-endian:
//!
//! | offset | size | field   | value        |
//! |--------|------|---------|--------------|
//! | 0      | 4    | magic   | `0x53CB3701` |
//! | 4      | 2    | version | `0x0002`     |
//! | 6      | n    | payload | protobuf     |
//!
//! The wire version tags the codec itself; the sealing scheme applied to
//! the payload is carried separately in `Header.seal_version`.

use std::io::{Read, Write};

use prost::Message;

use crate::error::{Error, Result};
use crate::proto::{Container, Header};

/// Magic signature opening every framed container.
pub const CONTAINER_MAGIC: u32 = 0x53CB_3701;

/// Wire format version.
pub const CONTAINER_VERSION: u16 = 0x0002;

/// Read one framed container from `reader`, consuming it to EOF.
///
/// A decoded container never has absent headers: an empty [`Header`] record
/// is substituted so downstream code is free of presence checks.
pub fn load<R: Read>(reader: &mut R) -> Result<Container> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| Error::Framing("truncated container prefix"))?;
    if magic != CONTAINER_MAGIC.to_be_bytes() {
        return Err(Error::Framing("invalid magic signature"));
    }

    let mut version = [0u8; 2];
    reader
        .read_exact(&mut version)
        .map_err(|_| Error::Framing("truncated container prefix"))?;
    if u16::from_be_bytes(version) != CONTAINER_VERSION {
        return Err(Error::Framing("unsupported container version"));
    }

    let mut payload = Vec::new();
    reader
        .read_to_end(&mut payload)
        .map_err(|_| Error::Framing("unable to read container payload"))?;
    if payload.is_empty() {
        return Err(Error::Framing("empty container payload"));
    }

    let mut container = Container::decode(payload.as_slice())
        .map_err(|_| Error::Framing("malformed container payload"))?;
    if container.headers.is_none() {
        container.headers = Some(Header::default());
    }
    Ok(container)
}

/// Write `container` to `writer` as a framed byte stream.
pub fn dump<W: Write>(writer: &mut W, container: &Container) -> Result<()> {
    // Encoding happens first so a failing container emits no prefix. With
    // prost the in-memory encode is infallible.
    let payload = container.encode_to_vec();

    writer
        .write_all(&CONTAINER_MAGIC.to_be_bytes())
        .and_then(|()| writer.write_all(&CONTAINER_VERSION.to_be_bytes()))
        .and_then(|()| writer.write_all(&payload))
        .map_err(|_| Error::Internal("unable to write container"))
}
