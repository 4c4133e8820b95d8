// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by container operations.
///
/// Authenticated-crypto rejections are collapsed into [`Error::Crypto`]
/// without detail: whether a MAC, a signature or a point decoding refused
/// the input is not disclosed, and no message carries key material.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied value failed structural validation.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The byte stream is not a well-formed framed container.
    #[error("framing error: {0}")]
    Framing(&'static str),

    /// A textual key could not be understood.
    #[error("key format error: {0}")]
    KeyFormat(&'static str),

    /// An authenticated cryptographic operation rejected its input.
    #[error("cryptographic operation failed")]
    Crypto,

    /// No recipient entry matches the provided identity key.
    #[error("no recipient matches the provided identity key")]
    RecipientNotFound,

    /// A failure that well-formed inputs should never reach.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
