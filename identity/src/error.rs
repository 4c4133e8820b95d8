// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("description must be ascii and 1 to 50 characters long")]
    InvalidDescription,

    #[error("identity has no private key")]
    NoPrivateKey,

    #[error("malformed key document: {0}")]
    MalformedKey(&'static str),

    #[error("wrapping the private key failed")]
    WrapFailed,

    #[error("unwrapping the private key failed")]
    UnwrapFailed,

    #[error("unsupported private key encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("transit provider error")]
    Kms(#[from] harp_kms::Error),

    #[error("internal error: {0}")]
    Internal(&'static str),
}
