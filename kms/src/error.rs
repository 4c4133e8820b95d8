// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transit encrypt failed: {0}")]
    EncryptFailed(String),

    #[error("transit decrypt failed: {0}")]
    DecryptFailed(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
}
