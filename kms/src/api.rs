// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Api definitions for transit encryption providers
//!
//! Two kinds of parameters are involved when talking to a transit service:
//! - Public parameters: mount path, key name, region, etc. They are not
//!   confidential. [`ProviderSettings`] is a json object holding all of them;
//!   the hashmap style keeps it flexible across different providers.
//! - Private parameters: the credential used to reach the service. These are
//!   captured inside the provider's constructor rather than passed through
//!   this interface.

use crate::Result;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// ProviderSettings are extra information to create a provider client
pub type ProviderSettings = Map<String, Value>;

/// Annotations is extra information of one encryption/decryption operation
pub type Annotations = Map<String, Value>;

#[async_trait]
pub trait Encrypter: Send + Sync {
    /// Use the key of `key_id` to encrypt the `data` slice inside the remote
    /// service, and return the ciphertext. The key never leaves the service.
    ///
    /// The returned [`Annotations`] are the parameters of the encryption
    /// operation, needed to decrypt later.
    async fn encrypt(&mut self, data: &[u8], key_id: &str) -> Result<(Vec<u8>, Annotations)>;
}

#[async_trait]
pub trait Decrypter: Send + Sync {
    /// Use the key of `key_id` to decrypt the `ciphertext` slice inside the
    /// remote service, and return the plaintext.
    async fn decrypt(
        &mut self,
        ciphertext: &[u8],
        key_id: &str,
        crypto_context: &Annotations,
    ) -> Result<Vec<u8>>;
}
