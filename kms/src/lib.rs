// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # KMS provider interfaces
//!
//! Identity private keys can be wrapped by a remote transit service instead
//! of a local passphrase. This crate only defines the provider surface the
//! rest of the workspace programs against; concrete clients (Vault transit,
//! cloud KMSes) live outside the core and are injected by the caller.

pub mod api;
pub mod error;

pub use api::*;
pub use error::*;
