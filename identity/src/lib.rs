// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Container identities
//!
//! An identity is a long-lived key pair whose public half designates a
//! container recipient and whose private half unseals containers addressed
//! to it. Identities are stored as JSON documents; the private key is never
//! written in the clear, it is wrapped either under a passphrase (JWE) or
//! by a remote transit service.

pub mod document;
pub mod error;
pub mod jwk;
pub mod wrap;

pub use document::{Identity, PrivateKey};
pub use error::{IdentityError, Result};
pub use jwk::{Jwk, KeyType};
