// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Deterministic byte source.
//!
//! Adapts a fixed buffer of key-derivation output to the [`RngCore`]
//! interface so the key generators can run unchanged in random and
//! deterministic modes. The source yields its bytes sequentially exactly
//! once and errors when drained.

use rand::{CryptoRng, Error, RngCore};
use zeroize::Zeroizing;

pub struct DeterministicSource {
    buf: Zeroizing<Vec<u8>>,
    pos: usize,
}

impl DeterministicSource {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            buf: Zeroizing::new(bytes.to_vec()),
            pos: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl RngCore for DeterministicSource {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // Callers in this workspace always go through try_fill_bytes; the
        // infallible entry point exists only to complete the trait.
        if let Err(err) = self.try_fill_bytes(dest) {
            panic!("{err}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        if self.remaining() < dest.len() {
            return Err(Error::new("deterministic byte source exhausted"));
        }
        dest.copy_from_slice(&self.buf[self.pos..self.pos + dest.len()]);
        self.pos += dest.len();
        Ok(())
    }
}

// The buffer is the output of a memory-hard KDF over a caller-held master
// seed; reproducibility is the contract of deterministic key generation.
impl CryptoRng for DeterministicSource {}
