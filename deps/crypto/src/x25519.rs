// Copyright (c) 2024 The Harp Container Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Low-order X25519 public key guard.
//!
//! A peer public key lying in the small-order subgroup would force the
//! shared secret to a constant regardless of our private key, so such keys
//! are refused before any key agreement happens. The table holds the
//! canonical little-endian u-coordinates of the small-order points; every
//! published low-order encoding reduces to one of them once the top bit is
//! cleared, which the X25519 function does anyway before operating.

use subtle::{Choice, ConstantTimeEq};

/// Canonical u-coordinates of the low-order points, little-endian.
const LOW_ORDER_POINTS: [[u8; 32]; 7] = [
    // 0 (the identity's image)
    [
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    // 1
    [
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    // order-8 point
    [
        0xe0, 0xeb, 0x7a, 0x7c, 0x3b, 0x41, 0xb8, 0xae, 0x16, 0x56, 0xe3, 0xfa, 0xf1, 0x9f, 0xc4,
        0x6a, 0xda, 0x09, 0x8d, 0xeb, 0x9c, 0x32, 0xb1, 0xfd, 0x86, 0x62, 0x05, 0x16, 0x5f, 0x49,
        0xb8, 0x00,
    ],
    // order-8 point
    [
        0x5f, 0x9c, 0x95, 0xbc, 0xa3, 0x50, 0x8c, 0x24, 0xb1, 0xd0, 0xb1, 0x55, 0x9c, 0x83, 0xef,
        0x5b, 0x04, 0x44, 0x5c, 0xc4, 0x58, 0x1c, 0x8e, 0x86, 0xd8, 0x22, 0x4e, 0xdd, 0xd0, 0x9f,
        0x11, 0x57,
    ],
    // p - 1
    [
        0xec, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // p
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // p + 1
    [
        0xee, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
];

/// Returns true when `public_key` lies in the small-order subgroup.
pub fn is_low_order(public_key: &[u8; 32]) -> bool {
    let mut masked = *public_key;
    masked[31] &= 0x7f;

    let mut found = Choice::from(0u8);
    for point in &LOW_ORDER_POINTS {
        found |= masked.as_slice().ct_eq(point.as_slice());
    }
    bool::from(found)
}

#[cfg(test)]
mod tests {
    use super::{is_low_order, LOW_ORDER_POINTS};

    #[test]
    fn canonical_points_detected() {
        for point in &LOW_ORDER_POINTS {
            assert!(is_low_order(point));
        }
    }

    #[test]
    fn masked_encodings_detected() {
        for point in &LOW_ORDER_POINTS {
            let mut high_bit = *point;
            high_bit[31] |= 0x80;
            assert!(is_low_order(&high_bit));
        }
    }

    #[test]
    fn ordinary_points_accepted() {
        // base point u = 9
        let mut base = [0u8; 32];
        base[0] = 9;
        assert!(!is_low_order(&base));

        let random = [0x42u8; 32];
        assert!(!is_low_order(&random));
    }
}
