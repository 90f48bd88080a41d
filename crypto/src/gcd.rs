//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use num_bigint::BigInt;
use num_bigint::BigUint;
use num_bigint::ToBigInt;
use num_integer::Integer;
use num_traits::One;

/// Multiplicative inverse of `a` modulo `modulus`, if one exists
pub fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    let a = a.to_bigint().unwrap();
    let m = modulus.to_bigint().unwrap();

    let e = a.extended_gcd(&m);
    if !e.gcd.is_one() {
        return None;
    }

    let inv: BigInt = ((e.x % &m) + &m) % &m;
    inv.to_biguint()
}
