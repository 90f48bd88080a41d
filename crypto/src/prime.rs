//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use num_bigint::BigUint;
use num_bigint::RandBigInt;
use num_traits::One;
use num_traits::Zero;

const MILLER_RABIN_ROUNDS: usize = 40;

const SMALL_PRIMES: [u32; 15] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47];

fn is_probable_prime(n: &BigUint) -> bool {
    let one = BigUint::one();
    let two = &one + &one;

    if n < &two {
        return false;
    }
    for p in SMALL_PRIMES.iter() {
        let p = BigUint::from(*p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    // write n - 1 as d * 2^s with d odd
    let n_1 = n - &one;
    let s = n_1.trailing_zeros().unwrap_or(0);
    let d = &n_1 >> s;

    let mut rng = rand::thread_rng();
    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_1);
        let mut x = a.modpow(&d, n);

        if x.is_one() || x == n_1 {
            continue;
        }
        for _ in 0..s.saturating_sub(1) {
            x = x.modpow(&two, n);
            if x == n_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Samples a prime of exactly `bits` bits
pub fn sample_prime(bits: u64) -> BigUint {
    assert!(bits >= 8);

    let mut rng = rand::thread_rng();
    let one = BigUint::one();

    loop {
        // force the top bit for the exact width and the bottom bit for oddness
        let candidate = rng.gen_biguint(bits) | (&one << (bits - 1)) | &one;
        if is_probable_prime(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_primes() {
        for p in [2_u32, 3, 5, 47, 53, 7919, 104729] {
            assert!(is_probable_prime(&BigUint::from(p)), "{} is prime", p);
        }
    }

    #[test]
    fn test_known_composites() {
        // includes Carmichael numbers
        for c in [1_u32, 4, 49, 561, 1729, 104730] {
            assert!(!is_probable_prime(&BigUint::from(c)), "{} is composite", c);
        }
    }

    #[test]
    fn test_sampled_prime_width() {
        for _ in 0..4 {
            let p = sample_prime(128);
            assert_eq!(p.bits(), 128);
            assert!(is_probable_prime(&p));
        }
    }
}
