//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::fmt::Error;
use std::fmt::Formatter;

use num_bigint::BigUint;
use num_bigint::RandBigInt;
use num_bigint::ToBigInt;
use num_traits::One;
use num_traits::Zero;
use rayon::iter::IndexedParallelIterator;
use rayon::iter::IntoParallelIterator;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;
use serde::Deserialize;
use serde::Serialize;

use crate::bytes::ByteBuffer;
use crate::gcd::mod_inverse;
use crate::prime::sample_prime;

pub const PAILLIER_PUBLIC_KEY_SIZE: u64 = 2048;

/// Public half of a Paillier keypair. Serializable so an owner can ship it
/// to the peer, who then encrypts values addressed to this owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncryptionKey {
    pub n: BigUint,
    pub nn: BigUint,
}

#[derive(Clone, Debug)]
struct DecryptionKey {
    p: BigUint,
    q: BigUint,
    p_1: BigUint,
    q_1: BigUint,
    pp: BigUint,
    qq: BigUint,
    // h_p = L(g^(p-1) mod p^2)^-1 mod p, likewise h_q
    h_p: BigUint,
    h_q: BigUint,
    p_inv: BigUint,
}

fn l(x: &BigUint, n: &BigUint) -> BigUint {
    assert!(x > &BigUint::zero());
    (x - BigUint::one()) / n
}

fn gen_keypair(key_size: u64) -> (EncryptionKey, DecryptionKey) {
    assert_eq!(key_size % 2, 0);

    let p = sample_prime(key_size / 2);
    let q = loop {
        let q = sample_prime(key_size / 2);
        if q != p {
            break q;
        }
    };

    let n = &p * &q;
    let nn = &n * &n;
    let pp = &p * &p;
    let qq = &q * &q;
    let p_1 = &p - BigUint::one();
    let q_1 = &q - BigUint::one();
    let g = &n + BigUint::one();

    let h_p = mod_inverse(&l(&g.modpow(&p_1, &pp), &p), &p).unwrap();
    let h_q = mod_inverse(&l(&g.modpow(&q_1, &qq), &q), &q).unwrap();
    let p_inv = mod_inverse(&p, &q).unwrap();

    (
        EncryptionKey { n, nn },
        DecryptionKey {
            p,
            q,
            p_1,
            q_1,
            pp,
            qq,
            h_p,
            h_q,
            p_inv,
        },
    )
}

fn encrypt(msg: &BigUint, key: &EncryptionKey) -> BigUint {
    assert!(msg < &key.n);
    let mut rng = rand::thread_rng();
    let r = rng.gen_biguint_range(&BigUint::one(), &key.n);

    // g = n + 1, hence g^m mod n^2 is 1 + m * n
    let g_m = (BigUint::one() + msg * &key.n) % &key.nn;
    let r_n = r.modpow(&key.n, &key.nn);

    (g_m * r_n) % &key.nn
}

// CRT decryption, section 7 of Paillier's original paper
fn decrypt(cipher: &BigUint, key: &DecryptionKey) -> BigUint {
    let m_p = (l(&cipher.modpow(&key.p_1, &key.pp), &key.p) * &key.h_p) % &key.p;
    let m_q = (l(&cipher.modpow(&key.q_1, &key.qq), &key.q) * &key.h_q) % &key.q;

    let diff = {
        let q = key.q.to_bigint().unwrap();
        let d = (m_q.to_bigint().unwrap() - m_p.to_bigint().unwrap()) % &q;
        (((d + &q) % &q).to_biguint()).unwrap()
    };
    let t = (diff * &key.p_inv) % &key.q;

    m_p + t * &key.p
}

/// Uniform sample over the scheme's plaintext domain `[0, n)`
pub fn random_plaintext(enc_key: &EncryptionKey) -> BigUint {
    let mut rng = rand::thread_rng();
    rng.gen_biguint_range(&BigUint::zero(), &enc_key.n)
}

/// A column of uniform plaintext samples
pub fn random_plaintexts(enc_key: &EncryptionKey, count: usize) -> Vec<BigUint> {
    (0..count).map(|_| random_plaintext(enc_key)).collect()
}

/// Encrypts a plaintext column under an arbitrary public key, typically the
/// peer's
pub fn encrypt_with_key(enc_key: &EncryptionKey, raw: &[BigUint]) -> Vec<ByteBuffer> {
    raw.par_iter()
        .map(|item| ByteBuffer {
            buffer: encrypt(item, enc_key).to_bytes_le(),
        })
        .collect::<Vec<ByteBuffer>>()
}

/// Elementwise ciphertext subtraction under one key.
///
/// Both columns must be encrypted under `enc_key`; the result decrypts to
/// the elementwise plaintext difference modulo `n`.
pub fn subtract_cipher(
    enc_key: &EncryptionKey,
    lhs: Vec<ByteBuffer>,
    rhs: &[ByteBuffer],
) -> Vec<ByteBuffer> {
    lhs.into_par_iter()
        .zip_eq(rhs.par_iter())
        .map(|(l_bytes, r_bytes)| {
            let c_l = BigUint::from_bytes_le(&l_bytes.buffer);
            let c_r = BigUint::from_bytes_le(&r_bytes.buffer);
            let c_r_inv = mod_inverse(&c_r, &enc_key.nn).unwrap();
            ByteBuffer {
                buffer: ((c_l * c_r_inv) % &enc_key.nn).to_bytes_le(),
            }
        })
        .collect::<Vec<ByteBuffer>>()
}

/// An additively homomorphic Paillier keypair with vectorized column
/// operations
pub struct PaillierScheme {
    pub enc_key: EncryptionKey,
    dec_key: DecryptionKey,
}

impl PaillierScheme {
    pub fn new(key_size: u64) -> PaillierScheme {
        let (enc_key, dec_key) = gen_keypair(key_size);
        PaillierScheme { enc_key, dec_key }
    }

    pub fn public_key(&self) -> EncryptionKey {
        self.enc_key.clone()
    }

    pub fn enc_serialise_u64(&self, raw: &[u64]) -> Vec<ByteBuffer> {
        raw.into_par_iter()
            .map(|item| ByteBuffer {
                buffer: encrypt(&BigUint::from(*item), &self.enc_key).to_bytes_le(),
            })
            .collect::<Vec<ByteBuffer>>()
    }

    pub fn decrypt_vec(&self, payload: Vec<ByteBuffer>) -> Vec<BigUint> {
        payload
            .into_par_iter()
            .map(|item| decrypt(&BigUint::from_bytes_le(&item.buffer), &self.dec_key))
            .collect::<Vec<BigUint>>()
    }
}

impl Debug for PaillierScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "Paillier cipher ({} bit)", self.enc_key.n.bits())
    }
}

impl Default for PaillierScheme {
    fn default() -> Self {
        Self::new(PAILLIER_PUBLIC_KEY_SIZE)
    }
}
