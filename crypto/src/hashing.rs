//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use num_bigint::BigUint;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;
use sha2::Digest;
use sha2::Sha256;

use crate::bytes::ByteBuffer;

/// 256-bit digest of `identifier || salt`.
///
/// The digest is only ever compared for equality; identical identifier and
/// salt always produce the identical digest.
pub fn hash_identifier(identifier: &str, salt: &BigUint) -> ByteBuffer {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update(salt.to_bytes_le());
    ByteBuffer {
        buffer: hasher.finalize().to_vec(),
    }
}

/// Hashes a whole identifier column under one salt
pub fn hash_identifiers(identifiers: &[String], salt: &BigUint) -> Vec<ByteBuffer> {
    identifiers
        .par_iter()
        .map(|id| hash_identifier(id, salt))
        .collect::<Vec<ByteBuffer>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let salt = BigUint::from(123456789_u64);
        assert_eq!(hash_identifier("id-1", &salt), hash_identifier("id-1", &salt));
    }

    #[test]
    fn test_salt_changes_digest() {
        let s1 = BigUint::from(1_u64);
        let s2 = BigUint::from(2_u64);
        assert_ne!(hash_identifier("id-1", &s1), hash_identifier("id-1", &s2));
    }

    #[test]
    fn test_identifier_changes_digest() {
        let salt = BigUint::from(1_u64);
        assert_ne!(hash_identifier("id-1", &salt), hash_identifier("id-2", &salt));
    }

    #[test]
    fn test_digest_width() {
        let salt = BigUint::from(42_u64);
        assert_eq!(hash_identifier("id", &salt).len(), 32);
    }

    #[test]
    fn test_column_matches_single() {
        let salt = BigUint::from(7_u64);
        let ids = vec!["a".to_string(), "b".to_string()];
        let digests = hash_identifiers(&ids, &salt);
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0], hash_identifier("a", &salt));
        assert_eq!(digests[1], hash_identifier("b", &salt));
    }
}
