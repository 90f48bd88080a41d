//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

/// Opaque byte payload used for digests and serialized ciphertexts
#[derive(Hash, PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct ByteBuffer {
    pub buffer: Vec<u8>,
}

impl ByteBuffer {
    pub fn from_slice(v: &[u8]) -> ByteBuffer {
        ByteBuffer { buffer: v.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Display for ByteBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        for b in self.buffer.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_lowercase_hex() {
        let b = ByteBuffer::from_slice(&[0x0f, 0xa0, 0x01]);
        assert_eq!(format!("{}", b), "0fa001");
    }

    #[test]
    fn test_from_slice_roundtrip() {
        let v = [1u8, 2, 3];
        let b = ByteBuffer::from_slice(&v);
        assert_eq!(b.buffer, v.to_vec());
        assert_eq!(b.len(), 3);
        assert!(!b.is_empty());
    }
}
