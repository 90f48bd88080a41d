//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

pub use crate::bytes::ByteBuffer;
pub use crate::paillier::EncryptionKey;
pub use crate::paillier::PaillierScheme;
pub use crate::paillier::PAILLIER_PUBLIC_KEY_SIZE;

pub type Bytes = Vec<ByteBuffer>;
pub type TPayload = Bytes;
