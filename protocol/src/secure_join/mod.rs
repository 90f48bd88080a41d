//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::RwLock;

use common::pool::PoolError;
use crypto::prelude::EncryptionKey;
use crypto::prelude::TPayload;
use num_bigint::BigUint;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub mod helper;
pub mod owner;
pub mod traits;

/// Message ids addressing the point-to-point mailboxes. A mailbox is keyed
/// by (sender, message id), so the same id can be in flight between
/// different pairs of parties at once.
pub const ID_PUBLIC_KEY: &str = "he_public_key";
pub const ID_SALT: &str = "salt_contribution";
pub const ID_FEATURE_NAMES: &str = "feature_names";
pub const ID_ENCRYPTED_TABLE: &str = "encrypted_table";
pub const ID_INTERSECTION_SIZE: &str = "intersection_size";
pub const ID_ENCRYPTED_MASK: &str = "encrypted_mask";
pub const ID_REAL_SHARE: &str = "real_share";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("state error: {0}")]
    State(String),
    #[error(transparent)]
    Transport(#[from] PoolError),
    #[error("unexpected payload, wanted {0}")]
    UnexpectedMessage(String),
    #[error("worker error: {0}")]
    Worker(String),
}

/// Ciphertext matrix, one inner vector per feature column
pub type CipherColumns = Vec<TPayload>;

/// Plaintext share matrix, one inner vector per feature column
pub type ShareColumns = Vec<Vec<BigUint>>;

/// One owner's upload to the helper: salted digests of the identifier
/// column plus the feature columns encrypted under the owner's own key.
/// The key rides along so the helper can do same-key ciphertext arithmetic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedTable {
    pub public_key: EncryptionKey,
    pub hashed_ids: TPayload,
    pub columns: CipherColumns,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    PublicKey(EncryptionKey),
    SaltContribution(BigUint),
    FeatureNames(Vec<String>),
    EncryptedTable(EncryptedTable),
    IntersectionSize(u64),
    EncryptedMask(CipherColumns),
    RealShare(CipherColumns),
}

impl Message {
    pub fn into_public_key(self) -> Result<EncryptionKey, ProtocolError> {
        match self {
            Message::PublicKey(k) => Ok(k),
            _ => Err(ProtocolError::UnexpectedMessage(ID_PUBLIC_KEY.to_string())),
        }
    }

    pub fn into_salt_contribution(self) -> Result<BigUint, ProtocolError> {
        match self {
            Message::SaltContribution(s) => Ok(s),
            _ => Err(ProtocolError::UnexpectedMessage(ID_SALT.to_string())),
        }
    }

    pub fn into_feature_names(self) -> Result<Vec<String>, ProtocolError> {
        match self {
            Message::FeatureNames(n) => Ok(n),
            _ => Err(ProtocolError::UnexpectedMessage(ID_FEATURE_NAMES.to_string())),
        }
    }

    pub fn into_encrypted_table(self) -> Result<EncryptedTable, ProtocolError> {
        match self {
            Message::EncryptedTable(t) => Ok(t),
            _ => Err(ProtocolError::UnexpectedMessage(ID_ENCRYPTED_TABLE.to_string())),
        }
    }

    pub fn into_intersection_size(self) -> Result<usize, ProtocolError> {
        match self {
            Message::IntersectionSize(s) => Ok(s as usize),
            _ => Err(ProtocolError::UnexpectedMessage(
                ID_INTERSECTION_SIZE.to_string(),
            )),
        }
    }

    pub fn into_encrypted_mask(self) -> Result<CipherColumns, ProtocolError> {
        match self {
            Message::EncryptedMask(m) => Ok(m),
            _ => Err(ProtocolError::UnexpectedMessage(ID_ENCRYPTED_MASK.to_string())),
        }
    }

    pub fn into_real_share(self) -> Result<CipherColumns, ProtocolError> {
        match self {
            Message::RealShare(s) => Ok(s),
            _ => Err(ProtocolError::UnexpectedMessage(ID_REAL_SHARE.to_string())),
        }
    }
}

/// A slot that a message will eventually populate
pub(crate) type Slot<T> = Arc<RwLock<Option<T>>>;

pub(crate) fn empty_slot<T>() -> Slot<T> {
    Arc::new(RwLock::new(None))
}

/// Reads a message-populated slot; `State` error while still empty
pub(crate) fn read_slot<T: Clone>(slot: &Slot<T>, what: &str) -> Result<T, ProtocolError> {
    slot.read()
        .unwrap()
        .clone()
        .ok_or_else(|| ProtocolError::State(format!("{} not received yet", what)))
}

/// Moves a message-populated slot's content out; `State` error while empty
pub(crate) fn take_slot<T>(slot: &Slot<T>, what: &str) -> Result<T, ProtocolError> {
    slot.write()
        .unwrap()
        .take()
        .ok_or_else(|| ProtocolError::State(format!("{} not received yet", what)))
}

pub(crate) fn fill_slot<T>(slot: &Slot<T>, value: T) {
    *slot.write().unwrap() = Some(value);
}

/// Dispatches CPU-bound work to the blocking pool so the event loop keeps
/// serving the exchanges that are still in flight
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ProtocolError>
where
    F: FnOnce() -> Result<T, ProtocolError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProtocolError::Worker(e.to_string()))?
}
