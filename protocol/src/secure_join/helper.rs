//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;
use common::pool::Pool;
use common::timer;
use common::vectors::intersection_indices;
use common::vectors::select_rows;
use crypto::paillier::subtract_cipher;
use crypto::prelude::EncryptionKey;
use itertools::Itertools;

use crate::secure_join::empty_slot;
use crate::secure_join::fill_slot;
use crate::secure_join::read_slot;
use crate::secure_join::run_blocking;
use crate::secure_join::traits::Player;
use crate::secure_join::CipherColumns;
use crate::secure_join::EncryptedTable;
use crate::secure_join::Message;
use crate::secure_join::ProtocolError;
use crate::secure_join::Slot;
use crate::secure_join::ID_ENCRYPTED_MASK;
use crate::secure_join::ID_ENCRYPTED_TABLE;
use crate::secure_join::ID_INTERSECTION_SIZE;
use crate::secure_join::ID_REAL_SHARE;

/// The semi-honest third party ("Henri").
///
/// Sees only salted digests and ciphertexts: it matches the two uploaded
/// tables on digest equality, reports the intersection size, and turns the
/// matched ciphertexts into masked real shares by same-key subtraction. It
/// never holds a decryption key; its state lives only for a single run and
/// is never persisted.
#[derive(Clone)]
pub struct Helper {
    pool: Arc<Pool<Message>>,
    self_id: String,
    /// Owner identities in canonical column order
    owner_ids: (String, String),

    /// Uploaded tables, keyed by owner, until `combine` consumes them
    tables: Arc<RwLock<HashMap<String, EncryptedTable>>>,
    /// Matched ciphertext block, lead owner's columns first
    matched_columns: Slot<CipherColumns>,
    /// Owner id to column range within the matched block
    feature_columns: Arc<RwLock<HashMap<String, Range<usize>>>>,
    owner_keys: Arc<RwLock<HashMap<String, EncryptionKey>>>,
    intersection_size: Slot<usize>,
}

impl Helper {
    pub fn new(
        self_id: String,
        owners: (String, String),
        pool: Arc<Pool<Message>>,
    ) -> Result<Helper, ProtocolError> {
        for party in [self_id.as_str(), owners.0.as_str(), owners.1.as_str()] {
            if !pool.contains(party) {
                return Err(ProtocolError::Configuration(format!(
                    "required counterparty \"{}\" is not registered with the pool",
                    party
                )));
            }
        }

        Ok(Helper {
            pool,
            self_id,
            owner_ids: owners,
            tables: Arc::new(RwLock::new(HashMap::new())),
            matched_columns: empty_slot(),
            feature_columns: Arc::new(RwLock::new(HashMap::new())),
            owner_keys: Arc::new(RwLock::new(HashMap::new())),
            intersection_size: empty_slot(),
        })
    }

    /// Receives both owners' encrypted tables; a full barrier, nothing
    /// proceeds until both uploads arrived
    pub async fn store_data(&self) -> Result<(), ProtocolError> {
        let (first, second) = tokio::join!(
            self.receive_from(&self.owner_ids.0, ID_ENCRYPTED_TABLE),
            self.receive_from(&self.owner_ids.1, ID_ENCRYPTED_TABLE),
        );

        let mut tables = self.tables.write().unwrap();
        tables.insert(self.owner_ids.0.clone(), first?.into_encrypted_table()?);
        tables.insert(self.owner_ids.1.clone(), second?.into_encrypted_table()?);

        debug!("{}: both tables stored", self.self_id);
        Ok(())
    }

    /// Matches the two digest columns and assembles the matched ciphertext
    /// block plus the owner-to-column-range map
    fn combine(&self) -> Result<usize, ProtocolError> {
        let (lead, follower) = {
            let mut tables = self.tables.write().unwrap();
            let lead = tables.remove(&self.owner_ids.0).ok_or_else(|| {
                ProtocolError::State(format!("table of \"{}\" not received yet", self.owner_ids.0))
            })?;
            let follower = tables.remove(&self.owner_ids.1).ok_or_else(|| {
                ProtocolError::State(format!("table of \"{}\" not received yet", self.owner_ids.1))
            })?;
            (lead, follower)
        };

        let t = timer::Timer::new_silent(&self.self_id);
        let (lead_rows, follower_rows) = intersection_indices(&lead.hashed_ids, &follower.hashed_ids);
        let size = lead_rows.len();
        t.qps("digest match", lead.hashed_ids.len() + follower.hashed_ids.len());

        let lead_width = lead.columns.len();
        let follower_width = follower.columns.len();

        let mut block = CipherColumns::with_capacity(lead_width + follower_width);
        for column in lead.columns.iter() {
            block.push(select_rows(column, &lead_rows));
        }
        for column in follower.columns.iter() {
            block.push(select_rows(column, &follower_rows));
        }

        {
            let mut ranges = self.feature_columns.write().unwrap();
            ranges.insert(self.owner_ids.0.clone(), 0..lead_width);
            ranges.insert(
                self.owner_ids.1.clone(),
                lead_width..lead_width + follower_width,
            );
        }
        {
            let mut keys = self.owner_keys.write().unwrap();
            keys.insert(self.owner_ids.0.clone(), lead.public_key);
            keys.insert(self.owner_ids.1.clone(), follower.public_key);
        }

        fill_slot(&self.matched_columns, block);
        fill_slot(&self.intersection_size, size);
        Ok(size)
    }

    /// Computes the intersection and concurrently reports its size to both
    /// owners
    pub async fn combine_and_send(&self) -> Result<(), ProtocolError> {
        let this = self.clone();
        let size = run_blocking(move || this.combine()).await?;
        info!("{}: intersection size {}", self.self_id, size);

        let (first, second) = tokio::join!(
            self.send_to(
                &self.owner_ids.0,
                ID_INTERSECTION_SIZE,
                Message::IntersectionSize(size as u64),
            ),
            self.send_to(
                &self.owner_ids.1,
                ID_INTERSECTION_SIZE,
                Message::IntersectionSize(size as u64),
            ),
        );
        first?;
        second
    }

    /// Subtracts a received mask from the matched block columns belonging
    /// to `owner`; ciphertext arithmetic under that owner's key
    fn subtract_mask(&self, owner: &str, mask: CipherColumns) -> Result<CipherColumns, ProtocolError> {
        let range = self
            .feature_columns
            .read()
            .unwrap()
            .get(owner)
            .cloned()
            .ok_or_else(|| {
                ProtocolError::State(format!("no feature column range for \"{}\"", owner))
            })?;
        let key = self
            .owner_keys
            .read()
            .unwrap()
            .get(owner)
            .cloned()
            .ok_or_else(|| ProtocolError::State(format!("no public key for \"{}\"", owner)))?;

        if mask.len() != range.len() {
            return Err(ProtocolError::State(format!(
                "mask of {} columns against a {} column block for \"{}\"",
                mask.len(),
                range.len(),
                owner
            )));
        }

        let block = read_slot(&self.matched_columns, "matched ciphertext block")?;
        let t = timer::Timer::new_silent(&self.self_id);
        let share = block[range]
            .iter()
            .zip_eq(mask.iter())
            .map(|(column, mask_column)| subtract_cipher(&key, column.clone(), mask_column))
            .collect::<CipherColumns>();
        t.qps("mask subtract", share.iter().map(|c| c.len()).sum());
        Ok(share)
    }

    /// One mask direction: receive the encrypted mask from `mask_sender`,
    /// subtract it from `mask_target`'s matched columns, return the real
    /// share to `mask_target`
    async fn relay_share(&self, mask_sender: &str, mask_target: &str) -> Result<(), ProtocolError> {
        let mask = self
            .receive_from(mask_sender, ID_ENCRYPTED_MASK)
            .await?
            .into_encrypted_mask()?;

        let this = self.clone();
        let target = mask_target.to_string();
        let share = run_blocking(move || this.subtract_mask(&target, mask)).await?;

        self.send_to(mask_target, ID_REAL_SHARE, Message::RealShare(share))
            .await
    }

    /// Converts both owners' matched ciphertexts into real shares; the two
    /// directions are independent and run concurrently
    pub async fn obtain_shares(&self) -> Result<(), ProtocolError> {
        let (first, second) = tokio::join!(
            self.relay_share(&self.owner_ids.0, &self.owner_ids.1),
            self.relay_share(&self.owner_ids.1, &self.owner_ids.0),
        );
        first?;
        second
    }
}

#[async_trait]
impl Player for Helper {
    fn name(&self) -> &str {
        &self.self_id
    }

    fn pool(&self) -> &Pool<Message> {
        &self.pool
    }

    fn intersection_size(&self) -> Result<usize, ProtocolError> {
        read_slot(&self.intersection_size, "intersection size")
    }

    async fn run_protocol(&self) -> Result<(), ProtocolError> {
        self.store_data().await?;
        self.combine_and_send().await?;
        self.obtain_shares().await?;

        info!("{}: protocol run complete", self.self_id);
        Ok(())
    }
}
