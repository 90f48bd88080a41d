//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::pool::Pool;
use common::timer;
use crypto::hashing;
use crypto::paillier::encrypt_with_key;
use crypto::paillier::random_plaintexts;
use crypto::prelude::EncryptionKey;
use crypto::prelude::PaillierScheme;
use crypto::prelude::TPayload;
use num_bigint::BigUint;
use num_bigint::RandBigInt;
use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator;

use crate::secure_join::empty_slot;
use crate::secure_join::fill_slot;
use crate::secure_join::read_slot;
use crate::secure_join::run_blocking;
use crate::secure_join::take_slot;
use crate::secure_join::traits::Player;
use crate::secure_join::CipherColumns;
use crate::secure_join::EncryptedTable;
use crate::secure_join::Message;
use crate::secure_join::ProtocolError;
use crate::secure_join::ShareColumns;
use crate::secure_join::Slot;
use crate::secure_join::ID_ENCRYPTED_MASK;
use crate::secure_join::ID_ENCRYPTED_TABLE;
use crate::secure_join::ID_FEATURE_NAMES;
use crate::secure_join::ID_INTERSECTION_SIZE;
use crate::secure_join::ID_PUBLIC_KEY;
use crate::secure_join::ID_REAL_SHARE;
use crate::secure_join::ID_SALT;
use crate::shared::TFeatures;

/// Construction parameters for one data owner
pub struct OwnerConfig {
    /// The two owner identities, in canonical column order
    pub owners: (String, String),
    pub self_id: String,
    pub helper_id: String,
    /// Identifier column; must be duplicate free
    pub identifiers: Vec<String>,
    /// One name per feature column
    pub feature_names: Vec<String>,
    /// Feature columns, column major, each as long as `identifiers`
    pub features: TFeatures,
    /// Bit length of the private salt contribution
    pub salt_bits: u64,
}

/// One of the two data holders ("Alice"/"Bob").
///
/// Hashes and encrypts its own table, uploads it to the helper, and later
/// converts the helper's masked ciphertexts into its half of the additive
/// sharing. All message-populated state sits behind `Slot`s whose accessors
/// raise a `State` error until the corresponding message has arrived.
#[derive(Clone)]
pub struct DatabaseOwner {
    pool: Arc<Pool<Message>>,
    self_id: String,
    peer_id: String,
    helper_id: String,
    /// True for the owner listed first; its columns come first in the
    /// final share table
    lead: bool,

    scheme: Arc<PaillierScheme>,
    salt_contribution: BigUint,
    identifiers: Arc<Vec<String>>,
    feature_names: Arc<Vec<String>>,
    features: Arc<TFeatures>,

    peer_public_key: Slot<EncryptionKey>,
    peer_salt_contribution: Slot<BigUint>,
    peer_feature_names: Slot<Vec<String>>,

    hashed_ids: Slot<TPayload>,
    encrypted_columns: Slot<CipherColumns>,

    intersection_size: Slot<usize>,
    /// Mask generated for the peer's columns; becomes this owner's share
    /// of those columns
    peer_mask: Slot<ShareColumns>,
    /// Decrypted real share of this owner's own columns
    own_share: Slot<ShareColumns>,
}

impl DatabaseOwner {
    pub fn new(
        config: OwnerConfig,
        scheme: PaillierScheme,
        pool: Arc<Pool<Message>>,
    ) -> Result<DatabaseOwner, ProtocolError> {
        let OwnerConfig {
            owners,
            self_id,
            helper_id,
            identifiers,
            feature_names,
            features,
            salt_bits,
        } = config;

        let (lead, peer_id) = if self_id == owners.0 {
            (true, owners.1)
        } else if self_id == owners.1 {
            (false, owners.0)
        } else {
            return Err(ProtocolError::Configuration(format!(
                "\"{}\" is not one of the configured data owners",
                self_id
            )));
        };

        for party in [self_id.as_str(), peer_id.as_str(), helper_id.as_str()] {
            if !pool.contains(party) {
                return Err(ProtocolError::Configuration(format!(
                    "required counterparty \"{}\" is not registered with the pool",
                    party
                )));
            }
        }

        if feature_names.len() != features.len() {
            return Err(ProtocolError::Configuration(format!(
                "{} feature names for {} feature columns",
                feature_names.len(),
                features.len()
            )));
        }
        for column in features.iter() {
            if column.len() != identifiers.len() {
                return Err(ProtocolError::Configuration(format!(
                    "feature column of length {} against {} identifiers",
                    column.len(),
                    identifiers.len()
                )));
            }
        }

        let unique = identifiers.iter().collect::<HashSet<_>>();
        if unique.len() != identifiers.len() {
            return Err(ProtocolError::Configuration(
                "identifier column contains duplicates".to_string(),
            ));
        }

        if salt_bits == 0 {
            return Err(ProtocolError::Configuration(
                "salt contribution needs a positive bit length".to_string(),
            ));
        }
        let salt_contribution = rand::thread_rng().gen_biguint(salt_bits);

        Ok(DatabaseOwner {
            pool,
            self_id,
            peer_id,
            helper_id,
            lead,
            scheme: Arc::new(scheme),
            salt_contribution,
            identifiers: Arc::new(identifiers),
            feature_names: Arc::new(feature_names),
            features: Arc::new(features),
            peer_public_key: empty_slot(),
            peer_salt_contribution: empty_slot(),
            peer_feature_names: empty_slot(),
            hashed_ids: empty_slot(),
            encrypted_columns: empty_slot(),
            intersection_size: empty_slot(),
            peer_mask: empty_slot(),
            own_share: empty_slot(),
        })
    }

    pub fn public_key(&self) -> EncryptionKey {
        self.scheme.public_key()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_records(&self) -> usize {
        self.identifiers.len()
    }

    /// Exchanges public key, salt contribution and feature names with the
    /// peer. The six transfers have no ordering dependency among
    /// themselves and run concurrently; all must complete before hashing
    /// or encryption starts.
    pub async fn exchange_with_peer(&self) -> Result<(), ProtocolError> {
        let (sent_key, sent_salt, sent_names, key, salt, names) = tokio::join!(
            self.send_to(
                &self.peer_id,
                ID_PUBLIC_KEY,
                Message::PublicKey(self.scheme.public_key()),
            ),
            self.send_to(
                &self.peer_id,
                ID_SALT,
                Message::SaltContribution(self.salt_contribution.clone()),
            ),
            self.send_to(
                &self.peer_id,
                ID_FEATURE_NAMES,
                Message::FeatureNames((*self.feature_names).clone()),
            ),
            self.receive_from(&self.peer_id, ID_PUBLIC_KEY),
            self.receive_from(&self.peer_id, ID_SALT),
            self.receive_from(&self.peer_id, ID_FEATURE_NAMES),
        );
        sent_key?;
        sent_salt?;
        sent_names?;

        fill_slot(&self.peer_public_key, key?.into_public_key()?);
        fill_slot(&self.peer_salt_contribution, salt?.into_salt_contribution()?);
        fill_slot(&self.peer_feature_names, names?.into_feature_names()?);

        debug!("{}: peer exchange complete", self.self_id);
        Ok(())
    }

    /// Hashes the identifier column under the combined salt. Requires both
    /// salt contributions; pure CPU work, safe to run off the event loop.
    pub fn hash_data(&self) -> Result<(), ProtocolError> {
        let peer_salt = read_slot(&self.peer_salt_contribution, "peer salt contribution")?;
        let salt = &self.salt_contribution + peer_salt;

        let t = timer::Timer::new_silent(&self.self_id);
        let digests = hashing::hash_identifiers(&self.identifiers, &salt);
        t.qps("hash", digests.len());

        fill_slot(&self.hashed_ids, digests);
        Ok(())
    }

    /// Encrypts every feature column under this owner's own key. Depends
    /// on `hash_data` having populated the working buffer.
    pub fn encrypt_data(&self) -> Result<(), ProtocolError> {
        if self.hashed_ids.read().unwrap().is_none() {
            return Err(ProtocolError::State(
                "identifiers are not hashed yet".to_string(),
            ));
        }

        let t = timer::Timer::new_silent(&self.self_id);
        let columns = self
            .features
            .iter()
            .map(|column| self.scheme.enc_serialise_u64(column))
            .collect::<CipherColumns>();
        t.qps("encrypt", self.num_features() * self.num_records());

        fill_slot(&self.encrypted_columns, columns);
        Ok(())
    }

    /// Uploads the encrypted table to the helper; the local ciphertext
    /// buffers are consumed by the send
    pub async fn send_encrypted_data(&self) -> Result<(), ProtocolError> {
        let table = EncryptedTable {
            public_key: self.scheme.public_key(),
            hashed_ids: take_slot(&self.hashed_ids, "hashed identifiers")?,
            columns: take_slot(&self.encrypted_columns, "encrypted columns")?,
        };
        self.send_to(&self.helper_id, ID_ENCRYPTED_TABLE, Message::EncryptedTable(table))
            .await
    }

    pub async fn receive_intersection_size(&self) -> Result<(), ProtocolError> {
        let size = self
            .receive_from(&self.helper_id, ID_INTERSECTION_SIZE)
            .await?
            .into_intersection_size()?;
        info!("{}: intersection size {}", self.self_id, size);
        fill_slot(&self.intersection_size, size);
        Ok(())
    }

    /// Samples the mask matrix for the peer's columns, uniform over the
    /// peer's plaintext domain. Requires the intersection size and the
    /// peer's public key.
    pub fn generate_share(&self) -> Result<(), ProtocolError> {
        let size = self.intersection_size()?;
        let peer_key = read_slot(&self.peer_public_key, "peer public key")?;
        let peer_names = read_slot(&self.peer_feature_names, "peer feature names")?;

        let mask = (0..peer_names.len())
            .into_par_iter()
            .map(|_| random_plaintexts(&peer_key, size))
            .collect::<ShareColumns>();

        fill_slot(&self.peer_mask, mask);
        Ok(())
    }

    /// Encrypts the mask matrix under the peer's key and uploads it to the
    /// helper
    pub async fn send_share(&self) -> Result<(), ProtocolError> {
        let this = self.clone();
        let encrypted = run_blocking(move || {
            let peer_key = read_slot(&this.peer_public_key, "peer public key")?;
            let mask = read_slot(&this.peer_mask, "share mask")?;

            let t = timer::Timer::new_silent(&this.self_id);
            let columns = mask
                .iter()
                .map(|column| encrypt_with_key(&peer_key, column))
                .collect::<CipherColumns>();
            t.qps("mask encrypt", columns.iter().map(|c| c.len()).sum());
            Ok(columns)
        })
        .await?;

        self.send_to(&self.helper_id, ID_ENCRYPTED_MASK, Message::EncryptedMask(encrypted))
            .await
    }

    /// Receives the masked ciphertexts of this owner's own columns from
    /// the helper and decrypts them into the own-column share
    pub async fn receive_share(&self) -> Result<(), ProtocolError> {
        let columns = self
            .receive_from(&self.helper_id, ID_REAL_SHARE)
            .await?
            .into_real_share()?;

        let this = self.clone();
        let share = run_blocking(move || {
            let t = timer::Timer::new_silent(&this.self_id);
            let share = columns
                .into_iter()
                .map(|column| this.scheme.decrypt_vec(column))
                .collect::<ShareColumns>();
            t.qps("share decrypt", share.iter().map(|c| c.len()).sum());
            Ok(share)
        })
        .await?;

        fill_slot(&self.own_share, share);
        Ok(())
    }

    /// The final share table, columns ordered lead-owner-first. Own
    /// columns hold the decrypted real share, peer columns the locally
    /// generated mask.
    pub fn shares(&self) -> Result<ShareColumns, ProtocolError> {
        let own = read_slot(&self.own_share, "own share columns")?;
        let mask = read_slot(&self.peer_mask, "peer column mask")?;

        let mut columns = ShareColumns::new();
        if self.lead {
            columns.extend(own);
            columns.extend(mask);
        } else {
            columns.extend(mask);
            columns.extend(own);
        }
        Ok(columns)
    }

    /// Column labels aligned with `shares`
    pub fn feature_names(&self) -> Result<Vec<String>, ProtocolError> {
        let peer = read_slot(&self.peer_feature_names, "peer feature names")?;

        let mut names = Vec::with_capacity(self.feature_names.len() + peer.len());
        if self.lead {
            names.extend_from_slice(&self.feature_names);
            names.extend(peer);
        } else {
            names.extend(peer);
            names.extend_from_slice(&self.feature_names);
        }
        Ok(names)
    }
}

#[async_trait]
impl Player for DatabaseOwner {
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
        self.exchange_with_peer().await?;

        let this = self.clone();
        run_blocking(move || {
            this.hash_data()?;
            this.encrypt_data()
        })
        .await?;

        self.send_encrypted_data().await?;
        self.receive_intersection_size().await?;

        let this = self.clone();
        run_blocking(move || this.generate_share()).await?;

        let (sent, received) = tokio::join!(self.send_share(), self.receive_share());
        sent?;
        received?;

        info!("{}: protocol run complete", self.self_id);
        Ok(())
    }
}
