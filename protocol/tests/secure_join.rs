//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use common::pool::Pool;
use crypto::prelude::PaillierScheme;
use num_bigint::BigUint;
use protocol::secure_join::helper::Helper;
use protocol::secure_join::owner::DatabaseOwner;
use protocol::secure_join::owner::OwnerConfig;
use protocol::secure_join::traits::Player;
use protocol::secure_join::Message;

const TEST_KEY_SIZE: u64 = 512;
const TEST_SALT_BITS: u64 = 64;

fn owner_config(
    self_id: &str,
    identifiers: &[&str],
    feature_names: &[&str],
    features: Vec<Vec<u64>>,
) -> OwnerConfig {
    OwnerConfig {
        owners: ("alice".to_string(), "bob".to_string()),
        self_id: self_id.to_string(),
        helper_id: "henri".to_string(),
        identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
        features,
        salt_bits: TEST_SALT_BITS,
    }
}

/// Runs a full three-role protocol and returns the two owners for
/// inspection
async fn run_join(alice_config: OwnerConfig, bob_config: OwnerConfig) -> (DatabaseOwner, DatabaseOwner) {
    let _ = env_logger::builder().is_test(true).try_init();

    let pool: Arc<Pool<Message>> = Arc::new(Pool::new(["alice", "bob", "henri"]));

    let alice =
        DatabaseOwner::new(alice_config, PaillierScheme::new(TEST_KEY_SIZE), pool.clone()).unwrap();
    let bob =
        DatabaseOwner::new(bob_config, PaillierScheme::new(TEST_KEY_SIZE), pool.clone()).unwrap();
    let henri = Helper::new(
        "henri".to_string(),
        ("alice".to_string(), "bob".to_string()),
        pool.clone(),
    )
    .unwrap();

    let alice_run = {
        let role = alice.clone();
        tokio::spawn(async move { role.run_protocol().await })
    };
    let bob_run = {
        let role = bob.clone();
        tokio::spawn(async move { role.run_protocol().await })
    };
    let henri_run = {
        let role = henri.clone();
        tokio::spawn(async move { role.run_protocol().await })
    };

    alice_run.await.unwrap().unwrap();
    bob_run.await.unwrap().unwrap();
    henri_run.await.unwrap().unwrap();

    (alice, bob)
}

/// Adds the two share tables columnwise mod the column owner's modulus
fn reconstruct(alice: &DatabaseOwner, bob: &DatabaseOwner) -> Vec<Vec<BigUint>> {
    let alice_shares = alice.shares().unwrap();
    let bob_shares = bob.shares().unwrap();
    assert_eq!(alice_shares.len(), bob_shares.len());

    let n_alice = alice.public_key().n;
    let n_bob = bob.public_key().n;

    alice_shares
        .iter()
        .zip(bob_shares.iter())
        .enumerate()
        .map(|(col, (a_column, b_column))| {
            let modulus = if col < alice.num_features() {
                &n_alice
            } else {
                &n_bob
            };
            a_column
                .iter()
                .zip(b_column.iter())
                .map(|(a, b)| (a + b) % modulus)
                .collect::<Vec<BigUint>>()
        })
        .collect()
}

#[tokio::test]
async fn end_to_end_scenario() {
    let (alice, bob) = run_join(
        owner_config("alice", &["id1", "id2"], &["x"], vec![vec![5, 7]]),
        owner_config("bob", &["id2", "id3"], &["y"], vec![vec![3, 9]]),
    )
    .await;

    assert_eq!(alice.intersection_size().unwrap(), 1);
    assert_eq!(bob.intersection_size().unwrap(), 1);

    assert_eq!(alice.feature_names().unwrap(), vec!["x", "y"]);
    assert_eq!(bob.feature_names().unwrap(), vec!["x", "y"]);

    // the only matched row is id2 with x = 7 and y = 3
    let values = reconstruct(&alice, &bob);
    assert_eq!(values.len(), 2);
    assert_eq!(values[0], vec![BigUint::from(7_u64)]);
    assert_eq!(values[1], vec![BigUint::from(3_u64)]);
}

#[tokio::test]
async fn multi_column_join_aligns_rows() {
    // matched identifiers in Alice's row order: id-b (20, 200 | 7), id-d (40, 400 | 5)
    let (alice, bob) = run_join(
        owner_config(
            "alice",
            &["id-a", "id-b", "id-c", "id-d"],
            &["income", "expenses"],
            vec![vec![10, 20, 30, 40], vec![100, 200, 300, 400]],
        ),
        owner_config("bob", &["id-d", "id-b", "id-e"], &["score"], vec![vec![5, 7, 9]]),
    )
    .await;

    assert_eq!(alice.intersection_size().unwrap(), 2);
    assert_eq!(bob.intersection_size().unwrap(), 2);
    assert_eq!(
        alice.feature_names().unwrap(),
        vec!["income", "expenses", "score"]
    );

    let values = reconstruct(&alice, &bob);
    assert_eq!(values.len(), 3);
    assert_eq!(values[0], vec![BigUint::from(20_u64), BigUint::from(40_u64)]);
    assert_eq!(
        values[1],
        vec![BigUint::from(200_u64), BigUint::from(400_u64)]
    );
    assert_eq!(values[2], vec![BigUint::from(7_u64), BigUint::from(5_u64)]);
}

#[tokio::test]
async fn empty_intersection_completes_cleanly() {
    let (alice, bob) = run_join(
        owner_config("alice", &["id1", "id2"], &["x"], vec![vec![1, 2]]),
        owner_config("bob", &["id3", "id4"], &["y"], vec![vec![3, 4]]),
    )
    .await;

    assert_eq!(alice.intersection_size().unwrap(), 0);
    assert_eq!(bob.intersection_size().unwrap(), 0);

    // both share tables carry the full column set with zero rows
    for owner in [&alice, &bob] {
        let shares = owner.shares().unwrap();
        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|column| column.is_empty()));
        assert_eq!(owner.feature_names().unwrap(), vec!["x", "y"]);
    }
}

#[tokio::test]
async fn share_halves_alone_are_not_the_values() {
    // a single share column is a uniform masking, not the joined values;
    // this only sanity checks that the shares differ from the plaintexts,
    // which fails with probability ~2^-512 per entry
    let (alice, bob) = run_join(
        owner_config("alice", &["id1", "id2"], &["x"], vec![vec![5, 7]]),
        owner_config("bob", &["id2", "id3"], &["y"], vec![vec![3, 9]]),
    )
    .await;

    let alice_shares = alice.shares().unwrap();
    let bob_shares = bob.shares().unwrap();
    assert_ne!(alice_shares[0], vec![BigUint::from(7_u64)]);
    assert_ne!(bob_shares[0], vec![BigUint::from(7_u64)]);
    assert_ne!(alice_shares[1], vec![BigUint::from(3_u64)]);
    assert_ne!(bob_shares[1], vec![BigUint::from(3_u64)]);
}
