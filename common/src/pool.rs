//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("party \"{0}\" is not registered with the pool")]
    UnknownParty(String),
    #[error("mailbox (to: {recipient}, from: {sender}, id: {msg_id}) is closed")]
    Closed {
        recipient: String,
        sender: String,
        msg_id: String,
    },
}

/// (recipient, sender, msg_id)
type MailboxKey = (String, String, String);

struct Mailbox<M> {
    tx: mpsc::UnboundedSender<M>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<M>>>,
}

impl<M> Mailbox<M> {
    fn new() -> Mailbox<M> {
        let (tx, rx) = mpsc::unbounded_channel();
        Mailbox {
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
        }
    }
}

/// Point-to-point message pool connecting the registered parties.
///
/// Every `(recipient, sender, msg_id)` triple addresses its own mailbox;
/// delivery within one mailbox is reliable and FIFO. Payloads are moved
/// through untouched, so callers can exchange native structures without a
/// serialization step.
///
/// There are no timeouts and no retries: a `receive` for which no `send`
/// ever happens suspends indefinitely.
pub struct Pool<M> {
    parties: HashSet<String>,
    mailboxes: Mutex<HashMap<MailboxKey, Mailbox<M>>>,
}

impl<M: Send + 'static> Pool<M> {
    pub fn new<I, S>(parties: I) -> Pool<M>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Pool {
            parties: parties.into_iter().map(|p| p.into()).collect(),
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    /// True when `party` was registered at pool construction
    pub fn contains(&self, party: &str) -> bool {
        self.parties.contains(party)
    }

    pub fn parties(&self) -> Vec<String> {
        let mut v = self.parties.iter().cloned().collect::<Vec<_>>();
        v.sort_unstable();
        v
    }

    fn check_party(&self, party: &str) -> Result<(), PoolError> {
        if self.contains(party) {
            Ok(())
        } else {
            Err(PoolError::UnknownParty(party.to_string()))
        }
    }

    fn sender(&self, key: &MailboxKey) -> mpsc::UnboundedSender<M> {
        let mut mailboxes = self.mailboxes.lock().unwrap();
        mailboxes
            .entry(key.clone())
            .or_insert_with(Mailbox::new)
            .tx
            .clone()
    }

    fn receiver(&self, key: &MailboxKey) -> Arc<AsyncMutex<mpsc::UnboundedReceiver<M>>> {
        let mut mailboxes = self.mailboxes.lock().unwrap();
        mailboxes
            .entry(key.clone())
            .or_insert_with(Mailbox::new)
            .rx
            .clone()
    }

    /// Delivers `payload` to `recipient`'s mailbox for `(sender, msg_id)`
    pub async fn send(
        &self,
        sender: &str,
        recipient: &str,
        msg_id: &str,
        payload: M,
    ) -> Result<(), PoolError> {
        self.check_party(sender)?;
        self.check_party(recipient)?;

        let key = (
            recipient.to_string(),
            sender.to_string(),
            msg_id.to_string(),
        );
        debug!("pool: {} -> {} [{}]", sender, recipient, msg_id);
        self.sender(&key).send(payload).map_err(|_| PoolError::Closed {
            recipient: key.0,
            sender: key.1,
            msg_id: key.2,
        })
    }

    /// Awaits the next payload in `recipient`'s mailbox for `(sender, msg_id)`
    pub async fn receive(
        &self,
        recipient: &str,
        sender: &str,
        msg_id: &str,
    ) -> Result<M, PoolError> {
        self.check_party(sender)?;
        self.check_party(recipient)?;

        let key = (
            recipient.to_string(),
            sender.to_string(),
            msg_id.to_string(),
        );
        let rx = self.receiver(&key);
        let payload = rx.lock().await.recv().await;
        payload.ok_or(PoolError::Closed {
            recipient: key.0,
            sender: key.1,
            msg_id: key.2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_party_pool() -> Pool<u64> {
        Pool::new(["alice", "bob", "henri"])
    }

    #[test]
    fn registered_parties_are_listed() {
        let pool = three_party_pool();
        assert_eq!(pool.parties(), vec!["alice", "bob", "henri"]);
        assert!(pool.contains("alice"));
        assert!(!pool.contains("eve"));
    }

    #[tokio::test]
    async fn send_then_receive() {
        let pool = three_party_pool();
        pool.send("alice", "bob", "salt", 42).await.unwrap();
        let v = pool.receive("bob", "alice", "salt").await.unwrap();
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn receive_before_send() {
        let pool = Arc::new(three_party_pool());

        let rx_pool = pool.clone();
        let handle =
            tokio::spawn(async move { rx_pool.receive("bob", "alice", "salt").await.unwrap() });

        tokio::task::yield_now().await;
        pool.send("alice", "bob", "salt", 7).await.unwrap();
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn fifo_per_key() {
        let pool = three_party_pool();
        for v in 0..10 {
            pool.send("alice", "henri", "table", v).await.unwrap();
        }
        for v in 0..10 {
            assert_eq!(pool.receive("henri", "alice", "table").await.unwrap(), v);
        }
    }

    #[tokio::test]
    async fn keys_do_not_interfere() {
        let pool = three_party_pool();
        pool.send("alice", "bob", "salt", 1).await.unwrap();
        pool.send("alice", "bob", "names", 2).await.unwrap();
        pool.send("henri", "bob", "salt", 3).await.unwrap();

        assert_eq!(pool.receive("bob", "henri", "salt").await.unwrap(), 3);
        assert_eq!(pool.receive("bob", "alice", "names").await.unwrap(), 2);
        assert_eq!(pool.receive("bob", "alice", "salt").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_party_is_rejected() {
        let pool = three_party_pool();
        assert!(matches!(
            pool.send("alice", "eve", "salt", 0).await,
            Err(PoolError::UnknownParty(_))
        ));
        assert!(matches!(
            pool.receive("eve", "alice", "salt").await,
            Err(PoolError::UnknownParty(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_exchanges_complete() {
        let pool = Arc::new(three_party_pool());

        let a = pool.clone();
        let alice = tokio::spawn(async move {
            let (_, r) = tokio::join!(
                async { a.send("alice", "bob", "key", 10).await.unwrap() },
                async { a.receive("alice", "bob", "key").await.unwrap() },
            );
            r
        });

        let b = pool.clone();
        let bob = tokio::spawn(async move {
            let (_, r) = tokio::join!(
                async { b.send("bob", "alice", "key", 20).await.unwrap() },
                async { b.receive("bob", "alice", "key").await.unwrap() },
            );
            r
        });

        assert_eq!(alice.await.unwrap(), 20);
        assert_eq!(bob.await.unwrap(), 10);
    }
}
