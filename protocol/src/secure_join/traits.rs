//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use common::pool::Pool;

use crate::secure_join::Message;
use crate::secure_join::ProtocolError;

/// Common contract of every protocol participant.
///
/// A player owns an identity in the transport pool and exchanges messages
/// exclusively through `send_to`/`receive_from`. The two role-specific
/// capabilities are the intersection size (known only after the helper
/// reported or computed it) and the protocol driver itself.
#[async_trait]
pub trait Player: Send + Sync {
    /// Identity under which this role is registered in the pool
    fn name(&self) -> &str;

    fn pool(&self) -> &Pool<Message>;

    /// Number of matched rows; `State` error before it is known
    fn intersection_size(&self) -> Result<usize, ProtocolError>;

    /// Drives this role through the whole protocol run
    async fn run_protocol(&self) -> Result<(), ProtocolError>;

    async fn send_to(
        &self,
        recipient: &str,
        msg_id: &str,
        message: Message,
    ) -> Result<(), ProtocolError> {
        Ok(self.pool().send(self.name(), recipient, msg_id, message).await?)
    }

    async fn receive_from(&self, sender: &str, msg_id: &str) -> Result<Message, ProtocolError> {
        Ok(self.pool().receive(self.name(), sender, msg_id).await?)
    }
}
