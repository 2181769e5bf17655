//! # External collaborators.
//!
//! The core never talks to the chat platform or the database directly; it consumes
//! these traits instead. Implementations live in the host application.
//!
//! - [`ChatClient`]: send/delete messages, presence and invite queries
//! - [`ConfigStore`]: per-channel configuration, balances, and the explicit
//!   [`ConfigStore::write`] durability call made after every persisted mutation
//! - [`Gateway`]: the host-owned connection torn down last during shutdown
//! - [`InboundMessage`]: what the dispatch framework hands to service handlers

use async_trait::async_trait;

use crate::config::ChannelConfig;
use crate::error::CollabError;

/// Result type returned by collaborator calls.
pub type CollabResult<T> = Result<T, CollabError>;

/// A chat message routed to a service handler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Message id.
    pub id: u64,
    /// Channel the message was posted in.
    pub channel: u64,
    /// Guild of the channel (`None` for direct messages).
    pub guild: Option<u64>,
    /// Author id.
    pub author: u64,
    /// Whether the author is an automated account.
    pub author_is_bot: bool,
    /// Display name used in announcements.
    pub author_name: String,
    /// Raw message text.
    pub content: String,
}

/// Snapshot of one invite link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InviteInfo {
    /// Invite code.
    pub code: String,
    /// User who created the invite.
    pub inviter: u64,
    /// Times the invite was used.
    pub uses: u64,
}

/// Which part of the configuration a write persists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteScope {
    /// Per-user records (balances, reputation).
    User,
    /// Per-guild records (channel configs, invite counts).
    Guild,
}

/// Chat platform client.
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// Posts a message in a channel.
    async fn send_message(&self, channel: u64, text: &str) -> CollabResult<()>;

    /// Deletes a message.
    async fn delete_message(&self, channel: u64, message: u64) -> CollabResult<()>;

    /// Users present in the channel that are not automated and not offline/invisible.
    async fn eligible_users(&self, channel: u64) -> CollabResult<Vec<u64>>;

    /// Current invites of a guild.
    async fn invites(&self, guild: u64) -> CollabResult<Vec<InviteInfo>>;
}

/// Configuration and state store.
///
/// Mutators change the in-memory view; nothing is durable until [`write`](Self::write).
/// Every `add_*` has a `remove_*` counterpart used to undo it when the write fails.
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Reward event configuration of a channel, if the channel takes part.
    async fn channel_config(&self, channel: u64) -> Option<ChannelConfig>;

    /// Adds `amount` of the reward named `kind` to a user's balance.
    async fn add_reward(&self, user: u64, kind: &str, amount: u64) -> CollabResult<()>;

    /// Adds one reputation point to a user.
    async fn add_reputation(&self, user: u64) -> CollabResult<()>;

    /// Adds one captured creature to a user.
    async fn add_creature(&self, user: u64) -> CollabResult<()>;

    /// Adds one invite to an inviter's count in a guild.
    async fn add_invite(&self, guild: u64, inviter: u64) -> CollabResult<()>;

    /// Takes back an [`add_reward`](Self::add_reward) whose write failed.
    async fn remove_reward(&self, user: u64, kind: &str, amount: u64) -> CollabResult<()>;

    /// Takes back an [`add_reputation`](Self::add_reputation) whose write failed.
    async fn remove_reputation(&self, user: u64) -> CollabResult<()>;

    /// Takes back an [`add_creature`](Self::add_creature) whose write failed.
    async fn remove_creature(&self, user: u64) -> CollabResult<()>;

    /// Takes back an [`add_invite`](Self::add_invite) whose write failed.
    async fn remove_invite(&self, guild: u64, inviter: u64) -> CollabResult<()>;

    /// Persists the given scope.
    async fn write(&self, scope: WriteScope) -> CollabResult<()>;

    /// All `(user, balance)` pairs for the reward named `kind`, in any order.
    async fn scores(&self, kind: &str) -> Vec<(u64, u64)>;
}

/// Host-owned gateway connection.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Stops the connection and logs out.
    async fn disconnect(&self) -> CollabResult<()>;
}
