//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::collab::{ChatClient, CollabResult, ConfigStore, InboundMessage, InviteInfo, WriteScope};
use crate::config::ChannelConfig;
use crate::error::CollabError;

/// Builds a human message.
pub(crate) fn message(channel: u64, author: u64, content: &str) -> InboundMessage {
    InboundMessage {
        id: author * 1_000 + channel,
        channel,
        guild: Some(1),
        author,
        author_is_bot: false,
        author_name: format!("user{author}"),
        content: content.to_string(),
    }
}

/// Chat client that records what it was asked to do.
#[derive(Default)]
pub(crate) struct FakeChat {
    sent: Mutex<Vec<(u64, String)>>,
    deleted: Mutex<Vec<(u64, u64)>>,
    eligible: Mutex<HashMap<u64, Vec<u64>>>,
    invites: Mutex<HashMap<u64, Vec<InviteInfo>>>,
    fail_sends: AtomicBool,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_eligible(&self, channel: u64, users: Vec<u64>) {
        self.eligible.lock().unwrap().insert(channel, users);
    }

    pub fn set_invites(&self, guild: u64, invites: Vec<InviteInfo>) {
        self.invites.lock().unwrap().insert(guild, invites);
    }

    pub fn fail_sends(&self, on: bool) {
        self.fail_sends.store(on, Ordering::SeqCst);
    }

    pub fn sent_in(&self, channel: u64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<(u64, u64)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn send_message(&self, channel: u64, text: &str) -> CollabResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(CollabError::new("send rejected"));
        }
        self.sent.lock().unwrap().push((channel, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, channel: u64, message: u64) -> CollabResult<()> {
        self.deleted.lock().unwrap().push((channel, message));
        Ok(())
    }

    async fn eligible_users(&self, channel: u64) -> CollabResult<Vec<u64>> {
        Ok(self
            .eligible
            .lock()
            .unwrap()
            .get(&channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn invites(&self, guild: u64) -> CollabResult<Vec<InviteInfo>> {
        Ok(self
            .invites
            .lock()
            .unwrap()
            .get(&guild)
            .cloned()
            .unwrap_or_default())
    }
}

/// Config store kept in hash maps, with switchable write failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
    channels: Mutex<HashMap<u64, ChannelConfig>>,
    rewards: Mutex<HashMap<(u64, String), u64>>,
    reputation: Mutex<HashMap<u64, u64>>,
    creatures: Mutex<HashMap<u64, u64>>,
    invites: Mutex<HashMap<(u64, u64), u64>>,
    writes: Mutex<Vec<WriteScope>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_channel(&self, cfg: ChannelConfig) {
        self.channels.lock().unwrap().insert(cfg.channel, cfg);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn reward(&self, user: u64, kind: &str) -> u64 {
        let rewards = self.rewards.lock().unwrap();
        rewards.get(&(user, kind.to_string())).copied().unwrap_or(0)
    }

    pub fn reputation(&self, user: u64) -> u64 {
        self.reputation.lock().unwrap().get(&user).copied().unwrap_or(0)
    }

    pub fn creatures(&self, user: u64) -> u64 {
        self.creatures.lock().unwrap().get(&user).copied().unwrap_or(0)
    }

    pub fn invites(&self, guild: u64, inviter: u64) -> u64 {
        let invites = self.invites.lock().unwrap();
        invites.get(&(guild, inviter)).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<WriteScope> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn channel_config(&self, channel: u64) -> Option<ChannelConfig> {
        self.channels.lock().unwrap().get(&channel).cloned()
    }

    async fn add_reward(&self, user: u64, kind: &str, amount: u64) -> CollabResult<()> {
        *self
            .rewards
            .lock()
            .unwrap()
            .entry((user, kind.to_string()))
            .or_default() += amount;
        Ok(())
    }

    async fn add_reputation(&self, user: u64) -> CollabResult<()> {
        *self.reputation.lock().unwrap().entry(user).or_default() += 1;
        Ok(())
    }

    async fn add_creature(&self, user: u64) -> CollabResult<()> {
        *self.creatures.lock().unwrap().entry(user).or_default() += 1;
        Ok(())
    }

    async fn add_invite(&self, guild: u64, inviter: u64) -> CollabResult<()> {
        *self.invites.lock().unwrap().entry((guild, inviter)).or_default() += 1;
        Ok(())
    }

    async fn remove_reward(&self, user: u64, kind: &str, amount: u64) -> CollabResult<()> {
        if let Some(balance) = self.rewards.lock().unwrap().get_mut(&(user, kind.to_string())) {
            *balance = balance.saturating_sub(amount);
        }
        Ok(())
    }

    async fn remove_reputation(&self, user: u64) -> CollabResult<()> {
        if let Some(points) = self.reputation.lock().unwrap().get_mut(&user) {
            *points = points.saturating_sub(1);
        }
        Ok(())
    }

    async fn remove_creature(&self, user: u64) -> CollabResult<()> {
        if let Some(count) = self.creatures.lock().unwrap().get_mut(&user) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    async fn remove_invite(&self, guild: u64, inviter: u64) -> CollabResult<()> {
        if let Some(count) = self.invites.lock().unwrap().get_mut(&(guild, inviter)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    async fn write(&self, scope: WriteScope) -> CollabResult<()> {
        // Give concurrent callers a chance to interleave around the write.
        tokio::task::yield_now().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CollabError::new("database unavailable"));
        }
        self.writes.lock().unwrap().push(scope);
        Ok(())
    }

    async fn scores(&self, kind: &str) -> Vec<(u64, u64)> {
        self.rewards
            .lock()
            .unwrap()
            .iter()
            .filter(|((_, k), _)| k == kind)
            .map(|((user, _), amount)| (*user, *amount))
            .collect()
    }
}
