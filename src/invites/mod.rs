//! # Invite attribution.
//!
//! Keeps the last known use count of every invite per guild. When a member joins,
//! the guild's invites are fetched again and every invite whose count grew credits
//! its creator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::collab::{ChatClient, ConfigStore, InviteInfo, WriteScope};
use crate::core::{HostContext, Service};
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};

/// An invite whose count grew in one join.
struct Credit {
    code: String,
    before: Option<u64>,
    uses: u64,
    inviter: u64,
}

/// Attributes member joins to the invites they used.
pub struct InviteTracker {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn ConfigStore>,
    bus: Bus,
    /// guild → invite code → uses
    uses: DashMap<u64, HashMap<String, u64>>,
}

impl InviteTracker {
    pub fn new(chat: Arc<dyn ChatClient>, store: Arc<dyn ConfigStore>, bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            chat,
            store,
            bus,
            uses: DashMap::new(),
        })
    }

    /// Caches the guild's current invites. Returns how many were seen.
    pub async fn load(&self, guild: u64) -> Result<usize, ServiceError> {
        let invites = self.fetch(guild).await?;
        let count = invites.len();
        self.uses.insert(
            guild,
            invites.into_iter().map(|i| (i.code, i.uses)).collect(),
        );
        debug!(guild, count, "invites loaded");
        Ok(count)
    }

    /// Credits the inviters whose invite was used since the last look.
    ///
    /// Returns the credited inviters.
    ///
    /// # Errors
    /// On a failing credit or write, credits already made are taken back and the
    /// cached counts of the credited invites are restored, so the next join retries them.
    pub async fn on_member_join(&self, guild: u64) -> Result<Vec<u64>, ServiceError> {
        let invites = self.fetch(guild).await?;
        let credits: Vec<Credit> = {
            let mut known = self.uses.entry(guild).or_default();
            invites
                .into_iter()
                .filter_map(|invite| {
                    let before = known.insert(invite.code.clone(), invite.uses);
                    let grew = match before {
                        Some(old) => old < invite.uses,
                        None => invite.uses == 1,
                    };
                    grew.then_some(Credit {
                        code: invite.code,
                        before,
                        uses: invite.uses,
                        inviter: invite.inviter,
                    })
                })
                .collect()
        };
        if credits.is_empty() {
            return Ok(Vec::new());
        }

        if let Err(e) = self.persist(guild, &credits).await {
            self.restore(guild, &credits);
            return Err(e);
        }

        for credit in &credits {
            info!(guild, inviter = credit.inviter, code = %credit.code, "member join credited");
            self.bus.publish(
                Event::new(EventKind::InviteCredited)
                    .with_key(guild)
                    .with_user(credit.inviter),
            );
        }
        Ok(credits.into_iter().map(|c| c.inviter).collect())
    }

    async fn persist(&self, guild: u64, credits: &[Credit]) -> Result<(), ServiceError> {
        let mut added = 0;
        let mut result = Ok(());
        for credit in credits {
            if let Err(e) = self.store.add_invite(guild, credit.inviter).await {
                result = Err(ServiceError::collaborator("add_invite", e));
                break;
            }
            added += 1;
        }
        if result.is_ok() {
            result = self
                .store
                .write(WriteScope::Guild)
                .await
                .map_err(|e| ServiceError::collaborator("write", e));
        }
        if result.is_err() {
            for credit in &credits[..added] {
                if let Err(undo) = self.store.remove_invite(guild, credit.inviter).await {
                    warn!(guild, inviter = credit.inviter, error = %undo, "invite credit not taken back");
                }
            }
        }
        result
    }

    /// Puts back the cached counts of `credits` unless a later join moved them.
    fn restore(&self, guild: u64, credits: &[Credit]) {
        let Some(mut known) = self.uses.get_mut(&guild) else {
            return;
        };
        for credit in credits {
            if known.get(&credit.code) != Some(&credit.uses) {
                continue;
            }
            match credit.before {
                Some(old) => known.insert(credit.code.clone(), old),
                None => known.remove(&credit.code),
            };
        }
    }

    async fn fetch(&self, guild: u64) -> Result<Vec<InviteInfo>, ServiceError> {
        self.chat
            .invites(guild)
            .await
            .map_err(|e| ServiceError::collaborator("invites", e))
    }
}

#[async_trait]
impl Service for InviteTracker {
    fn name(&self) -> &'static str {
        "invite-tracker"
    }

    async fn can_disconnect(&self, _host: &HostContext) -> bool {
        true
    }

    async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
        self.store
            .write(WriteScope::Guild)
            .await
            .map_err(|e| ServiceError::collaborator("write", e))
    }
}
