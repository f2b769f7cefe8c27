use std::collections::HashMap;

use chrono::{ DateTime, Utc };
use serde::Serialize;
use teloxide::types::{ ChatId, MessageId, UserId };
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Identifies one pending challenge: a member inside one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub chat_id: ChatId,
    pub member_id: UserId,
}

impl PendingKey {
    pub fn new(chat_id: ChatId, member_id: UserId) -> Self {
        Self { chat_id, member_id }
    }
}

/// A challenge that has been issued and not yet answered or expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub key: PendingKey,
    pub challenge_message_id: MessageId,
    /// `None` for button challenges, the expected sum for arithmetic ones.
    pub expected_answer: Option<i64>,
    pub issued_at: DateTime<Utc>,
}

/// Serializable view of a pending entry for the ops API.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub chat_id: i64,
    pub member_id: u64,
    pub challenge_message_id: i32,
    pub kind: &'static str,
    pub issued_at: DateTime<Utc>,
}

impl From<&PendingVerification> for PendingSummary {
    fn from(entry: &PendingVerification) -> Self {
        Self {
            chat_id: entry.key.chat_id.0,
            member_id: entry.key.member_id.0,
            challenge_message_id: entry.challenge_message_id.0,
            kind: if entry.expected_answer.is_some() { "arithmetic" } else { "button" },
            issued_at: entry.issued_at,
        }
    }
}

struct Slot {
    verification: PendingVerification,
    timer: Option<AbortHandle>,
}

/// In-memory table of members with an outstanding challenge.
///
/// Every entry is inserted once and removed once. Removal goes through
/// [`try_resolve`](Self::try_resolve) or [`try_expire`](Self::try_expire),
/// both of which check and remove under the same lock, so exactly one
/// caller ever receives a given entry. The lock is never held across I/O.
#[derive(Default)]
pub struct PendingRegistry {
    slots: Mutex<HashMap<PendingKey, Slot>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending entry. Returns `false` and leaves the existing entry
    /// untouched if the member already has a challenge in this chat.
    pub async fn mark_pending(&self, verification: PendingVerification) -> bool {
        let mut slots = self.slots.lock().await;
        if slots.contains_key(&verification.key) {
            return false;
        }
        slots.insert(verification.key, Slot { verification, timer: None });
        true
    }

    /// Remember the eviction task for the challenge posted as
    /// `challenge_message_id`. If that challenge is no longer the pending one
    /// the task is aborted at once. A handle already attached to the same
    /// entry is aborted before it is replaced.
    pub async fn attach_timer(
        &self,
        key: PendingKey,
        challenge_message_id: MessageId,
        timer: AbortHandle
    ) {
        let mut slots = self.slots.lock().await;
        match slots.get_mut(&key) {
            Some(slot) if slot.verification.challenge_message_id == challenge_message_id => {
                if let Some(displaced) = slot.timer.replace(timer) {
                    displaced.abort();
                }
            }
            _ => timer.abort(),
        }
    }

    /// Atomically remove an entry, cancelling its eviction timer.
    /// Returns `None` if there was nothing to resolve.
    pub async fn try_resolve(&self, key: PendingKey) -> Option<PendingVerification> {
        let slot = self.slots.lock().await.remove(&key)?;
        if let Some(timer) = slot.timer {
            timer.abort();
        }
        Some(slot.verification)
    }

    /// Atomically remove an entry on behalf of its own eviction timer.
    /// Same race semantics as `try_resolve`, but the timer is left running
    /// since it is the caller. Only the challenge the timer was armed for
    /// is removed; a newer challenge for the same member stays pending.
    pub async fn try_expire(
        &self,
        key: PendingKey,
        challenge_message_id: MessageId
    ) -> Option<PendingVerification> {
        let mut slots = self.slots.lock().await;
        match slots.get(&key) {
            Some(slot) if slot.verification.challenge_message_id == challenge_message_id => {
                slots.remove(&key).map(|slot| slot.verification)
            }
            _ => None,
        }
    }

    pub async fn get(&self, key: PendingKey) -> Option<PendingVerification> {
        self.slots
            .lock().await
            .get(&key)
            .map(|slot| slot.verification.clone())
    }

    pub async fn is_pending(&self, key: PendingKey) -> bool {
        self.slots.lock().await.contains_key(&key)
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of all pending entries, oldest first.
    pub async fn snapshot(&self) -> Vec<PendingVerification> {
        let mut entries: Vec<PendingVerification> = self.slots
            .lock().await
            .values()
            .map(|slot| slot.verification.clone())
            .collect();
        entries.sort_by_key(|entry| entry.issued_at);
        entries
    }
}
