use std::collections::HashMap;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::time::Duration;

use chrono::{ DateTime, Utc };
use serde::Serialize;
use teloxide::types::{ CallbackQueryId, ChatId, MessageId, User, UserId };
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db::{ MemberDirectory, NewMember };
use crate::enums::ChallengeMode;
use crate::error::Result;

use super::challenge::{ parse_answer, CallbackAction, Challenge };
use super::messages as msg;
use super::registry::{ PendingKey, PendingRegistry, PendingVerification };
use super::scheduler::EvictionScheduler;
use super::transport::{ ChatTransport, SendOptions };

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub mode: ChallengeMode,
    pub timeout: Duration,
    pub kick_grace: Duration,
    pub delete_previous_welcome: bool,
    pub community_name: String,
}

impl From<&Config> for VerificationSettings {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.challenge_mode,
            timeout: config.verification_timeout,
            kick_grace: config.kick_grace,
            delete_previous_welcome: config.delete_previous_welcome,
            community_name: config.community_name.clone(),
        }
    }
}

/// The parts of a Telegram user the verification flow cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl MemberProfile {
    pub fn to_new_member(&self, joined_at: DateTime<Utc>) -> NewMember {
        NewMember {
            telegram_id: self.id.0 as i64,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
            joined_at,
        }
    }
}

impl From<&User> for MemberProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            is_bot: user.is_bot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The clicker was pending and is now verified.
    Verified,
    /// Someone pressed a button addressed to another member.
    NotYourButton,
    /// The button's member has no active challenge (already verified or evicted).
    NotPending,
    /// Payload not understood or not a button challenge.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Verified,
    /// A reply to the challenge that was not the right number. The member
    /// stays pending and may try again.
    WrongAnswer,
    /// Not a reply to an active arithmetic challenge of this member.
    Ignored,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VerificationStats {
    pub issued: u64,
    pub verified: u64,
    pub evicted: u64,
}

#[derive(Default)]
struct Counters {
    issued: AtomicU64,
    verified: AtomicU64,
    evicted: AtomicU64,
}

/// Drives the `NONE -> PENDING -> {VERIFIED, EVICTED}` life cycle of joining
/// members. Whichever of verification or eviction resolves the registry
/// entry first acts; the other does nothing.
pub struct VerificationController {
    registry: PendingRegistry,
    transport: Arc<dyn ChatTransport>,
    directory: Arc<dyn MemberDirectory>,
    scheduler: EvictionScheduler,
    settings: VerificationSettings,
    last_welcome: Mutex<HashMap<ChatId, MessageId>>,
    counters: Counters,
}

impl VerificationController {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        directory: Arc<dyn MemberDirectory>,
        settings: VerificationSettings
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: PendingRegistry::new(),
            transport,
            directory,
            scheduler: EvictionScheduler::new(settings.timeout),
            settings,
            last_welcome: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        })
    }

    pub fn settings(&self) -> &VerificationSettings {
        &self.settings
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    pub fn stats(&self) -> VerificationStats {
        VerificationStats {
            issued: self.counters.issued.load(Ordering::Relaxed),
            verified: self.counters.verified.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }

    /// Challenge every human in a join batch. Returns how many challenges
    /// were issued.
    pub async fn on_members_joined(
        self: &Arc<Self>,
        chat_id: ChatId,
        join_message: Option<MessageId>,
        members: &[MemberProfile]
    ) -> usize {
        let mut issued = 0;

        for member in members {
            if member.is_bot {
                continue;
            }

            let challenge = Challenge::generate(self.settings.mode);
            match self.issue_challenge(chat_id, join_message, member, challenge).await {
                Ok(true) => {
                    issued += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        "Failed to send challenge to {} in chat {}: {}",
                        member.id,
                        chat_id,
                        e
                    );
                }
            }
        }

        issued
    }

    /// Send `challenge` to `member`, mark them pending and arm the eviction
    /// timer. Returns `Ok(false)` if the member already had a challenge here.
    pub async fn issue_challenge(
        self: &Arc<Self>,
        chat_id: ChatId,
        join_message: Option<MessageId>,
        member: &MemberProfile,
        challenge: Challenge
    ) -> Result<bool> {
        let key = PendingKey::new(chat_id, member.id);

        if self.registry.is_pending(key).await {
            tracing::debug!("Member {} already pending in chat {}", member.id, chat_id);
            return Ok(false);
        }

        let (text, mut options) = match challenge {
            Challenge::Button => {
                (
                    msg::button_challenge(&member.first_name, self.settings.timeout),
                    SendOptions::default().with_keyboard(msg::verify_button(member.id)),
                )
            }
            Challenge::Arithmetic { a, b } => {
                (
                    msg::arithmetic_challenge(&member.first_name, a, b, self.settings.timeout),
                    SendOptions::default(),
                )
            }
        };
        if let Some(join_message) = join_message {
            options = options.reply_to(join_message);
        }

        let challenge_message_id = self.transport.send_message(chat_id, text, options).await?;

        let pending = PendingVerification {
            key,
            challenge_message_id,
            expected_answer: challenge.expected_answer(),
            issued_at: Utc::now(),
        };

        if !self.registry.mark_pending(pending).await {
            // A concurrent join event got there first
            if let Err(e) = self.transport.delete_message(chat_id, challenge_message_id).await {
                tracing::warn!("Failed to delete duplicate challenge: {}", e);
            }
            return Ok(false);
        }

        let timer = self.scheduler.schedule(Arc::clone(self), key, challenge_message_id);
        self.registry.attach_timer(key, challenge_message_id, timer).await;
        self.counters.issued.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "Issued {:?} challenge to {} ({}) in chat {}",
            challenge,
            member.first_name,
            member.id,
            chat_id
        );
        Ok(true)
    }

    /// Handle a press of a verification button carrying `data` and answer
    /// the query. The answer is only visible to the presser.
    pub async fn on_button_click(
        &self,
        callback_id: CallbackQueryId,
        chat_id: ChatId,
        clicker: &MemberProfile,
        data: &str
    ) -> ClickOutcome {
        let outcome = self.resolve_click(chat_id, clicker, data).await;

        let (text, show_alert) = match outcome {
            ClickOutcome::Verified => (Some(msg::VERIFIED_TOAST), false),
            ClickOutcome::NotYourButton => (Some(msg::NOT_YOUR_BUTTON), true),
            ClickOutcome::NotPending => (Some(msg::ALREADY_RESOLVED), false),
            ClickOutcome::Ignored => (None, false),
        };
        if
            let Err(e) = self.transport.answer_callback(
                callback_id,
                text.map(str::to_string),
                show_alert
            ).await
        {
            tracing::warn!("Failed to answer button press of {}: {}", clicker.id, e);
        }

        outcome
    }

    async fn resolve_click(
        &self,
        chat_id: ChatId,
        clicker: &MemberProfile,
        data: &str
    ) -> ClickOutcome {
        let Ok(action) = data.parse::<CallbackAction>() else {
            return ClickOutcome::Ignored;
        };

        if action.target() != clicker.id {
            tracing::debug!(
                "User {} pressed the verification button of {} in chat {}",
                clicker.id,
                action.target(),
                chat_id
            );
            return ClickOutcome::NotYourButton;
        }

        let key = PendingKey::new(chat_id, clicker.id);
        match self.registry.get(key).await {
            Some(pending) if pending.expected_answer.is_none() => {}
            Some(_) => {
                return ClickOutcome::Ignored;
            }
            None => {
                return ClickOutcome::NotPending;
            }
        }

        match self.registry.try_resolve(key).await {
            Some(pending) => {
                self.complete_verification(pending, clicker).await;
                ClickOutcome::Verified
            }
            // Eviction won the race
            None => ClickOutcome::NotPending,
        }
    }

    /// Handle a text reply from `from` to `replied_to`.
    pub async fn on_reply(
        &self,
        chat_id: ChatId,
        from: &MemberProfile,
        replied_to: MessageId,
        answer_message: MessageId,
        text: &str
    ) -> ReplyOutcome {
        let key = PendingKey::new(chat_id, from.id);

        let Some(pending) = self.registry.get(key).await else {
            return ReplyOutcome::Ignored;
        };
        let Some(expected) = pending.expected_answer else {
            return ReplyOutcome::Ignored;
        };
        if pending.challenge_message_id != replied_to {
            return ReplyOutcome::Ignored;
        }

        if parse_answer(text) != Some(expected) {
            return ReplyOutcome::WrongAnswer;
        }

        let Some(pending) = self.registry.try_resolve(key).await else {
            return ReplyOutcome::Ignored;
        };

        if let Err(e) = self.transport.delete_message(chat_id, answer_message).await {
            tracing::warn!("Failed to delete answer message: {}", e);
        }

        self.complete_verification(pending, from).await;
        ReplyOutcome::Verified
    }

    async fn complete_verification(&self, pending: PendingVerification, member: &MemberProfile) {
        let chat_id = pending.key.chat_id;

        if let Err(e) = self.transport.delete_message(chat_id, pending.challenge_message_id).await {
            tracing::warn!("Failed to delete challenge message: {}", e);
        }

        // The directory is best effort; verification stands either way
        if let Err(e) = self.directory.add_member(member.to_new_member(pending.issued_at)).await {
            tracing::error!("Failed to add member {} to the directory: {}", member.id, e);
        }

        let text = msg::welcome(&member.first_name, &self.settings.community_name);
        match self.transport.send_message(chat_id, text, SendOptions::default()).await {
            Ok(welcome_id) => {
                if self.settings.delete_previous_welcome {
                    self.replace_welcome(chat_id, welcome_id).await;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to send welcome message: {}", e);
            }
        }

        self.counters.verified.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Member {} ({}) verified in chat {}", member.first_name, member.id, chat_id);
    }

    async fn replace_welcome(&self, chat_id: ChatId, welcome_id: MessageId) {
        let previous = self.last_welcome.lock().await.insert(chat_id, welcome_id);

        if let Some(previous) = previous {
            if let Err(e) = self.transport.delete_message(chat_id, previous).await {
                tracing::debug!("Failed to delete previous welcome message: {}", e);
            }
        }
    }

    /// Evict the member behind `key` if the challenge posted as
    /// `challenge_message_id` is still pending. Safe to call more than once;
    /// only the first call that finds the entry acts.
    pub async fn evict(&self, key: PendingKey, challenge_message_id: MessageId) -> bool {
        let Some(pending) = self.registry.try_expire(key, challenge_message_id).await else {
            tracing::debug!("Eviction of {} skipped, already resolved", key.member_id);
            return false;
        };

        let grace = chrono::Duration
            ::from_std(self.settings.kick_grace)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let until = Utc::now() + grace;

        if let Err(e) = self.transport.remove_member(key.chat_id, key.member_id, until).await {
            tracing::warn!(
                "Failed to remove unverified member {} from chat {}: {}",
                key.member_id,
                key.chat_id,
                e
            );
        }

        if let Err(e) = self.transport.delete_message(key.chat_id, pending.challenge_message_id).await {
            tracing::warn!("Failed to delete expired challenge: {}", e);
        }

        self.counters.evicted.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Evicted unverified member {} from chat {}", key.member_id, key.chat_id);
        true
    }

    /// A member left or was removed. The directory row goes exactly once;
    /// a challenge still outstanding for them is withdrawn without eviction.
    pub async fn on_member_left(&self, chat_id: ChatId, member_id: UserId) {
        if let Err(e) = self.directory.remove_member(member_id.0 as i64).await {
            tracing::error!("Failed to remove member {} from the directory: {}", member_id, e);
        } else {
            tracing::debug!("Member {} left chat {}", member_id, chat_id);
        }

        let key = PendingKey::new(chat_id, member_id);
        if let Some(pending) = self.registry.try_resolve(key).await {
            if let Err(e) = self.transport.delete_message(chat_id, pending.challenge_message_id).await {
                tracing::warn!("Failed to delete challenge of departed member: {}", e);
            }
            tracing::info!("Withdrew challenge of {} who left chat {}", member_id, chat_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::testing::{ callback_id, profile, FakeDirectory, FakeTransport };

    fn settings(mode: ChallengeMode) -> VerificationSettings {
        VerificationSettings {
            mode,
            timeout: Duration::from_secs(120),
            kick_grace: Duration::from_secs(300),
            delete_previous_welcome: true,
            community_name: "Builders".to_string(),
        }
    }

    fn setup(
        mode: ChallengeMode
    ) -> (Arc<VerificationController>, Arc<FakeTransport>, Arc<FakeDirectory>) {
        let transport = Arc::new(FakeTransport::default());
        let directory = Arc::new(FakeDirectory::default());
        let controller = VerificationController::new(
            transport.clone(),
            directory.clone(),
            settings(mode)
        );
        (controller, transport, directory)
    }

    const CHAT: ChatId = ChatId(9);

    #[tokio::test]
    async fn test_join_issues_button_challenge() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");

        let issued = controller.on_members_joined(CHAT, Some(MessageId(1)), &[member]).await;

        assert_eq!(issued, 1);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, Some(MessageId(1)));
        assert_eq!(sent[0].callback_data.as_deref(), Some("verify_123"));
        assert!(controller.registry().is_pending(PendingKey::new(CHAT, UserId(123))).await);
    }

    #[tokio::test]
    async fn test_bots_are_not_challenged() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let mut bot = profile(7, "Helper");
        bot.is_bot = true;

        let issued = controller.on_members_joined(CHAT, None, &[bot, profile(8, "Ada")]).await;

        assert_eq!(issued, 1);
        assert_eq!(transport.sent().len(), 1);
        assert!(!controller.registry().is_pending(PendingKey::new(CHAT, UserId(7))).await);
    }

    #[tokio::test]
    async fn test_second_join_does_not_duplicate_challenge() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");

        controller.on_members_joined(CHAT, None, &[member.clone()]).await;
        let issued = controller.on_members_joined(CHAT, None, &[member]).await;

        assert_eq!(issued, 0);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(controller.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_challenge_send_leaves_member_unpending() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        transport.fail_sends(true);

        let issued = controller.on_members_joined(CHAT, None, &[profile(123, "Ada")]).await;

        assert_eq!(issued, 0);
        assert!(controller.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_button_click_by_target_verifies() {
        let (controller, transport, directory) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");
        controller.on_members_joined(CHAT, None, &[member.clone()]).await;
        let challenge_id = transport.sent()[0].message_id;

        let outcome = controller.on_button_click(callback_id("cb"), CHAT, &member, "verify_123").await;

        assert_eq!(outcome, ClickOutcome::Verified);
        assert!(controller.registry().is_empty().await);
        assert_eq!(directory.added_ids(), vec![123]);
        assert_eq!(transport.answers()[0].text.as_deref(), Some(msg::VERIFIED_TOAST));
        assert!(!transport.answers()[0].show_alert);
        assert!(transport.deleted().contains(&(CHAT, challenge_id)));

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].text.contains("Welcome to Builders"));
        assert_eq!(controller.stats().verified, 1);
    }

    #[tokio::test]
    async fn test_button_click_by_other_user_is_rejected() {
        let (controller, transport, directory) = setup(ChallengeMode::Button);
        controller.on_members_joined(CHAT, None, &[profile(123, "Ada")]).await;

        let outcome = controller.on_button_click(
            callback_id("cb-456"),
            CHAT,
            &profile(456, "Eve"),
            "verify_123"
        ).await;

        assert_eq!(outcome, ClickOutcome::NotYourButton);
        assert!(controller.registry().is_pending(PendingKey::new(CHAT, UserId(123))).await);

        // Exactly one private alert, nothing in the chat
        let answers = transport.answers();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].callback_id, callback_id("cb-456"));
        assert_eq!(answers[0].text.as_deref(), Some(msg::NOT_YOUR_BUTTON));
        assert!(answers[0].show_alert);
        assert_eq!(transport.sent().len(), 1);
        assert!(transport.deleted().is_empty());
        assert!(directory.added_ids().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_ignored() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");
        controller.on_members_joined(CHAT, None, &[member.clone()]).await;

        let outcome = controller.on_button_click(callback_id("cb"), CHAT, &member, "verify_x").await;
        assert_eq!(outcome, ClickOutcome::Ignored);
        let outcome = controller.on_button_click(callback_id("cb"), CHAT, &member, "hello").await;
        assert_eq!(outcome, ClickOutcome::Ignored);

        assert_eq!(controller.registry().len().await, 1);
        // Answered silently
        assert!(transport.answers().iter().all(|a| a.text.is_none() && !a.show_alert));
        assert_eq!(transport.answers().len(), 2);
    }

    #[tokio::test]
    async fn test_click_when_not_pending() {
        let (controller, _, directory) = setup(ChallengeMode::Button);

        let outcome = controller.on_button_click(
            callback_id("cb"),
            CHAT,
            &profile(123, "Ada"),
            "verify_123"
        ).await;

        assert_eq!(outcome, ClickOutcome::NotPending);
        assert!(directory.added_ids().is_empty());
    }

    #[tokio::test]
    async fn test_directory_failure_does_not_block_welcome() {
        let (controller, transport, directory) = setup(ChallengeMode::Button);
        directory.fail_writes(true);
        let member = profile(123, "Ada");
        controller.on_members_joined(CHAT, None, &[member.clone()]).await;

        let outcome = controller.on_button_click(callback_id("cb"), CHAT, &member, "verify_123").await;

        assert_eq!(outcome, ClickOutcome::Verified);
        assert!(controller.registry().is_empty().await);
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_correct_reply_verifies() {
        let (controller, transport, directory) = setup(ChallengeMode::Arithmetic);
        let member = profile(42, "Ada");
        controller
            .issue_challenge(CHAT, None, &member, Challenge::Arithmetic { a: 3, b: 4 }).await
            .unwrap();
        let challenge_id = transport.sent()[0].message_id;

        let outcome = controller.on_reply(CHAT, &member, challenge_id, MessageId(500), "7").await;

        assert_eq!(outcome, ReplyOutcome::Verified);
        assert!(controller.registry().is_empty().await);
        assert_eq!(directory.added_ids(), vec![42]);
        assert!(transport.deleted().contains(&(CHAT, MessageId(500))));
    }

    #[tokio::test]
    async fn test_wrong_reply_keeps_pending() {
        let (controller, transport, directory) = setup(ChallengeMode::Arithmetic);
        let member = profile(42, "Ada");
        controller
            .issue_challenge(CHAT, None, &member, Challenge::Arithmetic { a: 3, b: 4 }).await
            .unwrap();
        let challenge_id = transport.sent()[0].message_id;

        let wrong = controller.on_reply(CHAT, &member, challenge_id, MessageId(500), "8").await;
        let text = controller.on_reply(CHAT, &member, challenge_id, MessageId(501), "seven").await;

        assert_eq!(wrong, ReplyOutcome::WrongAnswer);
        assert_eq!(text, ReplyOutcome::WrongAnswer);
        assert!(controller.registry().is_pending(PendingKey::new(CHAT, UserId(42))).await);
        assert!(directory.added_ids().is_empty());

        // Still allowed to try again
        let retry = controller.on_reply(CHAT, &member, challenge_id, MessageId(502), " 7 ").await;
        assert_eq!(retry, ReplyOutcome::Verified);
    }

    #[tokio::test]
    async fn test_reply_to_other_message_is_ignored() {
        let (controller, _, _) = setup(ChallengeMode::Arithmetic);
        let member = profile(42, "Ada");
        controller
            .issue_challenge(CHAT, None, &member, Challenge::Arithmetic { a: 3, b: 4 }).await
            .unwrap();

        let outcome = controller.on_reply(CHAT, &member, MessageId(9999), MessageId(500), "7").await;

        assert_eq!(outcome, ReplyOutcome::Ignored);
        assert_eq!(controller.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_reply_from_someone_else_is_ignored() {
        let (controller, transport, _) = setup(ChallengeMode::Arithmetic);
        controller
            .issue_challenge(CHAT, None, &profile(42, "Ada"), Challenge::Arithmetic { a: 3, b: 4 }).await
            .unwrap();
        let challenge_id = transport.sent()[0].message_id;

        let outcome = controller.on_reply(
            CHAT,
            &profile(43, "Eve"),
            challenge_id,
            MessageId(500),
            "7"
        ).await;

        assert_eq!(outcome, ReplyOutcome::Ignored);
        assert_eq!(controller.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_button_cannot_bypass_arithmetic() {
        let (controller, _, _) = setup(ChallengeMode::Arithmetic);
        let member = profile(42, "Ada");
        controller
            .issue_challenge(CHAT, None, &member, Challenge::Arithmetic { a: 3, b: 4 }).await
            .unwrap();

        let outcome = controller.on_button_click(callback_id("cb"), CHAT, &member, "verify_42").await;

        assert_eq!(outcome, ClickOutcome::Ignored);
        assert_eq!(controller.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_scenario_member_42_in_chat_9() {
        let (controller, transport, directory) = setup(ChallengeMode::Arithmetic);
        let member = profile(42, "Ada");

        controller
            .issue_challenge(ChatId(9), None, &member, Challenge::Arithmetic { a: 3, b: 4 }).await
            .unwrap();
        let challenge_id = transport.sent()[0].message_id;
        assert!(transport.sent()[0].text.contains("3 + 4"));

        controller.on_reply(ChatId(9), &member, challenge_id, MessageId(77), "7").await;

        assert!(!controller.registry().is_pending(PendingKey::new(ChatId(9), UserId(42))).await);
        assert_eq!(directory.added_ids(), vec![42]);

        let welcomes: Vec<_> = transport
            .sent()
            .into_iter()
            .filter(|m| m.text.contains("Welcome to"))
            .collect();
        assert_eq!(welcomes.len(), 1);

        let challenge_deletions = transport
            .deleted()
            .into_iter()
            .filter(|(chat, id)| *chat == ChatId(9) && *id == challenge_id)
            .count();
        assert_eq!(challenge_deletions, 1);
    }

    #[tokio::test]
    async fn test_evict_acts_once() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        controller.on_members_joined(CHAT, None, &[profile(123, "Ada")]).await;
        let key = PendingKey::new(CHAT, UserId(123));
        let challenge_id = transport.sent()[0].message_id;

        assert!(controller.evict(key, challenge_id).await);
        assert!(!controller.evict(key, challenge_id).await);

        assert_eq!(transport.removed().len(), 1);
        assert_eq!(transport.removed()[0].1, UserId(123));
        assert_eq!(transport.deleted().len(), 1);
        assert!(controller.registry().is_empty().await);
        assert_eq!(controller.stats().evicted, 1);
    }

    #[tokio::test]
    async fn test_evict_after_verification_is_noop() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");
        controller.on_members_joined(CHAT, None, &[member.clone()]).await;
        let challenge_id = transport.sent()[0].message_id;
        controller.on_button_click(callback_id("cb"), CHAT, &member, "verify_123").await;

        assert!(!controller.evict(PendingKey::new(CHAT, UserId(123)), challenge_id).await);
        assert!(transport.removed().is_empty());
    }

    #[tokio::test]
    async fn test_eviction_grace_window() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        controller.on_members_joined(CHAT, None, &[profile(123, "Ada")]).await;

        let challenge_id = transport.sent()[0].message_id;

        let before = Utc::now();
        controller.evict(PendingKey::new(CHAT, UserId(123)), challenge_id).await;

        let (_, _, until) = transport.removed()[0];
        let grace = until - before;
        assert!(grace >= chrono::Duration::seconds(299));
        assert!(grace <= chrono::Duration::seconds(301));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_evicts_unverified_member() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        controller.on_members_joined(CHAT, None, &[profile(123, "Ada")]).await;

        tokio::time::sleep(Duration::from_secs(121)).await;

        assert_eq!(transport.removed().len(), 1);
        assert!(controller.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_cancels_eviction() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");
        controller.on_members_joined(CHAT, None, &[member.clone()]).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        let outcome = controller.on_button_click(callback_id("cb"), CHAT, &member, "verify_123").await;
        assert_eq!(outcome, ClickOutcome::Verified);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(transport.removed().is_empty());
        assert_eq!(controller.stats().evicted, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_verify_and_evict_race() {
        for id in 1..=25u64 {
            let (controller, transport, directory) = setup(ChallengeMode::Button);
            let member = profile(id, "Ada");
            controller.on_members_joined(CHAT, None, &[member.clone()]).await;
            let key = PendingKey::new(CHAT, UserId(id));
            let challenge_id = transport.sent()[0].message_id;
            let data = format!("verify_{}", id);

            let clicker = {
                let controller = controller.clone();
                tokio::spawn(async move {
                    controller.on_button_click(callback_id("cb"), CHAT, &member, &data).await
                })
            };
            let evictor = {
                let controller = controller.clone();
                tokio::spawn(async move { controller.evict(key, challenge_id).await })
            };

            let verified = clicker.await.unwrap() == ClickOutcome::Verified;
            let evicted = evictor.await.unwrap();

            assert!(verified ^ evicted);
            assert!(!controller.registry().is_pending(key).await);
            assert_eq!(directory.added_ids().len(), usize::from(verified));
            assert_eq!(transport.removed().len(), usize::from(evicted));
        }
    }

    #[tokio::test]
    async fn test_previous_welcome_is_replaced() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let first = profile(1, "Ada");
        let second = profile(2, "Bob");
        controller.on_members_joined(CHAT, None, &[first.clone(), second.clone()]).await;

        controller.on_button_click(callback_id("cb"), CHAT, &first, "verify_1").await;
        let first_welcome = transport.sent().last().unwrap().message_id;

        controller.on_button_click(callback_id("cb"), CHAT, &second, "verify_2").await;

        assert!(transport.deleted().contains(&(CHAT, first_welcome)));
    }

    #[tokio::test]
    async fn test_leaving_member_removed_from_directory_once() {
        let (controller, _, directory) = setup(ChallengeMode::Button);

        controller.on_member_left(CHAT, UserId(77)).await;

        assert_eq!(directory.removed_ids(), vec![77]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_pending_member_withdraws_challenge() {
        let (controller, transport, directory) = setup(ChallengeMode::Button);
        controller.on_members_joined(CHAT, None, &[profile(123, "Ada")]).await;
        let challenge_id = transport.sent()[0].message_id;

        controller.on_member_left(CHAT, UserId(123)).await;

        assert_eq!(directory.removed_ids(), vec![123]);
        assert!(controller.registry().is_empty().await);
        assert_eq!(transport.deleted(), vec![(CHAT, challenge_id)]);

        // The cancelled timer never bans them
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(transport.removed().is_empty());
        assert_eq!(controller.stats().evicted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_is_not_evicted_by_earlier_timer() {
        let (controller, transport, _) = setup(ChallengeMode::Button);
        let member = profile(123, "Ada");
        let key = PendingKey::new(CHAT, UserId(123));

        controller.on_members_joined(CHAT, None, &[member.clone()]).await;
        let first_challenge = transport.sent()[0].message_id;
        controller.on_member_left(CHAT, UserId(123)).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        controller.on_members_joined(CHAT, None, &[member.clone()]).await;
        let second_challenge = transport.sent()[1].message_id;
        assert_ne!(first_challenge, second_challenge);

        // A timer armed for the first challenge finds nothing to do
        assert!(!controller.evict(key, first_challenge).await);
        assert!(controller.registry().is_pending(key).await);
        assert!(transport.removed().is_empty());

        // The original deadline passes, the new challenge is still open
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(controller.registry().is_pending(key).await);
        assert!(transport.removed().is_empty());

        // Only the second timer evicts
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.removed().len(), 1);
        assert!(controller.registry().is_empty().await);
        assert_eq!(controller.stats().evicted, 1);
    }

    #[test]
    fn test_profile_to_new_member() {
        let mut member = profile(42, "Ada");
        member.username = Some("ada".to_string());
        let joined_at = Utc::now();

        let row = member.to_new_member(joined_at);

        assert_eq!(row.telegram_id, 42);
        assert_eq!(row.username.as_deref(), Some("ada"));
        assert_eq!(row.joined_at, joined_at);
    }
}
