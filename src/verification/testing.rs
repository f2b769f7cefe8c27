//! In-memory collaborators for unit tests.

use std::sync::atomic::{ AtomicBool, AtomicI32, Ordering };
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use teloxide::types::{ CallbackQueryId, ChatId, InlineKeyboardButtonKind, MessageId, UserId };

use crate::db::{ MemberDirectory, NewMember };
use crate::error::{ AppError, Result };

use super::controller::MemberProfile;
use super::transport::{ ChatTransport, SendOptions };

pub fn profile(id: u64, first_name: &str) -> MemberProfile {
    MemberProfile {
        id: UserId(id),
        first_name: first_name.to_string(),
        last_name: None,
        username: None,
        is_bot: false,
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub callback_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub callback_id: CallbackQueryId,
    pub text: Option<String>,
    pub show_alert: bool,
}

pub fn callback_id(id: &str) -> CallbackQueryId {
    CallbackQueryId(id.to_string())
}

pub struct FakeTransport {
    next_id: AtomicI32,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<(ChatId, MessageId)>>,
    restricted: Mutex<Vec<(ChatId, UserId, DateTime<Utc>)>>,
    removed: Mutex<Vec<(ChatId, UserId, DateTime<Utc>)>>,
    answers: Mutex<Vec<CallbackAnswer>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            next_id: AtomicI32::new(1000),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            restricted: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTransport {
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(ChatId, MessageId)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn restricted(&self) -> Vec<(ChatId, UserId, DateTime<Utc>)> {
        self.restricted.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<(ChatId, UserId, DateTime<Utc>)> {
        self.removed.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<CallbackAnswer> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: String,
        options: SendOptions
    ) -> Result<MessageId> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AppError::Internal("send failed".to_string()));
        }

        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let callback_data = options.keyboard.as_ref().and_then(|keyboard| {
            keyboard.inline_keyboard
                .iter()
                .flatten()
                .find_map(|button| match &button.kind {
                    InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                    _ => None,
                })
        });

        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            message_id,
            text,
            reply_to: options.reply_to,
            callback_data,
        });
        Ok(message_id)
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.deleted.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: ChatId,
        member_id: UserId,
        until: DateTime<Utc>
    ) -> Result<()> {
        self.restricted.lock().unwrap().push((chat_id, member_id, until));
        Ok(())
    }

    async fn remove_member(
        &self,
        chat_id: ChatId,
        member_id: UserId,
        until: DateTime<Utc>
    ) -> Result<()> {
        self.removed.lock().unwrap().push((chat_id, member_id, until));
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: CallbackQueryId,
        text: Option<String>,
        show_alert: bool
    ) -> Result<()> {
        self.answers.lock().unwrap().push(CallbackAnswer { callback_id, text, show_alert });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    fail_writes: AtomicBool,
    added: Mutex<Vec<NewMember>>,
    removed: Mutex<Vec<i64>>,
}

impl FakeDirectory {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn added_ids(&self) -> Vec<i64> {
        self.added
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.telegram_id)
            .collect()
    }

    pub fn removed_ids(&self) -> Vec<i64> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemberDirectory for FakeDirectory {
    async fn add_member(&self, member: NewMember) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("directory unavailable".to_string()));
        }
        self.added.lock().unwrap().push(member);
        Ok(())
    }

    async fn remove_member(&self, telegram_id: i64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("directory unavailable".to_string()));
        }
        self.removed.lock().unwrap().push(telegram_id);
        Ok(())
    }
}
