use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId,
    ChatPermissions,
    InlineKeyboardMarkup,
    MessageId,
    ReplyParameters,
};

use crate::error::Result;

/// Extra knobs for an outgoing message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub keyboard: Option<InlineKeyboardMarkup>,
    pub reply_to: Option<MessageId>,
}

impl SendOptions {
    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// The chat operations the verification flow and moderation commands need.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: String,
        options: SendOptions
    ) -> Result<MessageId>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    /// Revoke all permissions of a member until `until`.
    async fn restrict_member(
        &self,
        chat_id: ChatId,
        member_id: UserId,
        until: DateTime<Utc>
    ) -> Result<()>;

    /// Remove a member from the chat. They may rejoin after `until`.
    async fn remove_member(
        &self,
        chat_id: ChatId,
        member_id: UserId,
        until: DateTime<Utc>
    ) -> Result<()>;

    /// Answer a button press. Only the presser sees `text`; with
    /// `show_alert` it is shown as a dialog instead of a toast.
    async fn answer_callback(
        &self,
        callback_id: CallbackQueryId,
        text: Option<String>,
        show_alert: bool
    ) -> Result<()>;
}

/// `ChatTransport` backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: String,
        options: SendOptions
    ) -> Result<MessageId> {
        let mut request = self.bot.send_message(chat_id, text);
        if let Some(keyboard) = options.keyboard {
            request = request.reply_markup(keyboard);
        }
        if let Some(reply_to) = options.reply_to {
            request = request.reply_parameters(ReplyParameters::new(reply_to));
        }

        let sent = request.await?;
        Ok(sent.id)
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.bot.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: ChatId,
        member_id: UserId,
        until: DateTime<Utc>
    ) -> Result<()> {
        self.bot
            .restrict_chat_member(chat_id, member_id, ChatPermissions::empty())
            .until_date(until).await?;
        Ok(())
    }

    async fn remove_member(
        &self,
        chat_id: ChatId,
        member_id: UserId,
        until: DateTime<Utc>
    ) -> Result<()> {
        self.bot.ban_chat_member(chat_id, member_id).until_date(until).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: CallbackQueryId,
        text: Option<String>,
        show_alert: bool
    ) -> Result<()> {
        let mut request = self.bot.answer_callback_query(callback_id);
        if let Some(text) = text {
            request = request.text(text);
        }
        if show_alert {
            request = request.show_alert(true);
        }

        request.await?;
        Ok(())
    }
}
