use std::sync::Arc;
use std::time::Duration;

use chrono::{ DateTime, Utc };
use teloxide::prelude::*;
use teloxide::types::{ ChatMember, ParseMode, User };

use crate::error::{ AppError, Result };
use crate::verification::ChatTransport;
use super::{ BotState, setup, utils };
use super::constants::messages as msg;

pub async fn is_admin(bot: &Bot, chat_id: ChatId, user_id: UserId) -> bool {
    match bot.get_chat_member(chat_id, user_id).await {
        Ok(ChatMember { kind, .. }) => kind.is_privileged(),
        Err(e) => {
            tracing::warn!("Failed to look up member {} in chat {}: {}", user_id, chat_id, e);
            false
        }
    }
}

// Group-only, admin-only gate shared by the moderation commands.
// Tells the sender why when it refuses.
async fn require_admin<'a>(bot: &Bot, message: &'a Message) -> ResponseResult<Option<&'a User>> {
    if message.chat.is_private() {
        bot.send_message(message.chat.id, msg::GROUP_ONLY).await?;
        return Ok(None);
    }

    let Some(sender) = message.from.as_ref() else {
        return Ok(None);
    };

    if !is_admin(bot, message.chat.id, sender.id).await {
        bot.send_message(message.chat.id, msg::ADMINS_ONLY).await?;
        return Ok(None);
    }

    Ok(Some(sender))
}

fn reply_target(message: &Message) -> Option<&User> {
    message.reply_to_message().and_then(|replied| replied.from.as_ref())
}

/// Silence `member` in `chat_id` for `duration`. Returns when the
/// restriction lifts.
pub async fn mute_member(
    transport: &dyn ChatTransport,
    chat_id: ChatId,
    member_id: UserId,
    duration: Duration
) -> Result<DateTime<Utc>> {
    let duration = chrono::Duration
        ::from_std(duration)
        .map_err(|e| AppError::InvalidInput(format!("Mute duration out of range: {}", e)))?;
    let until = Utc::now() + duration;

    transport.restrict_member(chat_id, member_id, until).await?;
    Ok(until)
}

pub async fn handle_warn(bot: Bot, message: Message, reason: String) -> ResponseResult<()> {
    let Some(admin) = require_admin(&bot, &message).await? else {
        return Ok(());
    };

    let Some(target) = reply_target(&message) else {
        bot.send_message(message.chat.id, msg::WARN_USAGE).await?;
        return Ok(());
    };

    let reason = reason.trim();
    let reason = if reason.is_empty() { msg::NO_REASON } else { reason };

    bot.send_message(message.chat.id, utils::format_warning(&target.first_name, reason, &admin.first_name))
        .parse_mode(ParseMode::MarkdownV2).await?;

    tracing::info!(
        "Admin {} warned {} in chat {}: {}",
        admin.id,
        target.id,
        message.chat.id,
        reason
    );
    Ok(())
}

pub async fn handle_mute(
    bot: Bot,
    message: Message,
    args: String,
    state: Arc<BotState>
) -> ResponseResult<()> {
    let Some(admin) = require_admin(&bot, &message).await? else {
        return Ok(());
    };

    let Some(target) = reply_target(&message) else {
        bot.send_message(message.chat.id, msg::MUTE_USAGE).await?;
        return Ok(());
    };

    let duration = utils::parse_mute_duration(&args).unwrap_or(utils::DEFAULT_MUTE);

    match mute_member(state.transport.as_ref(), message.chat.id, target.id, duration).await {
        Ok(until) => {
            bot.send_message(
                message.chat.id,
                format!(
                    "🔇 {} has been muted for {}.",
                    target.first_name,
                    utils::format_duration(duration)
                )
            ).await?;

            tracing::info!(
                "Admin {} muted {} in chat {} until {}",
                admin.id,
                target.id,
                message.chat.id,
                until
            );
        }
        Err(e) => {
            tracing::warn!("Failed to mute {} in chat {}: {}", target.id, message.chat.id, e);
            bot.send_message(message.chat.id, msg::MUTE_FAILED).await?;
        }
    }

    Ok(())
}

pub async fn handle_setup(bot: Bot, message: Message) -> ResponseResult<()> {
    if require_admin(&bot, &message).await?.is_none() {
        return Ok(());
    }

    match setup::set_group_commands(&bot, message.chat.id).await {
        Ok(()) => {
            bot.send_message(message.chat.id, msg::SETUP_DONE).await?;
        }
        Err(e) => {
            tracing::error!("Failed to register commands for chat {}: {}", message.chat.id, e);
            bot.send_message(message.chat.id, msg::SETUP_FAILED).await?;
        }
    }

    Ok(())
}
