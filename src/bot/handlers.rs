use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ InputFile, Me, ParseMode };

use crate::bot::{ BotState, HandlerResult, commands::Command, moderation, setup, utils };
use crate::error::AppError;
use crate::verification::{ MemberProfile, ReplyOutcome };
use super::constants::messages as msg;

// Handler for dispatcher-based command handling
pub async fn handle_command_dispatch(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>
) -> HandlerResult {
    handle_command(bot, msg, cmd, state).await?;
    Ok(())
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg).await,
        Command::Rules => handle_rules(bot, msg).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Price(query) | Command::P(query) => handle_price(bot, msg, query, state).await,
        Command::Gas => handle_gas(bot, msg, state).await,
        Command::Warn(reason) => moderation::handle_warn(bot, msg, reason).await,
        Command::Mute(args) => moderation::handle_mute(bot, msg, args, state).await,
        Command::Setup => moderation::handle_setup(bot, msg).await,
    }
}

async fn handle_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    let first_name = msg.from
        .as_ref()
        .map(|user| user.first_name.as_str())
        .unwrap_or("there");

    bot.send_message(msg.chat.id, msg::start_text(first_name)).await?;

    if msg.chat.is_private() {
        bot.send_message(msg.chat.id, msg::PRIVATE_INTRO).await?;
    }

    Ok(())
}

async fn handle_rules(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, msg::RULES_TEXT).parse_mode(ParseMode::MarkdownV2).await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, msg::HELP_TEXT).parse_mode(ParseMode::MarkdownV2).await?;
    Ok(())
}

async fn handle_price(
    bot: Bot,
    msg: Message,
    query: String,
    state: Arc<BotState>
) -> ResponseResult<()> {
    let query = query.trim();
    if query.is_empty() {
        bot.send_message(msg.chat.id, msg::PRICE_USAGE).await?;
        return Ok(());
    }

    let quote = match state.price_service.get_price(query).await {
        Ok(quote) => quote,
        Err(AppError::NotFound(_)) => {
            tracing::debug!("Unknown coin '{}'", query);
            bot.send_message(msg.chat.id, msg::price_not_found(query)).await?;
            return Ok(());
        }
        Err(e) => {
            tracing::warn!("Price lookup for '{}' failed: {}", query, e);
            bot.send_message(msg.chat.id, msg::price_not_found(query)).await?;
            return Ok(());
        }
    };

    let caption = utils::format_price_caption(&quote);
    let image = quote.image_url.as_deref().and_then(|url| reqwest::Url::parse(url).ok());

    if let Some(image) = image {
        let sent = bot
            .send_photo(msg.chat.id, InputFile::url(image))
            .caption(caption.clone())
            .parse_mode(ParseMode::MarkdownV2).await;

        match sent {
            Ok(_) => {
                return Ok(());
            }
            Err(e) => {
                tracing::debug!("Sending coin image failed, falling back to text: {}", e);
            }
        }
    }

    bot.send_message(msg.chat.id, caption).parse_mode(ParseMode::MarkdownV2).await?;
    Ok(())
}

async fn handle_gas(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !state.gas_service.is_configured() {
        bot.send_message(msg.chat.id, msg::GAS_DISABLED).await?;
        return Ok(());
    }

    match state.gas_service.get_gas_prices().await {
        Ok(prices) => {
            bot
                .send_message(msg.chat.id, utils::format_gas_text(&prices))
                .parse_mode(ParseMode::MarkdownV2).await?;
        }
        Err(AppError::Config(detail)) => {
            tracing::error!("Gas oracle rejected the request: {}", detail);
            bot.send_message(msg.chat.id, msg::GAS_API_ERROR).await?;
        }
        Err(e) => {
            tracing::error!("Failed to fetch gas prices: {}", e);
            bot.send_message(msg.chat.id, msg::GAS_FAILED).await?;
        }
    }

    Ok(())
}

/// Join service message: register menus if we were the one added, then
/// challenge every human that joined.
pub async fn handle_new_members(
    bot: Bot,
    msg: Message,
    me: Me,
    state: Arc<BotState>
) -> HandlerResult {
    let Some(new_members) = msg.new_chat_members() else {
        return Ok(());
    };

    if new_members.iter().any(|user| user.id == me.id) {
        tracing::info!("Added to chat {} ({})", msg.chat.title().unwrap_or("untitled"), msg.chat.id);
        if let Err(e) = setup::set_group_commands(&bot, msg.chat.id).await {
            tracing::warn!("Failed to register group commands: {}", e);
        }
    }

    let members: Vec<MemberProfile> = new_members
        .iter()
        .filter(|user| user.id != me.id)
        .map(MemberProfile::from)
        .collect();

    if members.is_empty() {
        return Ok(());
    }

    let issued = state.verification.on_members_joined(msg.chat.id, Some(msg.id), &members).await;
    tracing::debug!("{} of {} new members challenged in chat {}", issued, members.len(), msg.chat.id);

    Ok(())
}

pub async fn handle_left_member(msg: Message, state: Arc<BotState>) -> HandlerResult {
    if let Some(user) = msg.left_chat_member() {
        state.verification.on_member_left(msg.chat.id, user.id).await;
    }
    Ok(())
}

/// Text replies are candidate answers to arithmetic challenges.
pub async fn handle_reply(msg: Message, state: Arc<BotState>) -> HandlerResult {
    let (Some(from), Some(replied), Some(text)) = (
        msg.from.as_ref(),
        msg.reply_to_message(),
        msg.text(),
    ) else {
        return Ok(());
    };

    let outcome = state.verification.on_reply(
        msg.chat.id,
        &MemberProfile::from(from),
        replied.id,
        msg.id,
        text
    ).await;

    if outcome == ReplyOutcome::WrongAnswer {
        tracing::debug!("Wrong answer from {} in chat {}", from.id, msg.chat.id);
    }

    Ok(())
}
