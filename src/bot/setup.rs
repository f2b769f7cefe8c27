// Command menus shown in the Telegram client

use teloxide::prelude::*;
use teloxide::types::{ BotCommand, BotCommandScope, Recipient };

use super::constants::command_descriptions as desc;

/// Default menu, also used in private chats.
pub fn default_commands() -> Vec<BotCommand> {
    let mut commands = vec![BotCommand::new("start", desc::START)];
    commands.extend(member_commands());
    commands
}

/// Commands every group member sees.
pub fn member_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("rules", desc::RULES),
        BotCommand::new("help", desc::HELP),
        BotCommand::new("price", desc::PRICE),
        BotCommand::new("gas", desc::GAS)
    ]
}

/// Member commands plus moderation.
pub fn admin_commands() -> Vec<BotCommand> {
    let mut commands = member_commands();
    commands.extend([
        BotCommand::new("warn", desc::WARN),
        BotCommand::new("mute", desc::MUTE),
        BotCommand::new("setup", desc::SETUP),
    ]);
    commands
}

pub async fn set_default_commands(bot: &Bot) -> ResponseResult<()> {
    bot.set_my_commands(default_commands()).await?;
    Ok(())
}

/// Register per-group menus: members get the basic list, administrators
/// also see the moderation commands.
pub async fn set_group_commands(bot: &Bot, chat_id: ChatId) -> ResponseResult<()> {
    bot
        .set_my_commands(member_commands())
        .scope(BotCommandScope::Chat { chat_id: Recipient::Id(chat_id) }).await?;

    bot
        .set_my_commands(admin_commands())
        .scope(BotCommandScope::ChatAdministrators { chat_id: Recipient::Id(chat_id) }).await?;

    tracing::info!("Registered command menus for chat {}", chat_id);
    Ok(())
}
