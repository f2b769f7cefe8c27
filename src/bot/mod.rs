pub mod handlers;
pub mod commands;
pub mod constants;
pub mod moderation;
pub mod setup;
mod callbacks;
mod utils;

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::dispatching::{ HandlerExt, UpdateHandler, UpdateFilterExt };
use crate::config::Config;
use crate::services::{ GasService, PriceService };
use crate::verification::{ ChatTransport, VerificationController };

pub(crate) type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone)]
pub struct BotState {
    pub verification: Arc<VerificationController>,
    pub transport: Arc<dyn ChatTransport>,
    pub price_service: Arc<PriceService>,
    pub gas_service: Arc<GasService>,
    pub config: Arc<Config>,
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let command_handler = dptree
        ::entry()
        .filter_command::<commands::Command>()
        .endpoint(handlers::handle_command_dispatch);

    let join_handler = dptree
        ::filter(|msg: Message| msg.new_chat_members().is_some())
        .endpoint(handlers::handle_new_members);

    let leave_handler = dptree
        ::filter(|msg: Message| msg.left_chat_member().is_some())
        .endpoint(handlers::handle_left_member);

    // Replies carrying text may answer an arithmetic challenge
    let reply_handler = dptree
        ::filter(|msg: Message| msg.reply_to_message().is_some() && msg.text().is_some())
        .endpoint(handlers::handle_reply);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(join_handler)
        .branch(leave_handler)
        .branch(reply_handler);

    let callback_handler = Update::filter_callback_query().endpoint(callbacks::handle_callback);

    dptree::entry().branch(message_handler).branch(callback_handler)
}

pub async fn run_bot(bot: Bot, state: Arc<BotState>) {
    tracing::info!("Starting Telegram bot for {}...", state.config.community_name);

    // Set bot commands for slash menu
    if let Err(e) = setup::set_default_commands(&bot).await {
        tracing::warn!("Failed to set bot commands: {}", e);
    } else {
        tracing::info!("Bot commands registered successfully");
    }

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            tracing::trace!("Unhandled update: {:?}", upd.id);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch().await;
}
