use std::sync::Arc;

use teloxide::prelude::*;

use crate::bot::{ BotState, HandlerResult };
use crate::verification::MemberProfile;

pub async fn handle_callback(q: CallbackQuery, state: Arc<BotState>) -> HandlerResult {
    let (Some(data), Some(chat_id)) = (
        q.data.as_deref(),
        q.message.as_ref().map(|m| m.chat().id),
    ) else {
        // Remove the loading state
        state.transport.answer_callback(q.id.clone(), None, false).await?;
        return Ok(());
    };

    let clicker = MemberProfile::from(&q.from);
    let outcome = state.verification.on_button_click(q.id.clone(), chat_id, &clicker, data).await;
    tracing::debug!("Button press by {} in chat {}: {:?}", clicker.id, chat_id, outcome);

    Ok(())
}
