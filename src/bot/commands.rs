use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Community Bot Commands:")]
pub enum Command {
    #[command(description = "Welcome message")]
    Start,

    #[command(description = "Show community rules")]
    Rules,

    #[command(description = "Show list of commands")]
    Help,

    #[command(description = "Get cryptocurrency price - Usage: /price <coin>")] Price(String),

    #[command(description = "Short for /price - Usage: /p <coin>")] P(String),

    #[command(description = "Get current Ethereum gas fees")]
    Gas,

    #[command(description = "(Admin) Warn a user - reply with /warn [reason]")] Warn(String),

    #[command(description = "(Admin) Mute a user - reply with /mute [duration]")] Mute(String),

    #[command(description = "(Admin) Refresh bot commands")]
    Setup,
}
