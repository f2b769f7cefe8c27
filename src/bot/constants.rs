// Command descriptions shown in the Telegram command menus
pub mod command_descriptions {
    pub const START: &str = "Welcome message";
    pub const RULES: &str = "Show community rules";
    pub const HELP: &str = "Show list of commands";
    pub const PRICE: &str = "Get cryptocurrency price";
    pub const GAS: &str = "Get current Ethereum gas fees";
    pub const WARN: &str = "(Admin) Warn a user";
    pub const MUTE: &str = "(Admin) Mute a user";
    pub const SETUP: &str = "(Admin) Refresh bot commands";
}

// Bot messages
pub mod messages {
    pub const RULES_TEXT: &str =
        r#"*COMMUNITY RULES* 🧱

1\. *Be Kind & Respectful*: We are a supportive family, not a battleground\.
2\. *Stay On Topic*: Keep discussions related to Web3, building, and technology\.
3\. *No Spam*: Unsolicited promotions or spam are strictly forbidden\.
4\. *Help Each Other*: Come with a mindset to learn, grow, and build together\.
5\. 🚫 No insults, no F\-word, no negativity – we keep it clean and empowering\."#;

    pub const HELP_TEXT: &str =
        r#"Here are the available commands:

/start \- Welcome message
/rules \- Show community rules
/help \- Show this message
/price `<coin>` \- Get cryptocurrency price \(alias: /p\)
/gas \- Get current Ethereum gas fees

*Admin Commands:*
/warn \- Warn a user \(reply to their message\)
/mute \- Mute a user \(reply to their message\)
/setup \- Refresh bot commands"#;

    pub const PRIVATE_INTRO: &str =
        "Add me to your community group and give me admin rights to delete messages and ban users. New members will have to prove they are human before they can stay.";

    // Moderation
    pub const ADMINS_ONLY: &str = "This command is for admins only.";
    pub const WARN_USAGE: &str = "Usage: Reply to a user's message with /warn [optional reason].";
    pub const MUTE_USAGE: &str =
        "Usage: Reply to a user's message with /mute [duration] (e.g. 30m, 1h, 2d). Default is 1 hour.";
    pub const MUTE_FAILED: &str = "An error occurred while trying to mute the user.";
    pub const NO_REASON: &str = "No reason provided.";
    pub const SETUP_DONE: &str = "✅ Bot commands refreshed for this group.";
    pub const SETUP_FAILED: &str = "❌ Failed to refresh bot commands.";
    pub const GROUP_ONLY: &str = "This command only works in groups.";

    // Price / gas
    pub const PRICE_USAGE: &str = "Please specify a cryptocurrency. Usage: /price bitcoin or /p eth";
    pub const GAS_DISABLED: &str = "Sorry, the gas command is not configured by the administrator.";
    pub const GAS_FAILED: &str = "Sorry, an error occurred while fetching gas fees.";
    pub const GAS_API_ERROR: &str = "The gas fee API returned an error. Please check your API key.";

    pub fn start_text(first_name: &str) -> String {
        format!("Hello, {}! I am the community bot. Use /help to see what I can do.", first_name)
    }

    pub fn price_not_found(query: &str) -> String {
        format!("Sorry, could not find data for '{}'.", query)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_texts() {
            assert!(start_text("Ada").contains("Hello, Ada!"));
            assert!(price_not_found("dogg").contains("'dogg'"));
        }
    }
}
