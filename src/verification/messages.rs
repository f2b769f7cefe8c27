// Texts and markup posted by the verification flow

use std::time::Duration;

use teloxide::types::{ InlineKeyboardButton, InlineKeyboardMarkup, UserId };

use super::challenge::CallbackAction;

pub const VERIFY_BUTTON: &str = "✅ I'm human";
pub const NOT_YOUR_BUTTON: &str = "This button is not for you.";
pub const ALREADY_RESOLVED: &str = "This verification is no longer active.";
pub const VERIFIED_TOAST: &str = "Verified, welcome!";

pub fn button_challenge(first_name: &str, timeout: Duration) -> String {
    format!(
        "🤖 Welcome, {}! To verify you're human, press the button below within {}.",
        first_name,
        describe_timeout(timeout)
    )
}

pub fn arithmetic_challenge(first_name: &str, a: i64, b: i64, timeout: Duration) -> String {
    format!(
        "🤖 Welcome, {}! To verify you're human, reply to this message with the answer within {}: {} + {} = ?",
        first_name,
        describe_timeout(timeout),
        a,
        b
    )
}

pub fn welcome(first_name: &str, community_name: &str) -> String {
    format!(
        r#"🎉 Welcome to {community}! 🚀

Hey there, {name}! We're so glad to have you in the family. 💪🏽🧱

Here's what we ask from every member:

🤝 Be kind and respectful – we're a supportive family, not a battleground.
🧠 Come with the mindset to learn, grow, and build.
🚫 No insults, no F-word, no negativity – we keep it clean and empowering.
🌍 Share your journey! Feel free to introduce yourself.

Let's build something great, block by block. 🧱🧱🧱"#,
        community = community_name,
        name = first_name
    )
}

// Single "I'm human" button bound to the joining member
pub fn verify_button(member_id: UserId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(
                VERIFY_BUTTON,
                CallbackAction::Verify(member_id).to_string()
            ),
        ],
    ])
}

fn describe_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
    }
}
