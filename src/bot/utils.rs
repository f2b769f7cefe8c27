// Formatting and parsing helpers for the bot module

use std::time::Duration;

use teloxide::utils::markdown::escape;

use crate::services::{ CoinQuote, GasPrices };

pub const DEFAULT_MUTE: Duration = Duration::from_secs(60 * 60);

// Telegram treats restrictions shorter than 30 seconds or longer than
// 366 days as permanent
const MIN_MUTE: Duration = Duration::from_secs(30);
const MAX_MUTE: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Parse a mute duration such as `30m`, `1h`, `2d` or `1h30m`.
/// Returns `None` for empty or malformed input.
pub fn parse_mute_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut digits = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c.is_whitespace() {
            continue;
        }

        let unit: u64 = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            'w' => 7 * 24 * 60 * 60,
            _ => {
                return None;
            }
        };

        if digits.is_empty() {
            return None;
        }
        let value: u64 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(unit)?)?;
        digits.clear();
    }

    // A trailing number without a unit is ambiguous
    if !digits.is_empty() || total == 0 {
        return None;
    }

    Some(Duration::from_secs(total).clamp(MIN_MUTE, MAX_MUTE))
}

/// Human readable duration, e.g. `1h 30m` or `2d`.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let mut parts = Vec::new();

    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            parts.push(format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

// Helper function to format numbers with thousand separators
pub fn format_usd(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, dec_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut result = String::new();
    let chars: Vec<char> = int_part.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, result, dec_part)
}

/// MarkdownV2 caption for a `/price` reply.
pub fn format_price_caption(quote: &CoinQuote) -> String {
    format!(
        "📈 *{} \\({}\\) Price:*\n`${} USD`",
        escape(&quote.id.to_uppercase()),
        escape(&quote.symbol.to_uppercase()),
        format_usd(quote.usd_price)
    )
}

/// MarkdownV2 text for a `/gas` reply.
pub fn format_gas_text(prices: &GasPrices) -> String {
    format!(
        "⛽️ *Current Ethereum Gas Fees:*\n\n\
🐢 *Slow \\(Safe\\):* `{} Gwei`\n\
🚗 *Standard \\(Propose\\):* `{} Gwei`\n\
🚀 *Fast:* `{} Gwei`",
        prices.safe,
        prices.propose,
        prices.fast
    )
}

/// MarkdownV2 text for a `/warn` notice.
pub fn format_warning(target: &str, reason: &str, admin: &str) -> String {
    format!(
        "⚠️ *Warning Issued* ⚠️\n\n*To User*: {}\n*Reason*: {}\n*By Admin*: {}",
        escape(target),
        escape(reason),
        escape(admin)
    )
}
