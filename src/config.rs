use std::env;
use std::time::Duration;

use crate::enums::ChallengeMode;

const DEFAULT_VERIFICATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_KICK_GRACE_SECS: u64 = 300;
const MIN_KICK_GRACE_SECS: u64 = 30;
const DEFAULT_COMMUNITY_NAME: &str = "BYB Builders Community";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub etherscan_api_key: Option<String>,
    pub challenge_mode: ChallengeMode,
    pub verification_timeout: Duration,
    pub kick_grace: Duration,
    pub delete_previous_welcome: bool,
    pub community_name: String,
    pub server_host: String,
    pub server_port: u16,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
        where F: Fn(&str) -> Option<String>
    {
        let required = |key: &str| -> Result<String, Box<dyn std::error::Error>> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(format!("{} not set", key).into()),
            }
        };

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let database_url = required("DATABASE_URL")?;

        let etherscan_api_key = lookup("ETHERSCAN_API_KEY").filter(|k| !k.trim().is_empty());
        if etherscan_api_key.is_none() {
            tracing::warn!("ETHERSCAN_API_KEY not set. The /gas command will not work.");
        }

        let challenge_mode = match lookup("CHALLENGE_MODE") {
            Some(mode) => mode.parse::<ChallengeMode>()?,
            None => ChallengeMode::default(),
        };

        let verification_timeout_secs: u64 = lookup("VERIFICATION_TIMEOUT_SECS")
            .unwrap_or_else(|| DEFAULT_VERIFICATION_TIMEOUT_SECS.to_string())
            .parse()?;
        if verification_timeout_secs == 0 {
            return Err("VERIFICATION_TIMEOUT_SECS must be greater than zero".into());
        }

        let kick_grace_secs: u64 = lookup("KICK_GRACE_SECS")
            .unwrap_or_else(|| DEFAULT_KICK_GRACE_SECS.to_string())
            .parse()?;
        // Telegram bans shorter than 30 seconds are permanent
        if kick_grace_secs < MIN_KICK_GRACE_SECS {
            return Err(format!("KICK_GRACE_SECS must be at least {}", MIN_KICK_GRACE_SECS).into());
        }

        let delete_previous_welcome = Self::parse_bool(
            lookup("DELETE_PREVIOUS_WELCOME").as_deref(),
            true
        )?;

        let community_name = lookup("COMMUNITY_NAME")
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COMMUNITY_NAME.to_string());

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = lookup("SERVER_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()?;

        let run_migrations = Self::parse_bool(lookup("RUN_MIGRATIONS").as_deref(), true)?;

        Ok(Config {
            telegram_bot_token,
            database_url,
            etherscan_api_key,
            challenge_mode,
            verification_timeout: Duration::from_secs(verification_timeout_secs),
            kick_grace: Duration::from_secs(kick_grace_secs),
            delete_previous_welcome,
            community_name,
            server_host,
            server_port,
            run_migrations,
        })
    }

    fn parse_bool(value: Option<&str>, default: bool) -> Result<bool, Box<dyn std::error::Error>> {
        let Some(value) = value else {
            return Ok(default);
        };

        match value.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(format!("Invalid boolean value: {}", other).into()),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Whether the `/gas` command has an API key to work with.
    pub fn gas_enabled(&self) -> bool {
        self.etherscan_api_key.is_some()
    }
}
