pub mod config;
pub mod enums;
pub mod error;
pub mod db;
pub mod verification;
pub mod services;
pub mod api;
pub mod bot;

pub use config::Config;
pub use enums::ChallengeMode;
pub use error::{ AppError, Result };
