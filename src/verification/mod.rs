//! New-member verification: challenge issuance, answer matching and
//! timeout-based eviction.

pub mod challenge;
pub mod controller;
pub mod messages;
pub mod registry;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use challenge::{ CallbackAction, Challenge };
pub use controller::{
    ClickOutcome,
    MemberProfile,
    ReplyOutcome,
    VerificationController,
    VerificationSettings,
    VerificationStats,
};
pub use registry::{ PendingKey, PendingRegistry, PendingSummary, PendingVerification };
pub use scheduler::EvictionScheduler;
pub use transport::{ ChatTransport, SendOptions, TelegramTransport };
