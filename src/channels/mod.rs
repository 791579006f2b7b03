//! Messaging transports — the Telegram long-poll channel.

pub mod telegram;
pub mod traits;

pub use telegram::TelegramChannel;
pub use traits::{Channel, InboundMessage};
