//! 具体渠道实现

pub mod discord;

pub use discord::{DiscordChannel, DiscordConfig};
