//! Source code for a bot that lets people report traffic police checkpoints
//! to a shared channel, where others can vote on whether they're still there.

/// Settings from the environment.
pub mod config;

/// Reports, their storage, and everything that happens to them.
pub mod reports;

/// Turning addresses into coordinates.
pub mod geocoding;

/// Parsing of user input and button payloads.
mod parsing;

/// Functions that perform stuff via the bot.
mod actions;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

/// Geocoder used for addresses. [`None`] if there's no API key.
pub type AddressGeocoder = Option<geocoding::YandexGeocoder>;
