//! Configuration module for calibration prompts.

mod i18n;

pub use i18n::{distance_placeholder, get_messages, Messages, MESSAGES_EN, MESSAGES_ZH};
