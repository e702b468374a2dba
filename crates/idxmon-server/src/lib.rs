pub mod channel_builder;
pub mod config;
pub mod monitor;
pub mod rule_builder;
pub mod source;
