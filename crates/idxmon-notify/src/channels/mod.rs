pub mod log;
pub mod push;
pub mod webhook;
