pub mod clipboard;
pub mod config;
pub mod gateway;
pub mod secret;
pub mod storage;
