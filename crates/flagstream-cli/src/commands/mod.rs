pub mod config;
pub mod stream;
