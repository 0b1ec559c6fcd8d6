pub mod config;
pub mod library;
pub mod song;
pub mod time;
