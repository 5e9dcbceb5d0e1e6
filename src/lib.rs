//! Discover cast receivers on the local network, keep one control session
//! per device, and serve local media files for them to pull over HTTP.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod http;
pub mod media;
pub mod session;
