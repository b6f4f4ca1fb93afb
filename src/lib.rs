//! Treewatch - posts build-tree and roll status transitions to a chat webhook

pub mod commands;
pub mod config;
pub mod error;
pub mod feeds;
pub mod notify;
pub mod telemetry;
pub mod transport;
pub mod watch;
