//! TCPChat server library.
//!
//! Clients connect over TCP, send a name, and every line they send afterwards
//! is relayed to all joined clients with a timestamp and the sender's name.

pub mod chatlog;
pub mod config;
pub mod engine;
pub mod server;
pub mod tcp;
