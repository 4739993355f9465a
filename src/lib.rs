//! Vidforge - self-hosted video sharing
//!
//! The library holds the server (session protocol, stores, transcoding
//! pipeline) and the client (connection, playback scheduler). The binary
//! wires them to the command line.

pub mod client;
pub mod config;
pub mod pipeline;
pub mod protocol;
pub mod server;
pub mod store;
