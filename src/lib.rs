//! SimpleWeb - minimal HTTP/1.1 server
//!
//! An incremental request parser plus a connection pool that polls every open
//! socket from one task and evicts idle ones.

pub mod config;
pub mod http;
pub mod server;
