//! Accept loop and the connection pool it feeds.

pub mod listener;
pub mod pool;

pub use pool::{ConnectionPool, PoolClosed, PoolHandle, PoolSettings};
