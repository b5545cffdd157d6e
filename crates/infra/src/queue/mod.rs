//! Infrastructure work queue implementations.
//!
//! The queue contract and the in-memory queue live in `invsync-events`.
//! This module provides the durable Redis-backed queue.

#[cfg(feature = "redis")]
pub mod redis_list;

#[cfg(feature = "redis")]
pub use redis_list::{RedisQueueError, RedisWorkQueue};
