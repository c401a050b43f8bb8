//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the process is up.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired entries from every registered cache

mod cleanup;

pub use cleanup::spawn_cleanup_task;
