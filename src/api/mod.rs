//! API Module
//!
//! Admin HTTP surface over the registered caches.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /caches` - Stats of every cache
//! - `GET /caches/:name/stats` - Stats and most read keys of one cache
//! - `GET /caches/:name/keys` - Keys, optionally filtered by `?pattern=`
//! - `PUT /caches/:name/entries` - Store a value
//! - `GET /caches/:name/entries/:key` - Read a value
//! - `DELETE /caches/:name/entries/:key` - Delete a value
//! - `POST /caches/:name/entries/:key/touch` - Restart an entry's TTL
//! - `POST /caches/:name/clear` - Drop everything and reset stats
//! - `POST /caches/:name/cleanup` - Purge expired entries now
//! - `POST /caches/:name/invalidate` - Drop entries carrying any of the given tags

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
