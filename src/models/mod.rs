//! Request and Response models for the admin API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, KeysQuery, SetRequest, TouchQuery};
pub use responses::{
    CacheListResponse, CleanupResponse, DeleteResponse, ErrorResponse, GetResponse,
    HealthResponse, KeysResponse, MessageResponse, SetResponse, StatsResponse,
};
