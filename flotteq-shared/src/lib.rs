//! # FlotteQ Shared Library
//!
//! This crate contains the types, persistence layer and business rules shared
//! by the FlotteQ API server and the background worker.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migrations
//! - `models`: Database models and their CRUD operations
//! - `auth`: Passwords, JWT tokens, request identity and permission checks
//! - `policy`: Tenant/ownership gate for vehicles and their records
//! - `quota`: Free-vehicle threshold and plan limits
//! - `analytics`: Platform statistics for internal staff

pub mod analytics;
pub mod auth;
pub mod db;
pub mod models;
pub mod policy;
pub mod quota;

/// Current version of the FlotteQ shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
