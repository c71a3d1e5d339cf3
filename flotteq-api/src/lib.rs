//! # FlotteQ API Server Library
//!
//! HTTP surface of the FlotteQ fleet-management platform.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Json, Path and Query extractors rejecting with `ApiError`
//! - `middleware`: Authentication and security headers
//! - `routes`: API route handlers
//! - `storage`: Upload directory for photos, invoices and inspection reports

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod storage;
