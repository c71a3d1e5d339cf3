/// Middleware modules for the API server
///
/// - `auth`: bearer token → `AuthContext` request extension
/// - `security`: security headers on every response

pub mod auth;
pub mod security;
