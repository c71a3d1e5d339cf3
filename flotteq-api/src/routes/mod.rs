/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: registration, login, token refresh, Google sign-in, current identity
/// - `users`: tenant user management
/// - `vehicles`: vehicles, with the quota gate on creation
/// - `maintenances`, `invoices`, `inspections`, `photos`: records attached to a vehicle
/// - `subscriptions`: plans and the caller's enrollment
/// - `admin`: back-office tenant/plan management and analytics

pub mod admin;
pub mod auth;
pub mod health;
pub mod inspections;
pub mod invoices;
pub mod maintenances;
pub mod photos;
pub mod subscriptions;
pub mod users;
pub mod vehicles;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Deserializes a nullable field of a partial update
///
/// With `#[serde(default, deserialize_with = "nullable")]`, an absent field
/// stays `None` (leave unchanged) while an explicit `null` becomes
/// `Some(None)` (clear the column).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Serves a stored file inline
pub(crate) fn file_response(data: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));

    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file_name))
        .unwrap_or(HeaderValue::from_static("inline"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);

        let cleared: Patch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(cleared.notes, Some(None));

        let set: Patch = serde_json::from_str(r#"{"notes": "pneus neufs"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("pneus neufs".to_string())));
    }

    #[test]
    fn test_pagination_bounds() {
        let page = Pagination::default();
        assert_eq!((page.limit(), page.offset()), (50, 0));

        let page = Pagination { limit: Some(10_000), offset: Some(-3) };
        assert_eq!((page.limit(), page.offset()), (200, 0));
    }

    #[test]
    fn test_file_response_headers() {
        let response = file_response(b"%PDF-".to_vec(), "application/pdf", "facture.pdf");

        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"facture.pdf\""
        );
    }
}
