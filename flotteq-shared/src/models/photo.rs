/// Vehicle photos
///
/// The image bytes live in the upload directory; the row keeps the relative
/// path, the client's file name, the detected content type and a SHA-256
/// checksum. The checksum is unique per vehicle, so uploading the same image
/// twice for one vehicle fails with a unique violation on
/// `photos_vehicle_checksum_key`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const PHOTO_COLUMNS: &str = "id, vehicle_id, tenant_id, file_path, original_name, content_type, \
     size_bytes, checksum, created_at";

/// Name of the constraint rejecting duplicate photos
pub const DUPLICATE_PHOTO_CONSTRAINT: &str = "photos_vehicle_checksum_key";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,

    #[serde(skip_serializing)]
    pub file_path: String,

    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,

    /// Hex-encoded SHA-256 of the file contents
    pub checksum: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhoto {
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,
    pub file_path: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
}

impl Photo {
    pub async fn create(pool: &PgPool, data: CreatePhoto) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO photos (vehicle_id, tenant_id, file_path, original_name, content_type, size_bytes, checksum) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PHOTO_COLUMNS}"
        );

        sqlx::query_as::<_, Photo>(&query)
            .bind(data.vehicle_id)
            .bind(data.tenant_id)
            .bind(data.file_path)
            .bind(data.original_name)
            .bind(data.content_type)
            .bind(data.size_bytes)
            .bind(data.checksum)
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_vehicle(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1 AND vehicle_id = $2");

        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(vehicle_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_vehicle(pool: &PgPool, vehicle_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE vehicle_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Photo>(&query)
            .bind(vehicle_id)
            .fetch_all(pool)
            .await
    }

    /// Deletes a photo row, returning it so the caller can remove the file
    pub async fn delete(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "DELETE FROM photos WHERE id = $1 AND vehicle_id = $2 RETURNING {PHOTO_COLUMNS}"
        );

        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(vehicle_id)
            .fetch_optional(pool)
            .await
    }
}
