/// Maintenance records and replaced parts
///
/// Both tables are reached through their vehicle: routes authorize the parent
/// vehicle first, then address the record with `vehicle_id` in the WHERE
/// clause so an id from another vehicle never matches.

use super::UnknownVariant;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

const MAINTENANCE_COLUMNS: &str = "id, vehicle_id, tenant_id, kind, status, performed_on, mileage, \
     garage, description, cost_cents, created_at, updated_at";

const PART_COLUMNS: &str =
    "id, maintenance_id, name, reference, quantity, unit_price_cents, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceKind {
    /// Scheduled servicing (vidange, révision)
    Service,
    Repair,
    Tires,
    Bodywork,
    Other,
}

impl MaintenanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceKind::Service => "service",
            MaintenanceKind::Repair => "repair",
            MaintenanceKind::Tires => "tires",
            MaintenanceKind::Bodywork => "bodywork",
            MaintenanceKind::Other => "other",
        }
    }
}

impl FromStr for MaintenanceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(MaintenanceKind::Service),
            "repair" => Ok(MaintenanceKind::Repair),
            "tires" => Ok(MaintenanceKind::Tires),
            "bodywork" => Ok(MaintenanceKind::Bodywork),
            "other" => Ok(MaintenanceKind::Other),
            other => Err(UnknownVariant::new("maintenance kind", other)),
        }
    }
}

impl TryFrom<String> for MaintenanceKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Scheduled => "scheduled",
            MaintenanceStatus::Completed => "completed",
            MaintenanceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for MaintenanceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MaintenanceStatus::Scheduled),
            "completed" => Ok(MaintenanceStatus::Completed),
            "cancelled" => Ok(MaintenanceStatus::Cancelled),
            other => Err(UnknownVariant::new("maintenance status", other)),
        }
    }
}

impl TryFrom<String> for MaintenanceStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Maintenance {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,

    #[sqlx(try_from = "String")]
    pub kind: MaintenanceKind,

    #[sqlx(try_from = "String")]
    pub status: MaintenanceStatus,

    pub performed_on: NaiveDate,
    pub mileage: Option<i32>,
    pub garage: Option<String>,
    pub description: String,

    /// Labour and parts total, in cents
    pub cost_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMaintenance {
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: MaintenanceKind,
    pub status: MaintenanceStatus,
    pub performed_on: NaiveDate,
    pub mileage: Option<i32>,
    pub garage: Option<String>,
    pub description: String,
    pub cost_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMaintenance {
    pub kind: Option<MaintenanceKind>,
    pub status: Option<MaintenanceStatus>,
    pub performed_on: Option<NaiveDate>,
    pub mileage: Option<Option<i32>>,
    pub garage: Option<Option<String>>,
    pub description: Option<String>,
    pub cost_cents: Option<i64>,
}

/// A part replaced during a maintenance (pièce changée)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReplacedPart {
    pub id: Uuid,
    pub maintenance_id: Uuid,
    pub name: String,
    pub reference: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReplacedPart {
    pub maintenance_id: Uuid,
    pub name: String,
    pub reference: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl ReplacedPart {
    pub fn total_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }

    pub async fn create(pool: &PgPool, data: CreateReplacedPart) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO replaced_parts (maintenance_id, name, reference, quantity, unit_price_cents) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PART_COLUMNS}"
        );

        sqlx::query_as::<_, ReplacedPart>(&query)
            .bind(data.maintenance_id)
            .bind(data.name)
            .bind(data.reference)
            .bind(data.quantity)
            .bind(data.unit_price_cents)
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_maintenance(
        pool: &PgPool,
        maintenance_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PART_COLUMNS} FROM replaced_parts WHERE maintenance_id = $1 ORDER BY created_at"
        );

        sqlx::query_as::<_, ReplacedPart>(&query)
            .bind(maintenance_id)
            .fetch_all(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, maintenance_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM replaced_parts WHERE id = $1 AND maintenance_id = $2")
            .bind(id)
            .bind(maintenance_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl Maintenance {
    pub async fn create(pool: &PgPool, data: CreateMaintenance) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO maintenances (vehicle_id, tenant_id, kind, status, performed_on, mileage, garage, description, cost_cents) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {MAINTENANCE_COLUMNS}"
        );

        sqlx::query_as::<_, Maintenance>(&query)
            .bind(data.vehicle_id)
            .bind(data.tenant_id)
            .bind(data.kind.as_str())
            .bind(data.status.as_str())
            .bind(data.performed_on)
            .bind(data.mileage)
            .bind(data.garage)
            .bind(data.description)
            .bind(data.cost_cents)
            .fetch_one(pool)
            .await
    }

    /// Finds a maintenance of one vehicle
    pub async fn find_for_vehicle(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenances WHERE id = $1 AND vehicle_id = $2"
        );

        sqlx::query_as::<_, Maintenance>(&query)
            .bind(id)
            .bind(vehicle_id)
            .fetch_optional(pool)
            .await
    }

    /// Maintenance history of a vehicle, most recent first
    pub async fn list_for_vehicle(pool: &PgPool, vehicle_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenances WHERE vehicle_id = $1 \
             ORDER BY performed_on DESC, created_at DESC"
        );

        sqlx::query_as::<_, Maintenance>(&query)
            .bind(vehicle_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
        data: UpdateMaintenance,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE maintenances SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.kind.is_some() {
            bind_count += 1;
            query.push_str(&format!(", kind = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.performed_on.is_some() {
            bind_count += 1;
            query.push_str(&format!(", performed_on = ${}", bind_count));
        }
        if data.mileage.is_some() {
            bind_count += 1;
            query.push_str(&format!(", mileage = ${}", bind_count));
        }
        if data.garage.is_some() {
            bind_count += 1;
            query.push_str(&format!(", garage = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.cost_cents.is_some() {
            bind_count += 1;
            query.push_str(&format!(", cost_cents = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND vehicle_id = $2 RETURNING {MAINTENANCE_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, Maintenance>(&query).bind(id).bind(vehicle_id);

        if let Some(kind) = data.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(status) = data.status {
            q = q.bind(status.as_str());
        }
        if let Some(performed_on) = data.performed_on {
            q = q.bind(performed_on);
        }
        if let Some(mileage) = data.mileage {
            q = q.bind(mileage);
        }
        if let Some(garage) = data.garage {
            q = q.bind(garage);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(cost) = data.cost_cents {
            q = q.bind(cost);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a maintenance and its parts; linked invoices keep existing
    pub async fn delete(pool: &PgPool, vehicle_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM maintenances WHERE id = $1 AND vehicle_id = $2")
            .bind(id)
            .bind(vehicle_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
