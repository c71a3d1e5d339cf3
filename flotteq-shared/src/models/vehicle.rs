/// Vehicle model and database operations
///
/// Every vehicle belongs to a tenant and is owned by one user of that tenant.
/// Plates are unique per tenant and stored uppercase without surrounding
/// whitespace.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE vehicles (
///     id UUID PRIMARY KEY,
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     plate VARCHAR(20) NOT NULL,
///     vin VARCHAR(17),
///     brand VARCHAR(100) NOT NULL,
///     model VARCHAR(100) NOT NULL,
///     year INTEGER,
///     fuel_type VARCHAR(20) NOT NULL DEFAULT 'diesel',
///     mileage INTEGER NOT NULL DEFAULT 0,
///     color VARCHAR(50),
///     status VARCHAR(20) NOT NULL DEFAULT 'active',
///     purchase_date DATE,
///     purchase_price_cents BIGINT,
///     notes TEXT,
///     ...
///     CONSTRAINT vehicles_tenant_plate_key UNIQUE (tenant_id, plate)
/// );
/// ```
///
/// Creation normally goes through `quota::create_vehicle_within_quota`, which
/// wraps [`Vehicle::create`] in the quota check.

use super::UnknownVariant;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;
use uuid::Uuid;

const VEHICLE_COLUMNS: &str = "id, tenant_id, user_id, plate, vin, brand, model, year, fuel_type, \
     mileage, color, status, purchase_date, purchase_price_cents, notes, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Diesel,
    Petrol,
    Electric,
    Hybrid,
    Lpg,
    Other,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Diesel => "diesel",
            FuelType::Petrol => "petrol",
            FuelType::Electric => "electric",
            FuelType::Hybrid => "hybrid",
            FuelType::Lpg => "lpg",
            FuelType::Other => "other",
        }
    }
}

impl FromStr for FuelType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diesel" => Ok(FuelType::Diesel),
            "petrol" => Ok(FuelType::Petrol),
            "electric" => Ok(FuelType::Electric),
            "hybrid" => Ok(FuelType::Hybrid),
            "lpg" => Ok(FuelType::Lpg),
            "other" => Ok(FuelType::Other),
            other => Err(UnknownVariant::new("fuel type", other)),
        }
    }
}

impl TryFrom<String> for FuelType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Operational status of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    /// In service
    Active,

    /// Temporarily off the road for maintenance
    Maintenance,

    /// Parked, out of service
    Inactive,

    /// Kept for history only
    Sold,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Inactive => "inactive",
            VehicleStatus::Sold => "sold",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VehicleStatus::Active),
            "maintenance" => Ok(VehicleStatus::Maintenance),
            "inactive" => Ok(VehicleStatus::Inactive),
            "sold" => Ok(VehicleStatus::Sold),
            other => Err(UnknownVariant::new("vehicle status", other)),
        }
    }
}

impl TryFrom<String> for VehicleStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Vehicle model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: Uuid,

    /// Tenant the vehicle belongs to
    pub tenant_id: Uuid,

    /// Owning user (always a member of `tenant_id`)
    pub user_id: Uuid,

    /// Registration plate (immatriculation), uppercase
    pub plate: String,

    pub vin: Option<String>,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,

    #[sqlx(try_from = "String")]
    pub fuel_type: FuelType,

    /// Odometer reading in kilometres
    pub mileage: i32,

    pub color: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: VehicleStatus,

    pub purchase_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVehicle {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub plate: String,
    pub vin: Option<String>,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub fuel_type: FuelType,
    pub mileage: i32,
    pub color: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Input for updating a vehicle
///
/// Ownership and tenant are not updatable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVehicle {
    pub plate: Option<String>,
    pub vin: Option<Option<String>>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<Option<i32>>,
    pub fuel_type: Option<FuelType>,
    pub mileage: Option<i32>,
    pub color: Option<Option<String>>,
    pub status: Option<VehicleStatus>,
    pub purchase_date: Option<Option<NaiveDate>>,
    pub purchase_price_cents: Option<Option<i64>>,
    pub notes: Option<Option<String>>,
}

/// Normalizes a registration plate for storage and uniqueness checks
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

impl Vehicle {
    /// Inserts a vehicle without any quota check
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateVehicle,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO vehicles (tenant_id, user_id, plate, vin, brand, model, year, fuel_type, \
             mileage, color, purchase_date, purchase_price_cents, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {VEHICLE_COLUMNS}"
        );

        sqlx::query_as::<_, Vehicle>(&query)
            .bind(data.tenant_id)
            .bind(data.user_id)
            .bind(normalize_plate(&data.plate))
            .bind(data.vin)
            .bind(data.brand)
            .bind(data.model)
            .bind(data.year)
            .bind(data.fuel_type.as_str())
            .bind(data.mileage)
            .bind(data.color)
            .bind(data.purchase_date)
            .bind(data.purchase_price_cents)
            .bind(data.notes)
            .fetch_one(executor)
            .await
    }

    /// Finds a vehicle by ID regardless of tenant
    ///
    /// Callers outside the back-office must go through the vehicle policy.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1");

        sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a vehicle by ID within one tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1 AND tenant_id = $2");

        sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Vehicles owned by a user in a tenant, ordered by plate
    pub async fn list_by_owner(
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE tenant_id = $1 AND user_id = $2 ORDER BY plate"
        );

        sqlx::query_as::<_, Vehicle>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Number of vehicles owned by a user
    ///
    /// Takes an executor so the quota check can count inside its transaction.
    pub async fn count_by_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    /// Number of vehicles on the platform
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Partially updates a vehicle
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateVehicle,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE vehicles SET updated_at = NOW()");
        let mut bind_count = 1;

        let mut push = |column: &str, present: bool| {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        };

        push("plate", data.plate.is_some());
        push("vin", data.vin.is_some());
        push("brand", data.brand.is_some());
        push("model", data.model.is_some());
        push("year", data.year.is_some());
        push("fuel_type", data.fuel_type.is_some());
        push("mileage", data.mileage.is_some());
        push("color", data.color.is_some());
        push("status", data.status.is_some());
        push("purchase_date", data.purchase_date.is_some());
        push("purchase_price_cents", data.purchase_price_cents.is_some());
        push("notes", data.notes.is_some());

        query.push_str(&format!(" WHERE id = $1 RETURNING {VEHICLE_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Vehicle>(&query).bind(id);

        if let Some(plate) = data.plate {
            q = q.bind(normalize_plate(&plate));
        }
        if let Some(vin) = data.vin {
            q = q.bind(vin);
        }
        if let Some(brand) = data.brand {
            q = q.bind(brand);
        }
        if let Some(model) = data.model {
            q = q.bind(model);
        }
        if let Some(year) = data.year {
            q = q.bind(year);
        }
        if let Some(fuel_type) = data.fuel_type {
            q = q.bind(fuel_type.as_str());
        }
        if let Some(mileage) = data.mileage {
            q = q.bind(mileage);
        }
        if let Some(color) = data.color {
            q = q.bind(color);
        }
        if let Some(status) = data.status {
            q = q.bind(status.as_str());
        }
        if let Some(purchase_date) = data.purchase_date {
            q = q.bind(purchase_date);
        }
        if let Some(price) = data.purchase_price_cents {
            q = q.bind(price);
        }
        if let Some(notes) = data.notes {
            q = q.bind(notes);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a vehicle and, by cascade, all of its records
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Relative paths of every uploaded file attached to a vehicle
    ///
    /// Read before deleting the vehicle so the files can be removed from the
    /// upload directory after the rows are gone.
    pub async fn stored_files(pool: &PgPool, id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT file_path FROM photos WHERE vehicle_id = $1
            UNION ALL
            SELECT document_path FROM invoices WHERE vehicle_id = $1 AND document_path IS NOT NULL
            UNION ALL
            SELECT report_path FROM technical_inspections WHERE vehicle_id = $1 AND report_path IS NOT NULL
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate("  ab-123-cd "), "AB-123-CD");
    }

    #[test]
    fn test_enum_string_forms() {
        for status in [
            VehicleStatus::Active,
            VehicleStatus::Maintenance,
            VehicleStatus::Inactive,
            VehicleStatus::Sold,
        ] {
            assert_eq!(status.as_str().parse::<VehicleStatus>().unwrap(), status);
        }

        assert_eq!(FuelType::try_from("lpg".to_string()).unwrap(), FuelType::Lpg);
        assert!("kerosene".parse::<FuelType>().is_err());
    }

    #[test]
    fn test_update_vehicle_deserializes_partial_body() {
        let update: UpdateVehicle = serde_json::from_value(serde_json::json!({
            "mileage": 120500,
            "status": "maintenance",
            "notes": null
        }))
        .unwrap();

        assert_eq!(update.mileage, Some(120_500));
        assert_eq!(update.status, Some(VehicleStatus::Maintenance));
        assert!(update.plate.is_none());
        // serde maps an explicit null onto the outer None for Option<Option<_>>
        assert!(update.notes.is_none());
    }
}
