/// Invoices (factures) attached to a vehicle
///
/// An invoice records an expense for a vehicle and may point to the
/// maintenance it pays for. The scanned document, if any, lives in the upload
/// directory; only its relative path and original file name are stored here.

use super::UnknownVariant;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "id, vehicle_id, tenant_id, maintenance_id, number, supplier, category, \
     issued_on, amount_cents, document_path, document_name, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceCategory {
    Fuel,
    Maintenance,
    Repair,
    Insurance,
    Inspection,
    Other,
}

impl InvoiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceCategory::Fuel => "fuel",
            InvoiceCategory::Maintenance => "maintenance",
            InvoiceCategory::Repair => "repair",
            InvoiceCategory::Insurance => "insurance",
            InvoiceCategory::Inspection => "inspection",
            InvoiceCategory::Other => "other",
        }
    }
}

impl FromStr for InvoiceCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fuel" => Ok(InvoiceCategory::Fuel),
            "maintenance" => Ok(InvoiceCategory::Maintenance),
            "repair" => Ok(InvoiceCategory::Repair),
            "insurance" => Ok(InvoiceCategory::Insurance),
            "inspection" => Ok(InvoiceCategory::Inspection),
            "other" => Ok(InvoiceCategory::Other),
            other => Err(UnknownVariant::new("invoice category", other)),
        }
    }
}

impl TryFrom<String> for InvoiceCategory {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,

    /// Maintenance this invoice pays for, cleared if the maintenance is deleted
    pub maintenance_id: Option<Uuid>,

    /// Supplier's invoice number
    pub number: Option<String>,

    pub supplier: Option<String>,

    #[sqlx(try_from = "String")]
    pub category: InvoiceCategory,

    pub issued_on: NaiveDate,

    /// Amount including taxes, in cents
    pub amount_cents: i64,

    /// Relative path under the upload directory
    #[serde(skip_serializing)]
    pub document_path: Option<String>,

    /// Original file name of the uploaded document
    pub document_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub vehicle_id: Uuid,
    pub tenant_id: Uuid,
    pub maintenance_id: Option<Uuid>,
    pub number: Option<String>,
    pub supplier: Option<String>,
    pub category: InvoiceCategory,
    pub issued_on: NaiveDate,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub maintenance_id: Option<Option<Uuid>>,
    pub number: Option<Option<String>>,
    pub supplier: Option<Option<String>>,
    pub category: Option<InvoiceCategory>,
    pub issued_on: Option<NaiveDate>,
    pub amount_cents: Option<i64>,
}

impl Invoice {
    pub fn has_document(&self) -> bool {
        self.document_path.is_some()
    }

    pub async fn create(pool: &PgPool, data: CreateInvoice) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO invoices (vehicle_id, tenant_id, maintenance_id, number, supplier, category, issued_on, amount_cents) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {INVOICE_COLUMNS}"
        );

        sqlx::query_as::<_, Invoice>(&query)
            .bind(data.vehicle_id)
            .bind(data.tenant_id)
            .bind(data.maintenance_id)
            .bind(data.number)
            .bind(data.supplier)
            .bind(data.category.as_str())
            .bind(data.issued_on)
            .bind(data.amount_cents)
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_vehicle(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query =
            format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND vehicle_id = $2");

        sqlx::query_as::<_, Invoice>(&query)
            .bind(id)
            .bind(vehicle_id)
            .fetch_optional(pool)
            .await
    }

    /// Invoices of a vehicle, most recent first
    pub async fn list_for_vehicle(pool: &PgPool, vehicle_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE vehicle_id = $1 ORDER BY issued_on DESC, created_at DESC"
        );

        sqlx::query_as::<_, Invoice>(&query)
            .bind(vehicle_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
        data: UpdateInvoice,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE invoices SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.maintenance_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", maintenance_id = ${}", bind_count));
        }
        if data.number.is_some() {
            bind_count += 1;
            query.push_str(&format!(", number = ${}", bind_count));
        }
        if data.supplier.is_some() {
            bind_count += 1;
            query.push_str(&format!(", supplier = ${}", bind_count));
        }
        if data.category.is_some() {
            bind_count += 1;
            query.push_str(&format!(", category = ${}", bind_count));
        }
        if data.issued_on.is_some() {
            bind_count += 1;
            query.push_str(&format!(", issued_on = ${}", bind_count));
        }
        if data.amount_cents.is_some() {
            bind_count += 1;
            query.push_str(&format!(", amount_cents = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND vehicle_id = $2 RETURNING {INVOICE_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, Invoice>(&query).bind(id).bind(vehicle_id);

        if let Some(maintenance_id) = data.maintenance_id {
            q = q.bind(maintenance_id);
        }
        if let Some(number) = data.number {
            q = q.bind(number);
        }
        if let Some(supplier) = data.supplier {
            q = q.bind(supplier);
        }
        if let Some(category) = data.category {
            q = q.bind(category.as_str());
        }
        if let Some(issued_on) = data.issued_on {
            q = q.bind(issued_on);
        }
        if let Some(amount) = data.amount_cents {
            q = q.bind(amount);
        }

        q.fetch_optional(pool).await
    }

    /// Records the stored document of an invoice
    pub async fn attach_document(
        pool: &PgPool,
        vehicle_id: Uuid,
        id: Uuid,
        path: &str,
        original_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE invoices SET document_path = $3, document_name = $4, updated_at = NOW() \
             WHERE id = $1 AND vehicle_id = $2 RETURNING {INVOICE_COLUMNS}"
        );

        sqlx::query_as::<_, Invoice>(&query)
            .bind(id)
            .bind(vehicle_id)
            .bind(path)
            .bind(original_name)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, vehicle_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND vehicle_id = $2")
            .bind(id)
            .bind(vehicle_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!("fuel".parse::<InvoiceCategory>().unwrap(), InvoiceCategory::Fuel);
        assert_eq!(
            InvoiceCategory::try_from("insurance".to_string()).unwrap(),
            InvoiceCategory::Insurance
        );
        assert!("tolls".parse::<InvoiceCategory>().is_err());
    }

    #[test]
    fn test_document_path_is_hidden() {
        let invoice = Invoice {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            maintenance_id: None,
            number: Some("F-2025-001".to_string()),
            supplier: Some("Garage Dupont".to_string()),
            category: InvoiceCategory::Repair,
            issued_on: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            amount_cents: 45_000,
            document_path: Some("invoices/abc.pdf".to_string()),
            document_name: Some("facture.pdf".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(invoice.has_document());
        let json = serde_json::to_value(&invoice).unwrap();
        assert!(json.get("document_path").is_none());
        assert_eq!(json["document_name"], "facture.pdf");
        assert_eq!(json["category"], "repair");
    }
}
