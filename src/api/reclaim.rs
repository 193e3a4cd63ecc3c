use super::Gateway;
use crate::error::AppError;
use crate::models::{ReclaimBatch, ReclaimStatus};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRow {
    pub id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<BatchRow> for ReclaimBatch {
    fn from(row: BatchRow) -> Self {
        ReclaimBatch {
            id: row.id,
            weight: row.weight_kg,
            source: row.source.unwrap_or_default(),
            notes: row.notes.unwrap_or_default(),
            status: row
                .status
                .as_deref()
                .and_then(ReclaimStatus::parse)
                .unwrap_or(ReclaimStatus::Drying),
            date: row
                .created_at
                .map(|t| t.with_timezone(&Local).date_naive())
                .unwrap_or_else(|| Local::now().date_naive()),
        }
    }
}

/// Newest batch first
pub async fn list(gw: &Gateway) -> Result<Vec<ReclaimBatch>, AppError> {
    let rows: Vec<BatchRow> = gw
        .rest()
        .from("reclaim_batches")
        .select("*")
        .order("created_at", false)
        .fetch()
        .await?;
    Ok(rows.into_iter().map(ReclaimBatch::from).collect())
}

pub async fn get(gw: &Gateway, id: &str) -> Result<ReclaimBatch, AppError> {
    let row: BatchRow = gw
        .rest()
        .from("reclaim_batches")
        .select("*")
        .eq("id", id)
        .single()
        .await?;
    Ok(row.into())
}

pub async fn create(gw: &Gateway, batch: &ReclaimBatch) -> Result<ReclaimBatch, AppError> {
    let user_id = gw.user_id()?;
    let row: BatchRow = gw
        .rest()
        .from("reclaim_batches")
        .insert(&json!({
            "user_id": user_id,
            "source": batch.source,
            "weight_kg": batch.weight,
            "status": batch.status.as_str(),
            "notes": batch.notes,
        }))
        .await?;
    Ok(row.into())
}

pub async fn update(gw: &Gateway, batch: &ReclaimBatch) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("reclaim_batches")
        .eq("id", &batch.id)
        .update(&json!({
            "source": batch.source,
            "weight_kg": batch.weight,
            "status": batch.status.as_str(),
            "notes": batch.notes,
        }))
        .await?;
    Ok(())
}

pub async fn update_status(gw: &Gateway, id: &str, status: ReclaimStatus) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("reclaim_batches")
        .eq("id", id)
        .update(&json!({ "status": status.as_str() }))
        .await?;
    Ok(())
}

pub async fn delete(gw: &Gateway, id: &str) -> Result<(), AppError> {
    gw.rest().from("reclaim_batches").eq("id", id).delete().await
}

#[derive(Debug, Deserialize)]
struct WeightRow {
    weight_kg: Option<f64>,
}

/// Sum of all recorded weights on the server
pub async fn total_weight(gw: &Gateway) -> Result<f64, AppError> {
    let rows: Vec<WeightRow> = gw
        .rest()
        .from("reclaim_batches")
        .select("weight_kg")
        .fetch()
        .await?;
    Ok(rows.iter().filter_map(|r| r.weight_kg).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, StubServer};

    #[test]
    fn test_row_maps_weight_and_status() {
        let row: BatchRow = serde_json::from_value(json!({
            "id": "b1",
            "source": "Trimming scraps",
            "weight_kg": 5.5,
            "status": "wedging",
            "notes": null,
            "created_at": "2026-01-10T10:00:00Z"
        }))
        .unwrap();

        let batch = ReclaimBatch::from(row);
        assert_eq!(batch.weight, Some(5.5));
        assert_eq!(batch.status, ReclaimStatus::WedgingNeeded);
        assert_eq!(batch.notes, "");
    }

    #[test]
    fn test_unknown_status_reads_as_drying() {
        let row: BatchRow = serde_json::from_value(json!({"id": "b2", "status": "frozen"})).unwrap();
        assert_eq!(ReclaimBatch::from(row).status, ReclaimStatus::Drying);
    }

    #[tokio::test]
    async fn test_total_skips_unweighed_batches() {
        let server = StubServer::start(vec![Reply::json(
            "GET",
            "/rest/v1/reclaim_batches?select=weight_kg",
            json!([{"weight_kg": 2.5}, {"weight_kg": null}, {"weight_kg": 1.25}]),
        )]);
        let total = total_weight(&server.gateway()).await.unwrap();
        assert!((total - 3.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_status_update_targets_one_batch() {
        let server = StubServer::start(vec![Reply::json(
            "PATCH",
            "/rest/v1/reclaim_batches",
            json!({"id": "b1", "status": "ready"}),
        )]);
        update_status(&server.gateway(), "b1", ReclaimStatus::Ready)
            .await
            .unwrap();
        assert!(server.received("PATCH", "/rest/v1/reclaim_batches?id=eq.b1"));
    }
}
