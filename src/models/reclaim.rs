use crate::error::AppError;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReclaimStatus {
    Drying,
    Soaking,
    Ready,
    #[serde(rename = "wedging")]
    WedgingNeeded,
}

impl ReclaimStatus {
    pub const ALL: [ReclaimStatus; 4] = [
        ReclaimStatus::Drying,
        ReclaimStatus::Soaking,
        ReclaimStatus::Ready,
        ReclaimStatus::WedgingNeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReclaimStatus::Drying => "drying",
            ReclaimStatus::Soaking => "soaking",
            ReclaimStatus::Ready => "ready",
            ReclaimStatus::WedgingNeeded => "wedging",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReclaimStatus::Drying => "Drying",
            ReclaimStatus::Soaking => "Soaking",
            ReclaimStatus::Ready => "Ready to Use",
            ReclaimStatus::WedgingNeeded => "Needs Wedging",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "drying" => Some(ReclaimStatus::Drying),
            "soaking" => Some(ReclaimStatus::Soaking),
            "ready" => Some(ReclaimStatus::Ready),
            "wedging" | "wedging-needed" => Some(ReclaimStatus::WedgingNeeded),
            _ => None,
        }
    }
}

/// A batch of scrap clay being reprocessed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReclaimBatch {
    pub id: String,
    /// Kilograms, absent when not weighed
    pub weight: Option<f64>,
    pub source: String,
    #[serde(default)]
    pub notes: String,
    pub status: ReclaimStatus,
    pub date: NaiveDate,
}

impl ReclaimBatch {
    pub fn new(source: String, weight: Option<f64>, notes: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            weight,
            source,
            notes,
            status: ReclaimStatus::Drying,
            date: Local::now().date_naive(),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.source.trim().is_empty() {
            return Err(AppError::Validation("Source must not be empty".to_string()));
        }
        validate_weight(self.weight)
    }
}

pub fn validate_weight(weight: Option<f64>) -> Result<(), AppError> {
    match weight {
        Some(w) if !w.is_finite() || w < 0.0 => Err(AppError::Validation(
            "Weight must be a non-negative number".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Sum of all recorded weights; unweighed batches count as nothing
pub fn total_reclaimed(batches: &[ReclaimBatch]) -> f64 {
    batches.iter().filter_map(|b| b.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_ignores_unweighed_batches() {
        let batches = vec![
            ReclaimBatch::new("Trimming scraps".into(), Some(5.5), String::new()),
            ReclaimBatch::new("Failed throws".into(), None, String::new()),
            ReclaimBatch::new("Slop bucket".into(), Some(2.0), String::new()),
        ];
        assert!((total_reclaimed(&batches) - 7.5).abs() < f64::EPSILON);
        assert_eq!(total_reclaimed(&[]), 0.0);
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(None).is_ok());
        assert!(validate_weight(Some(0.0)).is_ok());
        assert!(validate_weight(Some(-1.0)).is_err());
        assert!(validate_weight(Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_new_batch_is_drying() {
        let batch = ReclaimBatch::new("Trimming scraps".into(), None, String::new());
        assert_eq!(batch.status, ReclaimStatus::Drying);
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn test_wedging_needed_serializes_as_wedging() {
        let json = serde_json::to_string(&ReclaimStatus::WedgingNeeded).unwrap();
        assert_eq!(json, "\"wedging\"");
        assert_eq!(ReclaimStatus::parse("wedging"), Some(ReclaimStatus::WedgingNeeded));
    }
}
