use crate::error::AppError;
use crate::models::{Photo, Stage};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A ceramic piece moving through the stage pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub id: String,
    pub title: String,
    pub clay: String,
    #[serde(default)]
    pub stage: Stage,
    pub date: NaiveDate,
    #[serde(default)]
    pub photos: Vec<Photo>,
    /// One free-text slot per stage
    #[serde(default)]
    pub notes: BTreeMap<Stage, String>,
    #[serde(default)]
    pub glaze_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_glaze: Option<String>,
}

impl Piece {
    /// Creates a new piece at the first stage, dated today
    pub fn new(title: String, clay: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            clay,
            stage: Stage::Wedging,
            date: Local::now().date_naive(),
            photos: Vec::new(),
            notes: BTreeMap::new(),
            glaze_ids: Vec::new(),
            custom_glaze: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        if self.clay.trim().is_empty() {
            return Err(AppError::Validation(
                "Clay body must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Note recorded for `stage`, empty when none was written
    pub fn note(&self, stage: Stage) -> &str {
        self.notes.get(&stage).map(String::as_str).unwrap_or("")
    }

    /// Replaces the note for `stage`, leaving every other slot untouched
    pub fn set_note(&mut self, stage: Stage, content: String) {
        self.notes.insert(stage, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_piece_starts_at_wedging() {
        let piece = Piece::new("Yunomi".to_string(), "Stoneware".to_string());
        assert_eq!(piece.stage, Stage::Wedging);
        assert!(piece.photos.is_empty());
        assert!(piece.notes.is_empty());
        assert!(!piece.id.is_empty());
    }

    #[test]
    fn test_validate_requires_title_and_clay() {
        let piece = Piece::new("  ".to_string(), "Porcelain".to_string());
        assert!(piece.validate().is_err());

        let piece = Piece::new("Bowl".to_string(), "".to_string());
        assert!(piece.validate().is_err());

        let piece = Piece::new("Bowl".to_string(), "Porcelain".to_string());
        assert!(piece.validate().is_ok());
    }

    #[test]
    fn test_notes_are_per_stage() {
        let mut piece = Piece::new("Bowl".to_string(), "Porcelain".to_string());
        piece.set_note(Stage::Bisque, "cone 04".to_string());
        piece.set_note(Stage::Throwing, "2 lb".to_string());
        piece.set_note(Stage::Bisque, "cone 06".to_string());

        assert_eq!(piece.note(Stage::Bisque), "cone 06");
        assert_eq!(piece.note(Stage::Throwing), "2 lb");
        assert_eq!(piece.note(Stage::Glazing), "");
    }

    #[test]
    fn test_reads_stored_shape() {
        let json = r#"{"id":"1","title":"Celadon Bowl","clay":"Porcelain","stage":"glazing",
            "date":"2026-01-10","photos":[],"notes":{"bisque":"slow cool"}}"#;
        let piece: Piece = serde_json::from_str(json).unwrap();
        assert_eq!(piece.stage, Stage::Glazing);
        assert_eq!(piece.note(Stage::Bisque), "slow cool");
        assert!(piece.glaze_ids.is_empty());
        assert_eq!(piece.custom_glaze, None);
    }
}
