use crate::error::AppError;
use crate::models::Photo;
use serde::{Deserialize, Serialize};

/// A glaze recipe with its test tiles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Glaze {
    pub id: String,
    pub name: String,
    /// Firing range such as "Cone 6"
    #[serde(rename = "type")]
    pub firing_type: String,
    #[serde(default)]
    pub recipe: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tiles: Vec<Photo>,
    #[serde(default)]
    pub is_public: bool,
}

impl Glaze {
    pub fn new(name: String, firing_type: String, recipe: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            firing_type,
            recipe,
            notes: String::new(),
            tiles: Vec::new(),
            is_public: false,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        if self.firing_type.trim().is_empty() {
            return Err(AppError::Validation(
                "Firing type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Glaze::new("Temmoku".into(), "Cone 10".into(), String::new())
            .validate()
            .is_ok());
        assert!(Glaze::new("Temmoku".into(), " ".into(), String::new())
            .validate()
            .is_err());
    }

    #[test]
    fn test_firing_type_is_stored_as_type() {
        let glaze = Glaze::new("Leach Blue".into(), "Cone 6".into(), "Silica 25%".into());
        let value = serde_json::to_value(&glaze).unwrap();
        assert_eq!(value["type"], "Cone 6");
        assert_eq!(value["isPublic"], false);
    }
}
